use chrono::{DateTime, NaiveDate, Utc};

/// Injected time source. Revenue rows are bucketed by the calendar month in
/// which a profit-affecting event happens, so handlers must never read the
/// wall clock directly.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// (English month name, 4-digit year) key for a revenue row.
pub fn month_bucket(date: NaiveDate) -> (String, String) {
    (date.format("%B").to_string(), date.format("%Y").to_string())
}

/// 0-based position of an English month name, for sorting revenue rows.
pub fn month_index(name: &str) -> Option<usize> {
    MONTH_NAMES.iter().position(|m| *m == name)
}

/// Fixed clock for tests: month bucketing must be exercised without waiting
/// for a real calendar rollover.
#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl TimeSource for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
