#[cfg(test)]
mod tests {
    use crate::clock::{month_bucket, month_index, FixedClock, TimeSource, MONTH_NAMES};
    use crate::commands::leads::handover::close_profit;
    use crate::commands::leads::intake::{
        status_transition_allowed, STATUS_CLOSED, STATUS_INPROGRESS, STATUS_LOSS, STATUS_WON,
    };
    use chrono::{NaiveDate, TimeZone, Utc};

    /// Profit recognized at handover is a point-in-time snapshot:
    /// (cash + online) - (expense + gst)
    #[test]
    fn test_close_profit_snapshot() {
        assert_eq!(close_profit(1000, 500, 300, 100), 1100);

        // A project can close at a loss.
        assert_eq!(close_profit(100, 0, 300, 50), -250);

        // Empty lead closes at zero.
        assert_eq!(close_profit(0, 0, 0, 0), 0);
    }

    #[test]
    fn test_month_bucket_formatting() {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(month_bucket(jan), ("January".to_string(), "2024".to_string()));

        let dec = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        assert_eq!(month_bucket(dec), ("December".to_string(), "2025".to_string()));
    }

    #[test]
    fn test_month_index_orders_buckets() {
        assert_eq!(month_index("January"), Some(0));
        assert_eq!(month_index("December"), Some(11));
        assert_eq!(month_index("Smarch"), None);

        // Every bucket a FixedClock can produce maps back to an index.
        for (i, name) in MONTH_NAMES.iter().enumerate() {
            assert_eq!(month_index(name), Some(i));
        }
    }

    #[test]
    fn test_fixed_clock_drives_bucketing() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2031, 2, 10, 9, 30, 0).unwrap());
        let (month, year) = month_bucket(clock.today());
        assert_eq!(month, "February");
        assert_eq!(year, "2031");
    }

    #[test]
    fn test_status_transitions() {
        assert!(status_transition_allowed(STATUS_INPROGRESS, STATUS_WON));
        assert!(status_transition_allowed(STATUS_INPROGRESS, STATUS_LOSS));

        // CLOSED is reached through handover only, and is terminal.
        assert!(!status_transition_allowed(STATUS_INPROGRESS, STATUS_CLOSED));
        assert!(!status_transition_allowed(STATUS_WON, STATUS_CLOSED));
        assert!(!status_transition_allowed(STATUS_CLOSED, STATUS_INPROGRESS));
        assert!(!status_transition_allowed(STATUS_CLOSED, STATUS_WON));
        assert!(!status_transition_allowed(STATUS_WON, STATUS_LOSS));
        assert!(!status_transition_allowed(STATUS_LOSS, STATUS_WON));
    }
}
