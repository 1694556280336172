#![allow(dead_code)]
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{FromRow, Pool, Postgres};
use std::str::FromStr;

use crate::error::{ArborError, ArborResult};

pub type DbPool = Pool<Postgres>;

pub async fn init_pool_with_options(opts: PgConnectOptions) -> ArborResult<DbPool> {
    // connect_lazy_with returns the pool immediately. It does not validate connection.
    Ok(PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .idle_timeout(std::time::Duration::from_secs(120))
        .max_lifetime(std::time::Duration::from_secs(300))
        .connect_lazy_with(opts))
}

pub async fn init_pool(database_url: &str) -> ArborResult<DbPool> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| ArborError::Internal(format!("Invalid DB URL: {}", e)))?
        .ssl_mode(PgSslMode::Disable);

    init_pool_with_options(opts).await
}

pub async fn init_database(pool: &DbPool) -> ArborResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;

    let _ = ensure_seeds(pool).await;
    tracing::info!("System: Database ready.");

    Ok(())
}

/// Seeds the bootstrap admin account. Safe to run on every start.
async fn ensure_seeds(pool: &DbPool) -> ArborResult<()> {
    let admin_emp_no = std::env::var("ADMIN_EMP_NO").unwrap_or_else(|_| "EMP0001".to_string());

    let admin_exists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE emp_no = $1")
        .bind(&admin_emp_no)
        .fetch_one(pool)
        .await
        .unwrap_or((0,));
    if admin_exists.0 == 0 {
        let admin_password =
            std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());
        if let Ok(hash) = bcrypt::hash(admin_password, bcrypt::DEFAULT_COST) {
            let _ = sqlx::query(
                "INSERT INTO users (emp_no, name, password_hash, role) VALUES ($1, 'Administrator', $2, 'ADMIN') ON CONFLICT DO NOTHING",
            )
            .bind(&admin_emp_no)
            .bind(hash)
            .execute(pool)
            .await;
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub emp_no: String,
    pub name: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: String,
    pub store: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: i32,
    pub lead_no: String,
    pub store: Option<String>,
    pub customer_name: String,
    pub mobile_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub status: String,
    pub init: bool,
    pub assignee_id: Option<i32>,
    pub total_project_cost: i64,
    pub total_gst: i64,
    pub pay_in_cash: i64,
    pub pay_in_online: i64,
    pub total_exp: i64,
    pub additional_items_cost: i64,
    pub handover_date: Option<NaiveDate>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalItem {
    pub id: i32,
    pub lead_id: i32,
    pub category: String,
    pub detail: Option<String>,
    pub price: i64,
    pub gst: i64,
    pub landing_price: i64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProvidedItem {
    pub id: i32,
    pub lead_id: i32,
    pub area: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub pay_in_cash: i64,
    pub pay_in_online: i64,
    pub gst: i64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub id: i32,
    pub vendor_name: String,
    pub mobile_number: Option<String>,
    pub city: Option<String>,
    pub total_charge: i64,
    pub given_charge: i64,
    pub created_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VendorBreakdown {
    pub id: i32,
    pub vendor_id: i32,
    pub lead_id: i32,
    pub total_amt: i64,
    pub total_given: i64,
    pub created_at: Option<DateTime<Utc>>,
}

/// Breakdown row joined with vendor and lead names for listing.
#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VendorBreakdownEntry {
    pub id: i32,
    pub vendor_id: i32,
    pub vendor_name: String,
    pub lead_id: i32,
    pub lead_no: String,
    pub customer_name: String,
    pub total_amt: i64,
    pub total_given: i64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Revenue {
    pub id: i32,
    pub user_id: i32,
    pub month: String,
    pub year: String,
    pub total_profit: i64,
    pub revenue: i64,
    pub project_close: i32,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoreExpNote {
    pub id: i32,
    pub user_id: i32,
    pub amount: i64,
    pub transaction_date: NaiveDate,
    pub remark: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i32,
    pub noti_id: Option<String>,
    pub user_id: i32,
    pub message: String,
    pub read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Default)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_leads: Option<i64>, // Counts can be null if no rows
    pub inprogress_leads: Option<i64>,
    pub won_leads: Option<i64>,
    pub loss_leads: Option<i64>,
    pub closed_leads: Option<i64>,
    pub total_vendors: Option<i64>,
    pub month_profit: Option<i64>,
    pub month_revenue: Option<i64>,
    pub month_closes: Option<i64>,
    pub month_expenses: Option<i64>,
}

/// Company-wide totals for one (month, year) bucket.
#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub month: String,
    pub year: String,
    pub total_profit: Option<i64>,
    pub revenue: Option<i64>,
    pub project_close: Option<i64>,
}
