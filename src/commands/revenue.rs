use crate::clock::{month_bucket, month_index, TimeSource};
use crate::db::{DashboardStats, DbPool, MonthlySummary, Revenue};
use crate::error::{ArborError, ArborResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;
use axum::extract::{Json, Query, State as AxumState};
use axum::Extension;
use chrono::Datelike;
use serde::Deserialize;

/// Single atomic find-or-create for a monthly revenue row. Absent rows are
/// created with the delta as initial value; present rows are incremented.
/// Never overwrites unrelated fields.
pub async fn apply_revenue_delta(
    conn: &mut sqlx::PgConnection,
    user_id: i32,
    month: &str,
    year: &str,
    profit_delta: i64,
    revenue_delta: i64,
    close_delta: i32,
) -> ArborResult<()> {
    sqlx::query(
        "INSERT INTO revenues (user_id, month, year, total_profit, revenue, project_close)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (user_id, month, year) DO UPDATE SET
             total_profit = revenues.total_profit + EXCLUDED.total_profit,
             revenue = revenues.revenue + EXCLUDED.revenue,
             project_close = revenues.project_close + EXCLUDED.project_close",
    )
    .bind(user_id)
    .bind(month)
    .bind(year)
    .bind(profit_delta)
    .bind(revenue_delta)
    .bind(close_delta)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_revenue_internal(
    pool: &DbPool,
    user_id: i32,
    year: Option<String>,
) -> ArborResult<Vec<Revenue>> {
    let mut rows = if let Some(year) = year {
        sqlx::query_as::<_, Revenue>("SELECT * FROM revenues WHERE user_id = $1 AND year = $2")
            .bind(user_id)
            .bind(year)
            .fetch_all(pool)
            .await?
    } else {
        sqlx::query_as::<_, Revenue>("SELECT * FROM revenues WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(pool)
            .await?
    };

    rows.sort_by_key(|r| (r.year.clone(), month_index(&r.month).unwrap_or(12)));
    Ok(rows)
}

pub async fn get_monthly_summary_internal(
    pool: &DbPool,
    clock: &dyn TimeSource,
) -> ArborResult<MonthlySummary> {
    let (month, year) = month_bucket(clock.today());

    let sums: (Option<i64>, Option<i64>, Option<i64>) = sqlx::query_as(
        "SELECT SUM(total_profit), SUM(revenue), SUM(project_close)::BIGINT
         FROM revenues WHERE month = $1 AND year = $2",
    )
    .bind(&month)
    .bind(&year)
    .fetch_one(pool)
    .await?;

    Ok(MonthlySummary {
        month,
        year,
        total_profit: sums.0,
        revenue: sums.1,
        project_close: sums.2,
    })
}

pub async fn get_dashboard_stats_internal(
    pool: &DbPool,
    clock: &dyn TimeSource,
    store: Option<&str>,
) -> ArborResult<DashboardStats> {
    let today = clock.today();
    let (month, year) = month_bucket(today);
    let month_start = today
        .with_day(1)
        .ok_or_else(|| ArborError::Internal("Invalid calendar date".into()))?;

    let stats = sqlx::query_as::<_, DashboardStats>(
        "SELECT
            (SELECT COUNT(*) FROM leads WHERE deleted_at IS NULL AND ($1::VARCHAR IS NULL OR store = $1)) as total_leads,
            (SELECT COUNT(*) FROM leads WHERE deleted_at IS NULL AND status = 'INPROGRESS' AND ($1::VARCHAR IS NULL OR store = $1)) as inprogress_leads,
            (SELECT COUNT(*) FROM leads WHERE deleted_at IS NULL AND status = 'WON' AND ($1::VARCHAR IS NULL OR store = $1)) as won_leads,
            (SELECT COUNT(*) FROM leads WHERE deleted_at IS NULL AND status = 'LOSS' AND ($1::VARCHAR IS NULL OR store = $1)) as loss_leads,
            (SELECT COUNT(*) FROM leads WHERE deleted_at IS NULL AND status = 'CLOSED' AND ($1::VARCHAR IS NULL OR store = $1)) as closed_leads,
            (SELECT COUNT(*) FROM vendors) as total_vendors,
            (SELECT SUM(total_profit) FROM revenues WHERE month = $2 AND year = $3) as month_profit,
            (SELECT SUM(revenue) FROM revenues WHERE month = $2 AND year = $3) as month_revenue,
            (SELECT SUM(project_close)::BIGINT FROM revenues WHERE month = $2 AND year = $3) as month_closes,
            (SELECT SUM(amount) FROM store_exp_notes WHERE transaction_date >= $4) as month_expenses",
    )
    .bind(store)
    .bind(&month)
    .bind(&year)
    .bind(month_start)
    .fetch_one(pool)
    .await?;

    Ok(stats)
}

// --- Axum Handlers ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueQuery {
    pub user_id: i32,
    pub year: Option<String>,
}

pub async fn get_revenue_axum(
    AxumState(state): AxumState<AppState>,
    Query(query): Query<RevenueQuery>,
) -> ArborResult<Json<Vec<Revenue>>> {
    let rows = get_revenue_internal(&state.pool, query.user_id, query.year).await?;
    Ok(Json(rows))
}

pub async fn get_monthly_summary_axum(
    AxumState(state): AxumState<AppState>,
) -> ArborResult<Json<MonthlySummary>> {
    let summary = get_monthly_summary_internal(&state.pool, &*state.clock).await?;
    Ok(Json(summary))
}

pub async fn get_dashboard_stats_axum(
    AxumState(state): AxumState<AppState>,
    Extension(claims): Extension<Claims>,
) -> ArborResult<Json<DashboardStats>> {
    let stats =
        get_dashboard_stats_internal(&state.pool, &*state.clock, claims.store_filter()).await?;
    Ok(Json(stats))
}
