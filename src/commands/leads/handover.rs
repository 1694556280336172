use crate::clock::{month_bucket, TimeSource};
use crate::commands::leads::intake::{STATUS_CLOSED, STATUS_WON};
use crate::commands::revenue::apply_revenue_delta;
use crate::db::DbPool;
use crate::error::{ArborError, ArborResult};
use crate::state::AppState;
use axum::extract::{Json, State as AxumState};
use serde::Deserialize;
use serde_json::{json, Value};

/// Profit recognized when a project closes. Snapshotted from the lead's
/// accumulated fields at handover time; never recomputed afterwards.
pub fn close_profit(pay_in_cash: i64, pay_in_online: i64, total_exp: i64, total_gst: i64) -> i64 {
    (pay_in_cash + pay_in_online) - (total_exp + total_gst)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoverInput {
    pub user_id: i32,
    pub lead_id: i32,
}

pub async fn handover_lead_internal(
    pool: &DbPool,
    clock: &dyn TimeSource,
    input: HandoverInput,
) -> ArborResult<i64> {
    let mut tx = pool.begin().await?;

    let lead: Option<(String, i64, i64, i64, i64, i64)> = sqlx::query_as(
        "SELECT status, pay_in_cash, pay_in_online, total_exp, total_gst, total_project_cost
         FROM leads WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(input.lead_id)
    .fetch_optional(&mut *tx)
    .await?;

    // Missing lead reports as an authorization failure on this endpoint.
    let (status, cash, online, exp, gst, project_cost) =
        lead.ok_or_else(|| ArborError::Auth("Lead not found".into()))?;

    if status != STATUS_WON {
        return Err(ArborError::Policy(format!(
            "Only a won lead can be handed over (current status: {})",
            status
        )));
    }

    let today = clock.today();
    let profit = close_profit(cash, online, exp, gst);

    sqlx::query(
        "UPDATE leads SET status = $1, handover_date = $2, updated_at = now() WHERE id = $3",
    )
    .bind(STATUS_CLOSED)
    .bind(today)
    .bind(input.lead_id)
    .execute(&mut *tx)
    .await?;

    let (month, year) = month_bucket(today);
    apply_revenue_delta(&mut tx, input.user_id, &month, &year, profit, project_cost, 1).await?;

    tx.commit().await?;
    Ok(profit)
}

pub async fn handover_lead_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<HandoverInput>,
) -> ArborResult<Json<Value>> {
    let profit = handover_lead_internal(&state.pool, &*state.clock, input).await?;
    Ok(Json(json!({ "profit": profit })))
}
