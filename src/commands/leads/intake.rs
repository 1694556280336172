use crate::db::{AdditionalItem, DbPool, Lead, ProvidedItem};
use crate::error::{ArborError, ArborResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;
use axum::extract::{Json, Query, State as AxumState};
use axum::Extension;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const STATUS_INPROGRESS: &str = "INPROGRESS";
pub const STATUS_WON: &str = "WON";
pub const STATUS_LOSS: &str = "LOSS";
pub const STATUS_CLOSED: &str = "CLOSED";

/// INPROGRESS may move to WON or LOSS. WON moves to CLOSED through handover
/// only. CLOSED is terminal.
pub fn status_transition_allowed(from: &str, to: &str) -> bool {
    matches!((from, to), (STATUS_INPROGRESS, STATUS_WON) | (STATUS_INPROGRESS, STATUS_LOSS))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadInput {
    pub lead_no: String,
    pub store: Option<String>,
    pub customer_name: String,
    pub mobile_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub assignee_id: Option<i32>,
}

pub async fn create_lead_internal(pool: &DbPool, input: CreateLeadInput) -> ArborResult<i32> {
    if input.lead_no.trim().is_empty() {
        return Err(ArborError::Validation("Lead number is required".into()));
    }
    if input.customer_name.trim().is_empty() {
        return Err(ArborError::Validation("Customer name is required".into()));
    }

    let row: (i32,) = sqlx::query_as(
        "INSERT INTO leads (lead_no, store, customer_name, mobile_number, email, address, status, assignee_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
    )
    .bind(input.lead_no.trim())
    .bind(&input.store)
    .bind(input.customer_name.trim())
    .bind(&input.mobile_number)
    .bind(&input.email)
    .bind(&input.address)
    .bind(STATUS_INPROGRESS)
    .bind(input.assignee_id)
    .fetch_one(pool)
    .await
    .map_err(|e| ArborError::from(e).policy_on_unique("A lead with this number already exists"))?;

    Ok(row.0)
}

pub async fn list_leads_internal(pool: &DbPool, store: Option<&str>) -> ArborResult<Vec<Lead>> {
    // Soft-deleted leads never appear in default reads.
    let leads = if let Some(store) = store {
        sqlx::query_as::<_, Lead>(
            "SELECT * FROM leads WHERE deleted_at IS NULL AND store = $1 ORDER BY created_at DESC",
        )
        .bind(store)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, Lead>(
            "SELECT * FROM leads WHERE deleted_at IS NULL ORDER BY created_at DESC",
        )
        .fetch_all(pool)
        .await?
    };
    Ok(leads)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetail {
    pub lead: Lead,
    pub additional_items: Vec<AdditionalItem>,
    pub provided_items: Vec<ProvidedItem>,
}

pub async fn get_lead_detail_internal(pool: &DbPool, lead_id: i32) -> ArborResult<LeadDetail> {
    let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1 AND deleted_at IS NULL")
        .bind(lead_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ArborError::NotFound("Lead not found".into()))?;

    let additional_items = sqlx::query_as::<_, AdditionalItem>(
        "SELECT * FROM additional_items WHERE lead_id = $1 ORDER BY id ASC",
    )
    .bind(lead_id)
    .fetch_all(pool)
    .await?;

    let provided_items = sqlx::query_as::<_, ProvidedItem>(
        "SELECT * FROM provided_items WHERE lead_id = $1 ORDER BY id ASC",
    )
    .bind(lead_id)
    .fetch_all(pool)
    .await?;

    Ok(LeadDetail {
        lead,
        additional_items,
        provided_items,
    })
}

pub async fn update_lead_status_internal(
    pool: &DbPool,
    lead_id: i32,
    new_status: &str,
) -> ArborResult<()> {
    if !matches!(new_status, STATUS_WON | STATUS_LOSS) {
        return Err(ArborError::Validation(format!(
            "Unknown target status: {}",
            new_status
        )));
    }

    let mut tx = pool.begin().await?;

    let current: Option<(String,)> =
        sqlx::query_as("SELECT status FROM leads WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
            .bind(lead_id)
            .fetch_optional(&mut *tx)
            .await?;

    let (current,) = current.ok_or_else(|| ArborError::NotFound("Lead not found".into()))?;

    if !status_transition_allowed(&current, new_status) {
        return Err(ArborError::Policy(format!(
            "Lead cannot move from {} to {}",
            current, new_status
        )));
    }

    sqlx::query("UPDATE leads SET status = $1, updated_at = now() WHERE id = $2")
        .bind(new_status)
        .bind(lead_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Marks a lead deleted. An initialized lead carries ledger history and is
/// never removed from reads retroactively through this path.
pub async fn delete_lead_internal(pool: &DbPool, lead_id: i32) -> ArborResult<()> {
    let mut tx = pool.begin().await?;

    let row: Option<(bool,)> =
        sqlx::query_as("SELECT init FROM leads WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
            .bind(lead_id)
            .fetch_optional(&mut *tx)
            .await?;

    let (init,) = row.ok_or_else(|| ArborError::NotFound("Lead not found".into()))?;

    if init {
        return Err(ArborError::Policy(
            "An initialized lead cannot be deleted".into(),
        ));
    }

    sqlx::query("UPDATE leads SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(lead_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Recomputes a lead's aggregate fields as derived sums over its current line
/// items. Repairs any drift the incremental path may have accumulated.
pub async fn reconcile_lead_internal(pool: &DbPool, lead_id: i32) -> ArborResult<()> {
    let updated = sqlx::query(
        "UPDATE leads l SET
            additional_items_cost = COALESCE((SELECT SUM(price) FROM additional_items a WHERE a.lead_id = l.id), 0),
            total_exp = COALESCE((SELECT SUM(landing_price) FROM additional_items a WHERE a.lead_id = l.id), 0),
            pay_in_cash = COALESCE((SELECT SUM(pay_in_cash) FROM provided_items p WHERE p.lead_id = l.id), 0),
            pay_in_online = COALESCE((SELECT SUM(pay_in_online) FROM provided_items p WHERE p.lead_id = l.id), 0),
            total_gst = COALESCE((SELECT SUM(gst) FROM additional_items a WHERE a.lead_id = l.id), 0)
                      + COALESCE((SELECT SUM(gst) FROM provided_items p WHERE p.lead_id = l.id), 0),
            total_project_cost = COALESCE((SELECT SUM(price) FROM additional_items a WHERE a.lead_id = l.id), 0)
                               + COALESCE((SELECT SUM(pay_in_cash + pay_in_online) FROM provided_items p WHERE p.lead_id = l.id), 0),
            updated_at = now()
         WHERE l.id = $1 AND l.deleted_at IS NULL",
    )
    .bind(lead_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ArborError::NotFound("Lead not found".into()));
    }
    Ok(())
}

// --- Axum Handlers ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadStatusInput {
    pub lead_id: i32,
    pub status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadIdInput {
    pub lead_id: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDetailQuery {
    pub lead_id: i32,
}

pub async fn create_lead_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<CreateLeadInput>,
) -> ArborResult<Json<Value>> {
    let id = create_lead_internal(&state.pool, input).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn list_leads_axum(
    AxumState(state): AxumState<AppState>,
    Extension(claims): Extension<Claims>,
) -> ArborResult<Json<Vec<Lead>>> {
    let leads = list_leads_internal(&state.pool, claims.store_filter()).await?;
    Ok(Json(leads))
}

pub async fn get_lead_detail_axum(
    AxumState(state): AxumState<AppState>,
    Query(query): Query<LeadDetailQuery>,
) -> ArborResult<Json<LeadDetail>> {
    let detail = get_lead_detail_internal(&state.pool, query.lead_id).await?;
    Ok(Json(detail))
}

pub async fn update_lead_status_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<LeadStatusInput>,
) -> ArborResult<Json<()>> {
    update_lead_status_internal(&state.pool, input.lead_id, &input.status).await?;
    Ok(Json(()))
}

pub async fn delete_lead_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<LeadIdInput>,
) -> ArborResult<Json<()>> {
    delete_lead_internal(&state.pool, input.lead_id).await?;
    Ok(Json(()))
}

pub async fn reconcile_lead_axum(
    AxumState(state): AxumState<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<LeadIdInput>,
) -> ArborResult<Json<()>> {
    claims.require_admin()?;
    reconcile_lead_internal(&state.pool, input.lead_id).await?;
    Ok(Json(()))
}
