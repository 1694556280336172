use crate::db::{DbPool, Vendor, VendorBreakdownEntry};
use crate::error::{ArborError, ArborResult};
use crate::state::AppState;
use axum::extract::{Json, Query, State as AxumState};
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn get_vendor_list_internal(pool: &DbPool) -> ArborResult<Vec<Vendor>> {
    Ok(
        sqlx::query_as::<_, Vendor>("SELECT * FROM vendors ORDER BY vendor_name")
            .fetch_all(pool)
            .await?,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorInput {
    pub vendor_id: Option<i32>,
    pub vendor_name: String,
    pub mobile_number: Option<String>,
    pub city: Option<String>,
}

/// Registry upsert. Charge columns are ledger state and are never writable
/// through this path.
pub async fn save_vendor_internal(pool: &DbPool, vendor: VendorInput) -> ArborResult<i32> {
    if vendor.vendor_name.trim().is_empty() {
        return Err(ArborError::Validation("Vendor name is required".into()));
    }

    if let Some(id) = vendor.vendor_id {
        let updated = sqlx::query(
            "UPDATE vendors SET vendor_name = $1, mobile_number = $2, city = $3, updated_at = now() WHERE id = $4",
        )
        .bind(vendor.vendor_name.trim())
        .bind(&vendor.mobile_number)
        .bind(&vendor.city)
        .bind(id)
        .execute(pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(ArborError::NotFound("Vendor not found".into()));
        }
        Ok(id)
    } else {
        let row: (i32,) = sqlx::query_as(
            "INSERT INTO vendors (vendor_name, mobile_number, city) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(vendor.vendor_name.trim())
        .bind(&vendor.mobile_number)
        .bind(&vendor.city)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }
}

pub async fn delete_vendor_internal(pool: &DbPool, vendor_id: i32) -> ArborResult<()> {
    let mut tx = pool.begin().await?;

    let exists: Option<(i32,)> = sqlx::query_as("SELECT id FROM vendors WHERE id = $1 FOR UPDATE")
        .bind(vendor_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(ArborError::NotFound("Vendor not found".into()));
    }

    let assignments: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM vendor_breakdowns WHERE vendor_id = $1")
            .bind(vendor_id)
            .fetch_one(&mut *tx)
            .await?;
    if assignments.0 > 0 {
        return Err(ArborError::Policy(
            "Vendor has lead assignments and cannot be deleted".into(),
        ));
    }

    sqlx::query("DELETE FROM vendors WHERE id = $1")
        .bind(vendor_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignVendorInput {
    pub vendor_id: i32,
    pub lead_id: i32,
    #[serde(default)]
    pub price: i64,
}

/// Assigns a vendor to a lead: one breakdown row per (vendor, lead) pair, and
/// the assigned price accrues onto the vendor's total charge in the same
/// transaction.
pub async fn assign_vendor_internal(pool: &DbPool, input: AssignVendorInput) -> ArborResult<i32> {
    if input.price <= 0 {
        return Err(ArborError::Validation(
            "Assignment price must be positive".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    let vendor: Option<(i32,)> = sqlx::query_as("SELECT id FROM vendors WHERE id = $1 FOR UPDATE")
        .bind(input.vendor_id)
        .fetch_optional(&mut *tx)
        .await?;
    if vendor.is_none() {
        return Err(ArborError::NotFound("Vendor not found".into()));
    }

    let lead: Option<(i32,)> =
        sqlx::query_as("SELECT id FROM leads WHERE id = $1 AND deleted_at IS NULL")
            .bind(input.lead_id)
            .fetch_optional(&mut *tx)
            .await?;
    if lead.is_none() {
        return Err(ArborError::NotFound("Lead not found".into()));
    }

    let row: (i32,) = sqlx::query_as(
        "INSERT INTO vendor_breakdowns (vendor_id, lead_id, total_amt, total_given)
         VALUES ($1, $2, $3, 0) RETURNING id",
    )
    .bind(input.vendor_id)
    .bind(input.lead_id)
    .bind(input.price)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        ArborError::from(e).policy_on_unique("Vendor is already assigned to this lead")
    })?;

    sqlx::query("UPDATE vendors SET total_charge = COALESCE(total_charge, 0) + $1, updated_at = now() WHERE id = $2")
        .bind(input.price)
        .bind(input.vendor_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(row.0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorPayoutInput {
    pub breakdown_id: i32,
    #[serde(default)]
    pub amount: i64,
}

/// Records a disbursement against an assignment. The payout accrues on both
/// the breakdown and the vendor, and can never exceed the allocated charge.
pub async fn record_payout_internal(pool: &DbPool, input: VendorPayoutInput) -> ArborResult<()> {
    if input.amount <= 0 {
        return Err(ArborError::Validation(
            "Payout amount must be positive".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    let breakdown: Option<(i32, i64, i64)> = sqlx::query_as(
        "SELECT vendor_id, total_amt, total_given FROM vendor_breakdowns WHERE id = $1 FOR UPDATE",
    )
    .bind(input.breakdown_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (vendor_id, total_amt, total_given) =
        breakdown.ok_or_else(|| ArborError::NotFound("Vendor assignment not found".into()))?;

    if total_given + input.amount > total_amt {
        return Err(ArborError::Validation(format!(
            "Payout exceeds the allocated charge ({} of {} already disbursed)",
            total_given, total_amt
        )));
    }

    sqlx::query(
        "UPDATE vendor_breakdowns SET total_given = COALESCE(total_given, 0) + $1 WHERE id = $2",
    )
    .bind(input.amount)
    .bind(input.breakdown_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE vendors SET given_charge = COALESCE(given_charge, 0) + $1, updated_at = now() WHERE id = $2")
        .bind(input.amount)
        .bind(vendor_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignVendorInput {
    pub vendor_id: i32,
    pub lead_id: i32,
}

/// Removes an assignment and reverses its charge from the vendor total.
/// Refused once money has been disbursed against it.
pub async fn unassign_vendor_internal(
    pool: &DbPool,
    input: UnassignVendorInput,
) -> ArborResult<()> {
    let mut tx = pool.begin().await?;

    let breakdown: Option<(i32, i64, i64)> = sqlx::query_as(
        "SELECT id, total_amt, total_given FROM vendor_breakdowns
         WHERE vendor_id = $1 AND lead_id = $2 FOR UPDATE",
    )
    .bind(input.vendor_id)
    .bind(input.lead_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (breakdown_id, total_amt, total_given) =
        breakdown.ok_or_else(|| ArborError::NotFound("Vendor assignment not found".into()))?;

    if total_given > 0 {
        return Err(ArborError::Policy(
            "Assignment has disbursed payouts and cannot be removed".into(),
        ));
    }

    sqlx::query("DELETE FROM vendor_breakdowns WHERE id = $1")
        .bind(breakdown_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE vendors SET total_charge = COALESCE(total_charge, 0) - $1, updated_at = now() WHERE id = $2")
        .bind(total_amt)
        .bind(input.vendor_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn get_breakdowns_internal(
    pool: &DbPool,
    vendor_id: Option<i32>,
    lead_id: Option<i32>,
) -> ArborResult<Vec<VendorBreakdownEntry>> {
    let rows = sqlx::query_as::<_, VendorBreakdownEntry>(
        "SELECT b.id, b.vendor_id, v.vendor_name, b.lead_id, l.lead_no, l.customer_name,
                b.total_amt, b.total_given, b.created_at
         FROM vendor_breakdowns b
         JOIN vendors v ON v.id = b.vendor_id
         JOIN leads l ON l.id = b.lead_id
         WHERE ($1::INTEGER IS NULL OR b.vendor_id = $1)
           AND ($2::INTEGER IS NULL OR b.lead_id = $2)
         ORDER BY b.created_at DESC, b.id DESC",
    )
    .bind(vendor_id)
    .bind(lead_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// --- Axum Handlers ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorIdInput {
    pub vendor_id: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownQuery {
    pub vendor_id: Option<i32>,
    pub lead_id: Option<i32>,
}

pub async fn get_vendor_list_axum(
    AxumState(state): AxumState<AppState>,
) -> ArborResult<Json<Vec<Vendor>>> {
    let vendors = get_vendor_list_internal(&state.pool).await?;
    Ok(Json(vendors))
}

pub async fn save_vendor_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<VendorInput>,
) -> ArborResult<Json<Value>> {
    let id = save_vendor_internal(&state.pool, input).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn delete_vendor_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<VendorIdInput>,
) -> ArborResult<Json<()>> {
    delete_vendor_internal(&state.pool, input.vendor_id).await?;
    Ok(Json(()))
}

pub async fn assign_vendor_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<AssignVendorInput>,
) -> ArborResult<Json<Value>> {
    let id = assign_vendor_internal(&state.pool, input).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn record_payout_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<VendorPayoutInput>,
) -> ArborResult<Json<()>> {
    record_payout_internal(&state.pool, input).await?;
    Ok(Json(()))
}

pub async fn unassign_vendor_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<UnassignVendorInput>,
) -> ArborResult<Json<()>> {
    unassign_vendor_internal(&state.pool, input).await?;
    Ok(Json(()))
}

pub async fn get_breakdowns_axum(
    AxumState(state): AxumState<AppState>,
    Query(query): Query<BreakdownQuery>,
) -> ArborResult<Json<Vec<VendorBreakdownEntry>>> {
    let rows = get_breakdowns_internal(&state.pool, query.vendor_id, query.lead_id).await?;
    Ok(Json(rows))
}
