use crate::commands::leads::intake::{STATUS_INPROGRESS, STATUS_LOSS, STATUS_WON};
use crate::db::DbPool;
use crate::error::{ArborError, ArborResult};
use crate::state::AppState;
use axum::extract::{Json, State as AxumState};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalItemInput {
    pub category: String,
    pub detail: Option<String>,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub gst: i64,
    #[serde(default)]
    pub landing_price: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidedItemInput {
    pub area: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub pay_in_cash: i64,
    #[serde(default)]
    pub pay_in_online: i64,
    #[serde(default)]
    pub gst: i64,
}

fn check_non_negative(label: &str, value: i64) -> ArborResult<()> {
    if value < 0 {
        return Err(ArborError::Validation(format!(
            "{} must not be negative",
            label
        )));
    }
    Ok(())
}

fn validate_additional_input(item: &AdditionalItemInput) -> ArborResult<()> {
    if item.category.trim().is_empty() {
        return Err(ArborError::Validation("Item category is required".into()));
    }
    check_non_negative("price", item.price)?;
    check_non_negative("gst", item.gst)?;
    check_non_negative("landingPrice", item.landing_price)
}

fn validate_provided_input(item: &ProvidedItemInput) -> ArborResult<()> {
    check_non_negative("payInCash", item.pay_in_cash)?;
    check_non_negative("payInOnline", item.pay_in_online)?;
    check_non_negative("gst", item.gst)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitLeadInput {
    pub lead_no: String,
    pub status: Option<String>,
    pub user_id: i32,
    #[serde(default)]
    pub additional_items: Vec<AdditionalItemInput>,
    #[serde(default)]
    pub provided_items: Vec<ProvidedItemInput>,
}

/// One-time initialization: attaches the opening line items and computes the
/// lead totals as a fresh sum over them. Fails on a second call.
pub async fn initialize_lead_internal(pool: &DbPool, input: InitLeadInput) -> ArborResult<i32> {
    for item in &input.additional_items {
        validate_additional_input(item)?;
    }
    for item in &input.provided_items {
        validate_provided_input(item)?;
    }
    if let Some(status) = input.status.as_deref() {
        if !matches!(status, STATUS_INPROGRESS | STATUS_WON | STATUS_LOSS) {
            return Err(ArborError::Validation(format!(
                "Unknown lead status: {}",
                status
            )));
        }
    }

    let mut tx = pool.begin().await?;

    let lead: Option<(i32, bool)> = sqlx::query_as(
        "SELECT id, init FROM leads WHERE lead_no = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(&input.lead_no)
    .fetch_optional(&mut *tx)
    .await?;

    let (lead_id, init) = lead.ok_or_else(|| ArborError::NotFound("Lead not found".into()))?;

    if init {
        return Err(ArborError::Policy("Lead is already initialized".into()));
    }

    let mut items_cost: i64 = 0;
    let mut landing_sum: i64 = 0;
    let mut gst_sum: i64 = 0;
    let mut cash_sum: i64 = 0;
    let mut online_sum: i64 = 0;

    for item in &input.additional_items {
        sqlx::query(
            "INSERT INTO additional_items (lead_id, category, detail, price, gst, landing_price)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(lead_id)
        .bind(&item.category)
        .bind(&item.detail)
        .bind(item.price)
        .bind(item.gst)
        .bind(item.landing_price)
        .execute(&mut *tx)
        .await?;

        items_cost += item.price;
        gst_sum += item.gst;
        landing_sum += item.landing_price;
    }

    for item in &input.provided_items {
        sqlx::query(
            "INSERT INTO provided_items (lead_id, area, brand, model, pay_in_cash, pay_in_online, gst)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(lead_id)
        .bind(&item.area)
        .bind(&item.brand)
        .bind(&item.model)
        .bind(item.pay_in_cash)
        .bind(item.pay_in_online)
        .bind(item.gst)
        .execute(&mut *tx)
        .await?;

        cash_sum += item.pay_in_cash;
        online_sum += item.pay_in_online;
        gst_sum += item.gst;
    }

    sqlx::query(
        "UPDATE leads SET
            init = TRUE,
            status = COALESCE($2, status),
            assignee_id = $3,
            total_project_cost = $4,
            total_gst = $5,
            pay_in_cash = $6,
            pay_in_online = $7,
            total_exp = $8,
            additional_items_cost = $9,
            updated_at = now()
         WHERE id = $1",
    )
    .bind(lead_id)
    .bind(&input.status)
    .bind(input.user_id)
    .bind(items_cost + cash_sum + online_sum)
    .bind(gst_sum)
    .bind(cash_sum)
    .bind(online_sum)
    .bind(landing_sum)
    .bind(items_cost)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(lead_id)
}

/// Row lock on the lead shared by every item mutation: items attach to
/// initialized, live leads only.
async fn lock_initialized_lead(
    tx: &mut sqlx::PgConnection,
    lead_id: i32,
) -> ArborResult<()> {
    let lead: Option<(bool,)> =
        sqlx::query_as("SELECT init FROM leads WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
            .bind(lead_id)
            .fetch_optional(&mut *tx)
            .await?;

    let (init,) = lead.ok_or_else(|| ArborError::NotFound("Lead not found".into()))?;
    if !init {
        return Err(ArborError::Policy(
            "Items can only be attached to an initialized lead".into(),
        ));
    }
    Ok(())
}

// --- Additional items ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAdditionalItemInput {
    pub lead_id: i32,
    #[serde(flatten)]
    pub item: AdditionalItemInput,
}

pub async fn add_additional_item_internal(
    pool: &DbPool,
    input: AddAdditionalItemInput,
) -> ArborResult<i32> {
    validate_additional_input(&input.item)?;

    let mut tx = pool.begin().await?;
    lock_initialized_lead(&mut tx, input.lead_id).await?;

    let row: (i32,) = sqlx::query_as(
        "INSERT INTO additional_items (lead_id, category, detail, price, gst, landing_price)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(input.lead_id)
    .bind(&input.item.category)
    .bind(&input.item.detail)
    .bind(input.item.price)
    .bind(input.item.gst)
    .bind(input.item.landing_price)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE leads SET
            total_project_cost = COALESCE(total_project_cost, 0) + $1,
            total_gst = COALESCE(total_gst, 0) + $2,
            additional_items_cost = COALESCE(additional_items_cost, 0) + $1,
            total_exp = COALESCE(total_exp, 0) + $3,
            updated_at = now()
         WHERE id = $4",
    )
    .bind(input.item.price)
    .bind(input.item.gst)
    .bind(input.item.landing_price)
    .bind(input.lead_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row.0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAdditionalItemInput {
    pub item_id: i32,
    pub lead_id: i32,
    #[serde(flatten)]
    pub item: AdditionalItemInput,
}

pub async fn update_additional_item_internal(
    pool: &DbPool,
    input: UpdateAdditionalItemInput,
) -> ArborResult<()> {
    validate_additional_input(&input.item)?;

    let mut tx = pool.begin().await?;
    lock_initialized_lead(&mut tx, input.lead_id).await?;

    let old: Option<(i64, i64, i64)> = sqlx::query_as(
        "SELECT price, gst, landing_price FROM additional_items WHERE id = $1 AND lead_id = $2",
    )
    .bind(input.item_id)
    .bind(input.lead_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (old_price, old_gst, old_landing) =
        old.ok_or_else(|| ArborError::NotFound("Additional item not found".into()))?;

    sqlx::query(
        "UPDATE additional_items SET category = $1, detail = $2, price = $3, gst = $4, landing_price = $5
         WHERE id = $6",
    )
    .bind(&input.item.category)
    .bind(&input.item.detail)
    .bind(input.item.price)
    .bind(input.item.gst)
    .bind(input.item.landing_price)
    .bind(input.item_id)
    .execute(&mut *tx)
    .await?;

    let price_diff = input.item.price - old_price;
    let gst_diff = input.item.gst - old_gst;
    let landing_diff = input.item.landing_price - old_landing;

    if price_diff != 0 || gst_diff != 0 || landing_diff != 0 {
        sqlx::query(
            "UPDATE leads SET
                total_project_cost = COALESCE(total_project_cost, 0) + $1,
                total_gst = COALESCE(total_gst, 0) + $2,
                additional_items_cost = COALESCE(additional_items_cost, 0) + $1,
                total_exp = COALESCE(total_exp, 0) + $3,
                updated_at = now()
             WHERE id = $4",
        )
        .bind(price_diff)
        .bind(gst_diff)
        .bind(landing_diff)
        .bind(input.lead_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteItemInput {
    pub item_id: i32,
    pub lead_id: i32,
}

pub async fn delete_additional_item_internal(
    pool: &DbPool,
    input: DeleteItemInput,
) -> ArborResult<()> {
    let mut tx = pool.begin().await?;
    lock_initialized_lead(&mut tx, input.lead_id).await?;

    let old: Option<(i64, i64, i64)> = sqlx::query_as(
        "SELECT price, gst, landing_price FROM additional_items WHERE id = $1 AND lead_id = $2",
    )
    .bind(input.item_id)
    .bind(input.lead_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (price, gst, landing) =
        old.ok_or_else(|| ArborError::NotFound("Additional item not found".into()))?;

    sqlx::query("DELETE FROM additional_items WHERE id = $1")
        .bind(input.item_id)
        .execute(&mut *tx)
        .await?;

    // The landing-price contribution is reversed only when one was recorded.
    if landing > 0 {
        sqlx::query(
            "UPDATE leads SET
                total_project_cost = COALESCE(total_project_cost, 0) - $1,
                total_gst = COALESCE(total_gst, 0) - $2,
                additional_items_cost = COALESCE(additional_items_cost, 0) - $1,
                total_exp = COALESCE(total_exp, 0) - $3,
                updated_at = now()
             WHERE id = $4",
        )
        .bind(price)
        .bind(gst)
        .bind(landing)
        .bind(input.lead_id)
        .execute(&mut *tx)
        .await?;
    } else {
        sqlx::query(
            "UPDATE leads SET
                total_project_cost = COALESCE(total_project_cost, 0) - $1,
                total_gst = COALESCE(total_gst, 0) - $2,
                additional_items_cost = COALESCE(additional_items_cost, 0) - $1,
                updated_at = now()
             WHERE id = $3",
        )
        .bind(price)
        .bind(gst)
        .bind(input.lead_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

// --- Provided items ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProvidedItemInput {
    pub lead_id: i32,
    #[serde(flatten)]
    pub item: ProvidedItemInput,
}

pub async fn add_provided_item_internal(
    pool: &DbPool,
    input: AddProvidedItemInput,
) -> ArborResult<i32> {
    validate_provided_input(&input.item)?;

    let mut tx = pool.begin().await?;
    lock_initialized_lead(&mut tx, input.lead_id).await?;

    let row: (i32,) = sqlx::query_as(
        "INSERT INTO provided_items (lead_id, area, brand, model, pay_in_cash, pay_in_online, gst)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
    )
    .bind(input.lead_id)
    .bind(&input.item.area)
    .bind(&input.item.brand)
    .bind(&input.item.model)
    .bind(input.item.pay_in_cash)
    .bind(input.item.pay_in_online)
    .bind(input.item.gst)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE leads SET
            total_project_cost = COALESCE(total_project_cost, 0) + $1 + $2,
            pay_in_cash = COALESCE(pay_in_cash, 0) + $1,
            pay_in_online = COALESCE(pay_in_online, 0) + $2,
            total_gst = COALESCE(total_gst, 0) + $3,
            updated_at = now()
         WHERE id = $4",
    )
    .bind(input.item.pay_in_cash)
    .bind(input.item.pay_in_online)
    .bind(input.item.gst)
    .bind(input.lead_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row.0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProvidedItemInput {
    pub item_id: i32,
    pub lead_id: i32,
    #[serde(flatten)]
    pub item: ProvidedItemInput,
}

pub async fn update_provided_item_internal(
    pool: &DbPool,
    input: UpdateProvidedItemInput,
) -> ArborResult<()> {
    validate_provided_input(&input.item)?;

    let mut tx = pool.begin().await?;
    lock_initialized_lead(&mut tx, input.lead_id).await?;

    let old: Option<(i64, i64, i64)> = sqlx::query_as(
        "SELECT pay_in_cash, pay_in_online, gst FROM provided_items WHERE id = $1 AND lead_id = $2",
    )
    .bind(input.item_id)
    .bind(input.lead_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (old_cash, old_online, old_gst) =
        old.ok_or_else(|| ArborError::NotFound("Provided item not found".into()))?;

    sqlx::query(
        "UPDATE provided_items SET area = $1, brand = $2, model = $3, pay_in_cash = $4, pay_in_online = $5, gst = $6
         WHERE id = $7",
    )
    .bind(&input.item.area)
    .bind(&input.item.brand)
    .bind(&input.item.model)
    .bind(input.item.pay_in_cash)
    .bind(input.item.pay_in_online)
    .bind(input.item.gst)
    .bind(input.item_id)
    .execute(&mut *tx)
    .await?;

    let cash_diff = input.item.pay_in_cash - old_cash;
    let online_diff = input.item.pay_in_online - old_online;
    let gst_diff = input.item.gst - old_gst;

    if cash_diff != 0 || online_diff != 0 || gst_diff != 0 {
        sqlx::query(
            "UPDATE leads SET
                total_project_cost = COALESCE(total_project_cost, 0) + $1 + $2,
                pay_in_cash = COALESCE(pay_in_cash, 0) + $1,
                pay_in_online = COALESCE(pay_in_online, 0) + $2,
                total_gst = COALESCE(total_gst, 0) + $3,
                updated_at = now()
             WHERE id = $4",
        )
        .bind(cash_diff)
        .bind(online_diff)
        .bind(gst_diff)
        .bind(input.lead_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn delete_provided_item_internal(
    pool: &DbPool,
    input: DeleteItemInput,
) -> ArborResult<()> {
    let mut tx = pool.begin().await?;
    lock_initialized_lead(&mut tx, input.lead_id).await?;

    let old: Option<(i64, i64, i64)> = sqlx::query_as(
        "SELECT pay_in_cash, pay_in_online, gst FROM provided_items WHERE id = $1 AND lead_id = $2",
    )
    .bind(input.item_id)
    .bind(input.lead_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (cash, online, gst) =
        old.ok_or_else(|| ArborError::NotFound("Provided item not found".into()))?;

    sqlx::query("DELETE FROM provided_items WHERE id = $1")
        .bind(input.item_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE leads SET
            total_project_cost = COALESCE(total_project_cost, 0) - $1 - $2,
            pay_in_cash = COALESCE(pay_in_cash, 0) - $1,
            pay_in_online = COALESCE(pay_in_online, 0) - $2,
            total_gst = COALESCE(total_gst, 0) - $3,
            updated_at = now()
         WHERE id = $4",
    )
    .bind(cash)
    .bind(online)
    .bind(gst)
    .bind(input.lead_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

// --- Axum Handlers ---

pub async fn initialize_lead_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<InitLeadInput>,
) -> ArborResult<Json<Value>> {
    let id = initialize_lead_internal(&state.pool, input).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn add_additional_item_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<AddAdditionalItemInput>,
) -> ArborResult<Json<Value>> {
    let id = add_additional_item_internal(&state.pool, input).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn update_additional_item_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<UpdateAdditionalItemInput>,
) -> ArborResult<Json<()>> {
    update_additional_item_internal(&state.pool, input).await?;
    Ok(Json(()))
}

pub async fn delete_additional_item_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<DeleteItemInput>,
) -> ArborResult<Json<()>> {
    delete_additional_item_internal(&state.pool, input).await?;
    Ok(Json(()))
}

pub async fn add_provided_item_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<AddProvidedItemInput>,
) -> ArborResult<Json<Value>> {
    let id = add_provided_item_internal(&state.pool, input).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn update_provided_item_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<UpdateProvidedItemInput>,
) -> ArborResult<Json<()>> {
    update_provided_item_internal(&state.pool, input).await?;
    Ok(Json(()))
}

pub async fn delete_provided_item_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<DeleteItemInput>,
) -> ArborResult<Json<()>> {
    delete_provided_item_internal(&state.pool, input).await?;
    Ok(Json(()))
}
