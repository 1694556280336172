use crate::clock::{month_bucket, TimeSource};
use crate::commands::revenue::apply_revenue_delta;
use crate::db::{DbPool, StoreExpNote};
use crate::error::{ArborError, ArborResult};
use crate::state::AppState;
use axum::extract::{Json, Query, State as AxumState};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExpenseInput {
    pub user_id: i32,
    pub amount: i64,
    pub transaction_date: Option<String>,
    pub remark: Option<String>,
}

/// Logs a store expense and mirrors it as a negative adjustment to the
/// *current* month's revenue row (not the transaction date's month).
pub async fn create_expense_internal(
    pool: &DbPool,
    clock: &dyn TimeSource,
    input: CreateExpenseInput,
) -> ArborResult<i32> {
    if input.amount <= 0 {
        return Err(ArborError::Validation(
            "Expense amount must be positive".into(),
        ));
    }

    let t_date = match input.transaction_date.as_deref() {
        Some(d) if !d.is_empty() => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .map_err(|e| ArborError::Validation(format!("Invalid date: {}", e)))?,
        _ => clock.today(),
    };

    let mut tx = pool.begin().await?;

    let user_exists: Option<(i32,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
        .bind(input.user_id)
        .fetch_optional(&mut *tx)
        .await?;
    if user_exists.is_none() {
        return Err(ArborError::NotFound("User not found".into()));
    }

    let row: (i32,) = sqlx::query_as(
        "INSERT INTO store_exp_notes (user_id, amount, transaction_date, remark)
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(input.user_id)
    .bind(input.amount)
    .bind(t_date)
    .bind(&input.remark)
    .fetch_one(&mut *tx)
    .await?;

    let (month, year) = month_bucket(clock.today());
    apply_revenue_delta(&mut tx, input.user_id, &month, &year, -input.amount, 0, 0).await?;

    tx.commit().await?;
    Ok(row.0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteExpenseInput {
    pub expense_id: i32,
}

/// Removes a store expense. The reversal credits the month the expense was
/// recorded against (its stored transaction date), not the current month: an
/// expense logged in January and deleted in February belongs to January.
pub async fn delete_expense_internal(pool: &DbPool, input: DeleteExpenseInput) -> ArborResult<()> {
    let mut tx = pool.begin().await?;

    let old: Option<(i32, i64, NaiveDate)> = sqlx::query_as(
        "SELECT user_id, amount, transaction_date FROM store_exp_notes WHERE id = $1",
    )
    .bind(input.expense_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (user_id, amount, t_date) =
        old.ok_or_else(|| ArborError::NotFound("Expense entry not found".into()))?;

    sqlx::query("DELETE FROM store_exp_notes WHERE id = $1")
        .bind(input.expense_id)
        .execute(&mut *tx)
        .await?;

    let (month, year) = month_bucket(t_date);
    apply_revenue_delta(&mut tx, user_id, &month, &year, amount, 0, 0).await?;

    tx.commit().await?;
    Ok(())
}

pub async fn list_expenses_internal(
    pool: &DbPool,
    user_id: Option<i32>,
) -> ArborResult<Vec<StoreExpNote>> {
    let rows = if let Some(user_id) = user_id {
        sqlx::query_as::<_, StoreExpNote>(
            "SELECT * FROM store_exp_notes WHERE user_id = $1 ORDER BY transaction_date DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, StoreExpNote>(
            "SELECT * FROM store_exp_notes ORDER BY transaction_date DESC, id DESC",
        )
        .fetch_all(pool)
        .await?
    };
    Ok(rows)
}

// --- Axum Handlers ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseListQuery {
    pub user_id: Option<i32>,
}

pub async fn create_expense_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<CreateExpenseInput>,
) -> ArborResult<Json<Value>> {
    let id = create_expense_internal(&state.pool, &*state.clock, input).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn delete_expense_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<DeleteExpenseInput>,
) -> ArborResult<Json<()>> {
    delete_expense_internal(&state.pool, input).await?;
    Ok(Json(()))
}

pub async fn list_expenses_axum(
    AxumState(state): AxumState<AppState>,
    Query(query): Query<ExpenseListQuery>,
) -> ArborResult<Json<Vec<StoreExpNote>>> {
    let rows = list_expenses_internal(&state.pool, query.user_id).await?;
    Ok(Json(rows))
}
