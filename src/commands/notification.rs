use crate::db::{DbPool, Notification};
use crate::error::{ArborError, ArborResult};
use crate::state::AppState;
use axum::extract::{Json, Query, State as AxumState};
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn list_notifications_internal(
    pool: &DbPool,
    user_id: i32,
) -> ArborResult<Vec<Notification>> {
    Ok(sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationInput {
    pub noti_id: Option<String>,
    pub user_id: i32,
    pub message: String,
}

pub async fn create_notification_internal(
    pool: &DbPool,
    input: CreateNotificationInput,
) -> ArborResult<i32> {
    if input.message.trim().is_empty() {
        return Err(ArborError::Validation("Message is required".into()));
    }

    let row: (i32,) = sqlx::query_as(
        "INSERT INTO notifications (noti_id, user_id, message) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&input.noti_id)
    .bind(input.user_id)
    .bind(input.message.trim())
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn mark_notification_read_internal(pool: &DbPool, id: i32) -> ArborResult<()> {
    let updated = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(ArborError::NotFound("Notification not found".into()));
    }
    Ok(())
}

pub async fn delete_notification_internal(pool: &DbPool, id: i32) -> ArborResult<()> {
    let deleted = sqlx::query("DELETE FROM notifications WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ArborError::NotFound("Notification not found".into()));
    }
    Ok(())
}

// --- Axum Handlers ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListQuery {
    pub user_id: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationIdInput {
    pub id: i32,
}

pub async fn list_notifications_axum(
    AxumState(state): AxumState<AppState>,
    Query(query): Query<NotificationListQuery>,
) -> ArborResult<Json<Vec<Notification>>> {
    let rows = list_notifications_internal(&state.pool, query.user_id).await?;
    Ok(Json(rows))
}

pub async fn create_notification_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<CreateNotificationInput>,
) -> ArborResult<Json<Value>> {
    let id = create_notification_internal(&state.pool, input).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn mark_notification_read_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<NotificationIdInput>,
) -> ArborResult<Json<()>> {
    mark_notification_read_internal(&state.pool, input.id).await?;
    Ok(Json(()))
}

pub async fn delete_notification_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<NotificationIdInput>,
) -> ArborResult<Json<()>> {
    delete_notification_internal(&state.pool, input.id).await?;
    Ok(Json(()))
}
