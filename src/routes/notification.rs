use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/notifications",
            get(commands::notification::list_notifications_axum),
        )
        .route(
            "/api/notifications/create",
            post(commands::notification::create_notification_axum),
        )
        .route(
            "/api/notifications/read",
            post(commands::notification::mark_notification_read_axum),
        )
        .route(
            "/api/notifications/delete",
            post(commands::notification::delete_notification_axum),
        )
}
