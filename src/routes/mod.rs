use crate::state::AppState;
use axum::{routing::get, Router};

pub mod auth;
pub mod expense;
pub mod leads;
pub mod notification;
pub mod revenue;
pub mod vendor;

async fn ping() -> &'static str {
    "pong"
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/ping", get(ping))
        .merge(auth::router())
        .merge(leads::router())
        .merge(vendor::router())
        .merge(expense::router())
        .merge(revenue::router())
        .merge(notification::router())
}
