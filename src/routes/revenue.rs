use crate::commands;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/revenue", get(commands::revenue::get_revenue_axum))
        .route(
            "/api/revenue/summary",
            get(commands::revenue::get_monthly_summary_axum),
        )
        .route(
            "/api/dashboard/stats",
            get(commands::revenue::get_dashboard_stats_axum),
        )
}
