use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/leads", get(commands::leads::list_leads_axum))
        .route("/api/leads/detail", get(commands::leads::get_lead_detail_axum))
        .route("/api/leads/create", post(commands::leads::create_lead_axum))
        .route("/api/leads/status", post(commands::leads::update_lead_status_axum))
        .route("/api/leads/init", post(commands::leads::initialize_lead_axum))
        .route("/api/leads/delete", post(commands::leads::delete_lead_axum))
        .route("/api/leads/reconcile", post(commands::leads::reconcile_lead_axum))
        .route("/api/leads/handover", post(commands::leads::handover_lead_axum))
        // Additional items
        .route(
            "/api/leads/items/additional/add",
            post(commands::leads::add_additional_item_axum),
        )
        .route(
            "/api/leads/items/additional/update",
            post(commands::leads::update_additional_item_axum),
        )
        .route(
            "/api/leads/items/additional/delete",
            post(commands::leads::delete_additional_item_axum),
        )
        // Provided items
        .route(
            "/api/leads/items/provided/add",
            post(commands::leads::add_provided_item_axum),
        )
        .route(
            "/api/leads/items/provided/update",
            post(commands::leads::update_provided_item_axum),
        )
        .route(
            "/api/leads/items/provided/delete",
            post(commands::leads::delete_provided_item_axum),
        )
}
