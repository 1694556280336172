use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/vendors", get(commands::vendor::get_vendor_list_axum))
        .route("/api/vendors/save", post(commands::vendor::save_vendor_axum))
        .route("/api/vendors/delete", post(commands::vendor::delete_vendor_axum))
        .route("/api/vendors/assign", post(commands::vendor::assign_vendor_axum))
        .route("/api/vendors/payout", post(commands::vendor::record_payout_axum))
        .route("/api/vendors/unassign", post(commands::vendor::unassign_vendor_axum))
        .route("/api/vendors/breakdown", get(commands::vendor::get_breakdowns_axum))
}
