use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/expenses", get(commands::expense::list_expenses_axum))
        .route("/api/expenses/create", post(commands::expense::create_expense_axum))
        .route("/api/expenses/delete", post(commands::expense::delete_expense_axum))
}
