use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(commands::auth::login_axum))
        .route("/api/auth/signup", post(commands::auth::signup_axum))
        .route("/api/auth/otp/request", post(commands::auth::request_otp_axum))
        .route("/api/auth/otp/reset", post(commands::auth::reset_password_axum))
        .route("/api/users", get(commands::auth::get_all_users_axum))
        .route("/api/users/create", post(commands::auth::create_user_axum))
        .route("/api/users/update", post(commands::auth::update_user_axum))
        .route("/api/users/delete", post(commands::auth::delete_user_axum))
}
