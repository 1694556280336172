use crate::db::{DbPool, User};
use crate::error::{ArborError, ArborResult};
use crate::middleware::auth::{mint_token, Claims};
use crate::state::AppState;
use axum::extract::{Json, State as AxumState};
use axum::Extension;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const TOKEN_TTL_HOURS: i64 = 12;
const OTP_TTL_MINUTES: i64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub emp_no: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i32,
    pub emp_no: String,
    pub name: String,
    pub role: String,
    pub store: Option<String>,
}

pub async fn login_internal(pool: &DbPool, input: LoginRequest) -> ArborResult<LoginResponse> {
    if input.emp_no.trim().is_empty() || input.password.trim().is_empty() {
        return Err(ArborError::Validation(
            "Employee number and password are required".into(),
        ));
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE emp_no = $1")
        .bind(input.emp_no.trim())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ArborError::Auth("Unknown employee number".into()))?;

    let password_hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| ArborError::Auth("Account has not been activated yet".into()))?;

    if !verify(&input.password, password_hash)? {
        return Err(ArborError::Auth("Incorrect password".into()));
    }

    let exp = (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize;
    let claims = Claims {
        sub: user.emp_no.clone(),
        user_id: user.id,
        name: Some(user.name.clone()),
        role: user.role.clone(),
        store: user.store.clone(),
        exp,
    };
    let token = mint_token(&claims)?;

    Ok(LoginResponse {
        token,
        user_id: user.id,
        emp_no: user.emp_no,
        name: user.name,
        role: user.role,
        store: user.store,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub emp_no: String,
    pub email: Option<String>,
    pub password: String,
}

/// Claims a provisioned employee record. Accounts are created by an admin
/// without credentials; signup attaches them exactly once.
pub async fn signup_internal(pool: &DbPool, input: SignupRequest) -> ArborResult<()> {
    if input.password.trim().len() < 6 {
        return Err(ArborError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    let user: Option<(i32, Option<String>)> =
        sqlx::query_as("SELECT id, password_hash FROM users WHERE emp_no = $1 FOR UPDATE")
            .bind(input.emp_no.trim())
            .fetch_optional(&mut *tx)
            .await?;

    let (user_id, password_hash) =
        user.ok_or_else(|| ArborError::NotFound("Employee record not found".into()))?;

    if password_hash.is_some() {
        return Err(ArborError::Policy("Account is already registered".into()));
    }

    let hashed = hash(input.password, DEFAULT_COST)?;

    sqlx::query(
        "UPDATE users SET password_hash = $1, email = COALESCE($2, email), updated_at = now() WHERE id = $3",
    )
    .bind(hashed)
    .bind(&input.email)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| ArborError::from(e).policy_on_unique("Email is already in use"))?;

    tx.commit().await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequest {
    pub emp_no: String,
}

/// Issues a fresh one-time code with a short expiry. Delivery is handled by
/// the messaging side; the code never appears in the response body.
pub async fn request_otp_internal(pool: &DbPool, input: OtpRequest) -> ArborResult<()> {
    let user: Option<(i32,)> = sqlx::query_as("SELECT id FROM users WHERE emp_no = $1")
        .bind(input.emp_no.trim())
        .fetch_optional(pool)
        .await?;

    let (user_id,) = user.ok_or_else(|| ArborError::NotFound("Employee record not found".into()))?;

    let otp: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    let expires_at = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);

    sqlx::query("UPDATE users SET otp_code = $1, otp_expires_at = $2, updated_at = now() WHERE id = $3")
        .bind(otp.to_string())
        .bind(expires_at)
        .bind(user_id)
        .execute(pool)
        .await?;

    tracing::info!("OTP issued for user {}", user_id);
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub emp_no: String,
    pub otp: String,
    pub new_password: String,
}

pub async fn reset_password_internal(
    pool: &DbPool,
    input: ResetPasswordRequest,
) -> ArborResult<()> {
    if input.new_password.trim().len() < 6 {
        return Err(ArborError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    let mut tx = pool.begin().await?;

    let user: Option<(i32, Option<String>, Option<chrono::DateTime<Utc>>)> = sqlx::query_as(
        "SELECT id, otp_code, otp_expires_at FROM users WHERE emp_no = $1 FOR UPDATE",
    )
    .bind(input.emp_no.trim())
    .fetch_optional(&mut *tx)
    .await?;

    let (user_id, otp_code, otp_expires_at) =
        user.ok_or_else(|| ArborError::NotFound("Employee record not found".into()))?;

    let valid = otp_code.as_deref() == Some(input.otp.trim())
        && otp_expires_at.is_some_and(|t| t > Utc::now());
    if !valid {
        return Err(ArborError::Auth("Invalid or expired code".into()));
    }

    let hashed = hash(input.new_password, DEFAULT_COST)?;

    sqlx::query(
        "UPDATE users SET password_hash = $1, otp_code = NULL, otp_expires_at = NULL, updated_at = now() WHERE id = $2",
    )
    .bind(hashed)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

// --- User administration ---

pub async fn get_all_users_internal(pool: &DbPool) -> ArborResult<Vec<User>> {
    Ok(sqlx::query_as::<_, User>(
        "SELECT id, emp_no, name, email, NULL as password_hash, role, store, created_at, updated_at
         FROM users ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub emp_no: String,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub store: Option<String>,
}

pub async fn create_user_internal(pool: &DbPool, input: CreateUserRequest) -> ArborResult<i32> {
    if !matches!(input.role.as_str(), "ADMIN" | "SUPER_HEAD" | "STORE_MANAGER") {
        return Err(ArborError::Validation(format!(
            "Unknown role: {}",
            input.role
        )));
    }
    if input.emp_no.trim().is_empty() {
        return Err(ArborError::Validation("Employee number is required".into()));
    }

    let row: (i32,) = sqlx::query_as(
        "INSERT INTO users (emp_no, name, email, role, store) VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(input.emp_no.trim())
    .bind(input.name.trim())
    .bind(&input.email)
    .bind(&input.role)
    .bind(&input.store)
    .fetch_one(pool)
    .await
    .map_err(|e| ArborError::from(e).policy_on_unique("Employee number or email already exists"))?;

    Ok(row.0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub store: Option<String>,
}

pub async fn update_user_internal(pool: &DbPool, input: UpdateUserRequest) -> ArborResult<()> {
    if !matches!(input.role.as_str(), "ADMIN" | "SUPER_HEAD" | "STORE_MANAGER") {
        return Err(ArborError::Validation(format!(
            "Unknown role: {}",
            input.role
        )));
    }

    let updated = sqlx::query(
        "UPDATE users SET name = $1, email = $2, role = $3, store = $4, updated_at = now() WHERE id = $5",
    )
    .bind(input.name.trim())
    .bind(&input.email)
    .bind(&input.role)
    .bind(&input.store)
    .bind(input.id)
    .execute(pool)
    .await
    .map_err(|e| ArborError::from(e).policy_on_unique("Email is already in use"))?;

    if updated.rows_affected() == 0 {
        return Err(ArborError::NotFound("User not found".into()));
    }
    Ok(())
}

pub async fn delete_user_internal(pool: &DbPool, id: i32) -> ArborResult<()> {
    let user: Option<(String,)> = sqlx::query_as("SELECT role FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let (role,) = user.ok_or_else(|| ArborError::NotFound("User not found".into()))?;

    if role == "ADMIN" {
        let admins: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'ADMIN'")
            .fetch_one(pool)
            .await?;
        if admins.0 <= 1 {
            return Err(ArborError::Policy("Cannot delete the last admin".into()));
        }
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// --- Axum Handlers ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdInput {
    pub id: i32,
}

pub async fn login_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<LoginRequest>,
) -> ArborResult<Json<LoginResponse>> {
    let response = login_internal(&state.pool, input).await?;
    Ok(Json(response))
}

pub async fn signup_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<SignupRequest>,
) -> ArborResult<Json<()>> {
    signup_internal(&state.pool, input).await?;
    Ok(Json(()))
}

pub async fn request_otp_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<OtpRequest>,
) -> ArborResult<Json<()>> {
    request_otp_internal(&state.pool, input).await?;
    Ok(Json(()))
}

pub async fn reset_password_axum(
    AxumState(state): AxumState<AppState>,
    Json(input): Json<ResetPasswordRequest>,
) -> ArborResult<Json<()>> {
    reset_password_internal(&state.pool, input).await?;
    Ok(Json(()))
}

pub async fn get_all_users_axum(
    AxumState(state): AxumState<AppState>,
    Extension(claims): Extension<Claims>,
) -> ArborResult<Json<Vec<User>>> {
    claims.require_admin()?;
    let users = get_all_users_internal(&state.pool).await?;
    Ok(Json(users))
}

pub async fn create_user_axum(
    AxumState(state): AxumState<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<CreateUserRequest>,
) -> ArborResult<Json<Value>> {
    claims.require_admin()?;
    let id = create_user_internal(&state.pool, input).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn update_user_axum(
    AxumState(state): AxumState<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<UpdateUserRequest>,
) -> ArborResult<Json<()>> {
    claims.require_admin()?;
    update_user_internal(&state.pool, input).await?;
    Ok(Json(()))
}

pub async fn delete_user_axum(
    AxumState(state): AxumState<AppState>,
    Extension(claims): Extension<Claims>,
    Json(input): Json<UserIdInput>,
) -> ArborResult<Json<()>> {
    claims.require_admin()?;
    delete_user_internal(&state.pool, input.id).await?;
    Ok(Json(()))
}
