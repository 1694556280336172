use crate::error::{ArborError, ArborResult};
use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // emp_no
    pub user_id: i32,
    pub name: Option<String>,
    pub role: String,
    pub store: Option<String>,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == "ADMIN"
    }

    /// STORE_MANAGER sessions only see their own store; ADMIN and SUPER_HEAD
    /// see everything.
    pub fn store_filter(&self) -> Option<&str> {
        if self.role == "STORE_MANAGER" {
            self.store.as_deref()
        } else {
            None
        }
    }

    pub fn require_admin(&self) -> ArborResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ArborError::Auth("Admin authority required".to_string()))
        }
    }
}

pub fn get_jwt_secret() -> Vec<u8> {
    std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using insecure default!");
            "insecure-development-secret-key-replace-me-immediately".to_string()
        })
        .into_bytes()
}

pub fn mint_token(claims: &Claims) -> ArborResult<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(&get_jwt_secret()),
    )
    .map_err(|e| ArborError::Internal(format!("Token encode error: {}", e)))
}

pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let path = request.uri().path();
    let public_routes = [
        "/api/ping",
        "/api/auth/login",
        "/api/auth/signup",
        "/api/auth/otp/request",
        "/api/auth/otp/reset",
    ];

    if !path.starts_with("/api/") || public_routes.contains(&path) {
        return Ok(next.run(request).await);
    }

    let auth_header = request.headers().get(header::AUTHORIZATION);

    let auth_header = match auth_header {
        Some(header) => header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?,
        None => return Err(StatusCode::UNAUTHORIZED),
    };

    if !auth_header.starts_with("Bearer ") {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = &auth_header["Bearer ".len()..];

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(&get_jwt_secret()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(token_data.claims);

    Ok(next.run(request).await)
}
