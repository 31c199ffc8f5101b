use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::State;
use axum::Json;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::user::{Credentials, UserView};
use crate::state::AppState;

pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<Credentials>,
) -> Result<Json<UserView>, AppError> {
    let email = input.email.trim();
    if email.is_empty() || !email.contains('@') || email.len() > 254 {
        return Err(AppError::BadRequest("a valid email is required".to_string()));
    }

    if input.password.len() < 8 || input.password.len() > 128 {
        return Err(AppError::BadRequest(
            "password must be between 8 and 128 characters".to_string(),
        ));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(input.password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?
        .to_string();

    let user = db::users::create_user(&state.db, email, &password_hash).await?;
    tracing::info!(user_id = %user.id, "user signed up");

    Ok(Json(user.into()))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<Credentials>,
) -> Result<Json<serde_json::Value>, AppError> {
    let invalid = || AppError::Unauthorized("invalid credentials".to_string());

    let user = db::users::get_user_by_email(&state.db, input.email.trim())
        .await?
        .ok_or_else(invalid)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| AppError::Internal(format!("stored hash parse failed: {e}")))?;

    if Argon2::default()
        .verify_password(input.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid());
    }

    let token = state.jwt.issue(&user.id, state.token_ttl)?;
    Ok(Json(serde_json::json!({ "token": token })))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserView>, AppError> {
    let user = db::users::get_user(&state.db, &auth.user_id).await?;
    Ok(Json(user.into()))
}
