use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use atlas_types::api::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};

use crate::error::{ApiError, FieldErrors};
use crate::middleware::Claims;
use crate::state::{AppState, run_db};
use crate::validation::Validate;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let username = req.username.clone();
    let taken = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .is_some();
    if taken {
        return Err(ApiError::Conflict("A user with that username already exists.".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    let username = req.username.clone();
    let created = run_db(&state, move |db| {
        db.create_user(
            &user_id.to_string(),
            &req.username,
            &password_hash,
            &req.first_name,
            &req.last_name,
            &req.email,
            req.biography.as_deref(),
        )
    })
    .await?;
    // Lost a race with a concurrent registration of the same name.
    if !created {
        return Err(ApiError::Conflict("A user with that username already exists.".into()));
    }

    let token = create_token(&state, user_id, &username)?;
    info!("Registered user {}", username);

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();
    let user = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    verify_password(&req.password, &user.password)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Corrupt user id '{}': {}", user.id, e)))?;

    let token = create_token(&state, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let uid = claims.sub.to_string();
    let user = run_db(&state, move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if verify_password(&req.old_password, &user.password).is_err() {
        return Err(FieldErrors::single(
            "old_password",
            "Your old password was entered incorrectly.",
        ));
    }

    let password_hash = hash_password(&req.new_password)?;
    run_db(&state, move |db| db.update_password(&user.id, &password_hash)).await?;
    info!("User {} changed their password", claims.username);

    Ok(StatusCode::NO_CONTENT)
}

/// Hash password with Argon2id
fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored_hash: &str) -> Result<(), ApiError> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Corrupt password hash: {}", e)))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)
}

fn create_token(state: &AppState, user_id: Uuid, username: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(state.token_days)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_only_the_right_password() {
        let hash = hash_password("FunGuy123!").unwrap();
        assert!(verify_password("FunGuy123!", &hash).is_ok());
        assert!(matches!(verify_password("wrong", &hash), Err(ApiError::Unauthorized)));
    }
}
