use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use atlas_types::api::UpdateProfileRequest;

use crate::convert;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::state::{AppState, run_db};
use crate::validation::Validate;

pub async fn list_profiles(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, |db| db.list_profiles()).await?;
    Ok(Json(rows.into_iter().map(convert::profile).collect::<Vec<_>>()))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.get_profile(&user_id.to_string()))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(convert::profile(row)))
}

/// GET /profile: the caller's own profile.
pub async fn my_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.get_profile(&claims.sub.to_string()))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(convert::profile(row)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let uid = claims.sub.to_string();
    let row = run_db(&state, move |db| {
        if !db.update_profile(
            &uid,
            req.first_name.as_deref(),
            req.last_name.as_deref(),
            req.email.as_deref(),
            req.biography.as_deref(),
        )? {
            return Ok(None);
        }
        db.get_profile(&uid)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    info!("Profile of {} updated", claims.username);
    Ok(Json(convert::profile(row)))
}
