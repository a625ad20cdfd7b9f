//! Comments on findings and recipes, and the "new comments on my stuff"
//! views their owners use.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use atlas_db::models::CommentTarget;
use atlas_types::api::{Comment, CreateCommentRequest, UnreadComments};

use crate::convert;
use crate::error::ApiError;
use crate::middleware::Claims;
use crate::state::{AppState, run_db};
use crate::validation::Validate;

/// Shared by `POST /findings/{id}/comments` and `POST /recipes/{id}/comments`.
pub(crate) async fn create(
    state: &AppState,
    claims: &Claims,
    target: CommentTarget,
    target_id: Uuid,
    req: CreateCommentRequest,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    req.validate()?;

    let id = Uuid::new_v4();
    let uid = claims.sub.to_string();
    let row = run_db(state, move |db| {
        let id = id.to_string();
        if !db.create_comment(target, &id, &target_id.to_string(), &uid, &req.text)? {
            return Ok(None);
        }
        db.get_comment(target, &id)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    info!("{} commented on {:?} {}", claims.username, target, target_id);
    Ok((StatusCode::CREATED, Json(convert::comment(row))))
}

async fn on_mine(state: &AppState, claims: &Claims, target: CommentTarget) -> Result<Vec<Comment>, ApiError> {
    let uid = claims.sub.to_string();
    let rows = run_db(state, move |db| db.comments_on_owned(target, &uid)).await?;
    Ok(rows.into_iter().map(convert::comment).collect())
}

/// GET /comments/findings: comments left on the caller's findings.
pub async fn finding_comments_on_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(on_mine(&state, &claims, CommentTarget::Finding).await?))
}

/// GET /comments/recipes: comments left on the caller's recipes.
pub async fn recipe_comments_on_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(on_mine(&state, &claims, CommentTarget::Recipe).await?))
}

pub async fn unread_comments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let (findings, recipes) = run_db(&state, move |db| {
        Ok((
            db.count_new_comments(CommentTarget::Finding, &uid)?,
            db.count_new_comments(CommentTarget::Recipe, &uid)?,
        ))
    })
    .await?;
    Ok(Json(UnreadComments { findings, recipes }))
}

async fn mark_read(
    state: &AppState,
    claims: &Claims,
    target: CommentTarget,
    comment_id: Uuid,
) -> Result<StatusCode, ApiError> {
    let uid = claims.sub.to_string();
    run_db(state, move |db| db.mark_comment_read(target, &comment_id.to_string(), &uid))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_finding_comment_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    mark_read(&state, &claims, CommentTarget::Finding, comment_id).await
}

pub async fn mark_recipe_comment_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    mark_read(&state, &claims, CommentTarget::Recipe, comment_id).await
}
