use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use atlas_db::models::CommentTarget;
use atlas_types::api::{CreateCommentRequest, CreateFindingRequest, FindingDetail};

use crate::convert;
use crate::error::{ApiError, FieldErrors};
use crate::middleware::Claims;
use crate::state::{AppState, run_db};
use crate::validation::Validate;

pub async fn list_findings(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, |db| db.list_findings()).await?;
    Ok(Json(rows.into_iter().map(convert::finding).collect::<Vec<_>>()))
}

pub async fn get_finding(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (finding, comments) = run_db(&state, move |db| {
        let Some(finding) = db.get_finding(&id.to_string())? else {
            return Ok((None, vec![]));
        };
        let comments = db.comments_for(CommentTarget::Finding, &finding.id)?;
        Ok((Some(finding), comments))
    })
    .await?;

    let finding = finding.ok_or(ApiError::NotFound)?;
    Ok(Json(FindingDetail {
        finding: convert::finding(finding),
        comments: comments.into_iter().map(convert::comment).collect(),
    }))
}

pub async fn create_finding(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateFindingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = FieldErrors::new();
    req.check(&mut errors);
    let mushroom = req.mushroom.to_string();
    if run_db(&state, move |db| db.get_mushroom(&mushroom)).await?.is_none() {
        errors.add("mushroom", "Select a valid choice. That choice is not one of the available choices.");
    }
    errors.into_result()?;

    let id = Uuid::new_v4();
    let uid = claims.sub.to_string();
    let row = run_db(&state, move |db| {
        db.create_finding(&id.to_string(), &uid, &req)?;
        db.get_finding(&id.to_string())
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    info!(
        "Finding of {} at ({}, {}) recorded by {}",
        row.mushroom_name, row.latitude, row.longitude, claims.username
    );
    Ok((StatusCode::CREATED, Json(convert::finding(row))))
}

pub async fn comment_finding(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(finding_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    crate::comments::create(&state, &claims, CommentTarget::Finding, finding_id, req).await
}
