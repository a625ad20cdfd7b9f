use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use atlas_db::models::{CommentTarget, RateOutcome, RecipeFilter};
use atlas_types::api::{
    CreateCommentRequest, CreateRecipeRequest, RateRecipeRequest, RatingResponse, RecipeDetail,
};

use crate::convert;
use crate::error::{ApiError, FieldErrors};
use crate::middleware::Claims;
use crate::state::{AppState, run_db};
use crate::validation::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    pub main_mushroom: Option<Uuid>,
    pub min_rating: Option<f64>,
    pub user: Option<Uuid>,
}

pub async fn list_recipes(
    State(state): State<AppState>,
    Query(query): Query<RecipeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = RecipeFilter {
        main_mushroom: query.main_mushroom.map(|m| m.to_string()),
        min_rating: query.min_rating,
        user_id: query.user.map(|u| u.to_string()),
    };
    let rows = run_db(&state, move |db| db.list_recipes(&filter)).await?;
    Ok(Json(rows.into_iter().map(convert::recipe).collect::<Vec<_>>()))
}

/// GET /recipes/{id}: the recipe with its comments, newest first.
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (recipe, comments) = run_db(&state, move |db| {
        let Some(recipe) = db.get_recipe(&id.to_string())? else {
            return Ok((None, vec![]));
        };
        let comments = db.comments_for(CommentTarget::Recipe, &recipe.id)?;
        Ok((Some(recipe), comments))
    })
    .await?;

    let recipe = recipe.ok_or(ApiError::NotFound)?;
    Ok(Json(RecipeDetail {
        recipe: convert::recipe(recipe),
        comments: comments.into_iter().map(convert::comment).collect(),
    }))
}

pub async fn create_recipe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateRecipeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = FieldErrors::new();
    req.check(&mut errors);
    if let Some(mushroom) = req.main_mushroom {
        let exists = run_db(&state, move |db| db.get_mushroom(&mushroom.to_string()))
            .await?
            .is_some();
        if !exists {
            errors.add("main_mushroom", "Select a valid choice. That choice is not one of the available choices.");
        }
    }
    errors.into_result()?;

    let id = Uuid::new_v4();
    let uid = claims.sub.to_string();
    let row = run_db(&state, move |db| {
        db.create_recipe(&id.to_string(), &uid, &req)?;
        db.get_recipe(&id.to_string())
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    info!("Recipe '{}' created by {}", row.title, claims.username);
    Ok((StatusCode::CREATED, Json(convert::recipe(row))))
}

/// POST /recipes/{id}/ratings: each user may rate a recipe once.
pub async fn rate_recipe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(recipe_id): Path<Uuid>,
    Json(req): Json<RateRecipeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let rating_id = Uuid::new_v4();
    let uid = claims.sub.to_string();
    let value = req.value;
    let outcome = run_db(&state, move |db| {
        db.rate_recipe(&rating_id.to_string(), &recipe_id.to_string(), &uid, value)
    })
    .await?;

    match outcome {
        RateOutcome::Rated { rating, num_ratings } => {
            info!("{} rated recipe {} with {}", claims.username, recipe_id, value);
            Ok((
                StatusCode::CREATED,
                Json(RatingResponse {
                    recipe_id,
                    value,
                    rating,
                    num_ratings,
                }),
            ))
        }
        RateOutcome::AlreadyRated => Err(ApiError::Conflict("You have already rated this recipe.".into())),
        RateOutcome::RecipeNotFound => Err(ApiError::NotFound),
    }
}

pub async fn comment_recipe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(recipe_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    crate::comments::create(&state, &claims, CommentTarget::Recipe, recipe_id, req).await
}
