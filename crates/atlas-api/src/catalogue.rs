use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use atlas_db::models::MushroomFilter;
use atlas_types::api::{
    CreateFamilyRequest, CreateHabitatRequest, CreateMushroomRequest, CreateTipRequest,
    FamilyDetail, HomeSummary,
};
use atlas_types::models::Edibility;

use crate::convert;
use crate::error::{ApiError, FieldErrors};
use crate::middleware::Claims;
use crate::state::{AppState, run_db};
use crate::validation::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct MushroomQuery {
    pub edibility: Option<Edibility>,
    pub habitat: Option<Uuid>,
    pub family: Option<Uuid>,
}

/// Catalogue entries (mushrooms, families, habitats) can only be added by
/// users holding the permission.
async fn require_catalogue_permission(state: &AppState, claims: &Claims) -> Result<(), ApiError> {
    let uid = claims.sub.to_string();
    let user = run_db(state, move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if !user.can_add_mushroom {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// GET /: counts shown on the home page.
pub async fn home(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let counts = run_db(&state, |db| db.counts()).await?;
    Ok(Json(HomeSummary {
        mushrooms: counts.mushrooms,
        families: counts.families,
        habitats: counts.habitats,
        recipes: counts.recipes,
        tips: counts.tips,
        findings: counts.findings,
    }))
}

// -- Mushrooms --

pub async fn list_mushrooms(
    State(state): State<AppState>,
    Query(query): Query<MushroomQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = MushroomFilter {
        edibility: query.edibility,
        habitat_id: query.habitat.map(|h| h.to_string()),
        family_id: query.family.map(|f| f.to_string()),
    };
    let rows = run_db(&state, move |db| db.list_mushrooms(&filter)).await?;
    Ok(Json(rows.into_iter().map(convert::mushroom).collect::<Vec<_>>()))
}

pub async fn get_mushroom(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.get_mushroom(&id.to_string()))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(convert::mushroom(row)))
}

pub async fn create_mushroom(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateMushroomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_catalogue_permission(&state, &claims).await?;

    let mut errors = FieldErrors::new();
    req.check(&mut errors);

    let family: Vec<String> = req.family.iter().map(|f| f.to_string()).collect();
    let habitats: Vec<String> = req.habitats.iter().map(|h| h.to_string()).collect();
    let (missing_family, missing_habitats) = run_db(&state, move |db| {
        Ok((db.missing_ids("families", &family)?, db.missing_ids("habitats", &habitats)?))
    })
    .await?;
    if !missing_family.is_empty() {
        errors.add("family", "Select a valid choice. That choice is not one of the available choices.");
    }
    for habitat in missing_habitats {
        errors.add("habitats", format!("Select a valid choice. {habitat} is not one of the available choices."));
    }
    errors.into_result()?;

    let id = Uuid::new_v4();
    let row = run_db(&state, move |db| {
        db.create_mushroom(&id.to_string(), &req)?;
        db.get_mushroom(&id.to_string())
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    info!("Mushroom {} ({}) added by {}", row.name_cz, id, claims.username);
    Ok((StatusCode::CREATED, Json(convert::mushroom(row))))
}

// -- Families --

pub async fn list_families(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, |db| db.list_families()).await?;
    Ok(Json(rows.into_iter().map(convert::family).collect::<Vec<_>>()))
}

/// GET /families/{id}: the family with the mushrooms that belong to it.
pub async fn get_family(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (family, mushrooms) = run_db(&state, move |db| {
        let Some(family) = db.get_family(&id.to_string())? else {
            return Ok((None, vec![]));
        };
        let mushrooms = db.list_mushrooms(&MushroomFilter {
            family_id: Some(id.to_string()),
            ..Default::default()
        })?;
        Ok((Some(family), mushrooms))
    })
    .await?;

    let family = family.ok_or(ApiError::NotFound)?;
    Ok(Json(FamilyDetail {
        family: convert::family(family),
        mushrooms: mushrooms.into_iter().map(convert::mushroom).collect(),
    }))
}

pub async fn create_family(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateFamilyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_catalogue_permission(&state, &claims).await?;
    req.validate()?;

    let id = Uuid::new_v4();
    let row = run_db(&state, move |db| {
        db.create_family(&id.to_string(), &req)?;
        db.get_family(&id.to_string())
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    info!("Family {} added by {}", row.name, claims.username);
    Ok((StatusCode::CREATED, Json(convert::family(row))))
}

// -- Habitats --

pub async fn list_habitats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, |db| db.list_habitats()).await?;
    Ok(Json(rows.into_iter().map(convert::habitat).collect::<Vec<_>>()))
}

pub async fn create_habitat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateHabitatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_catalogue_permission(&state, &claims).await?;
    req.validate()?;

    let id = Uuid::new_v4();
    let name = req.name.clone();
    run_db(&state, move |db| db.create_habitat(&id.to_string(), &req.name)).await?;

    Ok((
        StatusCode::CREATED,
        Json(atlas_types::api::Habitat { id, name }),
    ))
}

// -- Tips --

pub async fn list_tips(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, |db| db.list_tips()).await?;
    Ok(Json(rows.into_iter().map(convert::tip).collect::<Vec<_>>()))
}

pub async fn get_tip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.get_tip(&id.to_string()))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(convert::tip(row)))
}

pub async fn create_tip(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTipRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let id = Uuid::new_v4();
    let uid = claims.sub.to_string();
    let row = run_db(&state, move |db| {
        db.create_tip(&id.to_string(), &uid, &req)?;
        db.get_tip(&id.to_string())
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok((StatusCode::CREATED, Json(convert::tip(row))))
}
