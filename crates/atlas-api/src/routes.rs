use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::middleware::require_auth;
use crate::messages::MAX_ATTACHMENT_SIZE;
use crate::state::AppState;
use crate::{auth, catalogue, comments, findings, messages, profiles, recipes};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Every HTTP route of the atlas. Reads of the public catalogue need no
/// token; everything that writes or touches personal data sits behind
/// `require_auth`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/", get(catalogue::home))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/mushrooms", get(catalogue::list_mushrooms))
        .route("/mushrooms/{id}", get(catalogue::get_mushroom))
        .route("/families", get(catalogue::list_families))
        .route("/families/{id}", get(catalogue::get_family))
        .route("/habitats", get(catalogue::list_habitats))
        .route("/recipes", get(recipes::list_recipes))
        .route("/recipes/{id}", get(recipes::get_recipe))
        .route("/tips", get(catalogue::list_tips))
        .route("/tips/{id}", get(catalogue::get_tip))
        .route("/findings", get(findings::list_findings))
        .route("/findings/{id}", get(findings::get_finding))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/password", post(auth::change_password))
        .route("/profiles", get(profiles::list_profiles))
        .route("/profiles/{id}", get(profiles::get_profile))
        .route("/profile", get(profiles::my_profile).put(profiles::update_profile))
        .route("/mushrooms", post(catalogue::create_mushroom))
        .route("/families", post(catalogue::create_family))
        .route("/habitats", post(catalogue::create_habitat))
        .route("/tips", post(catalogue::create_tip))
        .route("/recipes", post(recipes::create_recipe))
        .route("/recipes/{id}/ratings", post(recipes::rate_recipe))
        .route("/recipes/{id}/comments", post(recipes::comment_recipe))
        .route("/findings", post(findings::create_finding))
        .route("/findings/{id}/comments", post(findings::comment_finding))
        .route("/comments/findings", get(comments::finding_comments_on_mine))
        .route("/comments/recipes", get(comments::recipe_comments_on_mine))
        .route("/comments/unread", get(comments::unread_comments))
        .route("/comments/findings/{id}/read", post(comments::mark_finding_comment_read))
        .route("/comments/recipes/{id}/read", post(comments::mark_recipe_comment_read))
        // Messaging
        .route("/messages", post(messages::send_message))
        .route("/messages/inbox", get(messages::inbox))
        .route("/messages/outbox", get(messages::outbox))
        .route("/messages/trash", get(messages::trash))
        .route("/messages/bulk/trash", post(messages::bulk_trash))
        .route("/messages/bulk/delete", post(messages::bulk_delete))
        .route("/messages/bulk/restore-trash", post(messages::bulk_restore_trash))
        .route("/messages/bulk/delete-trash", post(messages::bulk_delete_trash))
        .route("/messages/{id}", get(messages::message_detail))
        .route("/messages/{id}/reply", post(messages::reply_message))
        .route("/messages/{id}/forward", post(messages::forward_message))
        .route("/messages/{id}/read", post(messages::mark_read))
        .route("/messages/{id}/trash", post(messages::trash_message))
        .route("/messages/{id}/restore", post(messages::restore_message))
        .route("/messages/{id}/delete", post(messages::delete_message))
        .route(
            "/messages/{id}/attachments",
            post(messages::upload_attachment).layer(DefaultBodyLimit::max(MAX_ATTACHMENT_SIZE)),
        )
        .route(
            "/messages/{id}/attachments/{attachment_id}",
            get(messages::download_attachment),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
