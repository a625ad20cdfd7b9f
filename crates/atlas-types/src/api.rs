use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mailbox::BoxState;
use crate::models::{Edibility, Party};

// -- JWT Claims --

/// Bearer token claims. Issued on register/login, checked by the auth
/// middleware on every protected route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub biography: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

// -- Profiles --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub biography: Option<String>,
    pub can_add_mushroom: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields left out of the body keep their current value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub biography: Option<String>,
}

// -- Home --

#[derive(Debug, Serialize, Deserialize)]
pub struct HomeSummary {
    pub mushrooms: i64,
    pub families: i64,
    pub habitats: i64,
    pub recipes: i64,
    pub tips: i64,
    pub findings: i64,
}

// -- Catalogue --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFamilyRequest {
    pub name: String,
    pub name_latin: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub id: Uuid,
    pub name: String,
    pub name_latin: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FamilyDetail {
    #[serde(flatten)]
    pub family: Family,
    pub mushrooms: Vec<Mushroom>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateHabitatRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habitat {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMushroomRequest {
    pub name_cz: String,
    pub name_latin: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub edibility: Edibility,
    #[serde(default)]
    pub family: Option<Uuid>,
    #[serde(default)]
    pub habitats: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mushroom {
    pub id: Uuid,
    pub name_cz: String,
    pub name_latin: String,
    pub description: Option<String>,
    pub edibility: Edibility,
    pub family: Option<Uuid>,
    pub habitats: Vec<Habitat>,
}

// -- Recipes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRecipeRequest {
    pub title: String,
    pub ingredients: String,
    pub instructions: String,
    #[serde(default)]
    pub main_mushroom: Option<Uuid>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub author_username: String,
    pub title: String,
    pub ingredients: String,
    pub instructions: String,
    pub main_mushroom: Option<Uuid>,
    pub source: Option<String>,
    /// Average of all ratings, one decimal place. 0.0 when unrated.
    pub rating: f64,
    pub num_ratings: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateRecipeRequest {
    pub value: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RatingResponse {
    pub recipe_id: Uuid,
    pub value: i64,
    pub rating: f64,
    pub num_ratings: i64,
}

// -- Tips --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTipRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tip {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub text: Option<String>,
}

// -- Findings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFindingRequest {
    pub mushroom: Uuid,
    #[serde(default)]
    pub description: Option<String>,
    pub date_found: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub user_id: Uuid,
    pub author_username: String,
    pub mushroom_id: Uuid,
    pub mushroom_name: String,
    pub description: Option<String>,
    pub date_found: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FindingDetail {
    #[serde(flatten)]
    pub finding: Finding,
    pub comments: Vec<Comment>,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub text: String,
}

/// A comment on a finding or a recipe. `target_id` is the id of whichever
/// one it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub target_id: Uuid,
    pub user_id: Uuid,
    pub author_username: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub new: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadComments {
    pub findings: i64,
    pub recipes: i64,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub receiver: Uuid,
    #[serde(default)]
    pub subject: Option<String>,
    pub content: String,
    #[serde(default)]
    pub replied_to: Option<Uuid>,
}

/// Reply to a message. The receiver defaults to the other party of the
/// original message and the subject to `RE: <original subject>`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyMessageRequest {
    #[serde(default)]
    pub receiver: Option<Uuid>,
    #[serde(default)]
    pub subject: Option<String>,
    pub content: String,
}

/// Forward a message. Subject defaults to `Fwd: <original subject>` and the
/// content to the original content.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardMessageRequest {
    pub receiver: Uuid,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub id: Uuid,
    pub file_name: String,
    pub size: i64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub receiver_id: Uuid,
    pub receiver_username: String,
    pub subject: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub replied_to: Option<Uuid>,
    pub is_read: bool,
    pub attachments: Vec<AttachmentInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkMessagesRequest {
    pub message_ids: Vec<Uuid>,
}

/// Result of a single mailbox transition.
#[derive(Debug, Serialize, Deserialize)]
pub struct MailboxUpdate {
    pub id: Uuid,
    pub party: Party,
    pub state: BoxState,
    /// Both parties deleted the message and it no longer exists.
    pub purged: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkMailboxUpdate {
    pub updated: usize,
    pub purged: usize,
    pub skipped: usize,
}
