//! Database row types. These map directly to SQLite rows and stay separate
//! from the atlas-types API models so the DB layer has no wire concerns.

use atlas_types::mailbox::MailboxFlags;
use atlas_types::models::Edibility;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub can_add_mushroom: bool,
    pub created_at: String,
}

pub struct ProfileRow {
    pub user_id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub biography: Option<String>,
    pub can_add_mushroom: bool,
    pub created_at: String,
}

pub struct CountsRow {
    pub mushrooms: i64,
    pub families: i64,
    pub habitats: i64,
    pub recipes: i64,
    pub tips: i64,
    pub findings: i64,
}

pub struct FamilyRow {
    pub id: String,
    pub name: String,
    pub name_latin: String,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct HabitatRow {
    pub id: String,
    pub name: String,
}

pub struct MushroomRow {
    pub id: String,
    pub name_cz: String,
    pub name_latin: String,
    pub description: Option<String>,
    pub edibility: String,
    pub family_id: Option<String>,
    pub habitats: Vec<HabitatRow>,
}

/// Equality filters for the mushroom list. `None` means "any".
#[derive(Debug, Default)]
pub struct MushroomFilter {
    pub edibility: Option<Edibility>,
    pub habitat_id: Option<String>,
    pub family_id: Option<String>,
}

pub struct RecipeRow {
    pub id: String,
    pub user_id: String,
    pub author_username: String,
    pub title: String,
    pub ingredients: String,
    pub instructions: String,
    pub main_mushroom: Option<String>,
    pub source: Option<String>,
    pub rating: f64,
    pub num_ratings: i64,
}

#[derive(Debug, Default)]
pub struct RecipeFilter {
    pub main_mushroom: Option<String>,
    pub min_rating: Option<f64>,
    pub user_id: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum RateOutcome {
    Rated { rating: f64, num_ratings: i64 },
    AlreadyRated,
    RecipeNotFound,
}

pub struct TipRow {
    pub id: String,
    pub user_id: Option<String>,
    pub title: String,
    pub content: String,
    pub text: Option<String>,
}

pub struct FindingRow {
    pub id: String,
    pub user_id: String,
    pub author_username: String,
    pub mushroom_id: String,
    pub mushroom_name: String,
    pub description: Option<String>,
    pub date_found: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// What a comment is attached to. Each target has its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentTarget {
    Finding,
    Recipe,
}

impl CommentTarget {
    pub(crate) fn table(self) -> &'static str {
        match self {
            Self::Finding => "finding_comments",
            Self::Recipe => "recipe_comments",
        }
    }

    pub(crate) fn owner_table(self) -> &'static str {
        match self {
            Self::Finding => "findings",
            Self::Recipe => "recipes",
        }
    }
}

pub struct CommentRow {
    pub id: String,
    pub target_id: String,
    pub user_id: String,
    pub author_username: String,
    pub text: String,
    pub is_new: bool,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub receiver_id: String,
    pub receiver_username: String,
    pub subject: String,
    pub content: String,
    pub replied_to: Option<String>,
    pub is_read: bool,
    pub flags: MailboxFlags,
    pub created_at: String,
}

pub struct NewMessage<'a> {
    pub id: &'a str,
    pub sender_id: &'a str,
    pub receiver_id: &'a str,
    pub subject: &'a str,
    pub content: &'a str,
    pub replied_to: Option<&'a str>,
}

#[derive(Clone)]
pub struct AttachmentRow {
    pub id: String,
    pub message_id: String,
    pub file_name: String,
    pub size: i64,
    pub sha256: String,
    pub created_at: String,
}

/// Which messages of a user a mailbox listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Inbox,
    Outbox,
    Trash,
}
