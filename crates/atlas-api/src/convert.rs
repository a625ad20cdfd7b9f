//! Row → API model conversions.
//!
//! The DB layer stores ids and timestamps as text. Corrupt values are logged
//! and replaced by defaults rather than failing the whole listing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use atlas_db::models::{
    AttachmentRow, CommentRow, FamilyRow, FindingRow, HabitatRow, MessageRow, MushroomRow,
    ProfileRow, RecipeRow, TipRow,
};
use atlas_types::api::{
    AttachmentInfo, Comment, Family, Finding, Habitat, MessageResponse, Mushroom, Profile, Recipe,
    Tip,
};
use atlas_types::models::Edibility;

pub fn uuid(value: &str, what: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, value, e);
        Uuid::default()
    })
}

fn opt_uuid(value: Option<&str>, what: &str) -> Option<Uuid> {
    value.map(|v| uuid(v, what))
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
pub fn timestamp(value: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", value, e);
            DateTime::default()
        })
}

fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap_or_else(|e| {
        warn!("Corrupt date '{}': {}", value, e);
        NaiveDate::default()
    })
}

pub fn profile(row: ProfileRow) -> Profile {
    Profile {
        user_id: uuid(&row.user_id, "user id"),
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        email: row.email,
        biography: row.biography,
        can_add_mushroom: row.can_add_mushroom,
        created_at: timestamp(&row.created_at),
    }
}

pub fn family(row: FamilyRow) -> Family {
    Family {
        id: uuid(&row.id, "family id"),
        name: row.name,
        name_latin: row.name_latin,
        description: row.description,
    }
}

pub fn habitat(row: HabitatRow) -> Habitat {
    Habitat {
        id: uuid(&row.id, "habitat id"),
        name: row.name,
    }
}

pub fn mushroom(row: MushroomRow) -> Mushroom {
    let edibility = row.edibility.parse::<Edibility>().unwrap_or_else(|e| {
        warn!("Mushroom {}: {}", row.id, e);
        Edibility::default()
    });
    Mushroom {
        id: uuid(&row.id, "mushroom id"),
        name_cz: row.name_cz,
        name_latin: row.name_latin,
        description: row.description,
        edibility,
        family: opt_uuid(row.family_id.as_deref(), "family id"),
        habitats: row.habitats.into_iter().map(habitat).collect(),
    }
}

pub fn recipe(row: RecipeRow) -> Recipe {
    Recipe {
        id: uuid(&row.id, "recipe id"),
        user_id: uuid(&row.user_id, "user id"),
        author_username: row.author_username,
        title: row.title,
        ingredients: row.ingredients,
        instructions: row.instructions,
        main_mushroom: opt_uuid(row.main_mushroom.as_deref(), "mushroom id"),
        source: row.source,
        rating: row.rating,
        num_ratings: row.num_ratings,
    }
}

pub fn tip(row: TipRow) -> Tip {
    Tip {
        id: uuid(&row.id, "tip id"),
        user_id: opt_uuid(row.user_id.as_deref(), "user id"),
        title: row.title,
        content: row.content,
        text: row.text,
    }
}

pub fn finding(row: FindingRow) -> Finding {
    Finding {
        id: uuid(&row.id, "finding id"),
        user_id: uuid(&row.user_id, "user id"),
        author_username: row.author_username,
        mushroom_id: uuid(&row.mushroom_id, "mushroom id"),
        mushroom_name: row.mushroom_name,
        description: row.description,
        date_found: date(&row.date_found),
        latitude: row.latitude,
        longitude: row.longitude,
    }
}

pub fn comment(row: CommentRow) -> Comment {
    Comment {
        id: uuid(&row.id, "comment id"),
        target_id: uuid(&row.target_id, "comment target id"),
        user_id: uuid(&row.user_id, "user id"),
        author_username: row.author_username,
        text: row.text,
        created_at: timestamp(&row.created_at),
        new: row.is_new,
    }
}

pub fn attachment(row: AttachmentRow) -> AttachmentInfo {
    AttachmentInfo {
        id: uuid(&row.id, "attachment id"),
        file_name: row.file_name,
        size: row.size,
        sha256: row.sha256,
    }
}

/// `attachments` may contain rows of other messages; only this message's
/// rows are kept.
pub fn message(row: MessageRow, attachments: &[AttachmentRow]) -> MessageResponse {
    let own = attachments
        .iter()
        .filter(|a| a.message_id == row.id)
        .cloned()
        .map(attachment)
        .collect();

    MessageResponse {
        id: uuid(&row.id, "message id"),
        sender_id: uuid(&row.sender_id, "sender id"),
        sender_username: row.sender_username,
        receiver_id: uuid(&row.receiver_id, "receiver id"),
        receiver_username: row.receiver_username,
        subject: row.subject,
        content: row.content,
        timestamp: timestamp(&row.created_at),
        replied_to: opt_uuid(row.replied_to.as_deref(), "replied_to id"),
        is_read: row.is_read,
        attachments: own,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_and_rfc3339_timestamps() {
        let sqlite = timestamp("2024-09-01 12:30:00");
        assert_eq!(sqlite.to_rfc3339(), "2024-09-01T12:30:00+00:00");
        let rfc = timestamp("2024-09-01T12:30:00Z");
        assert_eq!(rfc, sqlite);
        assert_eq!(timestamp("garbage"), DateTime::<Utc>::default());
    }

    #[test]
    fn corrupt_ids_fall_back_to_nil() {
        assert_eq!(uuid("not-a-uuid", "test id"), Uuid::nil());
    }
}
