//! Private messaging: folders, send/reply/forward, the per-party
//! trash/restore/delete flags, and attachments.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State, rejection::BytesRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use atlas_db::models::{AttachmentRow, Folder, MessageRow, NewMessage};
use atlas_db::queries::{MailboxOutcome, party_of};
use atlas_types::api::{
    BulkMailboxUpdate, BulkMessagesRequest, ForwardMessageRequest, MailboxUpdate, MessageResponse,
    ReplyMessageRequest, SendMessageRequest,
};
use atlas_types::mailbox::{BoxState, MailboxAction};
use atlas_types::models::Party;

use crate::convert;
use crate::error::{ApiError, FieldErrors};
use crate::middleware::Claims;
use crate::state::{AppState, run_db};
use crate::validation::Validate;

/// 20 MB upload limit for attachments
pub const MAX_ATTACHMENT_SIZE: usize = 20 * 1024 * 1024;

const DEFAULT_SUBJECT: &str = "No Subject";

#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    pub sender: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutboxQuery {
    pub receiver: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

/// A message about to be stored, with owned fields so it can move into
/// `spawn_blocking`.
struct Outgoing {
    id: String,
    sender_id: String,
    receiver_id: String,
    subject: String,
    content: String,
    replied_to: Option<String>,
}

impl Outgoing {
    fn as_new(&self) -> NewMessage<'_> {
        NewMessage {
            id: &self.id,
            sender_id: &self.sender_id,
            receiver_id: &self.receiver_id,
            subject: &self.subject,
            content: &self.content,
            replied_to: self.replied_to.as_deref(),
        }
    }
}

fn subject_or(subject: Option<String>, fallback: impl FnOnce() -> String) -> String {
    match subject {
        Some(s) if !s.trim().is_empty() => s,
        _ => fallback(),
    }
}

/// Prefixes stay within the 255 character subject limit.
fn prefixed(prefix: &str, subject: &str) -> String {
    format!("{prefix}{subject}").chars().take(255).collect()
}

/// Records a field error unless `receiver` is an existing user other than
/// the sender.
async fn check_receiver(
    state: &AppState,
    errors: &mut FieldErrors,
    sender: Uuid,
    receiver: Uuid,
) -> Result<(), ApiError> {
    if sender == receiver {
        errors.add("receiver", "You cannot send a message to yourself.");
        return Ok(());
    }
    let rid = receiver.to_string();
    if run_db(state, move |db| db.get_user_by_id(&rid)).await?.is_none() {
        errors.add("receiver", "Select a valid choice. That choice is not one of the available choices.");
    }
    Ok(())
}

/// Loads a message the caller is a party to and has not deleted.
async fn visible_message(state: &AppState, id: Uuid, user_id: Uuid) -> Result<(MessageRow, Party), ApiError> {
    let row = run_db(state, move |db| db.get_message(&id.to_string()))
        .await?
        .ok_or(ApiError::NotFound)?;
    let party = party_of(&row, &user_id.to_string()).ok_or(ApiError::NotFound)?;
    if row.flags.state(party) == BoxState::Deleted {
        return Err(ApiError::NotFound);
    }
    Ok((row, party))
}

/// Stores the message with its attachment rows and reads it back.
async fn store(state: &AppState, msg: Outgoing, attachments: Vec<AttachmentRow>) -> Result<MessageResponse, ApiError> {
    let (row, attachments) = run_db(state, move |db| {
        db.insert_message(&msg.as_new(), &attachments)?;
        let row = db.get_message(&msg.id)?;
        Ok((row, attachments))
    })
    .await?;
    let row = row.ok_or(ApiError::NotFound)?;
    Ok(convert::message(row, &attachments))
}

async fn folder(
    state: &AppState,
    claims: &Claims,
    folder: Folder,
    counterpart: Option<Uuid>,
) -> Result<Vec<MessageResponse>, ApiError> {
    let uid = claims.sub.to_string();
    let (rows, attachments) = run_db(state, move |db| {
        let counterpart = counterpart.map(|c| c.to_string());
        let rows = db.list_folder(&uid, folder, counterpart.as_deref())?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let attachments = db.attachments_for(&ids)?;
        Ok((rows, attachments))
    })
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| convert::message(row, &attachments))
        .collect())
}

// -- Folders --

pub async fn inbox(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<InboxQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(folder(&state, &claims, Folder::Inbox, query.sender).await?))
}

pub async fn outbox(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<OutboxQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(folder(&state, &claims, Folder::Outbox, query.receiver).await?))
}

pub async fn trash(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(folder(&state, &claims, Folder::Trash, None).await?))
}

// -- Sending --

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = FieldErrors::new();
    req.check(&mut errors);
    check_receiver(&state, &mut errors, claims.sub, req.receiver).await?;
    if let Some(replied_to) = req.replied_to {
        let exists = run_db(&state, move |db| db.get_message(&replied_to.to_string()))
            .await?
            .is_some();
        if !exists {
            errors.add("replied_to", "Select a valid choice. That choice is not one of the available choices.");
        }
    }
    errors.into_result()?;

    let msg = Outgoing {
        id: Uuid::new_v4().to_string(),
        sender_id: claims.sub.to_string(),
        receiver_id: req.receiver.to_string(),
        subject: subject_or(req.subject, || DEFAULT_SUBJECT.to_string()),
        content: req.content,
        replied_to: req.replied_to.map(|r| r.to_string()),
    };
    let response = store(&state, msg, vec![]).await?;

    info!("{} sent message {} to {}", claims.username, response.id, response.receiver_username);
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn reply_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReplyMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (original, party) = visible_message(&state, id, claims.sub).await?;

    let default_receiver = match party {
        Party::Sender => &original.receiver_id,
        Party::Receiver => &original.sender_id,
    };
    let receiver = match req.receiver {
        Some(r) => r,
        None => convert::uuid(default_receiver, "receiver id"),
    };

    let mut errors = FieldErrors::new();
    req.check(&mut errors);
    check_receiver(&state, &mut errors, claims.sub, receiver).await?;
    errors.into_result()?;

    let msg = Outgoing {
        id: Uuid::new_v4().to_string(),
        sender_id: claims.sub.to_string(),
        receiver_id: receiver.to_string(),
        subject: subject_or(req.subject, || prefixed("RE: ", &original.subject)),
        content: req.content,
        replied_to: Some(original.id.clone()),
    };
    let response = store(&state, msg, vec![]).await?;

    info!("{} replied to message {}", claims.username, original.id);
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /messages/{id}/forward: the original's attachments are copied to
/// new files so each message owns its own.
pub async fn forward_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ForwardMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (original, _) = visible_message(&state, id, claims.sub).await?;

    let mut errors = FieldErrors::new();
    req.check(&mut errors);
    check_receiver(&state, &mut errors, claims.sub, req.receiver).await?;
    errors.into_result()?;

    let message_id = Uuid::new_v4().to_string();
    let original_ids = vec![original.id.clone()];
    let originals = run_db(&state, move |db| db.attachments_for(&original_ids)).await?;

    let mut copies = Vec::with_capacity(originals.len());
    for attachment in originals {
        let copy_id = Uuid::new_v4().to_string();
        if let Err(e) = state.storage.copy(&attachment.id, &copy_id).await {
            let copied: Vec<String> = copies.iter().map(|c: &AttachmentRow| c.id.clone()).collect();
            state.storage.delete_all(&copied).await;
            return Err(ApiError::Internal(e));
        }
        copies.push(AttachmentRow {
            id: copy_id,
            message_id: message_id.clone(),
            ..attachment
        });
    }
    let copied: Vec<String> = copies.iter().map(|c| c.id.clone()).collect();

    let msg = Outgoing {
        id: message_id,
        sender_id: claims.sub.to_string(),
        receiver_id: req.receiver.to_string(),
        subject: subject_or(req.subject, || prefixed("Fwd: ", &original.subject)),
        content: req.content.unwrap_or(original.content),
        replied_to: None,
    };
    let response = match store(&state, msg, copies).await {
        Ok(response) => response,
        Err(e) => {
            state.storage.delete_all(&copied).await;
            return Err(e);
        }
    };

    info!(
        "{} forwarded message {} with {} attachment(s)",
        claims.username,
        original.id,
        copied.len()
    );
    Ok((StatusCode::CREATED, Json(response)))
}

// -- Reading --

/// GET /messages/{id}: opening a message as its receiver marks it read.
pub async fn message_detail(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (mut row, party) = visible_message(&state, id, claims.sub).await?;

    let mark = party == Party::Receiver && !row.is_read;
    let uid = claims.sub.to_string();
    let message_ids = vec![row.id.clone()];
    let attachments = run_db(&state, move |db| {
        if mark {
            db.mark_message_read(&message_ids[0], &uid)?;
        }
        db.attachments_for(&message_ids)
    })
    .await?;
    if mark {
        row.is_read = true;
    }

    Ok(Json(convert::message(row, &attachments)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let marked = run_db(&state, move |db| db.mark_message_read(&id.to_string(), &uid)).await?;
    if !marked {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

// -- Mailbox flags --

async fn transition(
    state: &AppState,
    claims: &Claims,
    id: Uuid,
    action: MailboxAction,
) -> Result<MailboxUpdate, ApiError> {
    let uid = claims.sub.to_string();
    let outcome = run_db(state, move |db| db.apply_mailbox_action(&id.to_string(), &uid, action)).await?;

    match outcome {
        MailboxOutcome::Updated {
            party,
            state: box_state,
            purged,
            removed_attachments,
        } => {
            if purged {
                state.storage.delete_all(&removed_attachments).await;
                info!("Message {} deleted by both parties and purged", id);
            }
            Ok(MailboxUpdate {
                id,
                party,
                state: box_state,
                purged,
            })
        }
        // A message the caller already deleted is gone from their point of view.
        MailboxOutcome::Rejected(e) => {
            warn!("{} on message {} by {} rejected: {}", action_name(action), id, claims.username, e);
            Err(ApiError::NotFound)
        }
        MailboxOutcome::NotFound => Err(ApiError::NotFound),
    }
}

fn action_name(action: MailboxAction) -> &'static str {
    match action {
        MailboxAction::Trash => "Trash",
        MailboxAction::Restore => "Restore",
        MailboxAction::Delete => "Delete",
    }
}

pub async fn trash_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(transition(&state, &claims, id, MailboxAction::Trash).await?))
}

pub async fn restore_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(transition(&state, &claims, id, MailboxAction::Restore).await?))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(transition(&state, &claims, id, MailboxAction::Delete).await?))
}

async fn bulk(
    state: &AppState,
    claims: &Claims,
    req: BulkMessagesRequest,
    action: MailboxAction,
    trash_only: bool,
) -> Result<BulkMailboxUpdate, ApiError> {
    if req.message_ids.is_empty() {
        return Err(FieldErrors::single("message_ids", "Select at least one message."));
    }

    let uid = claims.sub.to_string();
    let ids: Vec<String> = req.message_ids.iter().map(|id| id.to_string()).collect();
    let outcome = run_db(state, move |db| db.apply_mailbox_bulk(&ids, &uid, action, trash_only)).await?;

    state.storage.delete_all(&outcome.removed_attachments).await;
    info!(
        "{} by {}: {} updated, {} purged, {} skipped",
        action_name(action),
        claims.username,
        outcome.updated,
        outcome.purged,
        outcome.skipped
    );

    Ok(BulkMailboxUpdate {
        updated: outcome.updated,
        purged: outcome.purged,
        skipped: outcome.skipped,
    })
}

pub async fn bulk_trash(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BulkMessagesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(bulk(&state, &claims, req, MailboxAction::Trash, false).await?))
}

pub async fn bulk_delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BulkMessagesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(bulk(&state, &claims, req, MailboxAction::Delete, false).await?))
}

pub async fn bulk_restore_trash(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BulkMessagesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(bulk(&state, &claims, req, MailboxAction::Restore, true).await?))
}

pub async fn bulk_delete_trash(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BulkMessagesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(bulk(&state, &claims, req, MailboxAction::Delete, true).await?))
}

// -- Attachments --

/// Keeps only the last path component of a client-supplied file name.
fn clean_file_name(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or_default().trim().to_string()
}

/// POST /messages/{id}/attachments?filename=...: raw bytes body. Only the
/// sender may attach files.
pub async fn upload_attachment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Query(query): Query<UploadQuery>,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // The route's body limit is MAX_ATTACHMENT_SIZE; hitting it surfaces here.
    let bytes = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            FieldErrors::single("file", rejection.body_text())
        }
    })?;

    let (message, party) = visible_message(&state, id, claims.sub).await?;
    if party != Party::Sender {
        return Err(ApiError::Forbidden);
    }

    let file_name = clean_file_name(&query.filename);
    let mut errors = FieldErrors::new();
    if file_name.is_empty() {
        errors.add("filename", "This field is required.");
    } else if file_name.chars().count() > 255 {
        errors.add("filename", "Ensure this value has at most 255 characters.");
    }
    if bytes.is_empty() {
        errors.add("file", "The submitted file is empty.");
    }
    errors.into_result()?;

    let attachment_id = Uuid::new_v4();
    let stored = state.storage.write(&attachment_id.to_string(), &bytes).await?;

    let row = AttachmentRow {
        id: attachment_id.to_string(),
        message_id: message.id.clone(),
        file_name,
        size: stored.size,
        sha256: stored.sha256,
        created_at: String::new(),
    };
    let inserted = {
        let row = row.clone();
        run_db(&state, move |db| db.insert_attachment(&row)).await
    };
    if let Err(e) = inserted {
        state.storage.delete_all(&[row.id.clone()]).await;
        return Err(e);
    }

    info!(
        "{} attached {} ({} bytes) to message {}",
        claims.username, row.file_name, row.size, message.id
    );
    Ok((StatusCode::CREATED, Json(convert::attachment(row))))
}

/// GET /messages/{id}/attachments/{attachment_id}: either party may download.
pub async fn download_attachment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, attachment_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    visible_message(&state, id, claims.sub).await?;

    let attachment = run_db(&state, move |db| {
        db.get_attachment(&id.to_string(), &attachment_id.to_string())
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    let bytes = state.storage.read(&attachment.id).await.map_err(|e| {
        warn!("Attachment {} missing on disk: {}", attachment.id, e);
        ApiError::NotFound
    })?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        attachment.file_name.replace(['"', '\r', '\n'], "_")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_lose_their_directories() {
        assert_eq!(clean_file_name("../../etc/passwd"), "passwd");
        assert_eq!(clean_file_name("C:\\Users\\me\\hub.jpg"), "hub.jpg");
        assert_eq!(clean_file_name("map.gpx"), "map.gpx");
        assert_eq!(clean_file_name("dir/"), "");
    }

    #[test]
    fn default_subjects() {
        assert_eq!(subject_or(None, || DEFAULT_SUBJECT.into()), "No Subject");
        assert_eq!(subject_or(Some("  ".into()), || DEFAULT_SUBJECT.into()), "No Subject");
        assert_eq!(subject_or(Some("Hřiby".into()), || DEFAULT_SUBJECT.into()), "Hřiby");
        assert_eq!(prefixed("RE: ", "Hřiby"), "RE: Hřiby");
        assert_eq!(prefixed("Fwd: ", &"x".repeat(255)).chars().count(), 255);
    }
}
