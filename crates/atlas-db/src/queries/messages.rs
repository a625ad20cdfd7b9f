use anyhow::Result;
use rusqlite::Connection;

use atlas_types::mailbox::{BoxState, MailboxAction, MailboxFlags, Transition, TransitionError};
use atlas_types::models::Party;

use super::{OptionalExt, placeholders};
use crate::Database;
use crate::models::{AttachmentRow, Folder, MessageRow, NewMessage};

const MESSAGE_SELECT: &str = "SELECT m.id, m.sender_id, s.username, m.receiver_id, r.username,
                                     m.subject, m.content, m.replied_to, m.is_read,
                                     m.is_trashed_by_sender, m.is_trashed_by_receiver,
                                     m.is_deleted_by_sender, m.is_deleted_by_receiver,
                                     m.created_at
                              FROM messages m
                              LEFT JOIN users s ON s.id = m.sender_id
                              LEFT JOIN users r ON r.id = m.receiver_id";

/// Result of applying a mailbox action to one message.
#[derive(Debug, PartialEq)]
pub enum MailboxOutcome {
    /// No such message, or the user is not a party to it.
    NotFound,
    Rejected(TransitionError),
    Updated {
        party: Party,
        state: BoxState,
        /// Both parties have deleted the message and the row is gone.
        purged: bool,
        /// Attachment ids whose files must be removed from storage.
        removed_attachments: Vec<String>,
    },
}

#[derive(Debug, Default, PartialEq)]
pub struct BulkOutcome {
    pub updated: usize,
    pub purged: usize,
    pub skipped: usize,
    pub removed_attachments: Vec<String>,
}

impl Database {
    // -- Messages --

    /// Inserts a message together with its attachment rows.
    pub fn insert_message(&self, msg: &NewMessage<'_>, attachments: &[AttachmentRow]) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, subject, content, replied_to)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (msg.id, msg.sender_id, msg.receiver_id, msg.subject, msg.content, msg.replied_to),
            )?;
            for attachment in attachments {
                insert_attachment_row(&tx, attachment)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Lists one mailbox folder of `user_id`, newest first. `counterpart`
    /// narrows the inbox to one sender and the outbox to one receiver; it is
    /// ignored for the trash.
    pub fn list_folder(
        &self,
        user_id: &str,
        folder: Folder,
        counterpart: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let (mut filter, counterpart_column) = match folder {
                Folder::Inbox => (
                    "m.receiver_id = ?1 AND m.is_trashed_by_receiver = 0 AND m.is_deleted_by_receiver = 0"
                        .to_string(),
                    Some("m.sender_id"),
                ),
                Folder::Outbox => (
                    "m.sender_id = ?1 AND m.is_trashed_by_sender = 0 AND m.is_deleted_by_sender = 0"
                        .to_string(),
                    Some("m.receiver_id"),
                ),
                Folder::Trash => (
                    "((m.receiver_id = ?1 AND m.is_trashed_by_receiver = 1 AND m.is_deleted_by_receiver = 0)
                      OR (m.sender_id = ?1 AND m.is_trashed_by_sender = 1 AND m.is_deleted_by_sender = 0))"
                        .to_string(),
                    None,
                ),
            };

            let mut params: Vec<&str> = vec![user_id];
            if let (Some(column), Some(other)) = (counterpart_column, counterpart) {
                filter.push_str(&format!(" AND {column} = ?2"));
                params.push(other);
            }

            let sql = format!("{MESSAGE_SELECT} WHERE {filter} ORDER BY m.created_at DESC, m.rowid DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Marks a message read. Only the receiver may do this, and only while
    /// they have not deleted it; returns `false` otherwise.
    pub fn mark_message_read(&self, id: &str, receiver_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE id = ?1 AND receiver_id = ?2 AND is_deleted_by_receiver = 0",
                [id, receiver_id],
            )?;
            Ok(n == 1)
        })
    }

    // -- Attachments --

    pub fn insert_attachment(&self, attachment: &AttachmentRow) -> Result<()> {
        self.with_conn(|conn| insert_attachment_row(conn, attachment))
    }

    /// Batch-fetch attachments for a set of message IDs.
    pub fn attachments_for(&self, message_ids: &[String]) -> Result<Vec<AttachmentRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, message_id, file_name, size, sha256, created_at
                 FROM attachments WHERE message_id IN ({}) ORDER BY created_at, rowid",
                placeholders(1, message_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(message_ids.iter()), attachment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Option<AttachmentRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, message_id, file_name, size, sha256, created_at
                 FROM attachments WHERE id = ?1 AND message_id = ?2",
                [attachment_id, message_id],
                attachment_from_row,
            )
            .optional()
        })
    }

    // -- Mailbox --

    /// Trash, restore or delete one message on behalf of `user_id`.
    pub fn apply_mailbox_action(
        &self,
        id: &str,
        user_id: &str,
        action: MailboxAction,
    ) -> Result<MailboxOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let outcome = step(&tx, id, user_id, action, false)?;
            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Applies `action` to every message in `ids` the user is a party to.
    /// With `trash_only`, messages outside the user's trash are skipped too.
    pub fn apply_mailbox_bulk(
        &self,
        ids: &[String],
        user_id: &str,
        action: MailboxAction,
        trash_only: bool,
    ) -> Result<BulkOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut bulk = BulkOutcome::default();

            for id in ids {
                match step(&tx, id, user_id, action, trash_only)? {
                    MailboxOutcome::Updated { purged, removed_attachments, .. } => {
                        bulk.updated += 1;
                        if purged {
                            bulk.purged += 1;
                        }
                        bulk.removed_attachments.extend(removed_attachments);
                    }
                    MailboxOutcome::NotFound | MailboxOutcome::Rejected(_) => bulk.skipped += 1,
                }
            }

            tx.commit()?;
            Ok(bulk)
        })
    }
}

/// One mailbox transition inside an open transaction.
fn step(
    conn: &Connection,
    id: &str,
    user_id: &str,
    action: MailboxAction,
    trash_only: bool,
) -> Result<MailboxOutcome> {
    let Some(row) = query_message(conn, id)? else {
        return Ok(MailboxOutcome::NotFound);
    };
    let Some(party) = party_of(&row, user_id) else {
        return Ok(MailboxOutcome::NotFound);
    };

    let mut flags = row.flags;
    if trash_only && flags.state(party) != BoxState::Trashed {
        return Ok(MailboxOutcome::NotFound);
    }

    let transition = match flags.apply(party, action) {
        Ok(t) => t,
        Err(e) => return Ok(MailboxOutcome::Rejected(e)),
    };

    if flags.is_purgeable() {
        let removed_attachments = {
            let mut stmt = conn.prepare("SELECT id FROM attachments WHERE message_id = ?1")?;
            let ids = stmt
                .query_map([id], |r| r.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids
        };
        // Attachments cascade with the message.
        conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;

        return Ok(MailboxOutcome::Updated {
            party,
            state: BoxState::Deleted,
            purged: true,
            removed_attachments,
        });
    }

    if transition == Transition::Applied {
        conn.execute(
            "UPDATE messages SET
                is_trashed_by_sender = ?2,
                is_trashed_by_receiver = ?3,
                is_deleted_by_sender = ?4,
                is_deleted_by_receiver = ?5
             WHERE id = ?1",
            (
                id,
                flags.trashed_by_sender,
                flags.trashed_by_receiver,
                flags.deleted_by_sender,
                flags.deleted_by_receiver,
            ),
        )?;
    }

    Ok(MailboxOutcome::Updated {
        party,
        state: flags.state(party),
        purged: false,
        removed_attachments: vec![],
    })
}

/// Which side of `row` the user is on, if any.
pub fn party_of(row: &MessageRow, user_id: &str) -> Option<Party> {
    if row.sender_id == user_id {
        Some(Party::Sender)
    } else if row.receiver_id == user_id {
        Some(Party::Receiver)
    } else {
        None
    }
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    conn.query_row(&format!("{MESSAGE_SELECT} WHERE m.id = ?1"), [id], message_from_row)
        .optional()
}

fn insert_attachment_row(conn: &Connection, attachment: &AttachmentRow) -> Result<()> {
    conn.execute(
        "INSERT INTO attachments (id, message_id, file_name, size, sha256) VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            &attachment.id,
            &attachment.message_id,
            &attachment.file_name,
            attachment.size,
            &attachment.sha256,
        ),
    )?;
    Ok(())
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_username: row.get::<_, Option<String>>(2)?.unwrap_or_else(|| "unknown".to_string()),
        receiver_id: row.get(3)?,
        receiver_username: row.get::<_, Option<String>>(4)?.unwrap_or_else(|| "unknown".to_string()),
        subject: row.get(5)?,
        content: row.get(6)?,
        replied_to: row.get(7)?,
        is_read: row.get(8)?,
        flags: MailboxFlags {
            trashed_by_sender: row.get(9)?,
            trashed_by_receiver: row.get(10)?,
            deleted_by_sender: row.get(11)?,
            deleted_by_receiver: row.get(12)?,
        },
        created_at: row.get(13)?,
    })
}

fn attachment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttachmentRow> {
    Ok(AttachmentRow {
        id: row.get(0)?,
        message_id: row.get(1)?,
        file_name: row.get(2)?,
        size: row.get(3)?,
        sha256: row.get(4)?,
        created_at: row.get(5)?,
    })
}
