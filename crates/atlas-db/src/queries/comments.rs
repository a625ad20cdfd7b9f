use anyhow::Result;

use super::OptionalExt;
use crate::Database;
use crate::models::{CommentRow, CommentTarget};

impl Database {
    // -- Comments --

    /// Adds a comment flagged as new. Returns `false` when the target does
    /// not exist.
    pub fn create_comment(
        &self,
        target: CommentTarget,
        id: &str,
        target_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: Option<i64> = conn
                .query_row(
                    &format!("SELECT 1 FROM {} WHERE id = ?1", target.owner_table()),
                    [target_id],
                    |r| r.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Ok(false);
            }

            conn.execute(
                &format!(
                    "INSERT INTO {} (id, target_id, user_id, text, is_new) VALUES (?1, ?2, ?3, ?4, 1)",
                    target.table()
                ),
                (id, target_id, user_id, text),
            )?;
            Ok(true)
        })
    }

    pub fn get_comment(&self, target: CommentTarget, id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT c.id, c.target_id, c.user_id, u.username, c.text, c.is_new, c.created_at
                 FROM {} c
                 LEFT JOIN users u ON u.id = c.user_id
                 WHERE c.id = ?1",
                target.table()
            );
            Ok(conn.query_row(&sql, [id], comment_from_row).optional()?)
        })
    }

    pub fn comments_for(&self, target: CommentTarget, target_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT c.id, c.target_id, c.user_id, u.username, c.text, c.is_new, c.created_at
                 FROM {} c
                 LEFT JOIN users u ON u.id = c.user_id
                 WHERE c.target_id = ?1
                 ORDER BY c.created_at DESC, c.rowid DESC",
                target.table()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([target_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Comments left on findings or recipes owned by `owner_id`.
    pub fn comments_on_owned(&self, target: CommentTarget, owner_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT c.id, c.target_id, c.user_id, u.username, c.text, c.is_new, c.created_at
                 FROM {} c
                 JOIN {} t ON t.id = c.target_id
                 LEFT JOIN users u ON u.id = c.user_id
                 WHERE t.user_id = ?1
                 ORDER BY c.created_at DESC, c.rowid DESC",
                target.table(),
                target.owner_table()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_new_comments(&self, target: CommentTarget, owner_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT COUNT(*) FROM {} c
                 JOIN {} t ON t.id = c.target_id
                 WHERE t.user_id = ?1 AND c.is_new = 1",
                target.table(),
                target.owner_table()
            );
            Ok(conn.query_row(&sql, [owner_id], |r| r.get(0))?)
        })
    }

    /// Clears the new flag. Only the owner of the commented finding/recipe
    /// may do so; returns the target id, or `None` if the comment is not
    /// visible to `owner_id`.
    pub fn mark_comment_read(
        &self,
        target: CommentTarget,
        comment_id: &str,
        owner_id: &str,
    ) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let target_id: Option<String> = conn
                .query_row(
                    &format!(
                        "SELECT c.target_id FROM {} c
                         JOIN {} t ON t.id = c.target_id
                         WHERE c.id = ?1 AND t.user_id = ?2",
                        target.table(),
                        target.owner_table()
                    ),
                    [comment_id, owner_id],
                    |r| r.get(0),
                )
                .optional()?;

            if target_id.is_some() {
                conn.execute(
                    &format!("UPDATE {} SET is_new = 0 WHERE id = ?1", target.table()),
                    [comment_id],
                )?;
            }
            Ok(target_id)
        })
    }
}

fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        target_id: row.get(1)?,
        user_id: row.get(2)?,
        author_username: row.get::<_, Option<String>>(3)?.unwrap_or_else(|| "unknown".to_string()),
        text: row.get(4)?,
        is_new: row.get(5)?,
        created_at: row.get(6)?,
    })
}
