use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::{CountsRow, ProfileRow, UserRow};

const USER_COLUMNS: &str =
    "id, username, password, first_name, last_name, email, can_add_mushroom, created_at";

const PROFILE_SELECT: &str = "SELECT u.id, u.username, u.first_name, u.last_name, u.email,
                                     p.biography, u.can_add_mushroom, u.created_at
                              FROM users u
                              JOIN profiles p ON p.user_id = u.id";

impl Database {
    // -- Users --

    /// Creates the account and its profile in one transaction. Returns
    /// `false` when the username is already taken.
    #[allow(clippy::too_many_arguments)]
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
        biography: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO users (id, username, password, first_name, last_name, email)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (id, username, password_hash, first_name, last_name, email),
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            }
            tx.execute(
                "INSERT INTO profiles (user_id, biography) VALUES (?1, ?2)",
                (id, biography),
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn update_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET password = ?2 WHERE id = ?1",
                (id, password_hash),
            )?;
            Ok(n == 1)
        })
    }

    /// Grants or revokes the permission to add catalogue entries.
    pub fn set_can_add_mushroom(&self, username: &str, allowed: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET can_add_mushroom = ?2 WHERE username = ?1",
                (username, allowed),
            )?;
            Ok(n == 1)
        })
    }

    // -- Profiles --

    pub fn list_profiles(&self) -> Result<Vec<ProfileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{PROFILE_SELECT} ORDER BY u.username"))?;
            let rows = stmt
                .query_map([], profile_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("{PROFILE_SELECT} WHERE u.id = ?1"),
                [user_id],
                profile_from_row,
            )
            .optional()
        })
    }

    /// Updates account names/email and the profile biography together.
    /// `None` keeps the stored value.
    pub fn update_profile(
        &self,
        user_id: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
        email: Option<&str>,
        biography: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let n = tx.execute(
                "UPDATE users SET
                    first_name = COALESCE(?2, first_name),
                    last_name  = COALESCE(?3, last_name),
                    email      = COALESCE(?4, email)
                 WHERE id = ?1",
                (user_id, first_name, last_name, email),
            )?;
            if biography.is_some() {
                tx.execute(
                    "UPDATE profiles SET biography = ?2 WHERE user_id = ?1",
                    (user_id, biography),
                )?;
            }
            tx.commit()?;
            Ok(n == 1)
        })
    }

    pub fn counts(&self) -> Result<CountsRow> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<i64> {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
            };
            Ok(CountsRow {
                mushrooms: count("mushrooms")?,
                families: count("families")?,
                habitats: count("habitats")?,
                recipes: count("recipes")?,
                tips: count("tips")?,
                findings: count("findings")?,
            })
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                first_name: row.get(3)?,
                last_name: row.get(4)?,
                email: row.get(5)?,
                can_add_mushroom: row.get(6)?,
                created_at: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        user_id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        biography: row.get(5)?,
        can_add_mushroom: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::queries::fixtures;

    #[test]
    fn creating_a_user_creates_its_profile() {
        let db = fixtures::db();
        assert!(db.create_user("u1", "fungifreak", "hash", "Fungi", "Freak", "f@example.com", Some("hi"))
            .unwrap());

        let profile = db.get_profile("u1").unwrap().unwrap();
        assert_eq!(profile.username, "fungifreak");
        assert_eq!(profile.biography.as_deref(), Some("hi"));
        assert!(!profile.can_add_mushroom);
    }

    #[test]
    fn duplicate_username_is_rejected_and_leaves_no_profile() {
        let db = fixtures::db();
        fixtures::user(&db, "u1", "alice");
        assert!(!db.create_user("u2", "alice", "hash", "", "", "", None).unwrap());
        assert!(db.get_profile("u2").unwrap().is_none());
        assert_eq!(db.list_profiles().unwrap().len(), 1);
    }

    #[test]
    fn profile_update_keeps_omitted_fields() {
        let db = fixtures::db();
        db.create_user("u1", "alice", "hash", "Alice", "A", "a@example.com", None).unwrap();

        assert!(db.update_profile("u1", None, Some("Smith"), None, Some("bio")).unwrap());
        let profile = db.get_profile("u1").unwrap().unwrap();
        assert_eq!(profile.first_name, "Alice");
        assert_eq!(profile.last_name, "Smith");
        assert_eq!(profile.email, "a@example.com");
        assert_eq!(profile.biography.as_deref(), Some("bio"));
    }

    #[test]
    fn permission_flag_round_trips() {
        let db = fixtures::db();
        fixtures::user(&db, "u1", "alice");
        assert!(db.set_can_add_mushroom("alice", true).unwrap());
        assert!(db.get_user_by_username("alice").unwrap().unwrap().can_add_mushroom);
        assert!(!db.set_can_add_mushroom("nobody", true).unwrap());
    }
}
