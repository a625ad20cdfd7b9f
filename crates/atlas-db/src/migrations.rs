use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                TEXT PRIMARY KEY,
                username          TEXT NOT NULL UNIQUE,
                password          TEXT NOT NULL,
                first_name        TEXT NOT NULL DEFAULT '',
                last_name         TEXT NOT NULL DEFAULT '',
                email             TEXT NOT NULL DEFAULT '',
                can_add_mushroom  INTEGER NOT NULL DEFAULT 0,
                created_at        TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE profiles (
                user_id     TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                biography   TEXT
            );

            CREATE TABLE families (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                name_latin  TEXT NOT NULL,
                description TEXT
            );

            CREATE TABLE habitats (
                id      TEXT PRIMARY KEY,
                name    TEXT NOT NULL
            );

            CREATE TABLE mushrooms (
                id          TEXT PRIMARY KEY,
                name_cz     TEXT NOT NULL,
                name_latin  TEXT NOT NULL,
                description TEXT,
                edibility   TEXT NOT NULL DEFAULT 'inedible'
                            CHECK (edibility IN ('edible', 'inedible', 'poisonous')),
                family_id   TEXT REFERENCES families(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_mushrooms_family ON mushrooms(family_id);

            CREATE TABLE mushroom_habitats (
                mushroom_id TEXT NOT NULL REFERENCES mushrooms(id) ON DELETE CASCADE,
                habitat_id  TEXT NOT NULL REFERENCES habitats(id) ON DELETE CASCADE,
                PRIMARY KEY (mushroom_id, habitat_id)
            );

            CREATE TABLE recipes (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title           TEXT NOT NULL,
                ingredients     TEXT NOT NULL,
                instructions    TEXT NOT NULL,
                main_mushroom   TEXT REFERENCES mushrooms(id) ON DELETE CASCADE,
                source          TEXT,
                rating          REAL NOT NULL DEFAULT 0.0
            );

            CREATE TABLE ratings (
                id          TEXT PRIMARY KEY,
                recipe_id   TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                value       INTEGER NOT NULL CHECK (value BETWEEN 1 AND 5),
                UNIQUE(recipe_id, user_id)
            );

            CREATE TABLE tips (
                id          TEXT PRIMARY KEY,
                user_id     TEXT REFERENCES users(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                text        TEXT
            );

            CREATE TABLE findings (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                mushroom_id TEXT NOT NULL REFERENCES mushrooms(id) ON DELETE CASCADE,
                description TEXT,
                date_found  TEXT NOT NULL,
                latitude    REAL NOT NULL,
                longitude   REAL NOT NULL
            );

            CREATE TABLE finding_comments (
                id          TEXT PRIMARY KEY,
                target_id   TEXT NOT NULL REFERENCES findings(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text        TEXT NOT NULL,
                is_new      INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_finding_comments_target ON finding_comments(target_id, created_at);

            CREATE TABLE recipe_comments (
                id          TEXT PRIMARY KEY,
                target_id   TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text        TEXT NOT NULL,
                is_new      INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_recipe_comments_target ON recipe_comments(target_id, created_at);

            CREATE TABLE messages (
                id                      TEXT PRIMARY KEY,
                sender_id               TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                receiver_id             TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                subject                 TEXT NOT NULL DEFAULT 'No Subject',
                content                 TEXT NOT NULL,
                replied_to              TEXT REFERENCES messages(id) ON DELETE SET NULL,
                is_read                 INTEGER NOT NULL DEFAULT 0,
                is_trashed_by_sender    INTEGER NOT NULL DEFAULT 0,
                is_trashed_by_receiver  INTEGER NOT NULL DEFAULT 0,
                is_deleted_by_sender    INTEGER NOT NULL DEFAULT 0,
                is_deleted_by_receiver  INTEGER NOT NULL DEFAULT 0,
                created_at              TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_messages_receiver ON messages(receiver_id, created_at);
            CREATE INDEX idx_messages_sender ON messages(sender_id, created_at);

            CREATE TABLE attachments (
                id          TEXT PRIMARY KEY,
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                file_name   TEXT NOT NULL,
                size        INTEGER NOT NULL,
                sha256      TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_attachments_message ON attachments(message_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
