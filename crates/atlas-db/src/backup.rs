use anyhow::Result;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value};
use tracing::debug;

use crate::Database;

/// Tables included in a dump, in dependency order.
const TABLES: &[&str] = &[
    "users",
    "profiles",
    "families",
    "habitats",
    "mushrooms",
    "mushroom_habitats",
    "recipes",
    "ratings",
    "tips",
    "findings",
    "finding_comments",
    "recipe_comments",
    "messages",
    "attachments",
];

/// Columns never written to a dump.
const REDACTED: &[(&str, &str)] = &[("users", "password")];

impl Database {
    /// Every table as `{ table: [ { column: value } ] }`.
    pub fn dump_json(&self) -> Result<Value> {
        self.with_conn(|conn| {
            let mut dump = Map::new();

            for table in TABLES {
                let mut stmt = conn.prepare(&format!("SELECT * FROM {table} ORDER BY rowid"))?;
                let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

                let mut rows = stmt.query([])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut obj = Map::new();
                    for (i, column) in columns.iter().enumerate() {
                        if REDACTED.iter().any(|(t, c)| t == table && c == column) {
                            continue;
                        }
                        obj.insert(column.clone(), to_json(row.get_ref(i)?));
                    }
                    out.push(Value::Object(obj));
                }

                debug!("Dumped {} rows from {}", out.len(), table);
                dump.insert(table.to_string(), Value::Array(out));
            }

            Ok(Value::Object(dump))
        })
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::from(b.iter().map(|byte| format!("{byte:02x}")).collect::<String>()),
    }
}

#[cfg(test)]
mod tests {
    use crate::queries::fixtures;

    #[test]
    fn dump_lists_every_table_without_password_hashes() {
        let db = fixtures::db();
        fixtures::user(&db, "u1", "alice");
        db.create_habitat("h1", "forest").unwrap();

        let dump = db.dump_json().unwrap();
        let users = dump["users"].as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["username"], "alice");
        assert!(users[0].get("password").is_none());

        assert_eq!(dump["habitats"][0]["name"], "forest");
        assert_eq!(dump["messages"].as_array().unwrap().len(), 0);
        assert_eq!(dump.as_object().unwrap().len(), super::TABLES.len());
    }
}
