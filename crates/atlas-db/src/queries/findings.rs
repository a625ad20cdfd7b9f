use anyhow::Result;

use atlas_types::api::CreateFindingRequest;

use super::OptionalExt;
use crate::Database;
use crate::models::FindingRow;

const FINDING_SELECT: &str = "SELECT f.id, f.user_id, u.username, f.mushroom_id, m.name_cz,
                                     f.description, f.date_found, f.latitude, f.longitude
                              FROM findings f
                              LEFT JOIN users u ON u.id = f.user_id
                              LEFT JOIN mushrooms m ON m.id = f.mushroom_id";

impl Database {
    // -- Findings --

    pub fn create_finding(&self, id: &str, user_id: &str, req: &CreateFindingRequest) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO findings (id, user_id, mushroom_id, description, date_found, latitude, longitude)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (
                    id,
                    user_id,
                    req.mushroom.to_string(),
                    &req.description,
                    req.date_found.format("%Y-%m-%d").to_string(),
                    req.latitude,
                    req.longitude,
                ),
            )?;
            Ok(())
        })
    }

    /// All findings, newest find first; this is what the map plots.
    pub fn list_findings(&self) -> Result<Vec<FindingRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{FINDING_SELECT} ORDER BY f.date_found DESC, f.rowid DESC"))?;
            let rows = stmt
                .query_map([], finding_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_finding(&self, id: &str) -> Result<Option<FindingRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{FINDING_SELECT} WHERE f.id = ?1"), [id], finding_from_row)
                .optional()
        })
    }
}

fn finding_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FindingRow> {
    Ok(FindingRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author_username: row.get::<_, Option<String>>(2)?.unwrap_or_else(|| "unknown".to_string()),
        mushroom_id: row.get(3)?,
        mushroom_name: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        description: row.get(5)?,
        date_found: row.get(6)?,
        latitude: row.get(7)?,
        longitude: row.get(8)?,
    })
}
