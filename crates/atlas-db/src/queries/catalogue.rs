use std::collections::HashMap;

use anyhow::Result;
use rusqlite::Connection;
use rusqlite::types::ToSql;

use atlas_types::api::{CreateFamilyRequest, CreateMushroomRequest, CreateTipRequest};

use super::{OptionalExt, placeholders};
use crate::Database;
use crate::models::{FamilyRow, HabitatRow, MushroomFilter, MushroomRow, TipRow};

impl Database {
    // -- Families --

    pub fn create_family(&self, id: &str, req: &CreateFamilyRequest) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO families (id, name, name_latin, description) VALUES (?1, ?2, ?3, ?4)",
                (id, &req.name, &req.name_latin, &req.description),
            )?;
            Ok(())
        })
    }

    pub fn list_families(&self) -> Result<Vec<FamilyRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, name_latin, description FROM families ORDER BY name",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(FamilyRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        name_latin: row.get(2)?,
                        description: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_family(&self, id: &str) -> Result<Option<FamilyRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, name_latin, description FROM families WHERE id = ?1",
                [id],
                |row| {
                    Ok(FamilyRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        name_latin: row.get(2)?,
                        description: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Habitats --

    pub fn create_habitat(&self, id: &str, name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO habitats (id, name) VALUES (?1, ?2)", (id, name))?;
            Ok(())
        })
    }

    pub fn list_habitats(&self) -> Result<Vec<HabitatRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM habitats ORDER BY name")?;
            let rows = stmt
                .query_map([], |row| Ok(HabitatRow { id: row.get(0)?, name: row.get(1)? }))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns the ids from `ids` that do not exist in `table`.
    pub fn missing_ids(&self, table: &str, ids: &[String]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id FROM {table} WHERE id IN ({})",
                placeholders(1, ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let found = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids.iter().filter(|id| !found.contains(id)).cloned().collect())
        })
    }

    // -- Mushrooms --

    /// Inserts the mushroom and its habitat links in one transaction.
    pub fn create_mushroom(&self, id: &str, req: &CreateMushroomRequest) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let family = req.family.map(|f| f.to_string());
            tx.execute(
                "INSERT INTO mushrooms (id, name_cz, name_latin, description, edibility, family_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    id,
                    &req.name_cz,
                    &req.name_latin,
                    &req.description,
                    req.edibility.as_str(),
                    family,
                ),
            )?;
            for habitat in &req.habitats {
                tx.execute(
                    "INSERT OR IGNORE INTO mushroom_habitats (mushroom_id, habitat_id) VALUES (?1, ?2)",
                    (id, habitat.to_string()),
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn list_mushrooms(&self, filter: &MushroomFilter) -> Result<Vec<MushroomRow>> {
        self.with_conn(|conn| {
            let mut clauses: Vec<&str> = Vec::new();
            let mut params: Vec<Box<dyn ToSql>> = Vec::new();

            if let Some(edibility) = filter.edibility {
                params.push(Box::new(edibility.as_str()));
                clauses.push("m.edibility = ?");
            }
            if let Some(family) = &filter.family_id {
                params.push(Box::new(family.clone()));
                clauses.push("m.family_id = ?");
            }
            if let Some(habitat) = &filter.habitat_id {
                params.push(Box::new(habitat.clone()));
                clauses.push(
                    "EXISTS (SELECT 1 FROM mushroom_habitats mh
                             WHERE mh.mushroom_id = m.id AND mh.habitat_id = ?)",
                );
            }

            let mut sql = String::from(
                "SELECT m.id, m.name_cz, m.name_latin, m.description, m.edibility, m.family_id
                 FROM mushrooms m",
            );
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY m.name_cz");

            query_mushrooms(conn, &sql, &params)
        })
    }

    pub fn get_mushroom(&self, id: &str) -> Result<Option<MushroomRow>> {
        self.with_conn(|conn| {
            let params: Vec<Box<dyn ToSql>> = vec![Box::new(id.to_string())];
            let mut rows = query_mushrooms(
                conn,
                "SELECT id, name_cz, name_latin, description, edibility, family_id
                 FROM mushrooms WHERE id = ?",
                &params,
            )?;
            Ok(rows.pop())
        })
    }

    // -- Tips --

    pub fn create_tip(&self, id: &str, user_id: &str, req: &CreateTipRequest) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tips (id, user_id, title, content, text) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, user_id, &req.title, &req.content, &req.text),
            )?;
            Ok(())
        })
    }

    pub fn list_tips(&self) -> Result<Vec<TipRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, user_id, title, content, text FROM tips ORDER BY title")?;
            let rows = stmt
                .query_map([], tip_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_tip(&self, id: &str) -> Result<Option<TipRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, title, content, text FROM tips WHERE id = ?1",
                [id],
                tip_from_row,
            )
            .optional()
        })
    }
}

/// Runs a mushroom select and batch-loads the habitats of every result.
fn query_mushrooms(
    conn: &Connection,
    sql: &str,
    params: &[Box<dyn ToSql>],
) -> Result<Vec<MushroomRow>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok(MushroomRow {
                id: row.get(0)?,
                name_cz: row.get(1)?,
                name_latin: row.get(2)?,
                description: row.get(3)?,
                edibility: row.get(4)?,
                family_id: row.get(5)?,
                habitats: vec![],
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        return Ok(rows);
    }

    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    let sql = format!(
        "SELECT mh.mushroom_id, h.id, h.name
         FROM mushroom_habitats mh
         JOIN habitats h ON h.id = mh.habitat_id
         WHERE mh.mushroom_id IN ({})
         ORDER BY h.name",
        placeholders(1, ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let links = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                HabitatRow { id: row.get(1)?, name: row.get(2)? },
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_mushroom: HashMap<String, Vec<HabitatRow>> = HashMap::new();
    for (mushroom_id, habitat) in links {
        by_mushroom.entry(mushroom_id).or_default().push(habitat);
    }
    for row in &mut rows {
        row.habitats = by_mushroom.remove(&row.id).unwrap_or_default();
    }

    Ok(rows)
}

fn tip_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TipRow> {
    Ok(TipRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        text: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use atlas_types::api::{CreateFamilyRequest, CreateMushroomRequest};
    use atlas_types::models::Edibility;
    use uuid::Uuid;

    use crate::models::MushroomFilter;
    use crate::queries::fixtures;

    fn mushroom(name: &str, edibility: Edibility, family: Option<Uuid>, habitats: Vec<Uuid>) -> CreateMushroomRequest {
        CreateMushroomRequest {
            name_cz: name.to_string(),
            name_latin: format!("{name} latinus"),
            description: None,
            edibility,
            family,
            habitats,
        }
    }

    #[test]
    fn mushroom_list_filters_by_edibility_habitat_and_family() {
        let db = fixtures::db();
        let boletaceae = Uuid::new_v4();
        db.create_family(
            &boletaceae.to_string(),
            &CreateFamilyRequest {
                name: "Hřibovité".into(),
                name_latin: "Boletaceae".into(),
                description: None,
            },
        )
        .unwrap();
        let forest = Uuid::new_v4();
        let meadow = Uuid::new_v4();
        db.create_habitat(&forest.to_string(), "forest").unwrap();
        db.create_habitat(&meadow.to_string(), "meadow").unwrap();

        db.create_mushroom("m1", &mushroom("Hřib", Edibility::Edible, Some(boletaceae), vec![forest]))
            .unwrap();
        db.create_mushroom("m2", &mushroom("Muchomůrka", Edibility::Poisonous, None, vec![forest, meadow]))
            .unwrap();
        db.create_mushroom("m3", &mushroom("Bedla", Edibility::Edible, None, vec![meadow])).unwrap();

        let all = db.list_mushrooms(&MushroomFilter::default()).unwrap();
        let names: Vec<&str> = all.iter().map(|m| m.name_cz.as_str()).collect();
        assert_eq!(names, vec!["Bedla", "Hřib", "Muchomůrka"]);
        assert_eq!(all[2].habitats.len(), 2);

        let edible = db
            .list_mushrooms(&MushroomFilter { edibility: Some(Edibility::Edible), ..Default::default() })
            .unwrap();
        assert_eq!(edible.len(), 2);

        let edible_in_meadow = db
            .list_mushrooms(&MushroomFilter {
                edibility: Some(Edibility::Edible),
                habitat_id: Some(meadow.to_string()),
                family_id: None,
            })
            .unwrap();
        assert_eq!(edible_in_meadow.len(), 1);
        assert_eq!(edible_in_meadow[0].id, "m3");

        let in_family = db
            .list_mushrooms(&MushroomFilter { family_id: Some(boletaceae.to_string()), ..Default::default() })
            .unwrap();
        assert_eq!(in_family.len(), 1);
        assert_eq!(in_family[0].id, "m1");
    }

    #[test]
    fn missing_ids_reports_unknown_rows() {
        let db = fixtures::db();
        db.create_habitat("h1", "forest").unwrap();
        let missing = db
            .missing_ids("habitats", &["h1".to_string(), "h2".to_string()])
            .unwrap();
        assert_eq!(missing, vec!["h2".to_string()]);
    }
}
