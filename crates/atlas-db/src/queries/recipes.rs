use std::cmp::Ordering;

use anyhow::Result;
use rusqlite::types::ToSql;

use atlas_types::api::CreateRecipeRequest;

use super::OptionalExt;
use crate::Database;
use crate::models::{RateOutcome, RecipeFilter, RecipeRow};

const RECIPE_SELECT: &str = "SELECT r.id, r.user_id, u.username, r.title, r.ingredients,
                                    r.instructions, r.main_mushroom, r.source, r.rating,
                                    (SELECT COUNT(*) FROM ratings rt WHERE rt.recipe_id = r.id)
                             FROM recipes r
                             LEFT JOIN users u ON u.id = r.user_id";

impl Database {
    // -- Recipes --

    pub fn create_recipe(&self, id: &str, user_id: &str, req: &CreateRecipeRequest) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO recipes (id, user_id, title, ingredients, instructions, main_mushroom, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (
                    id,
                    user_id,
                    &req.title,
                    &req.ingredients,
                    &req.instructions,
                    req.main_mushroom.map(|m| m.to_string()),
                    &req.source,
                ),
            )?;
            Ok(())
        })
    }

    pub fn list_recipes(&self, filter: &RecipeFilter) -> Result<Vec<RecipeRow>> {
        self.with_conn(|conn| {
            let mut clauses: Vec<&str> = Vec::new();
            let mut params: Vec<Box<dyn ToSql>> = Vec::new();

            if let Some(mushroom) = &filter.main_mushroom {
                params.push(Box::new(mushroom.clone()));
                clauses.push("r.main_mushroom = ?");
            }
            if let Some(min_rating) = filter.min_rating {
                params.push(Box::new(min_rating));
                clauses.push("r.rating >= ?");
            }
            if let Some(user_id) = &filter.user_id {
                params.push(Box::new(user_id.clone()));
                clauses.push("r.user_id = ?");
            }

            let mut sql = String::from(RECIPE_SELECT);
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY r.title");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), recipe_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_recipe(&self, id: &str) -> Result<Option<RecipeRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{RECIPE_SELECT} WHERE r.id = ?1"), [id], recipe_from_row)
                .optional()
        })
    }

    // -- Ratings --

    /// Records one rating per user per recipe and refreshes the recipe's
    /// average, rounded to one decimal place.
    pub fn rate_recipe(&self, id: &str, recipe_id: &str, user_id: &str, value: i64) -> Result<RateOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists: Option<i64> = tx
                .query_row("SELECT 1 FROM recipes WHERE id = ?1", [recipe_id], |r| r.get(0))
                .optional()?;
            if exists.is_none() {
                return Ok(RateOutcome::RecipeNotFound);
            }

            let already: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM ratings WHERE recipe_id = ?1 AND user_id = ?2",
                    [recipe_id, user_id],
                    |r| r.get(0),
                )
                .optional()?;
            if already.is_some() {
                return Ok(RateOutcome::AlreadyRated);
            }

            tx.execute(
                "INSERT INTO ratings (id, recipe_id, user_id, value) VALUES (?1, ?2, ?3, ?4)",
                (id, recipe_id, user_id, value),
            )?;

            let (total, num_ratings): (i64, i64) = tx.query_row(
                "SELECT COALESCE(SUM(value), 0), COUNT(*) FROM ratings WHERE recipe_id = ?1",
                [recipe_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )?;
            let rating = round_rating(total as f64 / num_ratings as f64);

            tx.execute(
                "UPDATE recipes SET rating = ?2 WHERE id = ?1",
                (recipe_id, rating),
            )?;
            tx.commit()?;

            Ok(RateOutcome::Rated { rating, num_ratings })
        })
    }
}

/// Rounds to one decimal, ties to even, judged on the exact binary value of
/// `average`. 4.35 is stored just below the midpoint and becomes 4.3, while
/// 3.25 is exact and becomes 3.2.
fn round_rating(average: f64) -> f64 {
    if !average.is_finite() || average <= 0.0 {
        return 0.0;
    }
    let tenths = (average * 10.0).floor();
    let rounded = match cmp_to_midpoint(average, tenths as u64) {
        Ordering::Less => tenths,
        Ordering::Greater => tenths + 1.0,
        Ordering::Equal if tenths % 2.0 == 0.0 => tenths,
        Ordering::Equal => tenths + 1.0,
    };
    rounded / 10.0
}

/// Compares `value` with `(tenths + 0.5) / 10`, i.e. `20 * value` with
/// `2 * tenths + 1`, in integers.
fn cmp_to_midpoint(value: f64, tenths: u64) -> Ordering {
    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };

    let lhs = 20 * mantissa as u128;
    let rhs = 2 * tenths as u128 + 1;
    if exponent >= 0 {
        return match (lhs.checked_shl(exponent as u32), rhs) {
            (Some(l), r) if l >> exponent == lhs => l.cmp(&r),
            _ => Ordering::Greater,
        };
    }
    let shift = exponent.unsigned_abs();
    if shift >= 120 {
        // Far below any midpoint that matters for ratings.
        return Ordering::Less;
    }
    lhs.cmp(&(rhs << shift))
}

fn recipe_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecipeRow> {
    Ok(RecipeRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author_username: row.get::<_, Option<String>>(2)?.unwrap_or_else(|| "unknown".to_string()),
        title: row.get(3)?,
        ingredients: row.get(4)?,
        instructions: row.get(5)?,
        main_mushroom: row.get(6)?,
        source: row.get(7)?,
        rating: row.get(8)?,
        num_ratings: row.get(9)?,
    })
}
