use std::{collections::HashSet, io::Read, path::Path};

use sqlx::{Pool, Postgres};

use super::{actions::ingredients::insert_ingredients, error::ApiError};
use crate::constants::INGREDIENT_FIELD_MAX_LENGTH;

/// Reads headerless `name,measurement_unit` rows.
///
/// Blank names and values too long for the table are skipped, surrounding
/// whitespace is trimmed and repeated pairs are kept once, in file order.
pub fn parse_ingredients<R: Read>(reader: R) -> Result<Vec<(String, String)>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        let name = record.get(0).unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        let unit = record.get(1).unwrap_or_default();
        if name.chars().count() > INGREDIENT_FIELD_MAX_LENGTH
            || unit.chars().count() > INGREDIENT_FIELD_MAX_LENGTH
        {
            log::warn!("Skipping oversized ingredient row {name:.40}");
            continue;
        }

        let pair = (name.to_string(), unit.to_string());
        if seen.insert(pair.clone()) {
            rows.push(pair);
        }
    }

    Ok(rows)
}

/// Loads a CSV file into the ingredient table, returning the number of new rows.
pub async fn load_ingredients(path: &Path, pool: &Pool<Postgres>) -> Result<u64, ApiError> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        ApiError::validation("path", format!("Cannot open {}: {e}", path.display()))
    })?;
    let rows = parse_ingredients(data.as_slice())
        .map_err(|e| ApiError::validation("path", format!("Malformed CSV: {e}")))?;

    log::info!("Read {} ingredients from {}", rows.len(), path.display());
    let inserted = insert_ingredients(&rows, pool).await?;
    log::info!("Inserted {inserted} new ingredients");

    Ok(inserted)
}
