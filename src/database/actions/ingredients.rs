use crate::{
    error::{ApiError, QueryError},
    schema::{Id, Ingredient},
};

use sqlx::{Pool, Postgres, QueryBuilder};

// Postgres caps a statement at 65535 bind parameters, two per row here.
const INSERT_CHUNK: usize = 10_000;

/// Escapes LIKE wildcards so user input only ever matches literally.
pub fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Ingredients whose name starts with `name`, ignoring case. No filter lists everything.
pub async fn list_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, ApiError> {
    let list: Vec<Ingredient> = match name.filter(|name| !name.is_empty()) {
        Some(name) => sqlx::query_as("SELECT * FROM ingredients WHERE LOWER(name) LIKE LOWER($1) ORDER BY name")
            .bind(like_prefix(name))
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(list)
}

pub async fn get_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Ingredient, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    row.ok_or_else(|| ApiError::not_found("Ingredient"))
}

pub async fn existing_ingredient_ids(
    ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<Id>, ApiError> {
    let rows: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

/// Bulk insert of `(name, measurement_unit)` pairs; existing pairs are skipped.
/// Returns how many rows were actually inserted.
pub async fn insert_ingredients(
    items: &[(String, String)],
    pool: &Pool<Postgres>,
) -> Result<u64, ApiError> {
    let mut inserted = 0;

    for chunk in items.chunks(INSERT_CHUNK) {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
        query.push_values(chunk, |mut row, (name, unit)| {
            row.push_bind(name).push_bind(unit);
        });
        query.push(" ON CONFLICT DO NOTHING");

        let result = query
            .build()
            .execute(pool)
            .await
            .map_err(QueryError::from)?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pattern_escapes_wildcards() {
        assert_eq!(like_prefix("sug"), "sug%");
        assert_eq!(like_prefix("50%_"), "50\\%\\_%");
        assert_eq!(like_prefix(""), "%");
    }
}
