use crate::{
    error::{ApiError, QueryError, ValidationErrors},
    schema::{Id, Tag},
    validators::{validate_color, validate_slug},
    TAG_FIELD_MAX_LENGTH,
};

use sqlx::{Pool, Postgres};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, ApiError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Tag, ApiError> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    tag.ok_or_else(|| ApiError::not_found("Tag"))
}

/// Which of `ids` exist.
pub async fn existing_tag_ids(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Id>, ApiError> {
    let rows: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

pub async fn create_tag(
    name: &str,
    color: &str,
    slug: &str,
    pool: &Pool<Postgres>,
) -> Result<Tag, ApiError> {
    let mut errors = ValidationErrors::new();
    if name.trim().is_empty() || name.chars().count() > TAG_FIELD_MAX_LENGTH {
        errors.add(
            "name",
            format!("Name must be 1 to {TAG_FIELD_MAX_LENGTH} characters"),
        );
    }
    if let Err(e) = validate_color(color) {
        errors.add("color", e);
    }
    if let Err(e) = validate_slug(slug) {
        errors.add("slug", e);
    }
    errors.into_result()?;

    let tag: Option<Tag> = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING RETURNING *",
    )
    .bind(name.trim())
    .bind(color)
    .bind(slug)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    tag.ok_or_else(|| ApiError::Conflict("A tag with that name, color or slug already exists".to_string()))
}
