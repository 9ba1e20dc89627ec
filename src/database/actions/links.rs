use crate::{
    actions::recipes::require_recipe,
    authentication::cryptography::generate_short_token,
    config::Config,
    context::Context,
    error::{ApiError, QueryError},
    schema::{Id, ShortLink},
    views::ShortLinkView,
    SHORT_LINK_ATTEMPTS, SHORT_LINK_LENGTH,
};

use sqlx::{PgConnection, Pool, Postgres};

async fn find_link(recipe_id: Id, conn: &mut PgConnection) -> Result<Option<ShortLink>, ApiError> {
    let link: Option<ShortLink> = sqlx::query_as("SELECT * FROM short_links WHERE recipe_id = $1")
        .bind(recipe_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(link)
}

/// Returns the recipe's link, creating one with a fresh random token if needed.
///
/// Token collisions are retried with a new token; the insert never raises on
/// conflict so it is safe inside an open transaction.
pub async fn create_short_link(
    recipe_id: Id,
    config: &Config,
    conn: &mut PgConnection,
) -> Result<ShortLink, ApiError> {
    for _ in 0..SHORT_LINK_ATTEMPTS {
        let token = generate_short_token(SHORT_LINK_LENGTH);
        let link: Option<ShortLink> = sqlx::query_as(
            "
            INSERT INTO short_links (token, recipe_id, full_link)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING RETURNING *;
        ",
        )
        .bind(&token)
        .bind(recipe_id)
        .bind(config.recipe_url(recipe_id))
        .fetch_optional(&mut *conn)
        .await
        .map_err(QueryError::from)?;

        if let Some(link) = link {
            log::trace!("> Created short link {} for recipe {recipe_id}", link.token);
            return Ok(link);
        }
        if let Some(existing) = find_link(recipe_id, conn).await? {
            return Ok(existing);
        }
        log::debug!("Short link token {token} collided, retrying");
    }

    Err(ApiError::Internal(
        "Could not allocate a short link".to_string(),
    ))
}

pub async fn get_recipe_link(recipe_id: Id, ctx: &Context) -> Result<ShortLinkView, ApiError> {
    let recipe = require_recipe(recipe_id, &ctx.pool).await?;

    let mut conn = ctx.pool.acquire().await.map_err(QueryError::from)?;
    let link = match find_link(recipe.id, &mut *conn).await? {
        Some(link) => link,
        None => create_short_link(recipe.id, &ctx.config, &mut *conn).await?,
    };

    Ok(ShortLinkView {
        short_link: ctx.config.short_url(&link.token),
    })
}

/// Full recipe URL behind a token.
pub async fn resolve_short_link(token: &str, pool: &Pool<Postgres>) -> Result<String, ApiError> {
    let link: Option<ShortLink> = sqlx::query_as("SELECT * FROM short_links WHERE token = $1")
        .bind(token)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    link.map(|link| link.full_link)
        .ok_or_else(|| ApiError::not_found("Short link"))
}
