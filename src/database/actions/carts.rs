use crate::{
    authentication::jwt::SessionData,
    error::{ApiError, QueryError},
    shopping_list::{aggregate, render, CartLine},
};

use sqlx::{Pool, Postgres};

/// Plain-text shopping list for every recipe in the user's cart.
pub async fn download_shopping_list(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let has_cart: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM shopping_carts WHERE user_id = $1)")
            .bind(session.user_id)
            .fetch_one(pool)
            .await
            .map_err(QueryError::from)?;
    if !has_cart.0 {
        return Err(ApiError::EmptyCart);
    }

    let lines: Vec<CartLine> = sqlx::query_as(
        "
        SELECT i.name, i.measurement_unit, ri.amount
        FROM shopping_carts c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
        ORDER BY LOWER(i.name), i.name, i.measurement_unit
    ",
    )
    .bind(session.user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    log::trace!("> Shopping list for {} has {} lines", session.username, lines.len());
    Ok(render(&aggregate(lines)))
}
