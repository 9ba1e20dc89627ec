use crate::{
    actions::recipes::require_recipe,
    authentication::{jwt::SessionData, permissions::ActionType},
    context::Context,
    error::{ApiError, QueryError},
    schema::Id,
    views::{RecipeMarks, RecipeShortView},
};

use sqlx::{Pool, Postgres};

/// Per-user recipe lists sharing one shape: favorites and the shopping cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeMark {
    Favorite,
    ShoppingCart,
}

impl RecipeMark {
    fn table(self) -> &'static str {
        match self {
            RecipeMark::Favorite => "favorites",
            RecipeMark::ShoppingCart => "shopping_carts",
        }
    }

    fn already_marked(self) -> &'static str {
        match self {
            RecipeMark::Favorite => "Recipe is already in favorites",
            RecipeMark::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    fn not_marked(self) -> &'static str {
        match self {
            RecipeMark::Favorite => "Recipe is not in favorites",
            RecipeMark::ShoppingCart => "Recipe is not in the shopping cart",
        }
    }
}

pub async fn has_mark(
    mark: RecipeMark,
    user_id: Id,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let row: (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = $1 AND recipe_id = $2)",
        mark.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row.0)
}

pub async fn recipe_marks(
    viewer: Option<&SessionData>,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeMarks, ApiError> {
    let Some(session) = viewer else {
        return Ok(RecipeMarks::default());
    };

    Ok(RecipeMarks {
        is_favorited: has_mark(RecipeMark::Favorite, session.user_id, recipe_id, pool).await?,
        is_in_shopping_cart: has_mark(RecipeMark::ShoppingCart, session.user_id, recipe_id, pool)
            .await?,
    })
}

pub async fn add_mark(
    mark: RecipeMark,
    session: &SessionData,
    recipe_id: Id,
    ctx: &Context,
) -> Result<RecipeShortView, ApiError> {
    session.authenticate(ActionType::ManageOwnFavorites)?;
    let recipe = require_recipe(recipe_id, &ctx.pool).await?;

    let inserted = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        mark.table()
    ))
    .bind(session.user_id)
    .bind(recipe.id)
    .execute(&ctx.pool)
    .await
    .map_err(QueryError::from)?;

    if inserted.rows_affected() == 0 {
        return Err(ApiError::Conflict(mark.already_marked().to_string()));
    }

    log::trace!("> {} added recipe {} to {}", session.username, recipe.id, mark.table());
    Ok(RecipeShortView::new(&recipe, &ctx.images))
}

pub async fn remove_mark(
    mark: RecipeMark,
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    session.authenticate(ActionType::ManageOwnFavorites)?;
    let recipe = require_recipe(recipe_id, pool).await?;

    let deleted = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        mark.table()
    ))
    .bind(session.user_id)
    .bind(recipe.id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::NotFound(mark.not_marked().to_string()));
    }
    Ok(())
}
