//! Rows and contexts shared by the database-backed tests.

use sqlx::PgPool;
use tempfile::TempDir;

use crate::{
    authentication::jwt::SessionData,
    config::Config,
    context::Context,
    form::{IngredientAmount, RecipeForm},
    schema::{Id, User, UserRole},
};

const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

/// Context whose media root lives as long as the returned directory.
pub fn context(pool: PgPool) -> (Context, TempDir) {
    context_with(pool, Config::development())
}

pub fn context_with(pool: PgPool, config: Config) -> (Context, TempDir) {
    let media = tempfile::tempdir().unwrap();
    let config = Config {
        media_root: media.path().to_path_buf(),
        ..config
    };
    (Context::new(pool, config), media)
}

pub async fn user(username: &str, pool: &PgPool) -> SessionData {
    user_with_role(username, UserRole::User, pool).await
}

/// Inserts a user directly; the password column is never checked here.
pub async fn user_with_role(username: &str, role: UserRole, pool: &PgPool) -> SessionData {
    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password, role)
        VALUES ($1, $2, 'Test', 'Cook', 'unused', $3)
        RETURNING *;
    ",
    )
    .bind(format!("{username}@example.com"))
    .bind(username)
    .bind(role)
    .fetch_one(pool)
    .await
    .unwrap();

    SessionData {
        user_id: user.id,
        username: user.username,
        role: user.role,
    }
}

pub async fn tag(slug: &str, color: &str, pool: &PgPool) -> Id {
    let row: (Id,) =
        sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $1) RETURNING id")
            .bind(slug)
            .bind(color)
            .fetch_one(pool)
            .await
            .unwrap();
    row.0
}

pub async fn ingredient(name: &str, unit: &str, pool: &PgPool) -> Id {
    let row: (Id,) = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id",
    )
    .bind(name)
    .bind(unit)
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}

pub fn recipe_form(name: &str, tags: &[Id], ingredients: &[(Id, i64)]) -> RecipeForm {
    RecipeForm {
        ingredients: ingredients
            .iter()
            .map(|&(id, amount)| IngredientAmount { id, amount })
            .collect(),
        tags: tags.to_vec(),
        image: Some(PIXEL.to_string()),
        name: name.to_string(),
        text: "Mix and serve.".to_string(),
        cooking_time: Some(15),
    }
}
