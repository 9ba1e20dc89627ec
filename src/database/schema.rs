use serde::{Deserialize, Serialize};

pub type Id = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: UserRole,
    pub avatar: Option<String>,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserRow {
    #[sqlx(flatten)]
    pub user: User,
    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    #[sqlx(flatten)]
    pub recipe: Recipe,
    pub count: i64,
}

/// An ingredient as it appears inside one recipe.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct RecipePart {
    pub recipe_id: Id,
    pub ingredient_id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct ShortLink {
    pub id: Id,
    pub token: String,
    pub recipe_id: Id,
    pub full_link: String,
}

/// Joined author row used when listing subscriptions.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct SubscriptionRow {
    #[sqlx(flatten)]
    pub author: User,
    pub count: i64,
}
