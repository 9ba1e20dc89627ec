//! Response shapes. Every field is listed explicitly; computed fields are
//! filled in by the callers in `actions`, which know the requesting user.

use serde::Serialize;

use super::schema::{Id, Recipe, RecipePart, Tag, User};
use crate::storage::ImageStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub avatar: Option<String>,
}

impl UserView {
    pub fn new(user: &User, is_subscribed: bool, images: &ImageStore) -> Self {
        Self {
            email: user.email.to_owned(),
            id: user.id,
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            is_subscribed,
            avatar: user.avatar.as_deref().map(|path| images.url(path)),
        }
    }
}

/// Returned from registration; no computed fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedUserView {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for CreatedUserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.to_owned(),
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeShortView {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeShortView {
    pub fn new(recipe: &Recipe, images: &ImageStore) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.to_owned(),
            image: images.url(&recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeIngredientView {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipePart> for RecipeIngredientView {
    fn from(part: RecipePart) -> Self {
        Self {
            id: part.ingredient_id,
            name: part.name,
            measurement_unit: part.measurement_unit,
            amount: part.amount,
        }
    }
}

/// Per-viewer markers; both false for anonymous viewers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecipeMarks {
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeView {
    pub id: Id,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<RecipeIngredientView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

impl RecipeView {
    pub fn new(
        recipe: Recipe,
        author: UserView,
        tags: Vec<Tag>,
        parts: Vec<RecipePart>,
        marks: RecipeMarks,
        images: &ImageStore,
    ) -> Self {
        Self {
            id: recipe.id,
            tags,
            author,
            ingredients: parts.into_iter().map(RecipeIngredientView::from).collect(),
            is_favorited: marks.is_favorited,
            is_in_shopping_cart: marks.is_in_shopping_cart,
            image: images.url(&recipe.image),
            name: recipe.name,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub author: UserView,
    pub recipes: Vec<RecipeShortView>,
    pub recipes_count: i64,
}

impl SubscriptionView {
    pub fn new(
        author: UserView,
        recipes: &[Recipe],
        recipes_count: i64,
        images: &ImageStore,
    ) -> Self {
        Self {
            author,
            recipes: recipes
                .iter()
                .map(|recipe| RecipeShortView::new(recipe, images))
                .collect(),
            recipes_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvatarView {
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShortLinkView {
    #[serde(rename = "short-link")]
    pub short_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenView {
    pub auth_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::UserRole;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn images() -> ImageStore {
        ImageStore::new("media", "/media/")
    }

    fn user() -> User {
        User {
            id: 2,
            email: "chef@example.com".to_string(),
            username: "chef".to_string(),
            first_name: "Julia".to_string(),
            last_name: "Child".to_string(),
            password: "hash".to_string(),
            role: UserRole::User,
            avatar: Some("avatars/a.png".to_string()),
        }
    }

    fn recipe(id: Id) -> Recipe {
        Recipe {
            id,
            author_id: 2,
            name: format!("Recipe {id}"),
            text: "Cook it".to_string(),
            image: format!("recipes/{id}.png"),
            cooking_time: 15,
        }
    }

    #[test]
    fn user_view_hides_password() {
        let value = serde_json::to_value(UserView::new(&user(), true, &images())).unwrap();

        assert_eq!(
            value,
            json!({
                "email": "chef@example.com",
                "id": 2,
                "username": "chef",
                "first_name": "Julia",
                "last_name": "Child",
                "is_subscribed": true,
                "avatar": "/media/avatars/a.png",
            })
        );
    }

    #[test]
    fn short_view_has_four_fields() {
        let value = serde_json::to_value(RecipeShortView::new(&recipe(5), &images())).unwrap();

        assert_eq!(
            value,
            json!({
                "id": 5,
                "name": "Recipe 5",
                "image": "/media/recipes/5.png",
                "cooking_time": 15,
            })
        );
    }

    #[test]
    fn anonymous_marks_are_false_not_null() {
        let author = UserView::new(&user(), false, &images());
        let view = RecipeView::new(
            recipe(1),
            author,
            vec![],
            vec![],
            RecipeMarks::default(),
            &images(),
        );

        let value = serde_json::to_value(view).unwrap();
        assert_eq!(value["is_favorited"], json!(false));
        assert_eq!(value["is_in_shopping_cart"], json!(false));
    }

    #[test]
    fn full_view_lists_ingredients_with_amounts() {
        let part = RecipePart {
            recipe_id: 1,
            ingredient_id: 9,
            name: "eggs".to_string(),
            measurement_unit: "pcs".to_string(),
            amount: 3,
        };
        let tag = Tag {
            id: 1,
            name: "Breakfast".to_string(),
            color: "#E26C2D".to_string(),
            slug: "breakfast".to_string(),
        };

        let view = RecipeView::new(
            recipe(1),
            UserView::new(&user(), false, &images()),
            vec![tag.clone()],
            vec![part],
            RecipeMarks {
                is_favorited: true,
                is_in_shopping_cart: false,
            },
            &images(),
        );

        assert_eq!(view.tags, vec![tag]);
        assert_eq!(
            serde_json::to_value(&view.ingredients).unwrap(),
            json!([{ "id": 9, "name": "eggs", "measurement_unit": "pcs", "amount": 3 }])
        );
        assert!(view.is_favorited);
    }

    #[test]
    fn subscription_view_flattens_author() {
        let view = SubscriptionView::new(
            UserView::new(&user(), true, &images()),
            &[recipe(1), recipe(2)],
            7,
            &images(),
        );

        let value = serde_json::to_value(view).unwrap();
        assert_eq!(value["username"], json!("chef"));
        assert_eq!(value["recipes"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["recipes_count"], json!(7));
    }

    #[test]
    fn short_link_key_is_hyphenated() {
        let value = serde_json::to_value(ShortLinkView {
            short_link: "http://x/s/abc/".to_string(),
        })
        .unwrap();

        assert_eq!(value, json!({ "short-link": "http://x/s/abc/" }));
    }
}
