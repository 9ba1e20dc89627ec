use std::str::FromStr;

use serde::Deserialize;

use super::schema::Id;

/// Raw query-string pairs; keys may repeat (`?tags=a&tags=b`).
pub type QueryData = Vec<(String, String)>;

#[derive(Debug, Default, Clone)]
pub struct Form {
    inner: QueryData,
}

impl Form {
    pub fn from_data(data: QueryData) -> Self {
        Self { inner: data }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.inner
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Parsed value, or `None` when the key is missing or malformed.
    pub fn get_number<T>(&self, key: &str) -> Option<T>
    where
        T: FromStr,
    {
        self.get_str(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn get_flag(&self, key: &str) -> bool {
        matches!(
            self.get_str(key).map(str::to_ascii_lowercase).as_deref(),
            Some("1" | "true")
        )
    }

    /// Pairs other than the listed keys, used to carry filters into page links.
    pub fn without(&self, keys: &[&str]) -> QueryData {
        self.inner
            .iter()
            .filter(|(k, _)| !keys.contains(&k.as_str()))
            .cloned()
            .collect()
    }

    /// `recipes_limit`; negative or malformed values mean "no limit".
    pub fn recipes_limit(&self) -> Option<i64> {
        self.get_number::<i64>("recipes_limit").filter(|n| *n >= 0)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Vec<String>,
    pub author: Option<Id>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    pub fn from_form(form: &Form) -> Self {
        let mut tags: Vec<String> = form
            .get_all("tags")
            .into_iter()
            .filter(|slug| !slug.is_empty())
            .map(str::to_string)
            .collect();
        tags.sort_unstable();
        tags.dedup();

        Self {
            tags,
            author: form.get_number("author"),
            is_favorited: form.get_flag("is_favorited"),
            is_in_shopping_cart: form.get_flag("is_in_shopping_cart"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngredientAmount {
    pub id: Id,
    pub amount: i64,
}

/// Body of recipe create and update requests.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RecipeForm {
    pub ingredients: Vec<IngredientAmount>,
    pub tags: Vec<Id>,
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: Option<i64>,
}

impl RecipeForm {
    pub fn ingredient_ids(&self) -> Vec<Id> {
        self.ingredients.iter().map(|item| item.id).collect()
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct SetPasswordForm {
    pub new_password: String,
    pub current_password: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AvatarForm {
    pub avatar: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn recipe_filter_collects_repeated_tags() {
        let filter = RecipeFilter::from_form(&form(&[
            ("tags", "breakfast"),
            ("tags", "lunch"),
            ("author", "3"),
            ("is_favorited", "1"),
        ]));

        assert_eq!(filter.tags, vec!["breakfast", "lunch"]);
        assert_eq!(filter.author, Some(3));
        assert!(filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
    }

    #[test]
    fn repeated_tags_are_kept_once() {
        let filter = RecipeFilter::from_form(&form(&[
            ("tags", "lunch"),
            ("tags", "breakfast"),
            ("tags", "lunch"),
            ("tags", ""),
        ]));

        assert_eq!(filter.tags, vec!["breakfast", "lunch"]);
    }

    #[test]
    fn malformed_numbers_are_ignored() {
        let form = form(&[("author", "abc"), ("recipes_limit", "x")]);

        assert_eq!(RecipeFilter::from_form(&form).author, None);
        assert_eq!(form.recipes_limit(), None);
    }

    #[test]
    fn negative_recipes_limit_means_unlimited() {
        assert_eq!(form(&[("recipes_limit", "-2")]).recipes_limit(), None);
        assert_eq!(form(&[("recipes_limit", "0")]).recipes_limit(), Some(0));
        assert_eq!(form(&[("recipes_limit", "3")]).recipes_limit(), Some(3));
    }

    #[test]
    fn without_drops_paging_keys() {
        let form = form(&[("page", "2"), ("tags", "a"), ("limit", "6")]);
        assert_eq!(
            form.without(&["page"]),
            vec![
                ("tags".to_string(), "a".to_string()),
                ("limit".to_string(), "6".to_string())
            ]
        );
    }

    #[test]
    fn recipe_form_defaults_missing_fields() {
        let form: RecipeForm = serde_json::from_str(r#"{"name": "Soup"}"#).unwrap();

        assert!(form.tags.is_empty());
        assert!(form.ingredients.is_empty());
        assert_eq!(form.cooking_time, None);
    }
}
