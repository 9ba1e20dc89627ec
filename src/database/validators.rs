use std::{
    collections::{BTreeSet, HashSet},
    sync::LazyLock,
};

use regex::Regex;

use super::{
    error::ValidationErrors,
    form::{RecipeForm, RegisterForm},
    schema::Id,
};
use crate::constants::{
    EMAIL_MAX_LENGTH, FORBIDDEN_USERNAME, MAX_VALUE, MIN_VALUE, PERSON_NAME_MAX_LENGTH,
    RECIPE_NAME_MAX_LENGTH, TAG_FIELD_MAX_LENGTH, USERNAME_MAX_LENGTH,
};

static COLOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("static pattern"));
static SLUG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("static pattern"));

fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-')
}

pub fn validate_username(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("This field may not be blank".to_string());
    }
    if value.chars().count() > USERNAME_MAX_LENGTH {
        return Err(format!(
            "Ensure this field has no more than {USERNAME_MAX_LENGTH} characters"
        ));
    }
    if value.to_lowercase() == FORBIDDEN_USERNAME {
        return Err(format!(
            "Using <{FORBIDDEN_USERNAME}> as a username is not allowed"
        ));
    }

    let invalid: BTreeSet<char> = value.chars().filter(|c| !is_username_char(*c)).collect();
    if !invalid.is_empty() {
        let chars: Vec<String> = invalid.into_iter().map(|c| format!("'{c}'")).collect();
        return Err(format!("Invalid characters in username: {}", chars.join(", ")));
    }

    Ok(())
}

pub fn validate_color(value: &str) -> Result<(), String> {
    if COLOR_PATTERN.is_match(value) {
        Ok(())
    } else {
        Err("Color must be a HEX code in #RRGGBB format".to_string())
    }
}

pub fn validate_slug(value: &str) -> Result<(), String> {
    if value.len() > TAG_FIELD_MAX_LENGTH {
        return Err(format!(
            "Ensure this field has no more than {TAG_FIELD_MAX_LENGTH} characters"
        ));
    }
    if SLUG_PATTERN.is_match(value) {
        Ok(())
    } else {
        Err("Slug may contain only letters, numbers, underscores or hyphens".to_string())
    }
}

pub fn validate_bounds(value: i64) -> Result<(), String> {
    if value < MIN_VALUE {
        Err(format!("Ensure this value is greater than or equal to {MIN_VALUE}"))
    } else if value > MAX_VALUE {
        Err(format!("Ensure this value is less than or equal to {MAX_VALUE}"))
    } else {
        Ok(())
    }
}

fn has_duplicates(ids: &[Id]) -> bool {
    let mut seen = HashSet::with_capacity(ids.len());
    !ids.iter().all(|id| seen.insert(*id))
}

fn check_text(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        errors.add(field, "This field may not be blank");
    } else if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {max} characters"),
        );
    }
}

/// Structural checks on a recipe body; references are resolved separately.
pub fn validate_recipe_form(form: &RecipeForm, require_image: bool) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    check_text(&mut errors, "name", &form.name, RECIPE_NAME_MAX_LENGTH);
    if form.text.trim().is_empty() {
        errors.add("text", "This field may not be blank");
    }

    match form.cooking_time {
        Some(time) => {
            if let Err(e) = validate_bounds(time) {
                errors.add("cooking_time", e);
            }
        }
        None => errors.add("cooking_time", "This field is required"),
    }

    if form.tags.is_empty() {
        errors.add("tags", "A recipe needs at least one tag");
    } else if has_duplicates(&form.tags) {
        errors.add("tags", "Tags must be unique");
    }

    if form.ingredients.is_empty() {
        errors.add("ingredients", "A recipe needs at least one ingredient");
    } else {
        if has_duplicates(&form.ingredient_ids()) {
            errors.add("ingredients", "Ingredients must be unique");
        }
        for item in &form.ingredients {
            if let Err(e) = validate_bounds(item.amount) {
                errors.add("ingredients", format!("Ingredient {}: {e}", item.id));
            }
        }
    }

    let image_missing = form
        .image
        .as_deref()
        .map(|image| image.trim().is_empty())
        .unwrap_or(true);
    if require_image && image_missing {
        errors.add("image", "This field is required");
    }

    errors
}

/// Ids from `requested` that are absent from `existing`, in request order.
pub fn missing_references(requested: &[Id], existing: &[Id]) -> Vec<Id> {
    let existing: HashSet<&Id> = existing.iter().collect();
    requested
        .iter()
        .filter(|id| !existing.contains(id))
        .copied()
        .collect()
}

pub fn validate_register_form(form: &RegisterForm) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if form.email.trim().is_empty() {
        errors.add("email", "This field may not be blank");
    } else if form.email.len() > EMAIL_MAX_LENGTH {
        errors.add(
            "email",
            format!("Ensure this field has no more than {EMAIL_MAX_LENGTH} characters"),
        );
    } else if !is_plausible_email(&form.email) {
        errors.add("email", "Enter a valid email address");
    }

    if let Err(e) = validate_username(&form.username) {
        errors.add("username", e);
    }
    check_text(
        &mut errors,
        "first_name",
        &form.first_name,
        PERSON_NAME_MAX_LENGTH,
    );
    check_text(
        &mut errors,
        "last_name",
        &form.last_name,
        PERSON_NAME_MAX_LENGTH,
    );
    if form.password.is_empty() {
        errors.add("password", "This field may not be blank");
    }

    errors
}

fn is_plausible_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
