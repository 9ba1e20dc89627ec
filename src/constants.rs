pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Lower and upper bounds for ingredient amounts and cooking time.
pub const MIN_VALUE: i64 = 1;
pub const MAX_VALUE: i64 = 32000;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const PERSON_NAME_MAX_LENGTH: usize = 150;
pub const RECIPE_NAME_MAX_LENGTH: usize = 200;
pub const TAG_FIELD_MAX_LENGTH: usize = 200;
pub const INGREDIENT_FIELD_MAX_LENGTH: usize = 200;

pub const FORBIDDEN_USERNAME: &str = "me";

pub const SHORT_LINK_LENGTH: usize = 8;
pub const SHORT_LINK_ATTEMPTS: usize = 5;

pub const RECIPE_IMAGE_FOLDER: &str = "recipes";
pub const AVATAR_IMAGE_FOLDER: &str = "avatars";
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

pub const SHOPPING_LIST_FILENAME: &str = "shopping_cart.txt";
pub const SHOPPING_LIST_HEADER: &str = "Shopping list:";

/// Largest JSON body accepted; recipe images travel inline as base64.
pub const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;
