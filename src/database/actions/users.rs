use crate::{
    actions::{ensure_page, subscriptions::is_subscribed},
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::{generate_jwt_session, SessionData},
    },
    constants::AVATAR_IMAGE_FOLDER,
    context::Context,
    error::{ApiError, QueryError, ValidationErrors},
    form::{AvatarForm, LoginForm, QueryData, RegisterForm, SetPasswordForm},
    pagination::{PageContext, PageQuery},
    schema::{Id, User, UserRole, UserRow},
    storage::decode_image,
    validators::validate_register_form,
    views::{AvatarView, CreatedUserView, TokenView, UserView},
};

use sqlx::{Pool, Postgres};

pub async fn get_user_by_id(user_id: Id, pool: &Pool<Postgres>) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_email(email: &str, pool: &Pool<Postgres>) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn require_user(user_id: Id, pool: &Pool<Postgres>) -> Result<User, ApiError> {
    get_user_by_id(user_id, pool)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

/// `is_subscribed` is always false for anonymous viewers and for oneself.
pub async fn user_view(
    user: &User,
    viewer: Option<&SessionData>,
    ctx: &Context,
) -> Result<UserView, ApiError> {
    let subscribed = match viewer {
        Some(session) if session.user_id != user.id => {
            is_subscribed(session.user_id, user.id, &ctx.pool).await?
        }
        _ => false,
    };

    Ok(UserView::new(user, subscribed, &ctx.images))
}

pub async fn get_user_view(
    user_id: Id,
    viewer: Option<&SessionData>,
    ctx: &Context,
) -> Result<UserView, ApiError> {
    let user = require_user(user_id, &ctx.pool).await?;
    user_view(&user, viewer, ctx).await
}

pub async fn fetch_users(
    viewer: Option<&SessionData>,
    page: PageQuery,
    base_url: &str,
    extra: &QueryData,
    ctx: &Context,
) -> Result<PageContext<UserView>, ApiError> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "SELECT u.*, COUNT(*) OVER() AS count FROM users u ORDER BY u.username LIMIT $1 OFFSET $2",
    )
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&ctx.pool)
    .await
    .map_err(QueryError::from)?;

    ensure_page(&rows, page)?;
    let total = rows.first().map(|row| row.count).unwrap_or(0);

    let mut users = Vec::with_capacity(rows.len());
    for row in rows {
        users.push(user_view(&row.user, viewer, ctx).await?);
    }

    Ok(PageContext::from_rows(users, total, page, base_url, extra))
}

async fn uniqueness_errors(form: &RegisterForm, pool: &Pool<Postgres>) -> Result<ValidationErrors, ApiError> {
    let mut errors = ValidationErrors::new();

    if get_user_by_email(&form.email, pool).await?.is_some() {
        errors.add("email", "A user with that email already exists");
    }
    let taken: Option<(Id,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(&form.username)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;
    if taken.is_some() {
        errors.add("username", "A user with that username already exists");
    }

    Ok(errors)
}

/// Creates an account with the given role. The password is stored hashed.
pub async fn register_user(
    form: &RegisterForm,
    role: UserRole,
    pool: &Pool<Postgres>,
) -> Result<User, ApiError> {
    validate_register_form(form).into_result()?;
    uniqueness_errors(form, pool).await?.into_result()?;

    let password = hash_password(&form.password).await?;
    let user: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(form.email.trim())
    .bind(&form.username)
    .bind(form.first_name.trim())
    .bind(form.last_name.trim())
    .bind(password)
    .bind(role)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    let user = user.ok_or_else(|| ApiError::Conflict("User already exists".to_string()))?;
    log::info!("Registered user {} ({:?})", user.username, user.role);
    Ok(user)
}

pub async fn create_user(form: &RegisterForm, pool: &Pool<Postgres>) -> Result<CreatedUserView, ApiError> {
    let user = register_user(form, UserRole::User, pool).await?;
    Ok(CreatedUserView::from(&user))
}

pub async fn login_user(form: &LoginForm, ctx: &Context) -> Result<TokenView, ApiError> {
    let invalid = || {
        ApiError::validation(
            "non_field_errors",
            "Unable to log in with provided credentials",
        )
    };

    let user = get_user_by_email(&form.email, &ctx.pool)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&form.password, &user.password).await? {
        return Err(invalid());
    }

    let auth_token = generate_jwt_session(&user, &ctx.config)?;
    Ok(TokenView { auth_token })
}

pub async fn set_password(
    session: &SessionData,
    form: &SetPasswordForm,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let mut errors = ValidationErrors::new();
    if form.new_password.is_empty() {
        errors.add("new_password", "This field may not be blank");
    }
    if form.current_password.is_empty() {
        errors.add("current_password", "This field may not be blank");
    }
    errors.into_result()?;

    let user = require_user(session.user_id, pool).await?;
    if !verify_password(&form.current_password, &user.password).await? {
        return Err(ApiError::validation("current_password", "Wrong password"));
    }

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(hash_password(&form.new_password).await?)
        .bind(user.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Replaces the avatar; the previous file is removed once the row points at the new one.
pub async fn set_avatar(
    session: &SessionData,
    form: &AvatarForm,
    ctx: &Context,
) -> Result<AvatarView, ApiError> {
    let value = form
        .avatar
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::validation("avatar", "This field is required"))?;
    let image = decode_image("avatar", value)?;

    let user = require_user(session.user_id, &ctx.pool).await?;
    let path = ctx.images.save(AVATAR_IMAGE_FOLDER, image).await?;

    let updated = sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
        .bind(&path)
        .bind(user.id)
        .execute(&ctx.pool)
        .await;
    if let Err(e) = updated {
        ctx.images.delete(&path).await;
        return Err(QueryError::from(e).into());
    }

    if let Some(old) = user.avatar {
        ctx.images.delete(&old).await;
    }

    Ok(AvatarView {
        avatar: Some(ctx.images.url(&path)),
    })
}

pub async fn delete_avatar(session: &SessionData, ctx: &Context) -> Result<(), ApiError> {
    let user = require_user(session.user_id, &ctx.pool).await?;

    sqlx::query("UPDATE users SET avatar = NULL WHERE id = $1")
        .bind(user.id)
        .execute(&ctx.pool)
        .await
        .map_err(QueryError::from)?;

    if let Some(old) = user.avatar {
        ctx.images.delete(&old).await;
    }
    Ok(())
}
