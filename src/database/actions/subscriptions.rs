use crate::{
    actions::{
        ensure_page,
        recipes::{count_author_recipes, list_author_recipes},
        users::{require_user, user_view},
    },
    authentication::{jwt::SessionData, permissions::ActionType},
    context::Context,
    error::{ApiError, QueryError},
    form::QueryData,
    pagination::{PageContext, PageQuery},
    schema::{Id, SubscriptionRow, User},
    views::SubscriptionView,
};

use sqlx::{Pool, Postgres};

pub async fn is_subscribed(
    user_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE user_id = $1 AND author_id = $2)",
    )
    .bind(user_id)
    .bind(author_id)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row.0)
}

/// Author card plus up to `recipes_limit` of their recipes.
pub async fn subscription_view(
    author: &User,
    viewer: &SessionData,
    recipes_limit: Option<i64>,
    ctx: &Context,
) -> Result<SubscriptionView, ApiError> {
    let card = user_view(author, Some(viewer), ctx).await?;
    let recipes = list_author_recipes(author.id, recipes_limit, &ctx.pool).await?;
    let count = count_author_recipes(author.id, &ctx.pool).await?;

    Ok(SubscriptionView::new(card, &recipes, count, &ctx.images))
}

pub async fn subscribe(
    session: &SessionData,
    author_id: Id,
    recipes_limit: Option<i64>,
    ctx: &Context,
) -> Result<SubscriptionView, ApiError> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    if session.user_id == author_id {
        return Err(ApiError::Conflict(
            "You cannot subscribe to yourself".to_string(),
        ));
    }

    let author = require_user(author_id, &ctx.pool).await?;
    let inserted = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(author.id)
    .execute(&ctx.pool)
    .await
    .map_err(QueryError::from)?;

    if inserted.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "You are already subscribed to this user".to_string(),
        ));
    }

    log::trace!("> {} subscribed to {}", session.username, author.username);
    subscription_view(&author, session, recipes_limit, ctx).await
}

pub async fn unsubscribe(
    session: &SessionData,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    let author = require_user(author_id, pool).await?;

    let deleted = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(session.user_id)
        .bind(author.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Subscription"));
    }
    Ok(())
}

pub async fn fetch_subscriptions(
    session: &SessionData,
    page: PageQuery,
    recipes_limit: Option<i64>,
    base_url: &str,
    extra: &QueryData,
    ctx: &Context,
) -> Result<PageContext<SubscriptionView>, ApiError> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(
        "
        SELECT u.*, COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(session.user_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(&ctx.pool)
    .await
    .map_err(QueryError::from)?;

    ensure_page(&rows, page)?;
    let total = rows.first().map(|row| row.count).unwrap_or(0);

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        results.push(subscription_view(&row.author, session, recipes_limit, ctx).await?);
    }

    Ok(PageContext::from_rows(results, total, page, base_url, extra))
}
