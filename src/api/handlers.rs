use warp::{
    http::{header::CONTENT_DISPOSITION, StatusCode, Uri},
    path::FullPath,
    reply, Rejection, Reply,
};

use crate::{
    actions::{
        carts::download_shopping_list,
        ingredients::{get_ingredient, list_ingredients},
        links::{get_recipe_link, resolve_short_link},
        marks::{add_mark, remove_mark, RecipeMark},
        recipes::{create_recipe, delete_recipe, fetch_recipes, get_recipe_view, update_recipe},
        subscriptions::{fetch_subscriptions, subscribe, unsubscribe},
        tags::{get_tag, list_tags},
        users::{
            create_user, delete_avatar, fetch_users, get_user_view, login_user, set_avatar,
            set_password,
        },
    },
    context::Context,
    error::ApiError,
    form::{
        AvatarForm, Form, LoginForm, QueryData, RecipeFilter, RecipeForm, RegisterForm,
        SetPasswordForm,
    },
    jwt::SessionData,
    pagination::PageQuery,
    schema::Id,
    RECIPE_COUNT_PER_PAGE, SHOPPING_LIST_FILENAME, USER_COUNT_PER_PAGE,
};

fn page_url(ctx: &Context, path: &FullPath) -> String {
    format!("{}{}", ctx.config.site_url, path.as_str())
}

fn no_content() -> reply::WithStatus<&'static str> {
    reply::with_status("", StatusCode::NO_CONTENT)
}

// auth

pub async fn login(form: LoginForm, ctx: Context) -> Result<impl Reply, Rejection> {
    let token = login_user(&form, &ctx).await?;
    Ok(reply::json(&token))
}

/// Tokens are stateless; logging out only requires a valid one.
pub async fn logout(session: SessionData) -> Result<impl Reply, Rejection> {
    log::trace!("> {} logged out", session.username);
    Ok(no_content())
}

// users

pub async fn list_users(
    query: QueryData,
    path: FullPath,
    viewer: Option<SessionData>,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    let form = Form::from_data(query);
    let page = PageQuery::from_form(&form, USER_COUNT_PER_PAGE);
    let extra = form.without(&["page", "limit"]);

    let users = fetch_users(viewer.as_ref(), page, &page_url(&ctx, &path), &extra, &ctx).await?;
    Ok(reply::json(&users))
}

pub async fn register(form: RegisterForm, ctx: Context) -> Result<impl Reply, Rejection> {
    let user = create_user(&form, &ctx.pool).await?;
    Ok(reply::with_status(reply::json(&user), StatusCode::CREATED))
}

pub async fn get_user(
    id: Id,
    viewer: Option<SessionData>,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    let user = get_user_view(id, viewer.as_ref(), &ctx).await?;
    Ok(reply::json(&user))
}

pub async fn me(session: SessionData, ctx: Context) -> Result<impl Reply, Rejection> {
    let user = get_user_view(session.user_id, Some(&session), &ctx).await?;
    Ok(reply::json(&user))
}

pub async fn change_password(
    session: SessionData,
    form: SetPasswordForm,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    set_password(&session, &form, &ctx.pool).await?;
    Ok(no_content())
}

pub async fn put_avatar(
    session: SessionData,
    form: AvatarForm,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    let avatar = set_avatar(&session, &form, &ctx).await?;
    Ok(reply::json(&avatar))
}

pub async fn remove_avatar(session: SessionData, ctx: Context) -> Result<impl Reply, Rejection> {
    delete_avatar(&session, &ctx).await?;
    Ok(no_content())
}

pub async fn list_subscriptions(
    query: QueryData,
    path: FullPath,
    session: SessionData,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    let form = Form::from_data(query);
    let page = PageQuery::from_form(&form, USER_COUNT_PER_PAGE);
    let extra = form.without(&["page", "limit"]);

    let authors = fetch_subscriptions(
        &session,
        page,
        form.recipes_limit(),
        &page_url(&ctx, &path),
        &extra,
        &ctx,
    )
    .await?;
    Ok(reply::json(&authors))
}

pub async fn add_subscription(
    author_id: Id,
    query: QueryData,
    session: SessionData,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    let form = Form::from_data(query);
    let author = subscribe(&session, author_id, form.recipes_limit(), &ctx).await?;
    Ok(reply::with_status(reply::json(&author), StatusCode::CREATED))
}

pub async fn remove_subscription(
    author_id: Id,
    session: SessionData,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    unsubscribe(&session, author_id, &ctx.pool).await?;
    Ok(no_content())
}

// tags & ingredients

pub async fn tags(ctx: Context) -> Result<impl Reply, Rejection> {
    let tags = list_tags(&ctx.pool).await?;
    Ok(reply::json(&tags))
}

pub async fn tag(id: Id, ctx: Context) -> Result<impl Reply, Rejection> {
    let tag = get_tag(id, &ctx.pool).await?;
    Ok(reply::json(&tag))
}

pub async fn ingredients(query: QueryData, ctx: Context) -> Result<impl Reply, Rejection> {
    let form = Form::from_data(query);
    let ingredients = list_ingredients(form.get_str("name"), &ctx.pool).await?;
    Ok(reply::json(&ingredients))
}

pub async fn ingredient(id: Id, ctx: Context) -> Result<impl Reply, Rejection> {
    let ingredient = get_ingredient(id, &ctx.pool).await?;
    Ok(reply::json(&ingredient))
}

// recipes

pub async fn list_recipes(
    query: QueryData,
    path: FullPath,
    viewer: Option<SessionData>,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    let form = Form::from_data(query);
    let filter = RecipeFilter::from_form(&form);
    let page = PageQuery::from_form(&form, RECIPE_COUNT_PER_PAGE);
    let extra = form.without(&["page", "limit"]);

    let recipes = fetch_recipes(
        &filter,
        viewer.as_ref(),
        page,
        &page_url(&ctx, &path),
        &extra,
        &ctx,
    )
    .await?;
    Ok(reply::json(&recipes))
}

pub async fn new_recipe(
    session: SessionData,
    form: RecipeForm,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    let recipe = create_recipe(&session, &form, &ctx).await?;
    Ok(reply::with_status(reply::json(&recipe), StatusCode::CREATED))
}

pub async fn get_recipe(
    id: Id,
    viewer: Option<SessionData>,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    let recipe = get_recipe_view(id, viewer.as_ref(), &ctx).await?;
    Ok(reply::json(&recipe))
}

pub async fn patch_recipe(
    id: Id,
    session: SessionData,
    form: RecipeForm,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    let recipe = update_recipe(id, &session, &form, &ctx).await?;
    Ok(reply::json(&recipe))
}

pub async fn remove_recipe(
    id: Id,
    session: SessionData,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    delete_recipe(id, &session, &ctx).await?;
    Ok(no_content())
}

pub async fn recipe_link(id: Id, ctx: Context) -> Result<impl Reply, Rejection> {
    let link = get_recipe_link(id, &ctx).await?;
    Ok(reply::json(&link))
}

pub async fn mark_recipe(
    id: Id,
    mark: RecipeMark,
    session: SessionData,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    let recipe = add_mark(mark, &session, id, &ctx).await?;
    Ok(reply::with_status(reply::json(&recipe), StatusCode::CREATED))
}

pub async fn unmark_recipe(
    id: Id,
    mark: RecipeMark,
    session: SessionData,
    ctx: Context,
) -> Result<impl Reply, Rejection> {
    remove_mark(mark, &session, id, &ctx.pool).await?;
    Ok(no_content())
}

pub async fn download_cart(session: SessionData, ctx: Context) -> Result<impl Reply, Rejection> {
    let text = download_shopping_list(&session, &ctx.pool).await?;

    Ok(reply::with_header(
        text,
        CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    ))
}

// short links

pub async fn follow_short_link(token: String, ctx: Context) -> Result<impl Reply, Rejection> {
    let target = resolve_short_link(&token, &ctx.pool).await?;
    let uri: Uri = target.parse().map_err(|e| {
        log::error!("Stored link {target} is not a valid URI: {e}");
        ApiError::Internal("Invalid redirect target".to_string())
    })?;

    Ok(warp::redirect::found(uri))
}
