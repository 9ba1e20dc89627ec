use std::convert::Infallible;

use serde::de::DeserializeOwned;
use warp::{Filter, Rejection, Reply};

use super::{handlers, rejection::handle_rejection};
use crate::{
    actions::marks::RecipeMark,
    context::Context,
    form::QueryData,
    middleware::{with_possible_session, with_session},
    schema::Id,
    MAX_BODY_SIZE,
};

pub fn with_context(ctx: Context) -> impl Filter<Extract = (Context,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
{
    warp::body::content_length_limit(MAX_BODY_SIZE).and(warp::body::json())
}

fn query() -> impl Filter<Extract = (QueryData,), Error = Rejection> + Clone {
    warp::query::<QueryData>()
}

fn with_mark(mark: RecipeMark) -> impl Filter<Extract = (RecipeMark,), Error = Infallible> + Clone {
    warp::any().map(move || mark)
}

fn auth_routes(ctx: &Context) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let login = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(handlers::login);

    let logout = warp::path!("api" / "auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(ctx.config.clone()))
        .and_then(handlers::logout);

    login.or(logout)
}

fn user_routes(ctx: &Context) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let session = || with_session(ctx.config.clone());
    let context = || with_context(ctx.clone());

    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(query())
        .and(warp::path::full())
        .and(with_possible_session(ctx.config.clone()))
        .and(context())
        .and_then(handlers::list_users);

    let register = warp::path!("api" / "users")
        .and(warp::post())
        .and(json_body())
        .and(context())
        .and_then(handlers::register);

    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(session())
        .and(context())
        .and_then(handlers::me);

    let set_password = warp::path!("api" / "users" / "set_password")
        .and(warp::post())
        .and(session())
        .and(json_body())
        .and(context())
        .and_then(handlers::change_password);

    let put_avatar = warp::path!("api" / "users" / "me" / "avatar")
        .and(warp::put())
        .and(session())
        .and(json_body())
        .and(context())
        .and_then(handlers::put_avatar);

    let delete_avatar = warp::path!("api" / "users" / "me" / "avatar")
        .and(warp::delete())
        .and(session())
        .and(context())
        .and_then(handlers::remove_avatar);

    let subscriptions = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(query())
        .and(warp::path::full())
        .and(session())
        .and(context())
        .and_then(handlers::list_subscriptions);

    let subscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::post())
        .and(query())
        .and(session())
        .and(context())
        .and_then(handlers::add_subscription);

    let unsubscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::delete())
        .and(session())
        .and(context())
        .and_then(handlers::remove_subscription);

    let detail = warp::path!("api" / "users" / Id)
        .and(warp::get())
        .and(with_possible_session(ctx.config.clone()))
        .and(context())
        .and_then(handlers::get_user);

    list.or(register)
        .or(me)
        .or(set_password)
        .or(put_avatar)
        .or(delete_avatar)
        .or(subscriptions)
        .or(subscribe)
        .or(unsubscribe)
        .or(detail)
}

fn catalog_routes(ctx: &Context) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let context = || with_context(ctx.clone());

    let tags = warp::path!("api" / "tags")
        .and(warp::get())
        .and(context())
        .and_then(handlers::tags);

    let tag = warp::path!("api" / "tags" / Id)
        .and(warp::get())
        .and(context())
        .and_then(handlers::tag);

    let ingredients = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(query())
        .and(context())
        .and_then(handlers::ingredients);

    let ingredient = warp::path!("api" / "ingredients" / Id)
        .and(warp::get())
        .and(context())
        .and_then(handlers::ingredient);

    tags.or(tag).or(ingredients).or(ingredient)
}

fn mark_routes(
    ctx: &Context,
    segment: &'static str,
    mark: RecipeMark,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let add = warp::path("api")
        .and(warp::path("recipes"))
        .and(warp::path::param::<Id>())
        .and(warp::path(segment))
        .and(warp::path::end())
        .and(warp::post())
        .and(with_mark(mark))
        .and(with_session(ctx.config.clone()))
        .and(with_context(ctx.clone()))
        .and_then(handlers::mark_recipe);

    let remove = warp::path("api")
        .and(warp::path("recipes"))
        .and(warp::path::param::<Id>())
        .and(warp::path(segment))
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_mark(mark))
        .and(with_session(ctx.config.clone()))
        .and(with_context(ctx.clone()))
        .and_then(handlers::unmark_recipe);

    add.or(remove)
}

fn recipe_routes(ctx: &Context) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let session = || with_session(ctx.config.clone());
    let context = || with_context(ctx.clone());

    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(query())
        .and(warp::path::full())
        .and(with_possible_session(ctx.config.clone()))
        .and(context())
        .and_then(handlers::list_recipes);

    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(session())
        .and(json_body())
        .and(context())
        .and_then(handlers::new_recipe);

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(session())
        .and(context())
        .and_then(handlers::download_cart);

    let detail = warp::path!("api" / "recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(ctx.config.clone()))
        .and(context())
        .and_then(handlers::get_recipe);

    let update = warp::path!("api" / "recipes" / Id)
        .and(warp::patch())
        .and(session())
        .and(json_body())
        .and(context())
        .and_then(handlers::patch_recipe);

    let delete = warp::path!("api" / "recipes" / Id)
        .and(warp::delete())
        .and(session())
        .and(context())
        .and_then(handlers::remove_recipe);

    let link = warp::path!("api" / "recipes" / Id / "get-link")
        .and(warp::get())
        .and(context())
        .and_then(handlers::recipe_link);

    list.or(create)
        .or(download)
        .or(detail)
        .or(update)
        .or(delete)
        .or(link)
        .or(mark_routes(ctx, "favorite", RecipeMark::Favorite))
        .or(mark_routes(ctx, "shopping_cart", RecipeMark::ShoppingCart))
}

/// Every route of the service, with errors rendered and requests logged.
pub fn routes(ctx: Context) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let short_links = warp::path!("s" / String)
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(handlers::follow_short_link);

    let media = warp::path("media").and(warp::fs::dir(ctx.config.media_root.clone()));

    auth_routes(&ctx)
        .or(user_routes(&ctx))
        .or(catalog_routes(&ctx))
        .or(recipe_routes(&ctx))
        .or(short_links)
        .or(media)
        .recover(handle_rejection)
        .with(warp::log("foodgram::api"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        jwt::generate_jwt_session,
        schema::{User, UserRole},
    };
    use serde_json::{json, Value};
    use warp::http::StatusCode;

    fn context() -> Context {
        Context::lazy(Config::development()).unwrap()
    }

    fn token(ctx: &Context, id: Id) -> String {
        let user = User {
            id,
            email: format!("user{id}@example.com"),
            username: format!("user{id}"),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            password: String::new(),
            role: UserRole::User,
            avatar: None,
        };
        format!("Token {}", generate_jwt_session(&user, &ctx.config).unwrap())
    }

    fn body(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn writes_need_a_token() {
        let ctx = context();
        let api = routes(ctx);

        for (method, path) in [
            ("POST", "/api/recipes/"),
            ("GET", "/api/users/me/"),
            ("GET", "/api/users/subscriptions/"),
            ("POST", "/api/recipes/1/favorite/"),
            ("DELETE", "/api/recipes/1/shopping_cart/"),
            ("GET", "/api/recipes/download_shopping_cart/"),
            ("POST", "/api/auth/token/logout/"),
        ] {
            let res = warp::test::request()
                .method(method)
                .path(path)
                .reply(&api)
                .await;

            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{method} {path}");
        }
    }

    #[tokio::test]
    async fn bad_tokens_are_rejected() {
        let api = routes(context());

        let res = warp::test::request()
            .method("GET")
            .path("/api/users/me/")
            .header("authorization", "Token not-a-jwt")
            .reply(&api)
            .await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_accepts_a_valid_token() {
        let ctx = context();
        let auth = token(&ctx, 3);
        let api = routes(ctx);

        let res = warp::test::request()
            .method("POST")
            .path("/api/auth/token/logout/")
            .header("authorization", auth)
            .reply(&api)
            .await;

        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn subscribing_to_yourself_is_refused() {
        let ctx = context();
        let auth = token(&ctx, 7);
        let api = routes(ctx);

        let res = warp::test::request()
            .method("POST")
            .path("/api/users/7/subscribe/")
            .header("authorization", auth)
            .reply(&api)
            .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body(res.body()),
            json!({ "detail": "You cannot subscribe to yourself" })
        );
    }

    #[tokio::test]
    async fn recipe_without_tags_or_ingredients_is_invalid() {
        let ctx = context();
        let auth = token(&ctx, 2);
        let api = routes(ctx);

        let res = warp::test::request()
            .method("POST")
            .path("/api/recipes/")
            .header("authorization", auth)
            .json(&json!({
                "ingredients": [],
                "tags": [],
                "name": "Toast",
                "text": "Toast the bread",
                "cooking_time": 3,
                "image": "data:image/png;base64,AAAA",
            }))
            .reply(&api)
            .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let errors = body(res.body());
        assert!(errors.get("tags").is_some());
        assert!(errors.get("ingredients").is_some());
    }

    #[tokio::test]
    async fn duplicate_tags_are_invalid() {
        let ctx = context();
        let auth = token(&ctx, 2);
        let api = routes(ctx);

        let res = warp::test::request()
            .method("POST")
            .path("/api/recipes")
            .header("authorization", auth)
            .json(&json!({
                "ingredients": [{ "id": 1, "amount": 2 }, { "id": 1, "amount": 3 }],
                "tags": [1, 1],
                "name": "Toast",
                "text": "Toast the bread",
                "cooking_time": 3,
                "image": "data:image/png;base64,AAAA",
            }))
            .reply(&api)
            .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body(res.body()),
            json!({
                "ingredients": ["Ingredients must be unique"],
                "tags": ["Tags must be unique"],
            })
        );
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let api = routes(context());

        let res = warp::test::request()
            .method("POST")
            .path("/api/auth/token/login/")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&api)
            .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_paths_are_404() {
        let api = routes(context());

        let res = warp::test::request()
            .method("GET")
            .path("/api/nothing-here/")
            .reply(&api)
            .await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(res.body()), json!({ "detail": "Not found" }));
    }

    #[tokio::test]
    async fn registration_is_validated_before_lookup() {
        let api = routes(context());

        let res = warp::test::request()
            .method("POST")
            .path("/api/users/")
            .json(&json!({
                "email": "broken",
                "username": "me",
                "first_name": "A",
                "last_name": "B",
                "password": "secret",
            }))
            .reply(&api)
            .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let errors = body(res.body());
        assert!(errors.get("email").is_some());
        assert!(errors.get("username").is_some());
    }
}
