use crate::{
    actions::{
        begin_failed, commit_failed, ensure_page,
        ingredients::existing_ingredient_ids,
        links::create_short_link,
        marks::recipe_marks,
        tags::existing_tag_ids,
        users::{require_user, user_view},
    },
    authentication::{
        jwt::SessionData,
        permissions::{is_admin_author_or_read_only, ActionType},
    },
    context::Context,
    error::{ApiError, QueryError, ValidationErrors},
    form::{IngredientAmount, QueryData, RecipeFilter, RecipeForm},
    pagination::{PageContext, PageQuery},
    schema::{Id, Recipe, RecipePart, RecipeRow, Tag},
    storage::decode_image,
    validators::{missing_references, validate_recipe_form},
    views::RecipeView,
    MAX_VALUE, MIN_VALUE, RECIPE_IMAGE_FOLDER,
};

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};
use warp::http::Method;

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ApiError> {
    let recipe: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(recipe)
}

pub async fn require_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Recipe, ApiError> {
    get_recipe(id, pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipe"))
}

/// Fetches a recipe for `method`; unsafe methods need the author or an admin.
pub async fn get_recipe_mut(
    id: Id,
    method: &Method,
    session: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let recipe = require_recipe(id, pool).await?;
    is_admin_author_or_read_only(method, session, recipe.author_id)?;

    Ok(recipe)
}

pub async fn list_recipe_parts(
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipePart>, ApiError> {
    let parts: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT ri.recipe_id, ri.ingredient_id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY i.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(parts)
}

pub async fn list_recipe_tags(recipe_id: Id, pool: &Pool<Postgres>) -> Result<Vec<Tag>, ApiError> {
    let tags: Vec<Tag> = sqlx::query_as(
        "SELECT t.* FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = $1 ORDER BY t.name",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(tags)
}

/// Newest first; `None` lists all of them.
pub async fn list_author_recipes(
    author_id: Id,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, ApiError> {
    let recipes: Vec<Recipe> =
        sqlx::query_as("SELECT * FROM recipes WHERE author_id = $1 ORDER BY id DESC LIMIT $2")
            .bind(author_id)
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(recipes)
}

pub async fn count_author_recipes(author_id: Id, pool: &Pool<Postgres>) -> Result<i64, ApiError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(count.0)
}

pub async fn recipe_view(
    recipe: Recipe,
    viewer: Option<&SessionData>,
    ctx: &Context,
) -> Result<RecipeView, ApiError> {
    let author = require_user(recipe.author_id, &ctx.pool).await?;
    let author = user_view(&author, viewer, ctx).await?;
    let tags = list_recipe_tags(recipe.id, &ctx.pool).await?;
    let parts = list_recipe_parts(recipe.id, &ctx.pool).await?;
    let marks = recipe_marks(viewer, recipe.id, &ctx.pool).await?;

    Ok(RecipeView::new(recipe, author, tags, parts, marks, &ctx.images))
}

pub async fn get_recipe_view(
    id: Id,
    viewer: Option<&SessionData>,
    ctx: &Context,
) -> Result<RecipeView, ApiError> {
    let recipe = require_recipe(id, &ctx.pool).await?;
    recipe_view(recipe, viewer, ctx).await
}

/// Filters on favorites and cart only apply to a signed-in viewer.
fn filtered_query<'a>(
    filter: &'a RecipeFilter,
    viewer: Option<&SessionData>,
    page: PageQuery,
) -> QueryBuilder<'a, Postgres> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query
            .push(" AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(")
            .push_bind(&filter.tags)
            .push("))");
    }
    if let Some(session) = viewer {
        if filter.is_favorited {
            query
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(session.user_id)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query
                .push(" AND EXISTS (SELECT 1 FROM shopping_carts c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(session.user_id)
                .push(")");
        }
    }

    query
        .push(" ORDER BY r.name, r.id LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    query
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<&SessionData>,
    page: PageQuery,
    base_url: &str,
    extra: &QueryData,
    ctx: &Context,
) -> Result<PageContext<RecipeView>, ApiError> {
    let mut query = filtered_query(filter, viewer, page);
    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(&ctx.pool)
        .await
        .map_err(QueryError::from)?;

    ensure_page(&rows, page)?;
    let total = rows.first().map(|row| row.count).unwrap_or(0);

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        results.push(recipe_view(row.recipe, viewer, ctx).await?);
    }

    Ok(PageContext::from_rows(results, total, page, base_url, extra))
}

/// Tags and ingredients must all exist before anything is written.
async fn check_references(form: &RecipeForm, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    let mut errors = ValidationErrors::new();

    let ingredient_ids = form.ingredient_ids();
    let existing = existing_ingredient_ids(&ingredient_ids, pool).await?;
    for id in missing_references(&ingredient_ids, &existing) {
        errors.add("ingredients", format!("Ingredient {id} does not exist"));
    }

    let existing = existing_tag_ids(&form.tags, pool).await?;
    for id in missing_references(&form.tags, &existing) {
        errors.add("tags", format!("Tag {id} does not exist"));
    }

    errors.into_result()
}

fn bounded(value: i64) -> i32 {
    value.clamp(MIN_VALUE, MAX_VALUE) as i32
}

async fn insert_recipe_parts(
    recipe_id: Id,
    items: &[IngredientAmount],
    conn: &mut PgConnection,
) -> Result<(), ApiError> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query.push_values(items, |mut row, item| {
        row.push_bind(recipe_id)
            .push_bind(item.id)
            .push_bind(bounded(item.amount));
    });

    query
        .build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;
    Ok(())
}

async fn insert_recipe_tags(
    recipe_id: Id,
    tags: &[Id],
    conn: &mut PgConnection,
) -> Result<(), ApiError> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query.push_values(tags, |mut row, tag| {
        row.push_bind(recipe_id).push_bind(*tag);
    });

    query
        .build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;
    Ok(())
}

async fn insert_recipe(
    session: &SessionData,
    form: &RecipeForm,
    image: &str,
    ctx: &Context,
) -> Result<Recipe, ApiError> {
    let mut tr = ctx.pool.begin().await.map_err(begin_failed)?;

    let recipe: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *;
    ",
    )
    .bind(session.user_id)
    .bind(form.name.trim())
    .bind(&form.text)
    .bind(image)
    .bind(bounded(form.cooking_time.unwrap_or(MIN_VALUE)))
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    insert_recipe_parts(recipe.id, &form.ingredients, &mut *tr).await?;
    insert_recipe_tags(recipe.id, &form.tags, &mut *tr).await?;
    create_short_link(recipe.id, &ctx.config, &mut *tr).await?;

    tr.commit().await.map_err(commit_failed)?;
    Ok(recipe)
}

/// Creates a recipe with its ingredients, tags and short link in one transaction.
/// The image is written first and removed again if the transaction fails.
pub async fn create_recipe(
    session: &SessionData,
    form: &RecipeForm,
    ctx: &Context,
) -> Result<RecipeView, ApiError> {
    session.authenticate(ActionType::CreateRecipes)?;
    validate_recipe_form(form, true).into_result()?;
    check_references(form, &ctx.pool).await?;

    let image = decode_image("image", form.image.as_deref().unwrap_or_default())?;
    let image = ctx.images.save(RECIPE_IMAGE_FOLDER, image).await?;

    let recipe = match insert_recipe(session, form, &image, ctx).await {
        Ok(recipe) => recipe,
        Err(e) => {
            ctx.images.delete(&image).await;
            return Err(e);
        }
    };

    log::info!("{} created recipe {} ({})", session.username, recipe.name, recipe.id);
    recipe_view(recipe, Some(session), ctx).await
}

async fn replace_recipe(
    id: Id,
    form: &RecipeForm,
    image: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let mut tr = pool.begin().await.map_err(begin_failed)?;

    let recipe: Recipe = sqlx::query_as(
        "
        UPDATE recipes
        SET name = $2, text = $3, cooking_time = $4, image = COALESCE($5, image)
        WHERE id = $1
        RETURNING *;
    ",
    )
    .bind(id)
    .bind(form.name.trim())
    .bind(&form.text)
    .bind(bounded(form.cooking_time.unwrap_or(MIN_VALUE)))
    .bind(image)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;
    insert_recipe_parts(id, &form.ingredients, &mut *tr).await?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;
    insert_recipe_tags(id, &form.tags, &mut *tr).await?;

    tr.commit().await.map_err(commit_failed)?;
    Ok(recipe)
}

/// Replaces fields, tags and ingredients. The image is only replaced when a new one is sent.
pub async fn update_recipe(
    id: Id,
    session: &SessionData,
    form: &RecipeForm,
    ctx: &Context,
) -> Result<RecipeView, ApiError> {
    let current = get_recipe_mut(id, &Method::PATCH, Some(session), &ctx.pool).await?;
    validate_recipe_form(form, false).into_result()?;
    check_references(form, &ctx.pool).await?;

    let new_image = match form.image.as_deref().filter(|image| !image.trim().is_empty()) {
        Some(value) => {
            let image = decode_image("image", value)?;
            Some(ctx.images.save(RECIPE_IMAGE_FOLDER, image).await?)
        }
        None => None,
    };

    let recipe = match replace_recipe(current.id, form, new_image.as_deref(), &ctx.pool).await {
        Ok(recipe) => recipe,
        Err(e) => {
            if let Some(path) = &new_image {
                ctx.images.delete(path).await;
            }
            return Err(e);
        }
    };

    if new_image.is_some() {
        ctx.images.delete(&current.image).await;
    }

    log::info!("{} updated recipe {}", session.username, recipe.id);
    recipe_view(recipe, Some(session), ctx).await
}

pub async fn delete_recipe(id: Id, session: &SessionData, ctx: &Context) -> Result<(), ApiError> {
    let recipe = get_recipe_mut(id, &Method::DELETE, Some(session), &ctx.pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(&ctx.pool)
        .await
        .map_err(QueryError::from)?;

    ctx.images.delete(&recipe.image).await;
    log::info!("{} deleted recipe {}", session.username, recipe.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actions::{
            fixtures,
            links::{get_recipe_link, resolve_short_link},
        },
        schema::UserRole,
    };
    use sqlx::PgPool;

    fn session() -> SessionData {
        SessionData {
            user_id: 4,
            username: "cook".to_string(),
            role: UserRole::User,
        }
    }

    #[test]
    fn anonymous_filters_are_ignored() {
        let filter = RecipeFilter {
            tags: vec![],
            author: None,
            is_favorited: true,
            is_in_shopping_cart: true,
        };
        let page = PageQuery { page: 1, limit: 6 };

        let sql = filtered_query(&filter, None, page).into_sql();
        assert!(!sql.contains("favorites"));
        assert!(!sql.contains("shopping_carts"));

        let sql = filtered_query(&filter, Some(&session()), page).into_sql();
        assert!(sql.contains("favorites f"));
        assert!(sql.contains("shopping_carts c"));
    }

    #[test]
    fn tag_and_author_filters_bind_parameters() {
        let filter = RecipeFilter {
            tags: vec!["lunch".to_string(), "dinner".to_string()],
            author: Some(3),
            is_favorited: false,
            is_in_shopping_cart: false,
        };

        let sql = filtered_query(&filter, None, PageQuery { page: 2, limit: 6 }).into_sql();
        assert!(sql.contains("r.author_id = $1"));
        assert!(sql.contains("t.slug = ANY($2)"));
        assert!(sql.ends_with("LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn amounts_are_kept_in_range() {
        assert_eq!(bounded(5), 5);
        assert_eq!(bounded(0), MIN_VALUE as i32);
        assert_eq!(bounded(i64::MAX), MAX_VALUE as i32);
    }

    async fn count(table: &str, pool: &PgPool) -> i64 {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .unwrap();
        row.0
    }

    fn tag_ids(view: &RecipeView) -> Vec<Id> {
        let mut ids: Vec<Id> = view.tags.iter().map(|tag| tag.id).collect();
        ids.sort_unstable();
        ids
    }

    fn amounts(view: &RecipeView) -> Vec<(Id, i32)> {
        view.ingredients.iter().map(|part| (part.id, part.amount)).collect()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn created_recipe_reads_back(pool: PgPool) {
        let (ctx, _media) = fixtures::context(pool.clone());
        let cook = fixtures::user("cook", &pool).await;
        let lunch = fixtures::tag("lunch", "#49B64E", &pool).await;
        let dinner = fixtures::tag("dinner", "#8775D2", &pool).await;
        let eggs = fixtures::ingredient("eggs", "pcs", &pool).await;
        let flour = fixtures::ingredient("flour", "g", &pool).await;

        let form = fixtures::recipe_form("Pancakes", &[dinner, lunch], &[(flour, 200), (eggs, 2)]);
        let created = create_recipe(&cook, &form, &ctx).await.unwrap();
        let fetched = get_recipe_view(created.id, None, &ctx).await.unwrap();

        let mut expected = vec![lunch, dinner];
        expected.sort_unstable();
        assert_eq!(tag_ids(&fetched), expected);
        assert_eq!(amounts(&fetched), vec![(eggs, 2), (flour, 200)]);
        assert_eq!(fetched.author.id, cook.user_id);
        assert_eq!(fetched.name, "Pancakes");
        assert_eq!(fetched.cooking_time, 15);
        assert_eq!(fetched.image, created.image);
        assert!(!fetched.is_favorited);

        let link = get_recipe_link(created.id, &ctx).await.unwrap();
        let token = link.short_link.trim_end_matches('/').rsplit('/').next().unwrap();
        assert_eq!(
            resolve_short_link(token, &pool).await.unwrap(),
            ctx.config.recipe_url(created.id)
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_replaces_tags_and_ingredients(pool: PgPool) {
        let (ctx, _media) = fixtures::context(pool.clone());
        let cook = fixtures::user("cook", &pool).await;
        let lunch = fixtures::tag("lunch", "#49B64E", &pool).await;
        let dinner = fixtures::tag("dinner", "#8775D2", &pool).await;
        let eggs = fixtures::ingredient("eggs", "pcs", &pool).await;
        let flour = fixtures::ingredient("flour", "g", &pool).await;

        let form = fixtures::recipe_form("Pancakes", &[lunch], &[(eggs, 2)]);
        let created = create_recipe(&cook, &form, &ctx).await.unwrap();

        let mut form = fixtures::recipe_form("Bread", &[dinner], &[(flour, 500)]);
        form.image = None;
        let updated = update_recipe(created.id, &cook, &form, &ctx).await.unwrap();

        assert_eq!(updated.name, "Bread");
        assert_eq!(tag_ids(&updated), vec![dinner]);
        assert_eq!(amounts(&updated), vec![(flour, 500)]);
        assert_eq!(updated.image, created.image);
        assert_eq!(count("recipe_ingredients", &pool).await, 1);
        assert_eq!(count("recipe_tags", &pool).await, 1);

        let stranger = fixtures::user("stranger", &pool).await;
        assert!(matches!(
            update_recipe(created.id, &stranger, &form, &ctx).await,
            Err(ApiError::Forbidden(_))
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn failed_writes_are_rolled_back(pool: PgPool) {
        let (ctx, media) = fixtures::context(pool.clone());
        let cook = fixtures::user("cook", &pool).await;
        let lunch = fixtures::tag("lunch", "#49B64E", &pool).await;
        let eggs = fixtures::ingredient("eggs", "pcs", &pool).await;
        let missing = eggs + 1000;

        let form = fixtures::recipe_form("Ghost", &[lunch], &[(missing, 1)]);
        assert!(matches!(
            create_recipe(&cook, &form, &ctx).await,
            Err(ApiError::Validation(_))
        ));
        assert!(std::fs::read_dir(media.path()).unwrap().next().is_none());

        // the foreign key only fails after the recipe row is written
        assert!(insert_recipe(&cook, &form, "recipes/ghost.png", &ctx).await.is_err());
        assert_eq!(count("recipes", &pool).await, 0);
        assert_eq!(count("recipe_tags", &pool).await, 0);
        assert_eq!(count("short_links", &pool).await, 0);

        let good = fixtures::recipe_form("Omelette", &[lunch], &[(eggs, 3)]);
        let created = create_recipe(&cook, &good, &ctx).await.unwrap();
        assert!(replace_recipe(created.id, &form, None, &pool).await.is_err());

        let fetched = get_recipe_view(created.id, None, &ctx).await.unwrap();
        assert_eq!(fetched.name, "Omelette");
        assert_eq!(amounts(&fetched), vec![(eggs, 3)]);
        assert_eq!(tag_ids(&fetched), vec![lunch]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn only_the_author_deletes(pool: PgPool) {
        let (ctx, media) = fixtures::context(pool.clone());
        let cook = fixtures::user("cook", &pool).await;
        let stranger = fixtures::user("stranger", &pool).await;
        let lunch = fixtures::tag("lunch", "#49B64E", &pool).await;
        let eggs = fixtures::ingredient("eggs", "pcs", &pool).await;

        let form = fixtures::recipe_form("Omelette", &[lunch], &[(eggs, 3)]);
        let created = create_recipe(&cook, &form, &ctx).await.unwrap();
        let stored = media.path().join(require_recipe(created.id, &pool).await.unwrap().image);
        assert!(stored.exists());

        assert!(matches!(
            delete_recipe(created.id, &stranger, &ctx).await,
            Err(ApiError::Forbidden(_))
        ));
        delete_recipe(created.id, &cook, &ctx).await.unwrap();

        assert!(matches!(
            require_recipe(created.id, &pool).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(!stored.exists());
        assert_eq!(count("short_links", &pool).await, 0);
    }
}
