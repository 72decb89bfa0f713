use serde::Deserialize;
use serde_json::json;
use sqlx::{Pool, Postgres};
use warp::{http::StatusCode, http::Uri, Rejection, Reply};

use crate::{
    actions,
    authentication::jwt::SessionData,
    authentication::permissions::ActionType,
    constants::{SESSION_COOKIE, SHOPPING_LIST_FILENAME},
    error::ApiError,
    pagination::PageContext,
    schema::{
        AvatarPayload, Id, LoginPayload, RecipeFilter, RecipePatchPayload, RecipePayload,
        RegisterPayload, SetPasswordPayload, SubscriptionEntry,
    },
};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RecipeListQuery {
    pub offset: Option<i64>,
    pub author: Option<Id>,
    /// Comma-separated tag slugs; matching any slug qualifies.
    pub tags: Option<String>,
    pub is_favorited: Option<u8>,
    pub is_in_shopping_cart: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    pub offset: Option<i64>,
    pub recipes_limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct IngredientQuery {
    pub name: Option<String>,
}

fn domain_name() -> String {
    std::env::var("DOMAIN_NAME").unwrap_or_else(|_| String::from("http://localhost:8080"))
}

// Reference data

pub async fn list_tags(pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let rows = actions::list_tags(&pool).await?;
    Ok(warp::reply::json(&rows))
}

pub async fn get_tag(id: Id, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    match actions::get_tag(id, &pool).await? {
        Some(tag) => Ok(warp::reply::json(&tag)),
        None => Err(ApiError::not_found("No tag exists with specified id").into()),
    }
}

pub async fn list_ingredients(
    query: IngredientQuery,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let rows = actions::list_ingredients(query.name, &pool).await?;
    Ok(warp::reply::json(&rows))
}

pub async fn get_ingredient(id: Id, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    match actions::get_ingredient(id, &pool).await? {
        Some(row) => Ok(warp::reply::json(&row)),
        None => Err(ApiError::not_found("No ingredient exists with specified id").into()),
    }
}

// Recipes

pub async fn list_recipes(
    query: RecipeListQuery,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.as_ref().map(|s| s.user_id);

    let mut filter = RecipeFilter {
        author: query.author,
        ..Default::default()
    };
    if let Some(tags) = &query.tags {
        filter.tag_slugs = tags
            .split(',')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    // relation filters only make sense for an authenticated viewer
    if query.is_favorited == Some(1) {
        filter.favorited_by = viewer;
    }
    if query.is_in_shopping_cart == Some(1) {
        filter.in_cart_of = viewer;
    }

    let page = actions::fetch_recipes(&filter, viewer, query.offset.unwrap_or(0), &pool).await?;
    Ok(warp::reply::json(&page))
}

pub async fn get_recipe(
    id: Id,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let recipe = match actions::get_recipe(id, &pool).await? {
        Some(recipe) => recipe,
        None => return Err(ApiError::not_found("No recipe exists with specified id").into()),
    };

    let viewer = session.as_ref().map(|s| s.user_id);
    let detail = actions::recipe_detail(recipe, viewer, &pool).await?;
    Ok(warp::reply::json(&detail))
}

pub async fn create_recipe(
    session: SessionData,
    payload: RecipePayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;

    let id = actions::create_recipe(session.user_id, &payload, &pool).await?;
    let recipe = match actions::get_recipe(id, &pool).await? {
        Some(recipe) => recipe,
        None => return Err(ApiError::Internal(String::from("Created recipe is missing")).into()),
    };

    let detail = actions::recipe_detail(recipe, Some(session.user_id), &pool).await?;
    Ok(warp::reply::with_status(
        warp::reply::json(&detail),
        StatusCode::CREATED,
    ))
}

pub async fn update_recipe(
    id: Id,
    session: SessionData,
    payload: RecipePatchPayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let recipe = actions::get_recipe_mut(id, &session, &pool).await?;
    actions::update_recipe(&recipe, &payload, &pool).await?;

    let recipe = match actions::get_recipe(id, &pool).await? {
        Some(recipe) => recipe,
        None => return Err(ApiError::Internal(String::from("Updated recipe is missing")).into()),
    };
    let detail = actions::recipe_detail(recipe, Some(session.user_id), &pool).await?;
    Ok(warp::reply::json(&detail))
}

pub async fn delete_recipe(
    id: Id,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let recipe = actions::get_recipe_mut(id, &session, &pool).await?;
    actions::delete_recipe(recipe.id, &pool).await?;
    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

pub async fn get_recipe_link(id: Id, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let recipe = match actions::get_recipe(id, &pool).await? {
        Some(recipe) => recipe,
        None => return Err(ApiError::not_found("No recipe exists with specified id").into()),
    };

    let link = format!("{}/s/{}", domain_name(), recipe.short_code);
    Ok(warp::reply::json(&json!({ "short-link": link })))
}

pub async fn resolve_short_link(
    code: String,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    match actions::get_recipe_by_short_code(&code, &pool).await? {
        Some(recipe) => {
            let uri: Uri = format!("/recipes/{}/", recipe.id)
                .parse()
                .map_err(|_| Rejection::from(ApiError::Internal(String::from("Bad redirect"))))?;
            Ok(warp::redirect::found(uri))
        }
        None => Err(ApiError::not_found("No recipe exists with specified short code").into()),
    }
}

// Favorites and shopping cart

async fn require_recipe(id: Id, pool: &Pool<Postgres>) -> Result<(), Rejection> {
    if actions::get_recipe(id, pool).await?.is_none() {
        return Err(ApiError::not_found("No recipe exists with specified id").into());
    }
    Ok(())
}

pub async fn add_favorite(
    id: Id,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnFavorites)?;
    require_recipe(id, &pool).await?;
    actions::add_to_favorites(id, session.user_id, &pool).await?;
    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::CREATED,
    ))
}

pub async fn remove_favorite(
    id: Id,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnFavorites)?;
    require_recipe(id, &pool).await?;
    actions::remove_from_favorites(id, session.user_id, &pool).await?;
    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

pub async fn add_to_cart(
    id: Id,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnCart)?;
    require_recipe(id, &pool).await?;
    actions::add_to_cart(id, session.user_id, &pool).await?;
    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::CREATED,
    ))
}

pub async fn remove_from_cart(
    id: Id,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnCart)?;
    require_recipe(id, &pool).await?;
    actions::remove_from_cart(id, session.user_id, &pool).await?;
    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

pub async fn download_shopping_cart(
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let items = actions::fetch_shopping_list(session.user_id, &pool).await?;
    let body = actions::render_shopping_list(&items);

    let reply = warp::reply::with_header(body, "Content-Type", "text/plain; charset=utf-8");
    let reply = warp::reply::with_header(
        reply,
        "Content-Disposition",
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    );
    Ok(reply)
}

// Users

pub async fn register_user(
    payload: RegisterPayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    if payload.email.trim().is_empty() || payload.username.trim().is_empty() {
        return Err(ApiError::validation("Email and username must not be empty").into());
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password must not be empty").into());
    }

    let id = actions::register_user(
        &payload.email,
        &payload.username,
        &payload.first_name,
        &payload.last_name,
        &payload.password,
        &pool,
    )
    .await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&json!({
            "id": id,
            "email": payload.email,
            "username": payload.username,
            "first_name": payload.first_name,
            "last_name": payload.last_name,
        })),
        StatusCode::CREATED,
    ))
}

pub async fn list_users(
    query: PageQuery,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.as_ref().map(|s| s.user_id);
    let page = actions::fetch_users(viewer, query.offset.unwrap_or(0), &pool).await?;
    Ok(warp::reply::json(&page))
}

pub async fn get_user(
    id: Id,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.as_ref().map(|s| s.user_id);
    match actions::get_user_profile(id, viewer, &pool).await? {
        Some(profile) => Ok(warp::reply::json(&profile)),
        None => Err(ApiError::not_found("No user exists with specified id").into()),
    }
}

pub async fn get_current_user(
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    match actions::get_user_profile(session.user_id, Some(session.user_id), &pool).await? {
        Some(profile) => Ok(warp::reply::json(&profile)),
        None => Err(ApiError::not_found("No user exists with specified id").into()),
    }
}

pub async fn set_password(
    session: SessionData,
    payload: SetPasswordPayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let current = match payload.current_password {
        Some(password) => password,
        None => return Err(ApiError::validation("current_password is required").into()),
    };
    let new = match payload.new_password {
        Some(password) if !password.is_empty() => password,
        _ => return Err(ApiError::validation("new_password is required").into()),
    };

    actions::set_password(session.user_id, &current, &new, &pool).await?;
    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

pub async fn set_avatar(
    session: SessionData,
    payload: AvatarPayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    if payload.avatar.trim().is_empty() {
        return Err(ApiError::validation("Avatar reference must not be empty").into());
    }

    actions::set_avatar(session.user_id, &payload.avatar, &pool).await?;
    Ok(warp::reply::json(&json!({ "avatar": payload.avatar })))
}

pub async fn clear_avatar(
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    actions::clear_avatar(session.user_id, &pool).await?;
    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

// Subscriptions

pub async fn list_subscriptions(
    query: SubscriptionQuery,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let page =
        actions::fetch_subscriptions(session.user_id, query.offset.unwrap_or(0), &pool).await?;

    let mut entries = Vec::with_capacity(page.rows.len());
    for row in &page.rows {
        let recipes = actions::list_author_recipes(row.id, query.recipes_limit, &pool).await?;
        let recipes_count = actions::count_author_recipes(row.id, &pool).await?;

        entries.push(SubscriptionEntry {
            id: row.id,
            email: row.email.clone(),
            username: row.username.clone(),
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            avatar: row.avatar.clone(),
            is_subscribed: row.is_subscribed,
            recipes,
            recipes_count,
        });
    }

    let page = PageContext {
        rows: entries,
        total_rows: page.total_rows,
        next_offset: page.next_offset,
        prev_offset: page.prev_offset,
        page_list: page.page_list,
        message: page.message,
    };
    Ok(warp::reply::json(&page))
}

pub async fn subscribe(
    id: Id,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    actions::subscribe(session.user_id, id, &pool).await?;

    let profile = match actions::get_user_profile(id, Some(session.user_id), &pool).await? {
        Some(profile) => profile,
        None => return Err(ApiError::not_found("No user exists with specified id").into()),
    };
    Ok(warp::reply::with_status(
        warp::reply::json(&profile),
        StatusCode::CREATED,
    ))
}

pub async fn unsubscribe(
    id: Id,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    actions::unsubscribe(session.user_id, id, &pool).await?;
    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

// Authentication

pub async fn login(payload: LoginPayload, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let token = actions::login_user(&payload.email, &payload.password, &pool).await?;

    let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly");
    Ok(warp::reply::with_header(
        warp::reply::json(&json!({ "auth_token": token })),
        "Set-Cookie",
        cookie,
    ))
}

pub async fn logout(_session: SessionData) -> Result<impl Reply, Rejection> {
    let cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0");
    Ok(warp::reply::with_header(
        warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT),
        "Set-Cookie",
        cookie,
    ))
}
