use std::convert::Infallible;

use serde::de::DeserializeOwned;
use sqlx::{Pool, Postgres};
use warp::{Filter, Rejection, Reply};

use crate::authentication::middleware::{with_possible_session, with_session};

use super::handlers;
use super::rejection::handle_rejection;

fn with_pool(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (Pool<Postgres>,), Error = Infallible> + Clone {
    warp::any().map(move || pool.clone())
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
{
    warp::body::content_length_limit(1024 * 64).and(warp::body::json())
}

/// The complete route tree: the JSON API under `/api` plus the public
/// short-link resolver under `/s`.
pub fn routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let api = warp::path("api").and(
        reference_routes(pool.clone())
            .or(recipe_routes(pool.clone()))
            .or(user_routes(pool.clone()))
            .or(auth_routes(pool.clone())),
    );

    let short_link = warp::path!("s" / String)
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(handlers::resolve_short_link);

    api.or(short_link).recover(handle_rejection)
}

fn reference_routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let list_tags = warp::path!("tags")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(handlers::list_tags);

    let get_tag = warp::path!("tags" / i32)
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_tag);

    let list_ingredients = warp::path!("ingredients")
        .and(warp::get())
        .and(warp::query())
        .and(with_pool(pool.clone()))
        .and_then(handlers::list_ingredients);

    let get_ingredient = warp::path!("ingredients" / i32)
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(handlers::get_ingredient);

    list_tags.or(get_tag).or(list_ingredients).or(get_ingredient)
}

fn recipe_routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    // literal segments go before the i32 captures
    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::download_shopping_cart);

    let list = warp::path!("recipes")
        .and(warp::get())
        .and(warp::query())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session())
        .and(json_body())
        .and(with_pool(pool.clone()))
        .and_then(handlers::create_recipe);

    let detail = warp::path!("recipes" / i32)
        .and(warp::get())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_recipe);

    let update = warp::path!("recipes" / i32)
        .and(warp::patch())
        .and(with_session())
        .and(json_body())
        .and(with_pool(pool.clone()))
        .and_then(handlers::update_recipe);

    let delete = warp::path!("recipes" / i32)
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::delete_recipe);

    let get_link = warp::path!("recipes" / i32 / "get-link")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_recipe_link);

    let add_favorite = warp::path!("recipes" / i32 / "favorite")
        .and(warp::post())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::add_favorite);

    let remove_favorite = warp::path!("recipes" / i32 / "favorite")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::remove_favorite);

    let add_to_cart = warp::path!("recipes" / i32 / "shopping_cart")
        .and(warp::post())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::add_to_cart);

    let remove_from_cart = warp::path!("recipes" / i32 / "shopping_cart")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool))
        .and_then(handlers::remove_from_cart);

    download
        .or(list)
        .or(create)
        .or(get_link)
        .or(add_favorite)
        .or(remove_favorite)
        .or(add_to_cart)
        .or(remove_from_cart)
        .or(detail)
        .or(update)
        .or(delete)
}

fn user_routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let register = warp::path!("users")
        .and(warp::post())
        .and(json_body())
        .and(with_pool(pool.clone()))
        .and_then(handlers::register_user);

    let list = warp::path!("users")
        .and(warp::get())
        .and(warp::query())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::list_users);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_current_user);

    let set_avatar = warp::path!("users" / "me" / "avatar")
        .and(warp::put())
        .and(with_session())
        .and(json_body())
        .and(with_pool(pool.clone()))
        .and_then(handlers::set_avatar);

    let clear_avatar = warp::path!("users" / "me" / "avatar")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::clear_avatar);

    let set_password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session())
        .and(json_body())
        .and(with_pool(pool.clone()))
        .and_then(handlers::set_password);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(warp::query())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::list_subscriptions);

    let detail = warp::path!("users" / i32)
        .and(warp::get())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::get_user);

    let subscribe = warp::path!("users" / i32 / "subscribe")
        .and(warp::post())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(handlers::subscribe);

    let unsubscribe = warp::path!("users" / i32 / "subscribe")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool))
        .and_then(handlers::unsubscribe);

    register
        .or(list)
        .or(me)
        .or(set_avatar)
        .or(clear_avatar)
        .or(set_password)
        .or(subscriptions)
        .or(subscribe)
        .or(unsubscribe)
        .or(detail)
}

fn auth_routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_pool(pool))
        .and_then(handlers::login);

    let logout = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session())
        .and_then(handlers::logout);

    login.or(logout)
}
