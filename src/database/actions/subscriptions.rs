use sqlx::{Pool, Postgres};

use crate::{
    constants::SUBSCRIPTION_COUNT_PER_PAGE,
    error::{ApiError, QueryError},
    pagination::PageContext,
    schema::{Id, RecipeBrief, UserProfileRow},
};

use super::get_user_by_id;

pub async fn is_subscribed(
    user_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let result: Option<(Id,)> = sqlx::query_as(
        "
        SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = $2
    ",
    )
    .bind(user_id)
    .bind(author_id)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(result.is_some())
}

/// Subscribes a user to an author. Self-subscription is checked here, before
/// the insert, in addition to the table-level CHECK constraint.
pub async fn subscribe(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    if user_id == author_id {
        return Err(ApiError::validation("You cannot subscribe to yourself"));
    }

    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(ApiError::not_found("No user exists with specified id"));
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING;",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::validation(
            "You are already subscribed to this user",
        ));
    }

    Ok(())
}

pub async fn unsubscribe(
    user_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(ApiError::not_found("No user exists with specified id"));
    }

    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::validation(
            "You are not subscribed to this user",
        ));
    }

    Ok(())
}

/// Paginated authors the user is subscribed to.
pub async fn fetch_subscriptions(
    user_id: Id,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserProfileRow>, ApiError> {
    let rows: Vec<UserProfileRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.avatar,
            TRUE AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(SUBSCRIPTION_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.first().map(|p| p.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, SUBSCRIPTION_COUNT_PER_PAGE, offset);

    Ok(page)
}

/// Latest recipes of an author, truncated when a limit is given. A NULL
/// limit means no truncation on the Postgres side.
pub async fn list_author_recipes(
    author_id: Id,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeBrief>, ApiError> {
    let rows: Vec<RecipeBrief> = sqlx::query_as(
        "
        SELECT id, name, image, cooking_time FROM recipes
        WHERE author_id = $1
        ORDER BY created DESC
        LIMIT $2
    ",
    )
    .bind(author_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn count_author_recipes(author_id: Id, pool: &Pool<Postgres>) -> Result<i64, ApiError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row.0)
}
