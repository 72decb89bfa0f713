use sqlx::{Pool, Postgres};

use crate::{
    authentication::cryptography::{hash_password, verify_password},
    authentication::jwt::generate_jwt_session,
    constants::USER_COUNT_PER_PAGE,
    error::{ApiError, QueryError},
    pagination::PageContext,
    schema::{Id, User, UserProfile, UserProfileRow},
};

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: i32) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Creates a user account. The password is hashed here; callers pass it in
/// clear from the registration payload.
pub async fn register_user(
    email: &str,
    username: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<Id, ApiError> {
    let hash = hash_password(password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))?;

    let row: Option<(Id,)> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING id;
    ",
    )
    .bind(email)
    .bind(username)
    .bind(first_name)
    .bind(last_name)
    .bind(hash)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    match row {
        Some((id,)) => Ok(id),
        None => Err(ApiError::validation(
            "A user with this email or username already exists",
        )),
    }
}

pub async fn login_user(
    email: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let user = match get_user_by_email(pool, email).await? {
        Some(user) => user,
        None => return Err(ApiError::validation("Invalid credentials")),
    };

    let authenticated = verify_password(password, &user.password)
        .map_err(|e| ApiError::Internal(format!("Failed to verify password: {e}")))?;
    if !authenticated {
        return Err(ApiError::validation("Invalid credentials"));
    }

    Ok(generate_jwt_session(&user))
}

/// Replaces the stored credential after verifying the current one.
pub async fn set_password(
    user_id: Id,
    current_password: &str,
    new_password: &str,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let user = match get_user_by_id(pool, user_id).await? {
        Some(user) => user,
        None => return Err(ApiError::not_found("No user exists with specified id")),
    };

    let authenticated = verify_password(current_password, &user.password)
        .map_err(|e| ApiError::Internal(format!("Failed to verify password: {e}")))?;
    if !authenticated {
        return Err(ApiError::validation("Wrong current password"));
    }

    let hash = hash_password(new_password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(hash)
        .bind(user_id)
        .execute(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

pub async fn set_avatar(
    user_id: Id,
    avatar: &str,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
        .bind(avatar)
        .bind(user_id)
        .execute(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

pub async fn clear_avatar(user_id: Id, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    sqlx::query("UPDATE users SET avatar = NULL WHERE id = $1")
        .bind(user_id)
        .execute(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

/// Public profile of a user, with is_subscribed resolved against the viewer
/// (always false for anonymous viewers).
pub async fn get_user_profile(
    user_id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Option<UserProfile>, ApiError> {
    let row: Option<UserProfile> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.avatar,
            EXISTS (
                SELECT 1 FROM subscriptions s
                WHERE s.user_id = $2 AND s.author_id = u.id
            ) AS is_subscribed
        FROM users u
        WHERE u.id = $1
    ",
    )
    .bind(user_id)
    .bind(viewer)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn fetch_users(
    viewer: Option<Id>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserProfileRow>, ApiError> {
    let rows: Vec<UserProfileRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.avatar,
            EXISTS (
                SELECT 1 FROM subscriptions s
                WHERE s.user_id = $1 AND s.author_id = u.id
            ) AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM users u
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(viewer)
    .bind(USER_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.first().map(|p| p.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, USER_COUNT_PER_PAGE, offset);

    Ok(page)
}
