use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, QueryError},
    schema::Id,
};

pub async fn is_favorite(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let result: Option<(Id,)> = sqlx::query_as(
        "
        SELECT recipe_id FROM favorites WHERE recipe_id = $1 AND user_id = $2
    ",
    )
    .bind(recipe_id)
    .bind(user_id)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(result.is_some())
}

/// Adds a recipe to the user's favorites. The unique constraint makes the
/// insert atomic; a redundant add surfaces as rows_affected == 0.
pub async fn add_to_favorites(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result =
        sqlx::query("INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING;")
            .bind(user_id)
            .bind(recipe_id)
            .execute(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::validation("Recipe is already in favorites"));
    }

    Ok(())
}

pub async fn remove_from_favorites(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::validation("Recipe is not in favorites"));
    }

    Ok(())
}
