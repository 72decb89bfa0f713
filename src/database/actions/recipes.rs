use std::collections::HashSet;

use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    authentication::cryptography::generate_short_code,
    authentication::jwt::SessionData,
    authentication::permissions::ActionType,
    constants::{RECIPE_COUNT_PER_PAGE, SHORT_CODE_RETRIES},
    error::{ApiError, QueryError},
    pagination::PageContext,
    schema::{
        Id, IngredientAmountPayload, Recipe, RecipeDetail, RecipeFilter, RecipeIngredientRow,
        RecipePatchPayload, RecipePayload, RecipeRow, Tag,
    },
};

use super::{get_user_profile, is_favorite, is_in_cart};

/// Paginated recipe listing. Filters compose through a dynamically built
/// query; the per-viewer relation flags come back as EXISTS subselects,
/// which evaluate to false for anonymous viewers (NULL user id).
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Id>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, ApiError> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.id, r.author_id, r.name, r.cooking_time, r.image, ");

    query.push("EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ");
    query.push_bind(viewer);
    query.push(") AS is_favorited, ");
    query.push("EXISTS (SELECT 1 FROM shopping_carts sc WHERE sc.recipe_id = r.id AND sc.user_id = ");
    query.push_bind(viewer);
    query.push(") AS is_in_shopping_cart, ");
    query.push("COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ");
        query.push_bind(author);
    }

    if !filter.tag_slugs.is_empty() {
        query.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        );
        query.push_bind(filter.tag_slugs.clone());
        query.push("))");
    }

    if let Some(user_id) = filter.favorited_by {
        query.push(" AND EXISTS (SELECT 1 FROM favorites ff WHERE ff.recipe_id = r.id AND ff.user_id = ");
        query.push_bind(user_id);
        query.push(")");
    }

    if let Some(user_id) = filter.in_cart_of {
        query.push(
            " AND EXISTS (SELECT 1 FROM shopping_carts scc WHERE scc.recipe_id = r.id AND scc.user_id = ",
        );
        query.push_bind(user_id);
        query.push(")");
    }

    query.push(" ORDER BY r.created DESC LIMIT ");
    query.push_bind(RECIPE_COUNT_PER_PAGE);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.first().map(|p| p.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, RECIPE_COUNT_PER_PAGE, offset);
    Ok(page)
}

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn get_recipe_by_short_code(
    code: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE short_code = $1")
        .bind(code)
        .fetch_optional(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Fetches a recipe for mutation, enforcing that only the author (or an
/// admin holding ManageAllRecipes) may touch it.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let recipe = get_recipe(id, pool).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(ApiError::forbidden("Only the author may modify this recipe"))
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(ApiError::not_found("No recipe exists with specified id")),
    }
}

pub fn validate_recipe_parts(parts: &[IngredientAmountPayload]) -> Result<(), ApiError> {
    if parts.is_empty() {
        return Err(ApiError::validation("A recipe needs at least one ingredient"));
    }
    if parts.iter().any(|part| part.amount < 1) {
        return Err(ApiError::validation("Ingredient amounts must be positive"));
    }

    let mut seen: HashSet<Id> = HashSet::new();
    if !parts.iter().all(|part| seen.insert(part.id)) {
        return Err(ApiError::validation("Duplicate ingredient in recipe"));
    }

    Ok(())
}

async fn verify_ingredients_exist(ids: Vec<Id>, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    let expected = ids.len() as i64;
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_one(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if row.0 != expected {
        return Err(ApiError::validation("Unknown ingredient id"));
    }
    Ok(())
}

async fn verify_tags_exist(ids: Vec<Id>, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    let unique: HashSet<Id> = ids.iter().copied().collect();
    if unique.len() != ids.len() {
        return Err(ApiError::validation("Duplicate tag in recipe"));
    }
    let expected = ids.len() as i64;
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_one(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if row.0 != expected {
        return Err(ApiError::validation("Unknown tag id"));
    }
    Ok(())
}

/// Creates a recipe with its ingredient amounts and tags in one transaction.
/// The short code is assigned here and never changes afterwards; a collision
/// with an existing code is retried with a fresh candidate.
pub async fn create_recipe(
    author_id: Id,
    payload: &RecipePayload,
    pool: &Pool<Postgres>,
) -> Result<Id, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::validation("Recipe name must not be empty"));
    }
    if payload.cooking_time < 1 {
        return Err(ApiError::validation("Cooking time must be at least 1"));
    }
    validate_recipe_parts(&payload.ingredients)?;
    verify_ingredients_exist(payload.ingredients.iter().map(|p| p.id).collect(), pool).await?;
    verify_tags_exist(payload.tags.clone(), pool).await?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    let mut recipe_id: Option<Id> = None;
    for _ in 0..SHORT_CODE_RETRIES {
        let code = generate_short_code();
        let row: Option<(Id,)> = sqlx::query_as(
            "
            INSERT INTO recipes (author_id, name, text, cooking_time, image, short_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (short_code) DO NOTHING
            RETURNING id
        ",
        )
        .bind(author_id)
        .bind(&payload.name)
        .bind(&payload.text)
        .bind(payload.cooking_time)
        .bind(&payload.image)
        .bind(code)
        .fetch_optional(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

        if let Some((id,)) = row {
            recipe_id = Some(id);
            break;
        }
    }

    let recipe_id = match recipe_id {
        Some(id) => id,
        None => {
            return Err(ApiError::Internal(
                "Could not allocate a unique short code".to_owned(),
            ))
        }
    };

    insert_recipe_parts(recipe_id, &payload.ingredients, &mut tr).await?;
    insert_recipe_tags(recipe_id, &payload.tags, &mut tr).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(recipe_id)
}

/// Applies a partial update. Ingredient and tag sets, when present, replace
/// the stored sets wholesale.
pub async fn update_recipe(
    recipe: &Recipe,
    payload: &RecipePatchPayload,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let name = payload.name.clone().unwrap_or_else(|| recipe.name.clone());
    let text = payload.text.clone().unwrap_or_else(|| recipe.text.clone());
    let cooking_time = payload.cooking_time.unwrap_or(recipe.cooking_time);
    let image = payload.image.clone().or_else(|| recipe.image.clone());

    if name.trim().is_empty() {
        return Err(ApiError::validation("Recipe name must not be empty"));
    }
    if cooking_time < 1 {
        return Err(ApiError::validation("Cooking time must be at least 1"));
    }
    if let Some(parts) = &payload.ingredients {
        validate_recipe_parts(parts)?;
        verify_ingredients_exist(parts.iter().map(|p| p.id).collect(), pool).await?;
    }
    if let Some(tags) = &payload.tags {
        verify_tags_exist(tags.clone(), pool).await?;
    }

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    sqlx::query("UPDATE recipes SET name = $1, text = $2, cooking_time = $3, image = $4 WHERE id = $5")
        .bind(name)
        .bind(text)
        .bind(cooking_time)
        .bind(image)
        .bind(recipe.id)
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if let Some(parts) = &payload.ingredients {
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(recipe.id)
            .execute(&mut *tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;
        insert_recipe_parts(recipe.id, parts, &mut tr).await?;
    }

    if let Some(tags) = &payload.tags {
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(recipe.id)
            .execute(&mut *tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;
        insert_recipe_tags(recipe.id, tags, &mut tr).await?;
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()).into())?;

    Ok(())
}

pub async fn delete_recipe(id: Id, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    // join rows cascade via the schema
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(&*pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

async fn insert_recipe_parts(
    recipe_id: Id,
    parts: &[IngredientAmountPayload],
    tr: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<(), ApiError> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");

    query.push_values(parts.iter(), |mut b, part| {
        b.push_bind(recipe_id).push_bind(part.id).push_bind(part.amount);
    });

    query
        .build()
        .execute(&mut **tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

async fn insert_recipe_tags(
    recipe_id: Id,
    tags: &[Id],
    tr: &mut sqlx::Transaction<'_, Postgres>,
) -> Result<(), ApiError> {
    if tags.is_empty() {
        return Ok(());
    }

    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");

    query.push_values(tags.iter(), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });

    query
        .build()
        .execute(&mut **tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

pub async fn list_recipe_ingredients(
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeIngredientRow>, ApiError> {
    let rows: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY i.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn list_recipe_tags(recipe_id: Id, pool: &Pool<Postgres>) -> Result<Vec<Tag>, ApiError> {
    let rows: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.id, t.name, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

/// Assembles the full read payload for a recipe: author profile, tags,
/// ingredient amounts and the per-viewer relation flags.
pub async fn recipe_detail(
    recipe: Recipe,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, ApiError> {
    let author = match get_user_profile(recipe.author_id, viewer, pool).await? {
        Some(profile) => profile,
        None => return Err(ApiError::Internal("Recipe author is missing".to_owned())),
    };

    let tags = list_recipe_tags(recipe.id, pool).await?;
    let ingredients = list_recipe_ingredients(recipe.id, pool).await?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(user_id) => (
            is_favorite(recipe.id, user_id, pool).await?,
            is_in_cart(recipe.id, user_id, pool).await?,
        ),
        None => (false, false),
    };

    Ok(RecipeDetail {
        id: recipe.id,
        author,
        name: recipe.name,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
        image: recipe.image,
        tags,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(id: Id, amount: i32) -> IngredientAmountPayload {
        IngredientAmountPayload { id, amount }
    }

    #[test]
    fn empty_ingredient_list_is_rejected() {
        assert!(validate_recipe_parts(&[]).is_err());
    }

    #[test]
    fn zero_amount_is_rejected() {
        assert!(validate_recipe_parts(&[part(1, 0)]).is_err());
        assert!(validate_recipe_parts(&[part(1, -5)]).is_err());
    }

    #[test]
    fn duplicate_ingredient_is_rejected() {
        assert!(validate_recipe_parts(&[part(1, 100), part(1, 50)]).is_err());
    }

    #[test]
    fn distinct_positive_parts_are_accepted() {
        assert!(validate_recipe_parts(&[part(1, 200), part(2, 100)]).is_ok());
    }
}
