use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, QueryError},
    schema::{Id, ShoppingListItem},
};

pub async fn is_in_cart(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let result: Option<(Id,)> = sqlx::query_as(
        "
        SELECT recipe_id FROM shopping_carts WHERE recipe_id = $1 AND user_id = $2
    ",
    )
    .bind(recipe_id)
    .bind(user_id)
    .fetch_optional(&*pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(result.is_some())
}

pub async fn add_to_cart(recipe_id: Id, user_id: Id, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    let result = sqlx::query(
        "INSERT INTO shopping_carts (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING;",
    )
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::validation("Recipe is already in the shopping cart"));
    }

    Ok(())
}

pub async fn remove_from_cart(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM shopping_carts WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::validation("Recipe is not in the shopping cart"));
    }

    Ok(())
}

/// Consolidated shopping list: every ingredient of every recipe in the
/// user's cart, summed per (name, unit) and ordered alphabetically. The
/// same ingredient appearing in several cart recipes collapses into one row.
pub async fn fetch_shopping_list(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListItem>, ApiError> {
    let rows: Vec<ShoppingListItem> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, SUM(ri.amount) AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        INNER JOIN shopping_carts sc ON sc.recipe_id = ri.recipe_id
        WHERE sc.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

/// Renders the aggregated list as the plain-text download body.
pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "{}. Единица измерения: {}, количество: {}.",
                item.name, item.measurement_unit, item.amount
            )
        })
        .collect::<Vec<String>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, unit: &str, amount: i64) -> ShoppingListItem {
        ShoppingListItem {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn renders_one_line_per_ingredient() {
        let items = vec![item("Flour", "g", 250), item("Milk", "ml", 100)];
        let text = render_shopping_list(&items);
        assert_eq!(
            text,
            "Flour. Единица измерения: g, количество: 250.\n\
             Milk. Единица измерения: ml, количество: 100."
        );
    }

    #[test]
    fn empty_cart_renders_empty_body() {
        assert_eq!(render_shopping_list(&[]), "");
    }
}
