//! Catalog checks and queries used before records reach the store

use anyhow::{bail, Result};

use crate::models::{Order, OrderStatus, Recipe};

/// Reject recipes the calculator cannot work with
pub fn validate_recipe(recipe: &Recipe) -> Result<()> {
    if recipe.id.trim().is_empty() {
        bail!("recipe id must not be empty");
    }
    if recipe.name.trim().is_empty() {
        bail!("recipe {} has an empty name", recipe.id);
    }
    if recipe.input.is_empty() {
        bail!("recipe {} needs at least one input", recipe.id);
    }
    if recipe.output.is_empty() {
        bail!("recipe {} needs at least one output", recipe.id);
    }
    for entry in recipe.input.iter().chain(&recipe.output) {
        if entry.amount.is_nan() || entry.amount <= 0.0 {
            bail!(
                "recipe {} has a non-positive amount for {}",
                recipe.id, entry.item.id
            );
        }
    }
    Ok(())
}

pub fn validate_order_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("order name must not be empty");
    }
    Ok(())
}

/// Case-insensitive name clash, ignoring the recipe being edited
pub fn is_recipe_name_taken(recipes: &[Recipe], name: &str, exclude_id: Option<&str>) -> bool {
    recipes.iter().any(|r| {
        r.name.to_lowercase() == name.to_lowercase() && Some(r.id.as_str()) != exclude_id
    })
}

pub fn search_recipes<'a>(recipes: &'a [Recipe], query: &str) -> Vec<&'a Recipe> {
    let query = query.to_lowercase();
    recipes
        .iter()
        .filter(|r| r.name.to_lowercase().contains(&query))
        .collect()
}

pub fn sort_recipes_by_name(recipes: &[Recipe], ascending: bool) -> Vec<Recipe> {
    let mut sorted = recipes.to_vec();
    sorted.sort_by(|a, b| {
        if ascending {
            a.name.cmp(&b.name)
        } else {
            b.name.cmp(&a.name)
        }
    });
    sorted
}

/// Apply a rename and/or status change to an order
pub fn prepare_order_update(order: &Order, name: Option<&str>, status: Option<OrderStatus>) -> Result<Order> {
    let mut updated = order.clone();
    if let Some(name) = name {
        validate_order_name(name)?;
        updated.name = name.trim().to_string();
    }
    if let Some(status) = status {
        updated.status = status;
    }
    Ok(updated)
}

pub fn filter_orders_by_status(orders: &[Order], status: OrderStatus) -> Vec<Order> {
    orders.iter().filter(|o| o.status == status).cloned().collect()
}
