//! Recipe lookup over a catalog slice

use log::warn;

use crate::models::{Recipe, RecipePreferences};

/// Find the recipe that should be used to produce `item_id`.
///
/// A preferred recipe wins if it exists and really lists the item among its
/// outputs. Otherwise the first recipe in catalog order that outputs the item
/// is chosen. `None` means the item is a base material.
pub fn find_recipe_by_output<'a>(
    recipes: &'a [Recipe],
    item_id: &str,
    preferences: &RecipePreferences,
) -> Option<&'a Recipe> {
    if let Some(preferred_id) = preferences.get(item_id) {
        match recipes.iter().find(|r| &r.id == preferred_id) {
            Some(recipe) if recipe.produces(item_id) => return Some(recipe),
            Some(_) => warn!(
                "preferred recipe {} does not produce {}, falling back",
                preferred_id, item_id
            ),
            None => warn!(
                "preferred recipe {} for {} is not in the catalog, falling back",
                preferred_id, item_id
            ),
        }
    }

    recipes.iter().find(|r| r.produces(item_id))
}

/// All recipes that list `item_id` among their outputs, in catalog order
pub fn recipes_by_output<'a>(recipes: &'a [Recipe], item_id: &str) -> Vec<&'a Recipe> {
    recipes.iter().filter(|r| r.produces(item_id)).collect()
}

/// All recipes that consume `item_id`, in catalog order
pub fn recipes_by_input<'a>(recipes: &'a [Recipe], item_id: &str) -> Vec<&'a Recipe> {
    recipes.iter().filter(|r| r.consumes(item_id)).collect()
}

pub fn find_recipe<'a>(recipes: &'a [Recipe], recipe_id: &str) -> Option<&'a Recipe> {
    recipes.iter().find(|r| r.id == recipe_id)
}

/// Quantity of `item_id` one execution of `recipe` yields (0 if it yields none)
pub fn output_amount(recipe: &Recipe, item_id: &str) -> f64 {
    recipe
        .output
        .iter()
        .find(|o| o.item.id == item_id)
        .map_or(0.0, |o| o.amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, ItemAmount};

    fn recipe(id: &str, input: &[(&str, f64)], output: &[(&str, f64)]) -> Recipe {
        let side = |entries: &[(&str, f64)]| {
            entries
                .iter()
                .map(|(item, amount)| ItemAmount::new(Item::new(*item, *item), *amount))
                .collect()
        };
        Recipe {
            id: id.to_string(),
            name: id.to_string(),
            input: side(input),
            output: side(output),
        }
    }

    fn catalog() -> Vec<Recipe> {
        vec![
            recipe("r1", &[("wood", 2.0)], &[("plank", 1.0)]),
            recipe("r1b", &[("log", 1.0)], &[("plank", 4.0)]),
            recipe("r2", &[("plank", 4.0)], &[("table", 1.0)]),
        ]
    }

    #[test]
    fn first_match_in_catalog_order() {
        let recipes = catalog();
        let found = find_recipe_by_output(&recipes, "plank", &RecipePreferences::new());
        assert_eq!(found.map(|r| r.id.as_str()), Some("r1"));
    }

    #[test]
    fn preference_overrides_catalog_order() {
        let recipes = catalog();
        let prefs = RecipePreferences::from([("plank".to_string(), "r1b".to_string())]);
        let found = find_recipe_by_output(&recipes, "plank", &prefs);
        assert_eq!(found.map(|r| r.id.as_str()), Some("r1b"));
    }

    #[test]
    fn stale_preference_falls_back() {
        let recipes = catalog();
        // r2 exists but makes tables, "gone" does not exist at all
        let wrong = RecipePreferences::from([("plank".to_string(), "r2".to_string())]);
        let missing = RecipePreferences::from([("plank".to_string(), "gone".to_string())]);
        assert_eq!(find_recipe_by_output(&recipes, "plank", &wrong).unwrap().id, "r1");
        assert_eq!(find_recipe_by_output(&recipes, "plank", &missing).unwrap().id, "r1");
    }

    #[test]
    fn base_material_has_no_producer() {
        let recipes = catalog();
        assert!(find_recipe_by_output(&recipes, "wood", &RecipePreferences::new()).is_none());
    }

    #[test]
    fn producers_and_consumers() {
        let recipes = catalog();
        let producers: Vec<_> = recipes_by_output(&recipes, "plank").iter().map(|r| r.id.clone()).collect();
        assert_eq!(producers, vec!["r1", "r1b"]);
        let consumers = recipes_by_input(&recipes, "plank");
        assert_eq!(consumers.len(), 1);
        assert_eq!(consumers[0].id, "r2");
    }

    #[test]
    fn output_amount_of_missing_item_is_zero() {
        let recipes = catalog();
        assert_eq!(output_amount(&recipes[1], "plank"), 4.0);
        assert_eq!(output_amount(&recipes[1], "table"), 0.0);
    }
}
