//! Order planning and stock checks

use std::collections::HashSet;

use log::debug;

use crate::calculator::runs_needed;
use crate::error::{ResolveError, Result};
use crate::lookup::{find_recipe_by_output, output_amount};
use crate::models::{ItemAmount, Recipe, RecipePreferences, RecipeRun};

/// Recipe ids reached while expanding `recipe`, chosen the way the
/// calculator chooses producers
fn reachable_recipes(recipes: &[Recipe], recipe: &Recipe, preferences: &RecipePreferences) -> HashSet<String> {
    let mut reached = HashSet::new();
    let mut pending = vec![recipe];

    while let Some(current) = pending.pop() {
        for input in &current.input {
            let Some(sub) = find_recipe_by_output(recipes, &input.item.id, preferences)
                .filter(|sub| sub.id != current.id)
            else {
                continue;
            };
            if output_amount(sub, &input.item.id) > 0.0 && reached.insert(sub.id.clone()) {
                pending.push(sub);
            }
        }
    }

    reached
}

/// Put runs whose recipe another run expands into after that run.
///
/// Order runs share one visit path, so a run must not come before a run that
/// reaches its recipe. Unrelated runs keep their relative order.
fn order_dependents_first(
    recipes: &[Recipe],
    plan: Vec<RecipeRun>,
    preferences: &RecipePreferences,
) -> Result<Vec<RecipeRun>> {
    let reach: Vec<HashSet<String>> = plan
        .iter()
        .map(|run| reachable_recipes(recipes, &run.recipe, preferences))
        .collect();

    let mut remaining: Vec<usize> = (0..plan.len()).collect();
    let mut order = Vec::with_capacity(plan.len());

    while !remaining.is_empty() {
        let next = remaining.iter().position(|&candidate| {
            remaining
                .iter()
                .all(|&other| other == candidate || !reach[other].contains(&plan[candidate].recipe.id))
        });

        let Some(pos) = next else {
            let first = &plan[remaining[0]].recipe;
            return Err(ResolveError::CircularDependency {
                recipe: first.name.clone(),
                path: remaining.iter().map(|&i| plan[i].recipe.id.clone()).collect(),
            });
        };
        order.push(remaining.remove(pos));
    }

    let mut slots: Vec<Option<RecipeRun>> = plan.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

/// Recipe runs that produce every target item directly.
///
/// Runs are whole numbers; targets produced by the same recipe share its runs
/// entry, each target rounding up on its own before being added. A run whose
/// recipe also feeds another run is placed after it.
pub fn plan_target_items(
    recipes: &[Recipe],
    targets: &[ItemAmount],
    preferences: &RecipePreferences,
) -> Result<Vec<RecipeRun>> {
    let mut plan: Vec<RecipeRun> = Vec::new();

    for target in targets {
        let recipe = find_recipe_by_output(recipes, &target.item.id, preferences)
            .ok_or_else(|| ResolveError::NoProducingRecipe(target.item.id.clone()))?;

        let per_run = output_amount(recipe, &target.item.id);
        if per_run <= 0.0 {
            return Err(ResolveError::NoProducingRecipe(target.item.id.clone()));
        }
        let runs = runs_needed(target.amount, per_run);
        debug!("{} x{} planned as {} runs of {}", target.item.id, target.amount, runs, recipe.id);

        match plan.iter_mut().find(|run| run.recipe.id == recipe.id) {
            Some(existing) => existing.amount += runs,
            None => plan.push(RecipeRun {
                recipe: recipe.clone(),
                amount: runs,
            }),
        }
    }

    order_dependents_first(recipes, plan, preferences)
}

/// Amounts still missing after drawing `required` from `inventory`
pub fn inventory_shortfall(required: &[ItemAmount], inventory: &[ItemAmount]) -> Vec<ItemAmount> {
    required
        .iter()
        .filter_map(|need| {
            let available: f64 = inventory
                .iter()
                .filter(|stock| stock.item.id == need.item.id)
                .map(|stock| stock.amount)
                .sum();
            let missing = need.amount - available;
            (missing > 0.0).then(|| ItemAmount::new(need.item.clone(), missing))
        })
        .collect()
}

pub fn is_inventory_sufficient(required: &[ItemAmount], inventory: &[ItemAmount]) -> bool {
    inventory_shortfall(required, inventory).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::calculate_order_materials;
    use crate::models::{Item, Order, OrderStatus};

    fn stack(id: &str, amount: f64) -> ItemAmount {
        ItemAmount::new(Item::new(id, id), amount)
    }

    fn recipe(id: &str, input: &[(&str, f64)], output: &[(&str, f64)]) -> Recipe {
        Recipe {
            id: id.to_string(),
            name: id.to_string(),
            input: input.iter().map(|(i, a)| stack(i, *a)).collect(),
            output: output.iter().map(|(i, a)| stack(i, *a)).collect(),
        }
    }

    #[test]
    fn targets_become_rounded_runs() {
        let catalog = vec![
            recipe("smelt", &[("ore", 3.0)], &[("ingot", 2.0), ("slag", 1.0)]),
            recipe("saw", &[("wood", 2.0)], &[("plank", 1.0)]),
        ];
        let plan = plan_target_items(
            &catalog,
            &[stack("ingot", 5.0), stack("plank", 2.0), stack("slag", 1.0)],
            &RecipePreferences::new(),
        )
        .unwrap();

        let runs: Vec<_> = plan.iter().map(|r| (r.recipe.id.as_str(), r.amount)).collect();
        assert_eq!(runs, vec![("smelt", 4.0), ("saw", 2.0)]);
    }

    #[test]
    fn intermediate_targets_follow_the_runs_that_use_them() {
        let catalog = vec![
            recipe("saw", &[("wood", 2.0)], &[("plank", 1.0)]),
            recipe("table", &[("plank", 4.0)], &[("table", 1.0)]),
            recipe("chair", &[("plank", 2.0)], &[("chair", 1.0)]),
        ];
        let targets = [stack("plank", 2.0), stack("chair", 1.0), stack("table", 1.0)];
        let plan = plan_target_items(&catalog, &targets, &RecipePreferences::new()).unwrap();

        let runs: Vec<_> = plan.iter().map(|r| (r.recipe.id.as_str(), r.amount)).collect();
        assert_eq!(runs, vec![("chair", 1.0), ("table", 1.0), ("saw", 2.0)]);

        let order = Order {
            id: "o1".to_string(),
            name: "Workshop".to_string(),
            status: OrderStatus::Pending,
            recipes: plan,
            target_items: targets.to_vec(),
        };
        let materials = calculate_order_materials(&catalog, &order, &RecipePreferences::new()).unwrap();
        assert_eq!(materials, vec![stack("wood", 16.0)]);
    }

    #[test]
    fn mutually_feeding_targets_cannot_be_planned() {
        let catalog = vec![
            recipe("a", &[("b_item", 1.0)], &[("a_item", 1.0)]),
            recipe("b", &[("a_item", 1.0)], &[("b_item", 1.0)]),
        ];
        let err = plan_target_items(
            &catalog,
            &[stack("a_item", 1.0), stack("b_item", 1.0)],
            &RecipePreferences::new(),
        )
        .unwrap_err();
        assert!(err.is_circular());
    }

    #[test]
    fn unproducible_target_is_an_error() {
        let catalog = vec![recipe("saw", &[("wood", 2.0)], &[("plank", 1.0)])];
        let err = plan_target_items(&catalog, &[stack("wood", 1.0)], &RecipePreferences::new()).unwrap_err();
        assert_eq!(err, ResolveError::NoProducingRecipe("wood".to_string()));
    }

    #[test]
    fn no_targets_no_plan() {
        assert!(plan_target_items(&[], &[], &RecipePreferences::new()).unwrap().is_empty());
    }

    #[test]
    fn shortfall_reports_missing_amounts() {
        let required = vec![stack("wood", 10.0), stack("iron", 2.0), stack("coal", 1.0)];
        let inventory = vec![stack("wood", 4.0), stack("iron", 5.0)];
        let short = inventory_shortfall(&required, &inventory);
        assert_eq!(short, vec![stack("wood", 6.0), stack("coal", 1.0)]);
        assert!(!is_inventory_sufficient(&required, &inventory));
        assert!(is_inventory_sufficient(&required[1..2], &inventory));
    }
}
