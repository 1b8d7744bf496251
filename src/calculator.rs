//! Material calculator
//!
//! Expands recipes down to the base materials they ultimately consume.
//! Every intermediate input is replaced by runs of the recipe chosen to
//! produce it, each branch rounding its run count up on its own.

use log::{debug, trace, warn};

use crate::error::{ResolveError, Result};
use crate::lookup::{find_recipe, find_recipe_by_output, output_amount};
use crate::models::{ItemAmount, Order, Recipe, RecipePreferences};

/// Rounding error, in ULPs of the ratio, tolerated before adding a run
const RATIO_ULPS: f64 = 4.0;

/// Recipe ids currently being expanded on one branch, outermost first.
///
/// Extending a path returns a new one, so sibling branches never see each
/// other's entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitPath {
    ids: Vec<String>,
}

impl VisitPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, recipe_id: &str) -> bool {
        self.ids.iter().any(|id| id == recipe_id)
    }

    pub fn with(&self, recipe_id: &str) -> Self {
        let mut ids = self.ids.clone();
        ids.push(recipe_id.to_string());
        Self { ids }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Whole executions of a recipe yielding `per_run` needed to cover `required`.
///
/// A ratio only a few ULPs above a whole number stays at that number, so the
/// noise of `0.1 * 3.0 / 0.3` does not cost an extra run.
pub(crate) fn runs_needed(required: f64, per_run: f64) -> f64 {
    let ratio = required / per_run;
    let floor = ratio.floor();
    if ratio - floor <= RATIO_ULPS * f64::EPSILON * ratio.abs() {
        floor
    } else {
        ratio.ceil()
    }
}

/// Base materials needed to execute `recipe` `amount` times.
///
/// Fails with `CircularDependency` when `recipe` is already on `path`.
pub fn calculate_recursive_materials(
    recipes: &[Recipe],
    recipe: &Recipe,
    amount: f64,
    path: &VisitPath,
    preferences: &RecipePreferences,
) -> Result<Vec<ItemAmount>> {
    if path.contains(&recipe.id) {
        return Err(ResolveError::CircularDependency {
            recipe: recipe.name.clone(),
            path: path.with(&recipe.id).ids,
        });
    }

    let path = path.with(&recipe.id);
    trace!("expanding {} x{} (depth {})", recipe.id, amount, path.len());

    let mut materials = Vec::new();

    for input in &recipe.input {
        let required = input.amount * amount;

        let sub_recipe = find_recipe_by_output(recipes, &input.item.id, preferences)
            .filter(|sub| sub.id != recipe.id);

        let Some(sub_recipe) = sub_recipe else {
            materials = merge_materials(&materials, &[ItemAmount::new(input.item.clone(), required)]);
            continue;
        };

        let per_run = output_amount(sub_recipe, &input.item.id);
        if per_run <= 0.0 {
            warn!(
                "recipe {} yields no {}, treating it as a base material",
                sub_recipe.id, input.item.id
            );
            materials = merge_materials(&materials, &[ItemAmount::new(input.item.clone(), required)]);
            continue;
        }

        let runs = runs_needed(required, per_run);
        debug!(
            "{} needs {} {}: {} runs of {}",
            recipe.id, required, input.item.id, runs, sub_recipe.id
        );

        let sub_materials = calculate_recursive_materials(recipes, sub_recipe, runs, &path, preferences)?;
        materials = merge_materials(&materials, &sub_materials);
    }

    Ok(materials)
}

/// Combine two material lists, adding amounts of items present in both.
///
/// Items of `a` keep their position; new items from `b` follow in `b`'s order.
pub fn merge_materials(a: &[ItemAmount], b: &[ItemAmount]) -> Vec<ItemAmount> {
    let mut merged = a.to_vec();

    for entry in b {
        match merged.iter_mut().find(|m| m.item.id == entry.item.id) {
            Some(existing) => existing.amount += entry.amount,
            None => merged.push(entry.clone()),
        }
    }

    merged
}

/// Base materials needed to execute the catalog recipe `recipe_id` `amount` times
pub fn calculate_recipe_materials(
    recipes: &[Recipe],
    recipe_id: &str,
    amount: f64,
    preferences: &RecipePreferences,
) -> Result<Vec<ItemAmount>> {
    let recipe = find_recipe(recipes, recipe_id)
        .ok_or_else(|| ResolveError::RecipeNotFound(recipe_id.to_string()))?;

    calculate_recursive_materials(recipes, recipe, amount, &VisitPath::new(), preferences)
}

/// Base materials for every recipe run of an order.
///
/// Runs share one path: a recipe resolved by an earlier run counts as
/// visited for the later ones. An order without runs needs nothing.
pub fn calculate_order_materials(
    recipes: &[Recipe],
    order: &Order,
    preferences: &RecipePreferences,
) -> Result<Vec<ItemAmount>> {
    let mut total = Vec::new();
    let mut path = VisitPath::new();

    for run in &order.recipes {
        let materials = calculate_recursive_materials(recipes, &run.recipe, run.amount, &path, preferences)?;
        total = merge_materials(&total, &materials);
        path = path.with(&run.recipe.id);
    }

    debug!("order {} needs {} base materials", order.id, total.len());
    Ok(total)
}

/// Base materials for a batch of orders, merged
pub fn calculate_bulk_orders(
    recipes: &[Recipe],
    orders: &[Order],
    preferences: &RecipePreferences,
) -> Result<Vec<ItemAmount>> {
    let mut total = Vec::new();

    for order in orders {
        let materials = calculate_order_materials(recipes, order, preferences)?;
        total = merge_materials(&total, &materials);
    }

    Ok(total)
}

/// Whether resolving one run of `recipe` reaches a recipe already on its own branch.
///
/// Errors other than a circular dependency are returned unchanged.
pub fn has_circular_dependency(
    recipes: &[Recipe],
    recipe: &Recipe,
    preferences: &RecipePreferences,
) -> Result<bool> {
    match calculate_recipe_materials(recipes, &recipe.id, 1.0, preferences) {
        Ok(_) => Ok(false),
        Err(e) if e.is_circular() => Ok(true),
        Err(e) => Err(e),
    }
}

/// Printable material list, sorted by item name
#[derive(Debug)]
pub struct MaterialSummary {
    pub title: String,
    pub materials: Vec<ItemAmount>,
}

pub fn summarize_materials(title: &str, materials: &[ItemAmount]) -> MaterialSummary {
    let mut sorted = materials.to_vec();
    sorted.sort_by(|a, b| a.item.name.cmp(&b.item.name));

    MaterialSummary {
        title: title.to_string(),
        materials: sorted,
    }
}

impl std::fmt::Display for MaterialSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Material Summary ===")?;
        writeln!(f, "Target: {}", self.title)?;
        writeln!(f)?;

        if self.materials.is_empty() {
            writeln!(f, "No base materials required.")?;
            return Ok(());
        }

        writeln!(f, "Base materials required:")?;
        for m in &self.materials {
            writeln!(f, "  {:>10} x {} ({})", m.amount, m.item.name, m.item.id)?;
        }

        Ok(())
    }
}
