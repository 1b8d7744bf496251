//! Dependency trees for displaying how a recipe is made
//!
//! Unlike the material calculator, a recipe that reappears on its own branch
//! becomes a `Circular` leaf instead of an error.

use serde::{Deserialize, Serialize};

use crate::calculator::VisitPath;
use crate::error::{ResolveError, Result};
use crate::lookup::{find_recipe, find_recipe_by_output};
use crate::models::{Item, Recipe, RecipePreferences};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecipeTree {
    /// The recipe is already being expanded higher up this branch
    Circular { name: String },
    Recipe {
        id: String,
        name: String,
        dependencies: Vec<Dependency>,
    },
}

/// One input of a recipe, with per-execution amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Dependency {
    Basic { item: Item, amount: f64 },
    Producible {
        item: Item,
        amount: f64,
        recipe: Box<RecipeTree>,
    },
}

impl RecipeTree {
    pub fn name(&self) -> &str {
        match self {
            RecipeTree::Circular { name } | RecipeTree::Recipe { name, .. } => name,
        }
    }

    /// True if any branch below this node closes a cycle
    pub fn has_circular(&self) -> bool {
        match self {
            RecipeTree::Circular { .. } => true,
            RecipeTree::Recipe { dependencies, .. } => dependencies.iter().any(|d| match d {
                Dependency::Basic { .. } => false,
                Dependency::Producible { recipe, .. } => recipe.has_circular(),
            }),
        }
    }
}

pub fn build_dependency_tree(
    recipes: &[Recipe],
    recipe: &Recipe,
    path: &VisitPath,
    preferences: &RecipePreferences,
) -> RecipeTree {
    if path.contains(&recipe.id) {
        return RecipeTree::Circular {
            name: recipe.name.clone(),
        };
    }

    let path = path.with(&recipe.id);

    let dependencies = recipe
        .input
        .iter()
        .map(|input| match find_recipe_by_output(recipes, &input.item.id, preferences) {
            Some(sub_recipe) => Dependency::Producible {
                item: input.item.clone(),
                amount: input.amount,
                recipe: Box::new(build_dependency_tree(recipes, sub_recipe, &path, preferences)),
            },
            None => Dependency::Basic {
                item: input.item.clone(),
                amount: input.amount,
            },
        })
        .collect();

    RecipeTree::Recipe {
        id: recipe.id.clone(),
        name: recipe.name.clone(),
        dependencies,
    }
}

/// Dependency tree of the catalog recipe `recipe_id`
pub fn recipe_dependency_tree(
    recipes: &[Recipe],
    recipe_id: &str,
    preferences: &RecipePreferences,
) -> Result<RecipeTree> {
    let recipe = find_recipe(recipes, recipe_id)
        .ok_or_else(|| ResolveError::RecipeNotFound(recipe_id.to_string()))?;

    Ok(build_dependency_tree(recipes, recipe, &VisitPath::new(), preferences))
}

/// Format a dependency tree as an indented outline
pub fn format_dependency_tree(tree: &RecipeTree, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    match tree {
        RecipeTree::Circular { name } => {
            output.push_str(&format!("{}{} (circular)\n", prefix, name));
        }
        RecipeTree::Recipe {
            id,
            name,
            dependencies,
        } => {
            output.push_str(&format!("{}{} [{}]\n", prefix, name, id));

            for dep in dependencies {
                match dep {
                    Dependency::Basic { item, amount } => {
                        output.push_str(&format!("{}  {} x {} (base material)\n", prefix, amount, item.name));
                    }
                    Dependency::Producible { item, amount, recipe } => {
                        output.push_str(&format!("{}  {} x {} via\n", prefix, amount, item.name));
                        output.push_str(&format_dependency_tree(recipe, indent + 2));
                    }
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemAmount;

    fn recipe(id: &str, name: &str, input: &[(&str, f64)], output: &[(&str, f64)]) -> Recipe {
        let side = |entries: &[(&str, f64)]| {
            entries
                .iter()
                .map(|(item, amount)| ItemAmount::new(Item::new(*item, *item), *amount))
                .collect()
        };
        Recipe {
            id: id.to_string(),
            name: name.to_string(),
            input: side(input),
            output: side(output),
        }
    }

    #[test]
    fn builds_nested_tree() {
        let catalog = vec![
            recipe("r1", "Saw", &[("wood", 2.0)], &[("plank", 1.0)]),
            recipe("r2", "Table", &[("plank", 4.0), ("nail", 8.0)], &[("table", 1.0)]),
        ];
        let tree = recipe_dependency_tree(&catalog, "r2", &RecipePreferences::new()).unwrap();

        let RecipeTree::Recipe { id, dependencies, .. } = &tree else {
            panic!("expected a recipe node");
        };
        assert_eq!(id, "r2");
        assert_eq!(dependencies.len(), 2);

        match &dependencies[0] {
            Dependency::Producible { item, amount, recipe } => {
                assert_eq!(item.id, "plank");
                assert_eq!(*amount, 4.0);
                assert_eq!(recipe.name(), "Saw");
            }
            other => panic!("expected producible plank, got {:?}", other),
        }
        assert!(matches!(&dependencies[1], Dependency::Basic { item, amount } if item.id == "nail" && *amount == 8.0));
        assert!(!tree.has_circular());
    }

    #[test]
    fn cycles_become_circular_leaves() {
        let catalog = vec![
            recipe("a", "Make A", &[("b_item", 1.0)], &[("a_item", 1.0)]),
            recipe("b", "Make B", &[("a_item", 1.0)], &[("b_item", 1.0)]),
        ];
        let tree = recipe_dependency_tree(&catalog, "a", &RecipePreferences::new()).unwrap();
        assert!(tree.has_circular());

        let text = format_dependency_tree(&tree, 0);
        assert_eq!(
            text,
            "Make A [a]\n  1 x b_item via\n    Make B [b]\n      1 x a_item via\n        Make A (circular)\n"
        );
    }

    #[test]
    fn self_producing_recipe_is_circular_in_tree() {
        let catalog = vec![recipe("farm", "Farm", &[("seed", 1.0)], &[("seed", 2.0)])];
        let tree = recipe_dependency_tree(&catalog, "farm", &RecipePreferences::new()).unwrap();
        assert!(tree.has_circular());
    }

    #[test]
    fn tree_follows_preferences() {
        let catalog = vec![
            recipe("r1", "Saw", &[("wood", 2.0)], &[("plank", 1.0)]),
            recipe("r1b", "Split", &[("log", 1.0)], &[("plank", 4.0)]),
            recipe("r2", "Table", &[("plank", 4.0)], &[("table", 1.0)]),
        ];
        let prefs = RecipePreferences::from([("plank".to_string(), "r1b".to_string())]);
        let tree = recipe_dependency_tree(&catalog, "r2", &prefs).unwrap();
        assert!(format_dependency_tree(&tree, 0).contains("Split [r1b]"));
    }

    #[test]
    fn missing_recipe_is_reported() {
        let err = recipe_dependency_tree(&[], "r9", &RecipePreferences::new()).unwrap_err();
        assert_eq!(err, ResolveError::RecipeNotFound("r9".to_string()));
    }

    #[test]
    fn serializes_with_kind_tags() {
        let catalog = vec![recipe("r1", "Saw", &[("wood", 2.0)], &[("plank", 1.0)])];
        let tree = recipe_dependency_tree(&catalog, "r1", &RecipePreferences::new()).unwrap();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["kind"], "recipe");
        assert_eq!(json["dependencies"][0]["kind"], "basic");
        assert_eq!(json["dependencies"][0]["item"]["id"], "wood");
    }
}
