//! Crafting planner
//!
//! Resolves recipes and orders into the base materials they need, builds
//! dependency trees for display, and keeps a SQLite recipe catalog.

pub mod calculator;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod lookup;
pub mod models;
pub mod planner;
pub mod tree;

pub use calculator::{
    calculate_bulk_orders, calculate_order_materials, calculate_recipe_materials,
    calculate_recursive_materials, has_circular_dependency, merge_materials, VisitPath,
};
pub use error::ResolveError;
pub use lookup::{find_recipe_by_output, recipes_by_input, recipes_by_output};
pub use models::{Item, ItemAmount, Order, OrderStatus, Recipe, RecipePreferences, RecipeRun};
pub use tree::{build_dependency_tree, recipe_dependency_tree, Dependency, RecipeTree};
