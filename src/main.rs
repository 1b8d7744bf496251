//! Crafting planner
//!
//! Command-line front end over the recipe catalog and material calculator.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use rusqlite::Connection;

use craft_planner::calculator::{self, summarize_materials};
use craft_planner::catalog::{self, filter_orders_by_status, search_recipes, sort_recipes_by_name};
use craft_planner::config::{default_config_path, PlannerConfig};
use craft_planner::models::{Item, ItemAmount, Order, OrderStatus, Recipe};
use craft_planner::{db, extract, lookup, planner, tree};

#[derive(Parser)]
#[command(name = "craft-planner")]
#[command(about = "Recipe resolution and material planning for crafting orders")]
struct Cli {
    /// Path to the SQLite database (overrides the config file)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Path to a config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema and write a config file if none exists
    Init,

    /// Import *.recipes definition files from a directory tree
    Import {
        source_dir: PathBuf,

        /// Clear items, recipes and preferences first
        #[arg(long)]
        clear: bool,
    },

    /// Load a small woodworking catalog for testing
    LoadSample,

    ListItems,

    /// List recipes in catalog order, or filtered and sorted by name
    ListRecipes {
        /// Only recipes whose name contains this text
        #[arg(short, long)]
        search: Option<String>,

        #[arg(long, value_enum)]
        sort: Option<SortOrder>,
    },

    /// Remove a recipe that no order uses
    DeleteRecipe { recipe: String },

    /// Recipes that produce an item
    Producers { item: String },

    /// Recipes that consume an item
    Consumers { item: String },

    /// Calculate base materials for running a recipe
    Calc {
        /// Recipe ID
        recipe: String,

        /// Number of executions
        #[arg(short, long, default_value = "1")]
        amount: f64,

        /// Also print the dependency tree
        #[arg(short, long)]
        tree: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show how a recipe is made
    Tree {
        recipe: String,

        #[arg(long)]
        json: bool,
    },

    /// Check a recipe for circular dependencies
    Check { recipe: String },

    /// Produce an item with a specific recipe when several can
    Prefer { item: String, recipe: String },

    /// Drop the preferred recipe for an item
    Unprefer { item: String },

    /// Create an order from target items given as item=amount
    NewOrder {
        name: String,

        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// Calculate base materials for one order
    Order {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Rename an order or change its status
    UpdateOrder {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        status: Option<OrderStatus>,
    },

    /// Calculate base materials for all orders
    Orders {
        /// Only orders with this status
        #[arg(short, long)]
        status: Option<OrderStatus>,
    },

    /// Set the stocked amount of an item
    Stock { item: String, amount: f64 },

    /// Show what is missing from stock to fulfil an order
    Shortfall { order_id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortOrder {
    Asc,
    Desc,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_error) = match PlannerConfig::load(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (PlannerConfig::default(), Some(e)),
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str())).init();
    if let Some(e) = config_error {
        warn!("{:#}. Using defaults.", e);
    }

    let config_path = cli.config.clone().or_else(default_config_path);
    let database = cli.database.unwrap_or_else(|| config.database.clone());
    let conn = Connection::open(&database)
        .with_context(|| format!("Failed to open database {}", database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", database.display());
            if let Some(path) = config_path.filter(|p| !p.exists()) {
                config.save(&path);
                println!("Wrote config to: {}", path.display());
            }
        }

        Commands::Import { source_dir, clear } => {
            if clear {
                println!("Clearing existing catalog...");
                db::clear_catalog(&conn)?;
            }

            let stats = extract::extract_to_database(&conn, &source_dir)?;
            println!("{}", stats);
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }

        Commands::ListItems => {
            let items = db::load_items(&conn)?;
            if items.is_empty() {
                println!("No items in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<20} {:<30}", "ID", "Name");
                println!("{}", "-".repeat(50));
                for item in items {
                    println!("{:<20} {:<30}", item.id, item.name);
                }
            }
        }

        Commands::ListRecipes { search, sort } => {
            let mut recipes = db::load_recipes(&conn)?;
            if recipes.is_empty() {
                println!("No recipes in database. Run 'import' or 'load-sample' first.");
                return Ok(());
            }

            if let Some(query) = search {
                recipes = search_recipes(&recipes, &query).into_iter().cloned().collect();
            }
            if let Some(order) = sort {
                recipes = sort_recipes_by_name(&recipes, matches!(order, SortOrder::Asc));
            }

            let listed: Vec<&Recipe> = recipes.iter().collect();
            print_recipe_list(&listed, None);
        }

        Commands::DeleteRecipe { recipe } => {
            let users = db::orders_using_recipe(&conn, &recipe)?;
            if !users.is_empty() {
                bail!("Recipe '{}' is used by orders: {}", recipe, users.join(", "));
            }
            if db::delete_recipe(&conn, &recipe)? {
                println!("Deleted recipe {}", recipe);
            } else {
                bail!("Recipe '{}' not found", recipe);
            }
        }

        Commands::Producers { item } => {
            let recipes = db::load_recipes(&conn)?;
            let prefs = db::load_preferences(&conn)?;
            let chosen = lookup::find_recipe_by_output(&recipes, &item, &prefs).map(|r| r.id.clone());
            print_recipe_list(&lookup::recipes_by_output(&recipes, &item), chosen.as_deref());
        }

        Commands::Consumers { item } => {
            let recipes = db::load_recipes(&conn)?;
            print_recipe_list(&lookup::recipes_by_input(&recipes, &item), None);
        }

        Commands::Calc {
            recipe,
            amount,
            tree: show_tree,
            json,
        } => {
            let recipes = db::load_recipes(&conn)?;
            let prefs = db::load_preferences(&conn)?;
            let materials = calculator::calculate_recipe_materials(&recipes, &recipe, amount, &prefs)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&materials)?);
                return Ok(());
            }

            if show_tree {
                let dependency_tree = tree::recipe_dependency_tree(&recipes, &recipe, &prefs)?;
                println!("Dependency tree:\n");
                println!("{}", tree::format_dependency_tree(&dependency_tree, 0));
            }

            println!("{}", summarize_materials(&format!("{} x{}", recipe, amount), &materials));
        }

        Commands::Tree { recipe, json } => {
            let recipes = db::load_recipes(&conn)?;
            let prefs = db::load_preferences(&conn)?;
            let dependency_tree = tree::recipe_dependency_tree(&recipes, &recipe, &prefs)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&dependency_tree)?);
            } else {
                print!("{}", tree::format_dependency_tree(&dependency_tree, 0));
            }
        }

        Commands::Check { recipe } => {
            let recipes = db::load_recipes(&conn)?;
            let prefs = db::load_preferences(&conn)?;
            let target = lookup::find_recipe(&recipes, &recipe)
                .with_context(|| format!("Recipe '{}' not found", recipe))?;

            if calculator::has_circular_dependency(&recipes, target, &prefs)? {
                println!("{} has a circular dependency", target.name);
            } else {
                println!("{} has no circular dependency", target.name);
            }
        }

        Commands::Prefer { item, recipe } => {
            let recipes = db::load_recipes(&conn)?;
            let Some(chosen) = lookup::find_recipe(&recipes, &recipe) else {
                bail!("Recipe '{}' not found", recipe);
            };
            if !chosen.produces(&item) {
                bail!("Recipe '{}' does not produce '{}'", recipe, item);
            }
            db::set_preference(&conn, &item, &recipe)?;
            println!("{} will be produced with {}", item, chosen.name);
        }

        Commands::Unprefer { item } => {
            if db::clear_preference(&conn, &item)? {
                println!("Cleared preferred recipe for {}", item);
            } else {
                println!("{} had no preferred recipe", item);
            }
        }

        Commands::NewOrder { name, targets } => {
            catalog::validate_order_name(&name)?;

            let mut target_items = Vec::new();
            for raw in &targets {
                target_items.push(parse_target(&conn, raw)?);
            }

            let recipes = db::load_recipes(&conn)?;
            let prefs = db::load_preferences(&conn)?;
            let runs = planner::plan_target_items(&recipes, &target_items, &prefs)?;

            let existing = db::load_orders(&conn, &recipes)?;
            let order = Order {
                id: next_order_id(&existing),
                name: name.trim().to_string(),
                status: OrderStatus::Pending,
                recipes: runs,
                target_items,
            };
            db::upsert_order(&conn, &order)?;
            info!("created order {} with {} recipe runs", order.id, order.recipes.len());

            println!("Created order {} ({})", order.id, order.name);
            for run in &order.recipes {
                println!("  {} x {}", run.amount, run.recipe.name);
            }
        }

        Commands::Order { id, json } => {
            let recipes = db::load_recipes(&conn)?;
            let prefs = db::load_preferences(&conn)?;
            let order = db::get_order(&conn, &recipes, &id)?
                .with_context(|| format!("Order '{}' not found", id))?;
            let materials = calculator::calculate_order_materials(&recipes, &order, &prefs)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&materials)?);
            } else {
                println!("{}", summarize_materials(&format!("{} [{}]", order.name, order.status), &materials));
            }
        }

        Commands::UpdateOrder { id, name, status } => {
            if name.is_none() && status.is_none() {
                bail!("Nothing to update: pass --name and/or --status");
            }
            let recipes = db::load_recipes(&conn)?;
            let order = db::get_order(&conn, &recipes, &id)?
                .with_context(|| format!("Order '{}' not found", id))?;

            let updated = catalog::prepare_order_update(&order, name.as_deref(), status)?;
            db::upsert_order(&conn, &updated)?;
            println!("Order {}: {} [{}]", updated.id, updated.name, updated.status);
        }

        Commands::Orders { status } => {
            let recipes = db::load_recipes(&conn)?;
            let prefs = db::load_preferences(&conn)?;
            let mut orders = db::load_orders(&conn, &recipes)?;
            if let Some(status) = status {
                orders = filter_orders_by_status(&orders, status);
            }

            let materials = calculator::calculate_bulk_orders(&recipes, &orders, &prefs)?;
            println!("{}", summarize_materials(&format!("{} orders", orders.len()), &materials));
        }

        Commands::Stock { item, amount } => {
            if amount < 0.0 {
                bail!("Stock amount cannot be negative");
            }
            db::set_stock(&conn, &item, amount)?;
            println!("{} in stock: {}", item, amount);
        }

        Commands::Shortfall { order_id } => {
            let recipes = db::load_recipes(&conn)?;
            let prefs = db::load_preferences(&conn)?;
            let order = db::get_order(&conn, &recipes, &order_id)?
                .with_context(|| format!("Order '{}' not found", order_id))?;
            let required = calculator::calculate_order_materials(&recipes, &order, &prefs)?;
            let inventory = db::load_inventory(&conn)?;

            if planner::is_inventory_sufficient(&required, &inventory) {
                println!("Stock covers order {}", order.name);
            } else {
                println!("Missing for order {}:", order.name);
                for m in planner::inventory_shortfall(&required, &inventory) {
                    println!("  {} x {}", m.amount, m.item.name);
                }
            }
        }
    }

    Ok(())
}

fn describe_recipe(recipe: &Recipe) -> String {
    let side = |entries: &[ItemAmount]| {
        entries
            .iter()
            .map(|e| format!("{} {}", e.amount, e.item.name))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("{} -> {}", side(&recipe.input), side(&recipe.output))
}

fn print_recipe_list(recipes: &[&Recipe], chosen: Option<&str>) {
    if recipes.is_empty() {
        println!("No matching recipes.");
        return;
    }
    for recipe in recipes {
        let marker = if Some(recipe.id.as_str()) == chosen { "*" } else { " " };
        println!("{} {:<12} {:<24} {}", marker, recipe.id, recipe.name, describe_recipe(recipe));
    }
}

/// Parse "item=amount", naming the item from the catalog when known
fn parse_target(conn: &Connection, raw: &str) -> Result<ItemAmount> {
    let Some((item_id, amount)) = raw.split_once('=') else {
        bail!("Target '{}' must look like item=amount", raw);
    };
    let amount: f64 = amount
        .trim()
        .parse()
        .with_context(|| format!("Invalid amount in target '{}'", raw))?;
    if amount <= 0.0 {
        bail!("Target '{}' must have a positive amount", raw);
    }

    let item_id = item_id.trim();
    let item = db::get_item(conn, item_id)?.unwrap_or_else(|| Item::new(item_id, item_id));
    Ok(ItemAmount::new(item, amount))
}

fn next_order_id(existing: &[Order]) -> String {
    (existing.len() + 1..)
        .map(|n| format!("order-{}", n))
        .find(|id| existing.iter().all(|o| &o.id != id))
        .unwrap_or_default()
}

/// Load a small woodworking catalog for testing without definition files
fn load_sample_data(conn: &Connection) -> Result<()> {
    db::clear_catalog(conn)?;

    let sample = r#"
item wood "Wood"
item log "Log"
item plank "Plank"
item nail "Nail"
item iron "Iron Ore"
item table "Table"
item chair "Chair"

recipe saw "Saw Planks": 2 wood -> 1 plank
recipe split "Split Log": 1 log -> 4 plank
recipe forge "Forge Nails": 1 iron -> 10 nail
recipe table "Build Table": 4 plank, 8 nail -> 1 table
recipe chair "Build Chair": 3 plank, 6 nail -> 1 chair
"#;

    let parsed = extract::parse_definitions(sample)?;
    for item in &parsed.items {
        db::upsert_item(conn, item)?;
    }
    for recipe in &parsed.recipes {
        db::upsert_recipe(conn, recipe)?;
    }

    println!("Loaded {} sample recipes", parsed.recipes.len());
    Ok(())
}
