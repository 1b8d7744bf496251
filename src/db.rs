//! Database schema and operations

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Item, ItemAmount, Order, OrderStatus, Recipe, RecipePreferences, RecipeRun};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            icon_url TEXT NOT NULL DEFAULT ''
        );

        -- position keeps catalog order, which decides the default producer
        CREATE TABLE IF NOT EXISTS recipes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            position INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS recipe_inputs (
            recipe_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            item_id TEXT NOT NULL,
            amount REAL NOT NULL,
            PRIMARY KEY (recipe_id, position)
        );

        CREATE TABLE IF NOT EXISTS recipe_outputs (
            recipe_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            item_id TEXT NOT NULL,
            amount REAL NOT NULL,
            PRIMARY KEY (recipe_id, position)
        );

        CREATE TABLE IF NOT EXISTS preferred_recipes (
            item_id TEXT PRIMARY KEY,
            recipe_id TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            status TEXT NOT NULL,
            position INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS order_recipes (
            order_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            recipe_id TEXT NOT NULL,
            amount REAL NOT NULL,
            PRIMARY KEY (order_id, position)
        );

        CREATE TABLE IF NOT EXISTS order_targets (
            order_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            item_id TEXT NOT NULL,
            amount REAL NOT NULL,
            PRIMARY KEY (order_id, position)
        );

        CREATE TABLE IF NOT EXISTS inventory (
            item_id TEXT PRIMARY KEY,
            amount REAL NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_recipe_outputs_item ON recipe_outputs(item_id);
        CREATE INDEX IF NOT EXISTS idx_recipe_inputs_item ON recipe_inputs(item_id);
        "#,
    )?;
    Ok(())
}

/// Clear items, recipes and preferences (for re-import)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM preferred_recipes;
        DELETE FROM recipe_outputs;
        DELETE FROM recipe_inputs;
        DELETE FROM recipes;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

/// Insert or replace an item
pub fn upsert_item(conn: &Connection, item: &Item) -> Result<()> {
    conn.execute(
        "INSERT INTO items (id, name, icon_url) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, icon_url = excluded.icon_url",
        (&item.id, &item.name, &item.icon_url),
    )?;
    Ok(())
}

/// Insert or replace a recipe together with its inputs and outputs.
///
/// A replaced recipe keeps its place in catalog order. Items it references
/// that are not stored yet are created from the recipe's copy.
pub fn upsert_recipe(conn: &Connection, recipe: &Recipe) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO recipes (id, name, position)
         VALUES (?1, ?2, (SELECT COALESCE(MAX(position), 0) + 1 FROM recipes))
         ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        (&recipe.id, &recipe.name),
    )?;
    tx.execute("DELETE FROM recipe_inputs WHERE recipe_id = ?1", [&recipe.id])?;
    tx.execute("DELETE FROM recipe_outputs WHERE recipe_id = ?1", [&recipe.id])?;

    for (table, entries) in [("recipe_inputs", &recipe.input), ("recipe_outputs", &recipe.output)] {
        for (position, entry) in entries.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO items (id, name, icon_url) VALUES (?1, ?2, ?3)",
                (&entry.item.id, &entry.item.name, &entry.item.icon_url),
            )?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (recipe_id, position, item_id, amount) VALUES (?1, ?2, ?3, ?4)",
                    table
                ),
                params![recipe.id, position as i64, entry.item.id, entry.amount],
            )?;
        }
    }

    tx.commit()?;
    Ok(())
}

/// Remove a recipe and any preference naming it; returns false if it did not exist
pub fn delete_recipe(conn: &Connection, recipe_id: &str) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM recipe_inputs WHERE recipe_id = ?1", [recipe_id])?;
    tx.execute("DELETE FROM recipe_outputs WHERE recipe_id = ?1", [recipe_id])?;
    tx.execute("DELETE FROM preferred_recipes WHERE recipe_id = ?1", [recipe_id])?;
    let removed = tx.execute("DELETE FROM recipes WHERE id = ?1", [recipe_id])?;
    tx.commit()?;
    Ok(removed > 0)
}

/// List all items ordered by name
pub fn load_items(conn: &Connection) -> Result<Vec<Item>> {
    let mut stmt = conn.prepare("SELECT id, name, icon_url FROM items ORDER BY name")?;

    let rows = stmt.query_map([], |row| {
        Ok(Item {
            id: row.get(0)?,
            name: row.get(1)?,
            icon_url: row.get(2)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn get_item(conn: &Connection, item_id: &str) -> Result<Option<Item>> {
    let item = conn
        .query_row(
            "SELECT id, name, icon_url FROM items WHERE id = ?1",
            [item_id],
            |row| {
                Ok(Item {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    icon_url: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(item)
}

/// Item amounts of one recipe side or order target list, joined with item names
fn query_item_amounts(conn: &Connection, table: &str, owner_column: &str, owner_id: &str) -> Result<Vec<ItemAmount>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT t.item_id, COALESCE(i.name, t.item_id), COALESCE(i.icon_url, ''), t.amount
         FROM {table} t
         LEFT JOIN items i ON i.id = t.item_id
         WHERE t.{owner_column} = ?1
         ORDER BY t.position"
    ))?;

    let rows = stmt.query_map([owner_id], |row| {
        Ok(ItemAmount {
            item: Item {
                id: row.get(0)?,
                name: row.get(1)?,
                icon_url: row.get(2)?,
            },
            amount: row.get(3)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Load the whole recipe catalog in catalog order
pub fn load_recipes(conn: &Connection) -> Result<Vec<Recipe>> {
    let mut stmt = conn.prepare("SELECT id, name FROM recipes ORDER BY position")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

    let mut headers = Vec::new();
    for row in rows {
        headers.push(row?);
    }

    let mut recipes = Vec::with_capacity(headers.len());
    for (id, name) in headers {
        let input = query_item_amounts(conn, "recipe_inputs", "recipe_id", &id)?;
        let output = query_item_amounts(conn, "recipe_outputs", "recipe_id", &id)?;
        recipes.push(Recipe { id, name, input, output });
    }
    Ok(recipes)
}

pub fn load_preferences(conn: &Connection) -> Result<RecipePreferences> {
    let mut stmt = conn.prepare("SELECT item_id, recipe_id FROM preferred_recipes")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut prefs = RecipePreferences::new();
    for row in rows {
        let (item_id, recipe_id) = row?;
        prefs.insert(item_id, recipe_id);
    }
    Ok(prefs)
}

pub fn set_preference(conn: &Connection, item_id: &str, recipe_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO preferred_recipes (item_id, recipe_id) VALUES (?1, ?2)",
        (item_id, recipe_id),
    )?;
    Ok(())
}

/// Returns false if the item had no preference
pub fn clear_preference(conn: &Connection, item_id: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM preferred_recipes WHERE item_id = ?1", [item_id])?;
    Ok(removed > 0)
}

/// Insert or replace an order, its recipe runs and its targets
pub fn upsert_order(conn: &Connection, order: &Order) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO orders (id, name, status, position)
         VALUES (?1, ?2, ?3, (SELECT COALESCE(MAX(position), 0) + 1 FROM orders))
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, status = excluded.status",
        (&order.id, &order.name, order.status.as_str()),
    )?;
    tx.execute("DELETE FROM order_recipes WHERE order_id = ?1", [&order.id])?;
    tx.execute("DELETE FROM order_targets WHERE order_id = ?1", [&order.id])?;

    for (position, run) in order.recipes.iter().enumerate() {
        tx.execute(
            "INSERT INTO order_recipes (order_id, position, recipe_id, amount) VALUES (?1, ?2, ?3, ?4)",
            params![order.id, position as i64, run.recipe.id, run.amount],
        )?;
    }
    for (position, target) in order.target_items.iter().enumerate() {
        tx.execute(
            "INSERT INTO order_targets (order_id, position, item_id, amount) VALUES (?1, ?2, ?3, ?4)",
            params![order.id, position as i64, target.item.id, target.amount],
        )?;
    }

    tx.commit()?;
    Ok(())
}

/// Ids of orders with a run of `recipe_id`, in creation order
pub fn orders_using_recipe(conn: &Connection, recipe_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT o.id, o.position FROM orders o
         JOIN order_recipes r ON r.order_id = o.id
         WHERE r.recipe_id = ?1
         ORDER BY o.position",
    )?;
    let rows = stmt.query_map([recipe_id], |row| row.get(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Rebuild an order, resolving its recipe runs against `recipes`
fn load_order_body(conn: &Connection, recipes: &[Recipe], id: String, name: String, status: String) -> Result<Order> {
    let status: OrderStatus = status
        .parse()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("order {} has an invalid status", id))?;

    let mut stmt = conn.prepare(
        "SELECT recipe_id, amount FROM order_recipes WHERE order_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map([&id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?;

    let mut runs = Vec::new();
    for row in rows {
        let (recipe_id, amount) = row?;
        let recipe = recipes
            .iter()
            .find(|r| r.id == recipe_id)
            .with_context(|| format!("order {} references missing recipe {}", id, recipe_id))?;
        runs.push(RecipeRun {
            recipe: recipe.clone(),
            amount,
        });
    }

    let target_items = query_item_amounts(conn, "order_targets", "order_id", &id)?;

    Ok(Order {
        id,
        name,
        status,
        recipes: runs,
        target_items,
    })
}

/// Load all orders in creation order
pub fn load_orders(conn: &Connection, recipes: &[Recipe]) -> Result<Vec<Order>> {
    let mut stmt = conn.prepare("SELECT id, name, status FROM orders ORDER BY position")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;

    let mut headers: Vec<(String, String, String)> = Vec::new();
    for row in rows {
        headers.push(row?);
    }

    let mut orders = Vec::with_capacity(headers.len());
    for (id, name, status) in headers {
        orders.push(load_order_body(conn, recipes, id, name, status)?);
    }
    Ok(orders)
}

pub fn get_order(conn: &Connection, recipes: &[Recipe], order_id: &str) -> Result<Option<Order>> {
    let header: Option<(String, String, String)> = conn
        .query_row(
            "SELECT id, name, status FROM orders WHERE id = ?1",
            [order_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    match header {
        Some((id, name, status)) => Ok(Some(load_order_body(conn, recipes, id, name, status)?)),
        None => Ok(None),
    }
}

/// Set the stocked amount of an item
pub fn set_stock(conn: &Connection, item_id: &str, amount: f64) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO inventory (item_id, amount) VALUES (?1, ?2)",
        params![item_id, amount],
    )?;
    Ok(())
}

pub fn load_inventory(conn: &Connection) -> Result<Vec<ItemAmount>> {
    let mut stmt = conn.prepare(
        "SELECT s.item_id, COALESCE(i.name, s.item_id), COALESCE(i.icon_url, ''), s.amount
         FROM inventory s
         LEFT JOIN items i ON i.id = s.item_id
         ORDER BY s.item_id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(ItemAmount {
            item: Item {
                id: row.get(0)?,
                name: row.get(1)?,
                icon_url: row.get(2)?,
            },
            amount: row.get(3)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn stack(id: &str, name: &str, amount: f64) -> ItemAmount {
        ItemAmount::new(Item::new(id, name), amount)
    }

    fn saw() -> Recipe {
        Recipe {
            id: "r1".to_string(),
            name: "Saw".to_string(),
            input: vec![stack("wood", "Wood", 2.0)],
            output: vec![stack("plank", "Plank", 1.0)],
        }
    }

    fn table() -> Recipe {
        Recipe {
            id: "r2".to_string(),
            name: "Table".to_string(),
            input: vec![stack("plank", "Plank", 4.0), stack("nail", "Nail", 8.0)],
            output: vec![stack("table", "Table", 1.0)],
        }
    }

    #[test]
    fn recipes_round_trip_in_catalog_order() {
        let conn = memory_db();
        upsert_recipe(&conn, &table()).unwrap();
        upsert_recipe(&conn, &saw()).unwrap();

        let mut renamed = table();
        renamed.name = "Big Table".to_string();
        upsert_recipe(&conn, &renamed).unwrap();

        let recipes = load_recipes(&conn).unwrap();
        assert_eq!(recipes.len(), 2);
        assert_eq!(recipes[0], renamed);
        assert_eq!(recipes[1], saw());
    }

    #[test]
    fn recipe_items_are_created_and_keep_explicit_names() {
        let conn = memory_db();
        let mut wood = Item::new("wood", "Oak Wood");
        wood.icon_url = "wood.png".to_string();
        upsert_item(&conn, &wood).unwrap();
        upsert_recipe(&conn, &saw()).unwrap();

        assert_eq!(get_item(&conn, "wood").unwrap(), Some(wood.clone()));
        assert_eq!(get_item(&conn, "plank").unwrap().unwrap().name, "Plank");
        assert_eq!(load_recipes(&conn).unwrap()[0].input[0].item, wood);
        assert_eq!(load_items(&conn).unwrap().len(), 2);
    }

    #[test]
    fn delete_recipe_removes_rows() {
        let conn = memory_db();
        upsert_recipe(&conn, &saw()).unwrap();
        set_preference(&conn, "plank", "r1").unwrap();
        set_preference(&conn, "table", "r2").unwrap();
        assert!(delete_recipe(&conn, "r1").unwrap());
        assert_eq!(load_preferences(&conn).unwrap().len(), 1);
        assert!(!delete_recipe(&conn, "r1").unwrap());
        assert!(load_recipes(&conn).unwrap().is_empty());
    }

    #[test]
    fn preferences_set_and_clear() {
        let conn = memory_db();
        set_preference(&conn, "plank", "r1").unwrap();
        set_preference(&conn, "plank", "r1b").unwrap();
        let prefs = load_preferences(&conn).unwrap();
        assert_eq!(prefs.get("plank").map(String::as_str), Some("r1b"));

        assert!(clear_preference(&conn, "plank").unwrap());
        assert!(!clear_preference(&conn, "plank").unwrap());
        assert!(load_preferences(&conn).unwrap().is_empty());
    }

    #[test]
    fn orders_round_trip() {
        let conn = memory_db();
        upsert_recipe(&conn, &saw()).unwrap();
        upsert_recipe(&conn, &table()).unwrap();
        let recipes = load_recipes(&conn).unwrap();

        let order = Order {
            id: "o1".to_string(),
            name: "Kitchen".to_string(),
            status: OrderStatus::Pending,
            recipes: vec![RecipeRun {
                recipe: recipes[1].clone(),
                amount: 2.0,
            }],
            target_items: vec![stack("table", "Table", 2.0)],
        };
        upsert_order(&conn, &order).unwrap();

        assert_eq!(get_order(&conn, &recipes, "o1").unwrap(), Some(order.clone()));
        assert_eq!(get_order(&conn, &recipes, "o2").unwrap(), None);
        assert_eq!(load_orders(&conn, &recipes).unwrap(), vec![order]);
    }

    #[test]
    fn finds_orders_using_a_recipe() {
        let conn = memory_db();
        upsert_recipe(&conn, &saw()).unwrap();
        upsert_recipe(&conn, &table()).unwrap();
        let order = |id: &str, recipe: Recipe| Order {
            id: id.to_string(),
            name: id.to_string(),
            status: OrderStatus::Pending,
            recipes: vec![
                RecipeRun { recipe: recipe.clone(), amount: 1.0 },
                RecipeRun { recipe, amount: 2.0 },
            ],
            target_items: Vec::new(),
        };
        upsert_order(&conn, &order("o2", table())).unwrap();
        upsert_order(&conn, &order("o1", saw())).unwrap();
        upsert_order(&conn, &order("o3", saw())).unwrap();

        assert_eq!(orders_using_recipe(&conn, "r1").unwrap(), vec!["o1", "o3"]);
        assert_eq!(orders_using_recipe(&conn, "r2").unwrap(), vec!["o2"]);
        assert!(orders_using_recipe(&conn, "r9").unwrap().is_empty());
    }

    #[test]
    fn order_with_deleted_recipe_fails_to_load() {
        let conn = memory_db();
        upsert_recipe(&conn, &saw()).unwrap();
        let order = Order {
            id: "o1".to_string(),
            name: "Planks".to_string(),
            status: OrderStatus::Draft,
            recipes: vec![RecipeRun { recipe: saw(), amount: 1.0 }],
            target_items: Vec::new(),
        };
        upsert_order(&conn, &order).unwrap();
        delete_recipe(&conn, "r1").unwrap();

        let err = load_orders(&conn, &[]).unwrap_err();
        assert!(err.to_string().contains("missing recipe r1"));
    }

    #[test]
    fn inventory_uses_item_names() {
        let conn = memory_db();
        upsert_recipe(&conn, &saw()).unwrap();
        set_stock(&conn, "wood", 5.0).unwrap();
        set_stock(&conn, "wood", 7.0).unwrap();
        set_stock(&conn, "gold", 1.0).unwrap();

        let inventory = load_inventory(&conn).unwrap();
        assert_eq!(inventory, vec![stack("gold", "gold", 1.0), stack("wood", "Wood", 7.0)]);
    }

    #[test]
    fn clear_catalog_empties_items_recipes_and_preferences() {
        let conn = memory_db();
        upsert_recipe(&conn, &saw()).unwrap();
        set_preference(&conn, "plank", "r1").unwrap();
        clear_catalog(&conn).unwrap();
        assert!(load_recipes(&conn).unwrap().is_empty());
        assert!(load_items(&conn).unwrap().is_empty());
        assert!(load_preferences(&conn).unwrap().is_empty());
    }
}
