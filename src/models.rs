//! Data models for items, recipes and orders

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Item id -> id of the recipe that should produce it
pub type RecipePreferences = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon_url: String,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon_url: String::new(),
        }
    }
}

/// A quantity of an item: a recipe input/output entry, or a line of a material list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAmount {
    pub item: Item,
    pub amount: f64,
}

impl ItemAmount {
    pub fn new(item: Item, amount: f64) -> Self {
        Self { item, amount }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub input: Vec<ItemAmount>,
    pub output: Vec<ItemAmount>,
}

impl Recipe {
    pub fn produces(&self, item_id: &str) -> bool {
        self.output.iter().any(|o| o.item.id == item_id)
    }

    pub fn consumes(&self, item_id: &str) -> bool {
        self.input.iter().any(|i| i.item.id == item_id)
    }
}

/// How many times a recipe is executed within an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRun {
    pub recipe: Recipe,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Draft,
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(OrderStatus::Draft),
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// An order: the desired end products plus the recipe runs that make them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub name: String,
    pub status: OrderStatus,
    pub recipes: Vec<RecipeRun>,
    #[serde(default)]
    pub target_items: Vec<ItemAmount>,
}
