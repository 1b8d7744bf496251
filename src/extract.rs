//! Recipe definition import
//!
//! Reads line-oriented `*.recipes` files:
//!
//! ```text
//! # comment
//! item wood "Wood" https://example.invalid/wood.png
//! recipe r1 "Saw planks": 2 wood -> 1 plank
//! prefer plank r1
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use regex::Regex;
use rusqlite::Connection;
use walkdir::WalkDir;

use crate::catalog::{is_recipe_name_taken, validate_recipe};
use crate::db;
use crate::models::{Item, ItemAmount, Recipe};

pub const RECIPE_FILE_EXTENSION: &str = "recipes";

/// Line patterns of the definition format
struct Patterns {
    item: Regex,
    recipe: Regex,
    entry: Regex,
    prefer: Regex,
}

impl Patterns {
    fn new() -> Result<Self> {
        Ok(Self {
            // item <id> "<name>" [icon url]
            item: Regex::new(r#"^item\s+([\w-]+)\s+"([^"]+)"(?:\s+(\S+))?$"#)?,
            // recipe <id> "<name>": <entries> -> <entries>
            recipe: Regex::new(r#"^recipe\s+([\w-]+)\s+"([^"]+)"\s*:\s*(.+?)\s*->\s*(.+)$"#)?,
            // 2 wood, 2x wood, 1.5 x coal
            entry: Regex::new(r"^(\d+(?:\.\d+)?)\s*x?\s+([\w-]+)$")?,
            prefer: Regex::new(r"^prefer\s+([\w-]+)\s+([\w-]+)$")?,
        })
    }
}

/// Everything parsed out of one definition file
#[derive(Debug, Default)]
pub struct ParsedDefinitions {
    pub items: Vec<Item>,
    pub recipes: Vec<Recipe>,
    /// (item id, recipe id)
    pub preferences: Vec<(String, String)>,
    pub skipped_lines: Vec<usize>,
}

/// Find all recipe definition files below `dir`, sorted by path
pub fn find_recipe_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == RECIPE_FILE_EXTENSION) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Parse "2 wood, 1.5 coal" into entries; `None` if any entry is malformed
fn parse_entries(entry_re: &Regex, list: &str, items: &HashMap<String, Item>) -> Option<Vec<ItemAmount>> {
    list.split(',')
        .map(|raw| {
            let cap = entry_re.captures(raw.trim())?;
            let amount = cap[1].parse::<f64>().ok()?;
            let id = &cap[2];
            let item = items.get(id).cloned().unwrap_or_else(|| Item::new(id, id));
            Some(ItemAmount::new(item, amount))
        })
        .collect()
}

/// Parse definition text. Items declared anywhere in the text are known to
/// every recipe in it.
pub fn parse_definitions(content: &str) -> Result<ParsedDefinitions> {
    let patterns = Patterns::new()?;
    let mut parsed = ParsedDefinitions::default();
    let mut items: HashMap<String, Item> = HashMap::new();

    // items first so recipes pick up their names regardless of line order
    for line in content.lines().map(str::trim) {
        if let Some(cap) = patterns.item.captures(line) {
            let item = Item {
                id: cap[1].to_string(),
                name: cap[2].to_string(),
                icon_url: cap.get(3).map_or_else(String::new, |m| m.as_str().to_string()),
            };
            items.insert(item.id.clone(), item.clone());
            parsed.items.push(item);
        }
    }

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || patterns.item.is_match(line) {
            continue;
        }

        if let Some(cap) = patterns.recipe.captures(line) {
            let input = parse_entries(&patterns.entry, &cap[3], &items);
            let output = parse_entries(&patterns.entry, &cap[4], &items);
            match (input, output) {
                (Some(input), Some(output)) => parsed.recipes.push(Recipe {
                    id: cap[1].to_string(),
                    name: cap[2].to_string(),
                    input,
                    output,
                }),
                _ => parsed.skipped_lines.push(index + 1),
            }
        } else if let Some(cap) = patterns.prefer.captures(line) {
            parsed.preferences.push((cap[1].to_string(), cap[2].to_string()));
        } else {
            parsed.skipped_lines.push(index + 1);
        }
    }

    Ok(parsed)
}

/// Import every definition file below `dir` into the database
pub fn extract_to_database(conn: &Connection, dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    info!("Scanning {} for recipe files", dir.display());
    let files = find_recipe_files(dir)?;
    info!("Found {} recipe files", files.len());

    let mut known = db::load_recipes(conn)?;

    for filepath in &files {
        let content = fs::read_to_string(filepath)
            .with_context(|| format!("Failed to read {}", filepath.display()))?;
        let parsed = parse_definitions(&content)
            .with_context(|| format!("Failed to parse {}", filepath.display()))?;

        for line in &parsed.skipped_lines {
            warn!("{}:{}: unrecognised line skipped", filepath.display(), line);
        }
        stats.skipped += parsed.skipped_lines.len();

        for item in &parsed.items {
            db::upsert_item(conn, item)?;
        }
        stats.items += parsed.items.len();

        for recipe in &parsed.recipes {
            if let Err(e) = validate_recipe(recipe) {
                warn!("{}: {}", filepath.display(), e);
                stats.errors += 1;
                continue;
            }
            if is_recipe_name_taken(&known, &recipe.name, Some(recipe.id.as_str())) {
                warn!(
                    "{}: recipe {} reuses the name \"{}\"",
                    filepath.display(),
                    recipe.id,
                    recipe.name
                );
                stats.errors += 1;
                continue;
            }
            db::upsert_recipe(conn, recipe)?;
            match known.iter_mut().find(|r| r.id == recipe.id) {
                Some(existing) => *existing = recipe.clone(),
                None => known.push(recipe.clone()),
            }
            stats.recipes += 1;
        }

        for (item_id, recipe_id) in &parsed.preferences {
            db::set_preference(conn, item_id, recipe_id)?;
        }
        stats.preferences += parsed.preferences.len();

        info!(
            "Parsed {} ({} items, {} recipes)",
            filepath.display(),
            parsed.items.len(),
            parsed.recipes.len()
        );
    }

    Ok(stats)
}

#[derive(Debug, Default, PartialEq)]
pub struct ImportStats {
    pub items: usize,
    pub recipes: usize,
    pub preferences: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} items, {} recipes, {} preferences. Skipped lines: {}, Errors: {}",
            self.items, self.recipes, self.preferences, self.skipped, self.errors
        )
    }
}
