//! Cocktail catalog
//!
//! Recipes and the initial inventory are loaded from a JSON file:
//!
//! ```json
//! {
//!   "ingredients": [{ "id": 1, "name": "Gin", "slot_label": "P1" }],
//!   "cocktails": [{ "id": 1, "name": "Gin Tonic",
//!                   "recipe": [{ "ingredient_id": 1, "quantity": 60, "sequence": 1 }] }],
//!   "inventory": [{ "id": 1, "event_id": 1, "ingredient_id": 1, "quantity": 700 }]
//! }
//! ```
//!
//! A recipe line gets the ingredient's slot label only while the ingredient
//! is available; lines without a slot are consumed but never poured.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::models::{
    CocktailId, EventId, IngredientId, InventoryRecord, InventoryRecordId, Recipe, RecipeLine,
};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Recipe lookup by cocktail id
#[async_trait]
pub trait RecipeSource: Send + Sync {
    async fn recipe(&self, cocktail_id: CocktailId) -> Option<Recipe>;
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Cocktail {cocktail_id} references unknown ingredient {ingredient_id}")]
    UnknownIngredient {
        cocktail_id: CocktailId,
        ingredient_id: IngredientId,
    },
}

fn default_true() -> bool {
    true
}

fn default_unit() -> String {
    "ml".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientEntry {
    pub id: IngredientId,
    pub name: String,
    /// Dispenser position, e.g. `P1`
    #[serde(default)]
    pub slot_label: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeItem {
    pub ingredient_id: IngredientId,
    pub quantity: Decimal,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default)]
    pub sequence: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CocktailEntry {
    pub id: CocktailId,
    pub name: String,
    pub recipe: Vec<RecipeItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventorySeed {
    pub id: InventoryRecordId,
    pub event_id: EventId,
    pub ingredient_id: IngredientId,
    pub quantity: Decimal,
    #[serde(default = "default_unit")]
    pub unit: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub ingredients: Vec<IngredientEntry>,
    #[serde(default)]
    pub cocktails: Vec<CocktailEntry>,
    #[serde(default)]
    pub inventory: Vec<InventorySeed>,
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Resolve cocktails into recipes with slot labels filled in
    pub fn recipes(&self) -> Result<CatalogRecipes, CatalogError> {
        let ingredients: HashMap<IngredientId, &IngredientEntry> =
            self.ingredients.iter().map(|i| (i.id, i)).collect();

        let mut recipes = HashMap::with_capacity(self.cocktails.len());
        for cocktail in &self.cocktails {
            let mut lines = Vec::with_capacity(cocktail.recipe.len());
            for item in &cocktail.recipe {
                let ingredient = ingredients.get(&item.ingredient_id).ok_or(
                    CatalogError::UnknownIngredient {
                        cocktail_id: cocktail.id,
                        ingredient_id: item.ingredient_id,
                    },
                )?;
                lines.push(RecipeLine {
                    ingredient_id: item.ingredient_id,
                    quantity: item.quantity,
                    slot_label: ingredient
                        .slot_label
                        .clone()
                        .filter(|_| ingredient.is_available),
                    is_optional: item.is_optional,
                    sequence: item.sequence,
                });
            }
            lines.sort_by_key(|l| l.sequence);

            recipes.insert(
                cocktail.id,
                Recipe {
                    cocktail_id: cocktail.id,
                    name: cocktail.name.clone(),
                    lines,
                },
            );
        }

        Ok(CatalogRecipes { recipes })
    }

    pub fn inventory_records(&self) -> Vec<InventoryRecord> {
        self.inventory
            .iter()
            .map(|seed| InventoryRecord {
                id: seed.id,
                event_id: seed.event_id,
                ingredient_id: seed.ingredient_id,
                initial_quantity: seed.quantity,
                current_quantity: seed.quantity,
                unit: seed.unit.clone(),
            })
            .collect()
    }
}

/// Resolved recipes held in memory
#[derive(Debug, Clone, Default)]
pub struct CatalogRecipes {
    recipes: HashMap<CocktailId, Recipe>,
}

impl CatalogRecipes {
    pub fn new(recipes: impl IntoIterator<Item = Recipe>) -> Self {
        Self {
            recipes: recipes.into_iter().map(|r| (r.cocktail_id, r)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

#[async_trait]
impl RecipeSource for CatalogRecipes {
    async fn recipe(&self, cocktail_id: CocktailId) -> Option<Recipe> {
        self.recipes.get(&cocktail_id).cloned()
    }
}
