//! Recipe Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CocktailId, IngredientId};

/// One ingredient line of a cocktail recipe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeLine {
    pub ingredient_id: IngredientId,
    pub quantity: Decimal,
    /// Physical dispenser position (e.g. `P1`); only set when the ingredient
    /// is assigned a position and currently enabled
    pub slot_label: Option<String>,
    pub is_optional: bool,
    pub sequence: i32,
}

/// Cocktail recipe, lines ordered by `sequence`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub cocktail_id: CocktailId,
    pub name: String,
    pub lines: Vec<RecipeLine>,
}

impl Recipe {
    /// Lines that must be consumed from inventory
    pub fn required_lines(&self) -> impl Iterator<Item = &RecipeLine> {
        self.lines.iter().filter(|l| !l.is_optional)
    }

    /// Lines the device can pour, in recipe order
    pub fn dispensable_lines(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.lines
            .iter()
            .filter_map(|l| l.slot_label.as_deref().map(|slot| (slot, l.quantity)))
    }
}
