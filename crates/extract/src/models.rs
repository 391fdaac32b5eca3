use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::category::Category;
use crate::schema::get_schema;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BikeFrame {
    pub material: String,
    pub weight: String,
    pub geometry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BikeGroupset {
    pub brand: String,
    pub model: String,
    pub speeds: f64,
    pub electronic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BikeWheels {
    pub brand: Option<String>,
    pub rim_depth: Option<String>,
    pub tubeless: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourDeFranceHistory {
    #[serde(rename = "usedInTDF")]
    pub used_in_tdf: bool,
    pub teams: Option<Vec<String>>,
    pub victories: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadBike {
    pub model: String,
    pub brand: String,
    pub year: f64,
    pub category: String,
    pub frame: BikeFrame,
    pub groupset: BikeGroupset,
    pub wheels: Option<BikeWheels>,
    pub price: f64,
    pub weight: String,
    pub features: Vec<String>,
    pub tour_de_france_history: Option<TourDeFranceHistory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumTrack {
    pub number: f64,
    pub title: String,
    pub duration: String,
    pub featuring: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub title: String,
    pub artist: String,
    pub release_year: f64,
    pub genre: String,
    pub label: Option<String>,
    pub tracks: Vec<AlbumTrack>,
    pub producers: Option<Vec<String>>,
    pub awards: Option<Vec<String>>,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub item: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NutritionInfo {
    pub calories: Option<f64>,
    pub protein: Option<String>,
    pub carbs: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub name: String,
    pub cuisine: String,
    pub difficulty: String,
    pub prep_time: f64,
    pub cook_time: f64,
    pub servings: f64,
    pub ingredients: Vec<RecipeIngredient>,
    pub instructions: Vec<String>,
    pub tags: Option<Vec<String>>,
    pub nutrition_info: Option<NutritionInfo>,
}

/// A finished, validated extraction
#[derive(Debug, Clone)]
pub enum Extracted {
    RoadBike(RoadBike),
    Album(Album),
    Recipe(Recipe),
}

impl Extracted {
    /// Validate against the category schema, then deserialize
    pub fn from_value(category: Category, value: &Value) -> Result<Self> {
        get_schema(category).validate(value)?;

        let extracted = match category {
            Category::RoadBike => Extracted::RoadBike(
                serde_json::from_value(value.clone()).context("Failed to read road bike")?,
            ),
            Category::Album => Extracted::Album(
                serde_json::from_value(value.clone()).context("Failed to read album")?,
            ),
            Category::Recipe => Extracted::Recipe(
                serde_json::from_value(value.clone()).context("Failed to read recipe")?,
            ),
        };
        Ok(extracted)
    }

    pub fn category(&self) -> Category {
        match self {
            Extracted::RoadBike(_) => Category::RoadBike,
            Extracted::Album(_) => Category::Album,
            Extracted::Recipe(_) => Category::Recipe,
        }
    }

    /// One-line summary for terminals and logs
    pub fn headline(&self) -> String {
        match self {
            Extracted::RoadBike(b) => format!("{} {} ({}), {}", b.brand, b.model, b.year, b.category),
            Extracted::Album(a) => format!("{} by {} ({}), {} tracks", a.title, a.artist, a.release_year, a.tracks.len()),
            Extracted::Recipe(r) => format!(
                "{} ({}), {}, serves {}",
                r.name, r.cuisine, r.difficulty, r.servings
            ),
        }
    }
}
