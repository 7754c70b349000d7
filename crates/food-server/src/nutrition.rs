use food_classifier::FoodClassError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Per-100g reference values. Fields absent from the table default to 0.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Nutrients {
	#[serde(rename = "calories_kcal_per_100g", default)]
	pub calories_kcal: f64,
	#[serde(rename = "protein_g_per_100g", default)]
	pub protein_g: f64,
	#[serde(rename = "carbohydrates_g_per_100g", default)]
	pub carbs_g: f64,
	#[serde(rename = "fat_g_per_100g", default)]
	pub fat_g: f64,
	#[serde(rename = "fiber_g_per_100g", default)]
	pub fiber_g: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PerServing {
	pub calories_kcal: f64,
	pub protein_g: f64,
	pub carbs_g: f64,
	pub fat_g: f64,
	pub fiber_g: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScaledNutrition {
	pub serving_g: f64,
	pub per_serving: PerServing,
}

/// Static class-name to nutrients lookup, loaded once at startup.
#[derive(Debug, Clone)]
pub struct NutritionTable {
	entries: HashMap<String, Nutrients>,
}

impl NutritionTable {
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FoodClassError> {
		Ok(Self {
			entries: serde_json::from_str(&fs::read_to_string(path)?)?,
		})
	}

	#[cfg(test)]
	pub fn from_json(json: &str) -> Self {
		Self {
			entries: serde_json::from_str(json).unwrap(),
		}
	}

	/// Linear scaling by `serving_g / 100`, each macro rounded to 1 decimal.
	/// Unknown labels yield `None`, which serializes as a null nutrition
	/// field rather than an error.
	pub fn scaled(&self, label: &str, serving_g: f64) -> Option<ScaledNutrition> {
		let entry = self.entries.get(label)?;
		let factor = serving_g / 100.0;
		Some(ScaledNutrition {
			serving_g,
			per_serving: PerServing {
				calories_kcal: round1(entry.calories_kcal * factor),
				protein_g: round1(entry.protein_g * factor),
				carbs_g: round1(entry.carbs_g * factor),
				fat_g: round1(entry.fat_g * factor),
				fiber_g: round1(entry.fiber_g * factor),
			},
		})
	}
}

/// Half-away-from-zero rounding to 1 decimal place.
fn round1(value: f64) -> f64 {
	(value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
	use super::*;

	const TABLE: &str = r#"{
		"pizza": {
			"calories_kcal_per_100g": 266,
			"protein_g_per_100g": 11,
			"carbohydrates_g_per_100g": 33,
			"fat_g_per_100g": 10,
			"fiber_g_per_100g": 2.3
		},
		"dosa": {
			"calories_kcal_per_100g": 200,
			"protein_g_per_100g": 10
		}
	}"#;

	#[test]
	fn default_serving_reproduces_table_values() {
		let table = NutritionTable::from_json(TABLE);
		let scaled = table.scaled("pizza", 100.0).unwrap();
		assert_eq!(scaled.serving_g, 100.0);
		assert_eq!(scaled.per_serving.calories_kcal, 266.0);
		assert_eq!(scaled.per_serving.protein_g, 11.0);
		assert_eq!(scaled.per_serving.carbs_g, 33.0);
		assert_eq!(scaled.per_serving.fat_g, 10.0);
		assert_eq!(scaled.per_serving.fiber_g, 2.3);
	}

	#[test]
	fn half_serving_halves_every_macro() {
		let table = NutritionTable::from_json(TABLE);
		let scaled = table.scaled("dosa", 50.0).unwrap();
		assert_eq!(scaled.per_serving.calories_kcal, 100.0);
		assert_eq!(scaled.per_serving.protein_g, 5.0);
	}

	#[test]
	fn missing_table_fields_scale_as_zero() {
		let table = NutritionTable::from_json(TABLE);
		let scaled = table.scaled("dosa", 150.0).unwrap();
		assert_eq!(scaled.per_serving.carbs_g, 0.0);
		assert_eq!(scaled.per_serving.fat_g, 0.0);
		assert_eq!(scaled.per_serving.fiber_g, 0.0);
	}

	#[test]
	fn unknown_label_is_none_not_error() {
		let table = NutritionTable::from_json(TABLE);
		assert!(table.scaled("sushi", 100.0).is_none());
	}

	#[test]
	fn rounds_half_away_from_zero_to_one_decimal() {
		let table = NutritionTable::from_json(r#"{"x": {"fiber_g_per_100g": 4.5}}"#);
		// 4.5 * 0.5 = 2.25 -> 2.3 under half-away-from-zero.
		let scaled = table.scaled("x", 50.0).unwrap();
		assert_eq!(scaled.per_serving.fiber_g, 2.3);
	}
}
