use crate::context::{ServeBackend, ServiceContext};
use crate::error::PredictError;
use crate::nutrition::{NutritionTable, ScaledNutrition};
use crate::request::{self, ParsedRequest};
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use food_classifier::labels::LabelMap;
use food_classifier::{infer, preprocess};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

const TOP_K: usize = 3;

#[derive(Debug, Serialize)]
pub struct PredictResponse {
	pub predictions: Vec<PredictionEntry>,
}

#[derive(Debug, Serialize)]
pub struct PredictionEntry {
	pub label: String,
	pub confidence: f64,
	pub nutrition: Option<ScaledNutrition>,
}

pub async fn predict(State(ctx): State<Arc<ServiceContext>>, req: Request) -> Response {
	match request::parse(req).await.and_then(|parsed| classify(&ctx, &parsed)) {
		Ok(response) => Json(response).into_response(),
		Err(err) => {
			tracing::warn!("prediction failed: {err}");
			err.into_response()
		}
	}
}

pub async fn health() -> Json<serde_json::Value> {
	Json(json!({ "status": "OK" }))
}

/// Decode, one forward pass, top-3 with nutrition. Decode and inference
/// block the calling task for their full duration.
fn classify(ctx: &ServiceContext, parsed: &ParsedRequest) -> Result<PredictResponse, PredictError> {
	let image = preprocess::decode(&parsed.image)?;
	let input = preprocess::to_batch::<ServeBackend>(&image, &ctx.device);
	let probs = infer::probabilities(ctx.model.forward(input));

	Ok(PredictResponse {
		predictions: build_predictions(&probs, &ctx.labels, &ctx.nutrition, parsed.serving_g),
	})
}

fn build_predictions(
	probs: &[f32],
	labels: &LabelMap,
	nutrition: &NutritionTable,
	serving_g: f64,
) -> Vec<PredictionEntry> {
	infer::top_k(probs, TOP_K)
		.into_iter()
		.map(|(index, confidence)| {
			// A label index outside the map degrades to its string form
			// instead of failing the whole request.
			let label = labels
				.get(index)
				.map(str::to_owned)
				.unwrap_or_else(|| index.to_string());
			PredictionEntry {
				nutrition: nutrition.scaled(&label, serving_g),
				confidence: round4(confidence as f64),
				label,
			}
		})
		.collect()
}

fn round4(value: f64) -> f64 {
	(value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
	use super::*;
	use food_classifier::labels::LabelMap;
	use std::collections::HashMap;

	fn labels(names: &[&str]) -> LabelMap {
		let entries: HashMap<String, String> = names
			.iter()
			.enumerate()
			.map(|(i, n)| (i.to_string(), n.to_string()))
			.collect();
		LabelMap::from_index_map(entries).unwrap()
	}

	fn table() -> NutritionTable {
		NutritionTable::from_json(
			r#"{"pizza": {"calories_kcal_per_100g": 200, "protein_g_per_100g": 10}}"#,
		)
	}

	#[test]
	fn three_entries_sorted_by_confidence() {
		let predictions = build_predictions(
			&[0.05, 0.7, 0.2, 0.05],
			&labels(&["dosa", "pizza", "samosa", "idli"]),
			&table(),
			100.0,
		);

		assert_eq!(predictions.len(), 3);
		assert_eq!(predictions[0].label, "pizza");
		assert_eq!(predictions[1].label, "samosa");
		assert!(predictions[0].confidence >= predictions[1].confidence);
		assert!(predictions[1].confidence >= predictions[2].confidence);
	}

	#[test]
	fn tied_confidences_keep_ascending_index_order() {
		let predictions = build_predictions(
			&[0.25, 0.25, 0.25, 0.25],
			&labels(&["a", "b", "c", "d"]),
			&table(),
			100.0,
		);
		let names: Vec<&str> = predictions.iter().map(|p| p.label.as_str()).collect();
		assert_eq!(names, vec!["a", "b", "c"]);
	}

	#[test]
	fn nutrition_scales_with_serving_and_is_null_when_unknown() {
		let predictions = build_predictions(
			&[0.1, 0.9],
			&labels(&["dosa", "pizza"]),
			&table(),
			50.0,
		);

		let pizza = &predictions[0];
		let nutrition = pizza.nutrition.as_ref().unwrap();
		assert_eq!(nutrition.serving_g, 50.0);
		assert_eq!(nutrition.per_serving.calories_kcal, 100.0);
		assert_eq!(nutrition.per_serving.protein_g, 5.0);

		// dosa is not in the table: omitted, not an error.
		assert!(predictions[1].nutrition.is_none());
	}

	#[test]
	fn unknown_index_falls_back_to_its_string_form() {
		// Only two labels known, but four class probabilities.
		let predictions = build_predictions(
			&[0.1, 0.2, 0.3, 0.4],
			&labels(&["dosa", "pizza"]),
			&table(),
			100.0,
		);
		assert_eq!(predictions[0].label, "3");
		assert_eq!(predictions[1].label, "2");
		assert_eq!(predictions[2].label, "pizza");
	}

	#[test]
	fn confidence_is_rounded_to_four_decimals() {
		let predictions =
			build_predictions(&[0.123456, 0.876544], &labels(&["dosa", "pizza"]), &table(), 100.0);
		assert_eq!(predictions[0].confidence, 0.8765);
		assert_eq!(predictions[1].confidence, 0.1235);
	}

	#[test]
	fn response_serializes_to_the_wire_contract() {
		let response = PredictResponse {
			predictions: build_predictions(&[0.9, 0.1], &labels(&["pizza", "dosa"]), &table(), 100.0),
		};
		let value = serde_json::to_value(&response).unwrap();

		let first = &value["predictions"][0];
		assert_eq!(first["label"], "pizza");
		assert_eq!(first["nutrition"]["serving_g"], 100.0);
		assert_eq!(first["nutrition"]["per_serving"]["calories_kcal"], 200.0);
		assert!(value["predictions"][1]["nutrition"].is_null());
	}
}
