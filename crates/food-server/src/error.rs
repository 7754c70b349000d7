use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use food_classifier::FoodClassError;
use serde_json::json;
use thiserror::Error;

/// Every way a /predict request can fail. Only [`PredictError::MissingImage`]
/// is a client-distinguishable 400; everything else surfaces as a 500
/// carrying the error text, matching the deliberately coarse upstream
/// contract.
#[derive(Debug, Error)]
pub enum PredictError {
	#[error("No image provided")]
	MissingImage,
	#[error("serving_g is not a number: {0:?}")]
	InvalidServing(String),
	#[error("invalid JSON body: {0}")]
	Json(#[from] serde_json::Error),
	#[error("invalid base64 image payload: {0}")]
	Base64(#[from] base64::DecodeError),
	#[error("failed to read request body: {0}")]
	Body(String),
	#[error("malformed multipart form: {0}")]
	Multipart(String),
	#[error(transparent)]
	Classifier(#[from] FoodClassError),
}

impl PredictError {
	fn status(&self) -> StatusCode {
		match self {
			PredictError::MissingImage => StatusCode::BAD_REQUEST,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for PredictError {
	fn into_response(self) -> Response {
		(self.status(), Json(json!({ "error": self.to_string() }))).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_image_is_the_only_bad_request() {
		assert_eq!(PredictError::MissingImage.status(), StatusCode::BAD_REQUEST);
		assert_eq!(
			PredictError::InvalidServing("abc".into()).status(),
			StatusCode::INTERNAL_SERVER_ERROR
		);
		assert_eq!(
			PredictError::Body("truncated".into()).status(),
			StatusCode::INTERNAL_SERVER_ERROR
		);
	}

	#[test]
	fn missing_image_message_is_stable() {
		assert_eq!(PredictError::MissingImage.to_string(), "No image provided");
	}
}
