use crate::error::PredictError;
use axum::body::to_bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_SERVING_G: f64 = 100.0;
const BODY_LIMIT: usize = 16 * 1024 * 1024;

/// A fully validated request: raw image bytes plus the serving size the
/// nutrition values are scaled to.
#[derive(Debug)]
pub struct ParsedRequest {
	pub image: Vec<u8>,
	pub serving_g: f64,
}

/// Extracts the one image a request must carry. A JSON body is authoritative
/// when the content type says so; it never falls back to the form channels.
pub async fn parse(req: Request) -> Result<ParsedRequest, PredictError> {
	let content_type = req
		.headers()
		.get(header::CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.unwrap_or("")
		.to_owned();

	if content_type.starts_with("application/json") {
		let bytes = to_bytes(req.into_body(), BODY_LIMIT)
			.await
			.map_err(|err| PredictError::Body(err.to_string()))?;
		parse_json(&bytes)
	} else if content_type.starts_with("multipart/form-data") {
		let multipart = Multipart::from_request(req, &())
			.await
			.map_err(|err| PredictError::Multipart(err.to_string()))?;
		parse_multipart(multipart).await
	} else {
		Err(PredictError::MissingImage)
	}
}

#[derive(Debug, Deserialize)]
struct JsonBody {
	#[serde(default)]
	image_base64: Option<String>,
	#[serde(default)]
	serving_g: Option<Value>,
}

fn parse_json(bytes: &[u8]) -> Result<ParsedRequest, PredictError> {
	let body: JsonBody = serde_json::from_slice(bytes)?;

	// serving_g is validated before the image is looked at, so a bad value
	// wins over a missing image, as in the upstream contract.
	let serving_g = match &body.serving_g {
		None => DEFAULT_SERVING_G,
		Some(value) => parse_serving(value)?,
	};

	let payload = body.image_base64.as_deref().map(strip_data_url).unwrap_or("");
	if payload.is_empty() {
		return Err(PredictError::MissingImage);
	}

	Ok(ParsedRequest {
		image: BASE64_STANDARD.decode(payload)?,
		serving_g,
	})
}

async fn parse_multipart(mut multipart: Multipart) -> Result<ParsedRequest, PredictError> {
	let mut file: Option<Vec<u8>> = None;
	let mut encoded: Option<String> = None;
	let mut serving: Option<String> = None;

	while let Some(field) = multipart
		.next_field()
		.await
		.map_err(|err| PredictError::Multipart(err.to_string()))?
	{
		// The field name borrow ends here; reading the body consumes the field.
		let name = field.name().map(str::to_owned);
		match name.as_deref() {
			Some("file") if file.is_none() => {
				let bytes = field
					.bytes()
					.await
					.map_err(|err| PredictError::Multipart(err.to_string()))?;
				file = Some(bytes.to_vec());
			}
			Some("image_base64") if encoded.is_none() => {
				let text = field
					.text()
					.await
					.map_err(|err| PredictError::Multipart(err.to_string()))?;
				encoded = Some(text);
			}
			Some("serving_g") if serving.is_none() => {
				let text = field
					.text()
					.await
					.map_err(|err| PredictError::Multipart(err.to_string()))?;
				serving = Some(text);
			}
			_ => {}
		}
	}

	let serving_g = match serving {
		None => DEFAULT_SERVING_G,
		Some(raw) => parse_serving_str(&raw)?,
	};

	// The file part wins over an inline base64 field.
	let image = if let Some(bytes) = file {
		bytes
	} else if let Some(raw) = encoded {
		BASE64_STANDARD.decode(strip_data_url(&raw))?
	} else {
		return Err(PredictError::MissingImage);
	};

	Ok(ParsedRequest { image, serving_g })
}

/// Drops a data-URL header, i.e. everything up to and including the first
/// comma, when one is present.
fn strip_data_url(payload: &str) -> &str {
	payload
		.split_once(',')
		.map(|(_, rest)| rest)
		.unwrap_or(payload)
}

/// Accepts JSON numbers and numeric strings; anything else is an invalid
/// input that surfaces through the generic failure channel.
fn parse_serving(value: &Value) -> Result<f64, PredictError> {
	match value {
		Value::Number(number) => number
			.as_f64()
			.ok_or_else(|| PredictError::InvalidServing(number.to_string())),
		Value::String(text) => parse_serving_str(text),
		other => Err(PredictError::InvalidServing(other.to_string())),
	}
}

fn parse_serving_str(text: &str) -> Result<f64, PredictError> {
	text.trim()
		.parse()
		.map_err(|_| PredictError::InvalidServing(text.to_owned()))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn encode(bytes: &[u8]) -> String {
		BASE64_STANDARD.encode(bytes)
	}

	#[test]
	fn json_body_with_plain_base64() {
		let body = format!(r#"{{"image_base64": "{}", "serving_g": 150}}"#, encode(b"img"));
		let parsed = parse_json(body.as_bytes()).unwrap();
		assert_eq!(parsed.image, b"img");
		assert_eq!(parsed.serving_g, 150.0);
	}

	#[test]
	fn data_url_prefix_is_stripped_up_to_first_comma() {
		let body = format!(
			r#"{{"image_base64": "data:image/png;base64,{}"}}"#,
			encode(b"img")
		);
		let parsed = parse_json(body.as_bytes()).unwrap();
		assert_eq!(parsed.image, b"img");
		assert_eq!(parsed.serving_g, DEFAULT_SERVING_G);
	}

	#[test]
	fn missing_image_field_is_missing_image() {
		let err = parse_json(br#"{"serving_g": 80}"#).unwrap_err();
		assert!(matches!(err, PredictError::MissingImage));
	}

	#[test]
	fn empty_payload_after_stripping_is_missing_image() {
		let err = parse_json(br#"{"image_base64": "data:image/png;base64,"}"#).unwrap_err();
		assert!(matches!(err, PredictError::MissingImage));
	}

	#[test]
	fn numeric_string_serving_is_accepted() {
		let body = format!(r#"{{"image_base64": "{}", "serving_g": " 75.5 "}}"#, encode(b"x"));
		let parsed = parse_json(body.as_bytes()).unwrap();
		assert_eq!(parsed.serving_g, 75.5);
	}

	#[test]
	fn non_numeric_serving_beats_a_missing_image() {
		let err = parse_json(br#"{"serving_g": "a lot"}"#).unwrap_err();
		assert!(matches!(err, PredictError::InvalidServing(_)));
	}

	#[test]
	fn null_serving_is_invalid_input() {
		let body = format!(r#"{{"image_base64": "{}", "serving_g": null}}"#, encode(b"x"));
		let err = parse_json(body.as_bytes()).unwrap_err();
		assert!(matches!(err, PredictError::InvalidServing(_)));
	}

	#[test]
	fn malformed_json_is_not_missing_image() {
		let err = parse_json(b"{not json").unwrap_err();
		assert!(matches!(err, PredictError::Json(_)));
	}

	#[test]
	fn malformed_base64_is_a_decode_failure() {
		let err = parse_json(br#"{"image_base64": "!!not-base64!!"}"#).unwrap_err();
		assert!(matches!(err, PredictError::Base64(_)));
	}

	#[test]
	fn strip_data_url_leaves_plain_payloads_alone() {
		assert_eq!(strip_data_url("abcd"), "abcd");
		assert_eq!(strip_data_url("data:image/jpeg;base64,abcd"), "abcd");
		// Only the first comma terminates the header.
		assert_eq!(strip_data_url("a,b,c"), "b,c");
	}
}
