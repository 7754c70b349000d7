use burn::record::RecorderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FoodClassError {
	#[error("failed to decode image: {0}")]
	Decode(#[from] image::ImageError),
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("invalid JSON: {0}")]
	Json(#[from] serde_json::Error),
	#[error(transparent)]
	Recorder(#[from] RecorderError),
	#[error("label map is not a dense index range: {0}")]
	LabelMap(String),
	#[error("no classes or images found under {0}")]
	EmptyDataset(String),
}
