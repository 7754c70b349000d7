use crate::nutrition::NutritionTable;
use anyhow::Context;
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::NdArray;
use burn::module::Module;
use burn::record::{CompactRecorder, Recorder};
use food_classifier::labels::LabelMap;
use food_classifier::model::{FoodClassifier, FoodModelConfig};

/// CPU backend for serving; the trained record is backend-agnostic.
pub type ServeBackend = NdArray<f32>;

pub const MODEL_PATH: &str = "models/food_model";
pub const LABELS_PATH: &str = "models/labels.json";
pub const NUTRITION_PATH: &str = "nutrients/label_to_nutrients.json";

/// Everything a request needs, loaded once at startup and immutable
/// afterwards, so concurrent handlers share it without locking.
pub struct ServiceContext {
	pub model: FoodClassifier<ServeBackend>,
	pub device: NdArrayDevice,
	pub labels: LabelMap,
	pub nutrition: NutritionTable,
}

impl ServiceContext {
	/// Fails fast when any artifact is missing; there is no
	/// partial-availability mode.
	pub fn load() -> anyhow::Result<Self> {
		let device = NdArrayDevice::default();

		let labels = LabelMap::load(LABELS_PATH)
			.with_context(|| format!("loading label map from {LABELS_PATH}"))?;
		let nutrition = NutritionTable::load(NUTRITION_PATH)
			.with_context(|| format!("loading nutrition table from {NUTRITION_PATH}"))?;

		let record = CompactRecorder::new()
			.load(MODEL_PATH.into(), &device)
			.with_context(|| format!("loading trained model from {MODEL_PATH}.mpk"))?;
		let model = FoodModelConfig::new(labels.len())
			.init::<ServeBackend>(&device)
			.load_record(record);

		Ok(Self {
			model,
			device,
			labels,
			nutrition,
		})
	}
}
