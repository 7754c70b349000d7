use crate::confusion::ConfusionMatrix;
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{CompactRecorder, Recorder};
use food_classifier::data::is_image_file;
use food_classifier::labels::LabelMap;
use food_classifier::model::FoodModelConfig;
use food_classifier::{infer, preprocess};
use std::fs;
use std::path::Path;

pub const TEST_DIR: &str = "data/test";
pub const MODEL_PATH: &str = "models/food_model";
pub const LABELS_PATH: &str = "models/labels.json";
pub const CONFUSION_OUT: &str = "models/confusion_matrix.bin";

pub fn run<B: Backend>(device: B::Device) {
	let labels = LabelMap::load(LABELS_PATH)
		.expect("Label map should exist, run the trainer first");
	log::info!("classes: {}", labels.len());

	let record = CompactRecorder::new()
		.load(MODEL_PATH.into(), &device)
		.expect("Trained model should exist, run the trainer first");
	let model = FoodModelConfig::new(labels.len())
		.init::<B>(&device)
		.load_record(record);

	let mut matrix = ConfusionMatrix::new(labels.len());
	for (truth, name) in labels.iter() {
		let class_dir = Path::new(TEST_DIR).join(name);
		if !class_dir.is_dir() {
			log::warn!("no test directory for class {name:?}");
			continue;
		}

		for entry in class_dir
			.read_dir()
			.expect("Test class directory should be readable")
		{
			let path = entry.expect("Test directory entry should be readable").path();
			if !is_image_file(&path) {
				continue;
			}

			// Unreadable files are reported and skipped, the run continues.
			let image = match preprocess::open(&path) {
				Ok(image) => image,
				Err(err) => {
					log::error!("error reading {}: {err}", path.display());
					continue;
				}
			};

			let input = preprocess::to_batch::<B>(&image, &device);
			let probs = infer::probabilities(model.forward(input));
			let predicted = infer::top_k(&probs, 1)[0].0;
			matrix.record(truth, predicted);
		}
	}

	if matrix.total() == 0 {
		log::warn!("no test images found under {TEST_DIR}");
		return;
	}

	log::info!(
		"test accuracy (top-1): {:.4} ({}/{})",
		matrix.accuracy(),
		matrix.correct(),
		matrix.total()
	);
	for (class, name) in labels.iter() {
		log::info!(
			"{name:<24} precision {:.3}  recall {:.3}",
			matrix.precision(class),
			matrix.recall(class)
		);
	}

	let bytes = bincode::serialize(&matrix).expect("Confusion matrix should serialize");
	fs::write(CONFUSION_OUT, bytes).expect("Confusion matrix artifact should be writable");
	log::info!("saved confusion matrix to {CONFUSION_OUT}");
}
