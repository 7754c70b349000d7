use burn::config::Config;
use burn::data::dataloader::DataLoaderBuilder;
use burn::data::dataset::Dataset;
use burn::module::Module;
use burn::optim::AdamConfig;
use burn::record::CompactRecorder;
use burn::tensor::backend::AutodiffBackend;
use burn::train::metric::store::{Aggregate, Direction, Split};
use burn::train::metric::{AccuracyMetric, CpuUse, LossMetric};
use burn::train::{LearnerBuilder, MetricEarlyStoppingStrategy, StoppingCondition};
use food_classifier::data::{ClassificationBatcher, FoodDataset};
use food_classifier::labels::LabelMap;
use food_classifier::model::FoodModelConfig;
use std::time::Instant;

pub const TRAIN_DIR: &str = "data/train";
pub const VAL_DIR: &str = "data/val";
pub const ARTIFACT_DIR: &str = "models/training";
pub const MODEL_OUT: &str = "models/food_model";
pub const LABELS_OUT: &str = "models/labels.json";

#[derive(Config)]
pub struct TrainingConfig {
	pub optimizer: AdamConfig,
	#[config(default = 10)]
	pub num_epochs: usize,
	#[config(default = 32)]
	pub batch_size: usize,
	#[config(default = 4)]
	pub num_workers: usize,
	#[config(default = 42)]
	pub seed: u64,
	#[config(default = 1.0e-4)]
	pub learning_rate: f64,
	#[config(default = 4)]
	pub patience: usize,
}

fn create_artifact_dir(artifact_dir: &str) {
	// Remove existing artifacts before to get an accurate learner summary
	std::fs::remove_dir_all(artifact_dir).ok();
	std::fs::create_dir_all(artifact_dir).ok();
}

pub fn run<B: AutodiffBackend>(config: TrainingConfig, device: B::Device) {
	create_artifact_dir(ARTIFACT_DIR);

	config
		.save(format!("{ARTIFACT_DIR}/config.json"))
		.expect("Config should be saved successfully");

	B::seed(config.seed);

	let labels = LabelMap::from_directory(TRAIN_DIR)
		.expect("Train directory should contain one directory per class");
	labels
		.save(LABELS_OUT)
		.expect("Label map should be saved successfully");
	log::info!("found {} classes under {TRAIN_DIR}", labels.len());

	let train_dataset =
		FoodDataset::scan(TRAIN_DIR, &labels).expect("Train split should contain images");
	let valid_dataset =
		FoodDataset::scan(VAL_DIR, &labels).expect("Validation split should contain images");
	log::info!(
		"train images: {}, validation images: {}",
		train_dataset.len(),
		valid_dataset.len()
	);

	let batcher_train = ClassificationBatcher::<B>::new(device.clone(), true);
	let batcher_valid = ClassificationBatcher::<B::InnerBackend>::new(device.clone(), false);

	let dataloader_train = DataLoaderBuilder::new(batcher_train)
		.batch_size(config.batch_size)
		.shuffle(config.seed)
		.num_workers(config.num_workers)
		.build(train_dataset);

	let dataloader_valid = DataLoaderBuilder::new(batcher_valid)
		.batch_size(config.batch_size)
		.num_workers(config.num_workers)
		.build(valid_dataset);

	let model = FoodModelConfig::new(labels.len())
		.init_pretrained::<B>(&device)
		.expect("Pretrained backbone weights should load");

	let learner = LearnerBuilder::new(ARTIFACT_DIR)
		.metric_train_numeric(AccuracyMetric::new())
		.metric_valid_numeric(AccuracyMetric::new())
		.metric_train_numeric(LossMetric::new())
		.metric_valid_numeric(LossMetric::new())
		.metric_train(CpuUse::new())
		.with_file_checkpointer(CompactRecorder::new())
		.early_stopping(MetricEarlyStoppingStrategy::new::<LossMetric<B>>(
			Aggregate::Mean,
			Direction::Lowest,
			Split::Valid,
			StoppingCondition::NoImprovementSince {
				n_epochs: config.patience,
			},
		))
		.devices(vec![device.clone()])
		.num_epochs(config.num_epochs)
		.summary()
		.build(model, config.optimizer.init(), config.learning_rate);

	let now = Instant::now();
	let model_trained = learner.fit(dataloader_train, dataloader_valid);
	let elapsed = now.elapsed().as_secs();
	log::info!("training completed in {}m{}s", elapsed / 60, elapsed % 60);

	model_trained
		.save_file(MODEL_OUT, &CompactRecorder::new())
		.expect("Trained model should be saved successfully");
	log::info!("saved model to {MODEL_OUT}.mpk and labels to {LABELS_OUT}");
}
