use crate::error::FoodClassError;
use crate::labels::LabelMap;
use crate::preprocess;
use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::{Backend, ElementConversion, Int};
use burn::tensor::{Tensor, TensorData};
use image::imageops;
use rand::{thread_rng, Rng};
use std::path::{Path, PathBuf};

pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub fn is_image_file(path: &Path) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.map(|ext| {
			let ext = ext.to_ascii_lowercase();
			IMAGE_EXTENSIONS.contains(&ext.as_str())
		})
		.unwrap_or(false)
}

/// One labeled sample. Pixels are loaded lazily by the batcher so the whole
/// dataset never sits in memory at once.
#[derive(Debug, Clone)]
pub struct FoodItem {
	pub path: PathBuf,
	pub label: usize,
}

pub struct FoodDataset {
	items: Vec<FoodItem>,
}

impl FoodDataset {
	/// Walks `root/<class_name>/` for every class in the label map. A class
	/// directory missing from this split is skipped with a warning.
	pub fn scan<P: AsRef<Path>>(root: P, labels: &LabelMap) -> Result<Self, FoodClassError> {
		let root = root.as_ref();
		let mut items = Vec::new();

		for (label, name) in labels.iter() {
			let class_dir = root.join(name);
			if !class_dir.is_dir() {
				log::warn!("no {name:?} directory under {}", root.display());
				continue;
			}
			for entry in class_dir.read_dir()? {
				let path = entry?.path();
				if is_image_file(&path) {
					items.push(FoodItem { path, label });
				}
			}
		}

		if items.is_empty() {
			return Err(FoodClassError::EmptyDataset(root.display().to_string()));
		}
		Ok(Self { items })
	}
}

impl Dataset<FoodItem> for FoodDataset {
	fn get(&self, index: usize) -> Option<FoodItem> {
		self.items.get(index).cloned()
	}

	fn len(&self) -> usize {
		self.items.len()
	}
}

#[derive(Debug, Clone)]
pub struct ClassificationBatch<B: Backend> {
	pub images: Tensor<B, 4>,
	pub targets: Tensor<B, 1, Int>,
}

#[derive(Clone)]
pub struct ClassificationBatcher<B: Backend> {
	device: B::Device,
	augment: bool,
}

impl<B: Backend> ClassificationBatcher<B> {
	/// `augment` enables the random horizontal flip used on the train split.
	pub fn new(device: B::Device, augment: bool) -> Self {
		Self { device, augment }
	}
}

impl<B: Backend> Batcher<FoodItem, ClassificationBatch<B>> for ClassificationBatcher<B> {
	fn batch(&self, items: Vec<FoodItem>) -> ClassificationBatch<B> {
		let mut rng = thread_rng();
		let mut images = Vec::with_capacity(items.len());
		let mut targets = Vec::with_capacity(items.len());

		for item in items {
			let image = match preprocess::open(&item.path) {
				Ok(image) => image,
				Err(err) => {
					log::warn!("skipping unreadable image {}: {err}", item.path.display());
					continue;
				}
			};

			let mut rgb = preprocess::to_model_rgb(&image);
			if self.augment && rng.gen_bool(0.5) {
				rgb = imageops::flip_horizontal(&rgb);
			}

			images.push(preprocess::to_tensor::<B>(rgb, &self.device));
			targets.push(Tensor::<B, 1, Int>::from_data(
				TensorData::from([(item.label as i64).elem::<B::IntElem>()]),
				&self.device,
			));
		}

		ClassificationBatch {
			images: Tensor::stack(images, 0),
			targets: Tensor::cat(targets, 0),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::labels::LabelMap;
	use burn::backend::ndarray::NdArrayDevice;
	use burn::backend::NdArray;
	use image::{Rgb, RgbImage};
	use std::fs;

	fn fixture_tree(tag: &str, classes: &[&str]) -> PathBuf {
		let root = std::env::temp_dir().join(format!("food-data-{tag}-{}", std::process::id()));
		for (i, class) in classes.iter().enumerate() {
			let dir = root.join(class);
			fs::create_dir_all(&dir).unwrap();
			let image = RgbImage::from_pixel(8, 8, Rgb([(i * 40) as u8, 0, 0]));
			image.save(dir.join("sample.png")).unwrap();
			fs::write(dir.join("notes.txt"), "not an image").unwrap();
		}
		root
	}

	#[test]
	fn scan_pairs_images_with_label_indices() {
		let root = fixture_tree("scan", &["dosa", "pizza"]);
		let labels = LabelMap::from_directory(&root).unwrap();

		let dataset = FoodDataset::scan(&root, &labels).unwrap();
		assert_eq!(dataset.len(), 2);
		let mut labels_seen: Vec<usize> =
			(0..dataset.len()).map(|i| dataset.get(i).unwrap().label).collect();
		labels_seen.sort();
		assert_eq!(labels_seen, vec![0, 1]);

		fs::remove_dir_all(&root).ok();
	}

	#[test]
	fn batcher_stacks_resized_images() {
		let root = fixture_tree("batch", &["dosa", "pizza"]);
		let labels = LabelMap::from_directory(&root).unwrap();
		let dataset = FoodDataset::scan(&root, &labels).unwrap();
		let device = NdArrayDevice::default();

		let batcher = ClassificationBatcher::<NdArray<f32>>::new(device, false);
		let items: Vec<FoodItem> = (0..dataset.len()).map(|i| dataset.get(i).unwrap()).collect();
		let batch = batcher.batch(items);

		assert_eq!(batch.images.dims(), [2, 3, 224, 224]);
		assert_eq!(batch.targets.dims(), [2]);

		fs::remove_dir_all(&root).ok();
	}
}
