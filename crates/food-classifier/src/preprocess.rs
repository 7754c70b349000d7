use crate::error::FoodClassError;
use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};
use image::imageops::FilterType;
use image::{imageops, DynamicImage, RgbImage};
use std::path::Path;

/// Model input side length. Images are squashed to this size, not cropped,
/// so aspect ratio is lost.
pub const IMAGE_SIDE: u32 = 224;

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, FoodClassError> {
	Ok(image::load_from_memory(bytes)?)
}

pub fn open<P: AsRef<Path>>(path: P) -> Result<DynamicImage, FoodClassError> {
	Ok(image::open(path)?)
}

/// Resizes to 224x224 RGB and drops the alpha channel if any.
pub fn to_model_rgb(image: &DynamicImage) -> RgbImage {
	imageops::resize(
		&image.to_rgb8(),
		IMAGE_SIDE,
		IMAGE_SIDE,
		FilterType::Lanczos3,
	)
}

/// `[3, 224, 224]` tensor with pixel values scaled to [0, 1].
pub fn to_tensor<B: Backend>(image: RgbImage, device: &B::Device) -> Tensor<B, 3> {
	let side = IMAGE_SIDE as usize;
	let data = TensorData::new(
		image
			.into_raw()
			.into_iter()
			.map(|p| p as f32 / 255.0)
			.collect::<Vec<_>>(),
		[side, side, 3],
	);
	Tensor::from_data(data, device).permute([2, 0, 1])
}

/// Batch of one, `[1, 3, 224, 224]`, as the model consumes per request.
pub fn to_batch<B: Backend>(image: &DynamicImage, device: &B::Device) -> Tensor<B, 4> {
	to_tensor(to_model_rgb(image), device).unsqueeze::<4>()
}
