use crate::model::BackboneRecord;
use burn::data::network::downloader;
use burn::prelude::{Backend, Device};
use burn::record::{FullPrecisionSettings, Recorder, RecorderError};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::PathBuf;

/// torchvision ResNet-18 trained on ImageNet-1k (top-1 69.758%).
const WEIGHTS_URL: &str = "https://download.pytorch.org/models/resnet18-f37072fd.pth";

/// Downloads the checkpoint on first use and caches it under
/// `~/.cache/food-classifier/`.
fn fetch_checkpoint() -> Result<PathBuf, std::io::Error> {
	let cache_dir = dirs::home_dir()
		.ok_or_else(|| {
			std::io::Error::new(std::io::ErrorKind::NotFound, "home directory not available")
		})?
		.join(".cache")
		.join("food-classifier");

	if !cache_dir.exists() {
		create_dir_all(&cache_dir)?;
	}

	let file_base_name = WEIGHTS_URL.rsplit_once('/').unwrap().1;
	let file_name = cache_dir.join(file_base_name);
	if !file_name.exists() {
		let bytes = downloader::download_file_as_bytes(WEIGHTS_URL, file_base_name);

		let mut output_file = File::create(&file_name)?;
		let bytes_written = output_file.write(&bytes)?;
		if bytes_written != bytes.len() {
			return Err(std::io::Error::new(
				std::io::ErrorKind::InvalidData,
				"failed to write the whole checkpoint file",
			));
		}
	}

	Ok(file_name)
}

/// Loads the ImageNet checkpoint into a [`BackboneRecord`], remapping the
/// torch state-dict keys onto the module structure.
pub fn imagenet_backbone_record<B: Backend>(
	device: &Device<B>,
) -> Result<BackboneRecord<B>, RecorderError> {
	let checkpoint = fetch_checkpoint()
		.map_err(|err| RecorderError::Unknown(format!("could not fetch checkpoint: {err}")))?;

	let load_args = LoadArgs::new(checkpoint)
		// *.downsample.0.* -> *.downsample.conv.*
		.with_key_remap("(.+)\\.downsample\\.0\\.(.+)", "$1.downsample.conv.$2")
		// *.downsample.1.* -> *.downsample.bn.*
		.with_key_remap("(.+)\\.downsample\\.1\\.(.+)", "$1.downsample.bn.$2")
		// layer[i].[j].* -> layer[i].blocks.[j].*
		.with_key_remap("(layer[1-4])\\.([0-9]+)\\.(.+)", "$1.blocks.$2.$3");

	PyTorchFileRecorder::<FullPrecisionSettings>::new().load(load_args, device)
}
