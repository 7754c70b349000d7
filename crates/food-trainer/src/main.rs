use burn::backend::Autodiff;
use burn::optim::AdamConfig;
use burn_tch::{LibTorch, LibTorchDevice};
use log::LevelFilter;
use simple_logger::SimpleLogger;

mod train;

fn main() {
	SimpleLogger::new()
		.with_level(LevelFilter::Info)
		.init()
		.expect("Logger should initialize once");

	let device = if tch::utils::has_cuda() {
		LibTorchDevice::Cuda(0)
	} else {
		LibTorchDevice::Cpu
	};
	log::info!("training on {device:?}");

	train::run::<Autodiff<LibTorch>>(train::TrainingConfig::new(AdamConfig::new()), device);
}
