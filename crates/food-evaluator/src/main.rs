use burn_tch::{LibTorch, LibTorchDevice};
use log::LevelFilter;
use simple_logger::SimpleLogger;

mod confusion;
mod eval;

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
	log::info!("evaluating on {device:?}");

	eval::run::<LibTorch>(device);
}
