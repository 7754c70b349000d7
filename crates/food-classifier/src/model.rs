use crate::data::ClassificationBatch;
use crate::weights;
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::loss::CrossEntropyLossConfig;
use burn::nn::pool::{
	AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig,
};
use burn::nn::{
	BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Initializer, Linear, LinearConfig,
	PaddingConfig2d, Relu,
};
use burn::prelude::{Backend, Device, Int, Tensor};
use burn::record::RecorderError;
use burn::tensor::backend::AutodiffBackend;
use burn::train::{ClassificationOutput, TrainOutput, TrainStep, ValidStep};
use std::f64::consts::SQRT_2;

/// Feature width of the pooled backbone output.
pub const FEATURE_DIM: usize = 512;
/// Class count of the ImageNet checkpoint the backbone weights come from.
/// The pretrained `fc` stays in the struct so the checkpoint loads without
/// key surgery; `forward_features` never runs it.
pub const IMAGENET_CLASSES: usize = 1000;

const RESNET18_LAYERS: [LayerSpec; 4] = [
	LayerSpec { blocks: 2, in_channels: 64, out_channels: 64, stride: 1 },
	LayerSpec { blocks: 2, in_channels: 64, out_channels: 128, stride: 2 },
	LayerSpec { blocks: 2, in_channels: 128, out_channels: 256, stride: 2 },
	LayerSpec { blocks: 2, in_channels: 256, out_channels: 512, stride: 2 },
];

struct LayerSpec {
	blocks: usize,
	in_channels: usize,
	out_channels: usize,
	stride: usize,
}

#[derive(Debug, Module)]
pub struct Downsample<B: Backend> {
	conv: Conv2d<B>,
	bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
	fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		self.bn.forward(self.conv.forward(input))
	}
}

#[derive(Debug, Module)]
pub struct BasicBlock<B: Backend> {
	conv1: Conv2d<B>,
	bn1: BatchNorm<B, 2>,
	conv2: Conv2d<B>,
	bn2: BatchNorm<B, 2>,
	relu: Relu,
	downsample: Option<Downsample<B>>,
}

impl<B: Backend> BasicBlock<B> {
	fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		let identity = input.clone();

		let x = self.conv1.forward(input);
		let x = self.bn1.forward(x);
		let x = self.relu.forward(x);

		let x = self.conv2.forward(x);
		let x = self.bn2.forward(x);

		// skip connection
		let x = match &self.downsample {
			Some(downsample) => x + downsample.forward(identity),
			None => x + identity,
		};

		self.relu.forward(x)
	}
}

#[derive(Debug, Module)]
pub struct LayerBlock<B: Backend> {
	blocks: Vec<BasicBlock<B>>,
}

impl<B: Backend> LayerBlock<B> {
	fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
		let mut x = input;
		for block in &self.blocks {
			x = block.forward(x);
		}
		x
	}
}

/// ResNet-18 feature extractor, frozen during fine-tuning.
#[derive(Debug, Module)]
pub struct Backbone<B: Backend> {
	conv1: Conv2d<B>,
	bn1: BatchNorm<B, 2>,
	relu: Relu,
	maxpool: MaxPool2d,
	layer1: LayerBlock<B>,
	layer2: LayerBlock<B>,
	layer3: LayerBlock<B>,
	layer4: LayerBlock<B>,
	avgpool: AdaptiveAvgPool2d,
	fc: Linear<B>,
}

impl<B: Backend> Backbone<B> {
	/// Pooled `[batch, 512]` features; the ImageNet `fc` is bypassed.
	pub fn forward_features(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
		let x = self.conv1.forward(input);
		let x = self.bn1.forward(x);
		let x = self.relu.forward(x);
		let x = self.maxpool.forward(x);

		let x = self.layer1.forward(x);
		let x = self.layer2.forward(x);
		let x = self.layer3.forward(x);
		let x = self.layer4.forward(x);

		let x = self.avgpool.forward(x);
		x.flatten(1, 3)
	}
}

/// Fresh classification head fine-tuned on the food classes.
#[derive(Debug, Module)]
pub struct Head<B: Backend> {
	dropout: Dropout,
	hidden: Linear<B>,
	relu: Relu,
	out: Linear<B>,
}

impl<B: Backend> Head<B> {
	fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
		let x = self.dropout.forward(features);
		let x = self.hidden.forward(x);
		let x = self.relu.forward(x);
		self.out.forward(x)
	}
}

#[derive(Debug, Module)]
pub struct FoodClassifier<B: Backend> {
	backbone: Backbone<B>,
	head: Head<B>,
}

impl<B: Backend> FoodClassifier<B> {
	/// One forward pass over a `[batch, 3, 224, 224]` input, returning
	/// logits over the food classes.
	pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
		self.head.forward(self.backbone.forward_features(images))
	}

	pub fn forward_classification(
		&self,
		images: Tensor<B, 4>,
		targets: Tensor<B, 1, Int>,
	) -> ClassificationOutput<B> {
		let output = self.forward(images);

		let loss = CrossEntropyLossConfig::new()
			.init(&output.device())
			.forward(output.clone(), targets.clone());

		ClassificationOutput::new(loss, output, targets)
	}
}

impl<B: AutodiffBackend> TrainStep<ClassificationBatch<B>, ClassificationOutput<B>>
	for FoodClassifier<B>
{
	fn step(&self, batch: ClassificationBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
		let item = self.forward_classification(batch.images, batch.targets);

		TrainOutput::new(self, item.loss.backward(), item)
	}
}

impl<B: Backend> ValidStep<ClassificationBatch<B>, ClassificationOutput<B>> for FoodClassifier<B> {
	fn step(&self, batch: ClassificationBatch<B>) -> ClassificationOutput<B> {
		self.forward_classification(batch.images, batch.targets)
	}
}

#[derive(Debug, Config)]
pub struct FoodModelConfig {
	pub num_classes: usize,
	#[config(default = 512)]
	pub hidden_size: usize,
	#[config(default = 0.3)]
	pub dropout: f64,
}

impl FoodModelConfig {
	/// Randomly initialized model, used when a trained record is loaded on
	/// top (evaluator, server).
	pub fn init<B: Backend>(&self, device: &Device<B>) -> FoodClassifier<B> {
		FoodClassifier {
			backbone: init_backbone(device),
			head: self.init_head(device),
		}
	}

	/// Downloads (or reuses the cached) ImageNet checkpoint, loads it into
	/// the backbone and freezes it. Only the head stays trainable.
	pub fn init_pretrained<B: Backend>(
		&self,
		device: &Device<B>,
	) -> Result<FoodClassifier<B>, RecorderError> {
		let record = weights::imagenet_backbone_record::<B>(device)?;
		let backbone = init_backbone(device).load_record(record).no_grad();

		Ok(FoodClassifier {
			backbone,
			head: self.init_head(device),
		})
	}

	fn init_head<B: Backend>(&self, device: &Device<B>) -> Head<B> {
		Head {
			dropout: DropoutConfig::new(self.dropout).init(),
			hidden: LinearConfig::new(FEATURE_DIM, self.hidden_size).init(device),
			relu: Relu::new(),
			out: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
		}
	}
}

fn conv_initializer() -> Initializer {
	// recommended for ReLU
	Initializer::KaimingNormal {
		gain: SQRT_2,
		fan_out_only: true,
	}
}

fn init_basic_block<B: Backend>(
	in_channels: usize,
	out_channels: usize,
	stride: usize,
	device: &Device<B>,
) -> BasicBlock<B> {
	let conv1 = Conv2dConfig::new([in_channels, out_channels], [3, 3])
		.with_stride([stride, stride])
		.with_padding(PaddingConfig2d::Explicit(1, 1))
		.with_bias(false)
		.with_initializer(conv_initializer())
		.init(device);
	let conv2 = Conv2dConfig::new([out_channels, out_channels], [3, 3])
		.with_stride([1, 1])
		.with_padding(PaddingConfig2d::Explicit(1, 1))
		.with_bias(false)
		.with_initializer(conv_initializer())
		.init(device);

	let downsample = (in_channels != out_channels || stride != 1).then(|| Downsample {
		conv: Conv2dConfig::new([in_channels, out_channels], [1, 1])
			.with_stride([stride, stride])
			.with_padding(PaddingConfig2d::Explicit(0, 0))
			.with_bias(false)
			.with_initializer(conv_initializer())
			.init(device),
		bn: BatchNormConfig::new(out_channels).init(device),
	});

	BasicBlock {
		conv1,
		bn1: BatchNormConfig::new(out_channels).init(device),
		conv2,
		bn2: BatchNormConfig::new(out_channels).init(device),
		relu: Relu::new(),
		downsample,
	}
}

fn init_layer<B: Backend>(spec: &LayerSpec, device: &Device<B>) -> LayerBlock<B> {
	let mut blocks = Vec::with_capacity(spec.blocks);
	blocks.push(init_basic_block(
		spec.in_channels,
		spec.out_channels,
		spec.stride,
		device,
	));
	for _ in 1..spec.blocks {
		blocks.push(init_basic_block(spec.out_channels, spec.out_channels, 1, device));
	}
	LayerBlock { blocks }
}

fn init_backbone<B: Backend>(device: &Device<B>) -> Backbone<B> {
	let [layer1, layer2, layer3, layer4] =
		RESNET18_LAYERS.each_ref().map(|spec| init_layer(spec, device));

	Backbone {
		conv1: Conv2dConfig::new([3, 64], [7, 7])
			.with_stride([2, 2])
			.with_padding(PaddingConfig2d::Explicit(3, 3))
			.with_bias(false)
			.with_initializer(conv_initializer())
			.init(device),
		bn1: BatchNormConfig::new(64).init(device),
		relu: Relu::new(),
		maxpool: MaxPool2dConfig::new([3, 3])
			.with_strides([2, 2])
			.with_padding(PaddingConfig2d::Explicit(1, 1))
			.init(),
		layer1,
		layer2,
		layer3,
		layer4,
		avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
		fc: LinearConfig::new(FEATURE_DIM, IMAGENET_CLASSES).init(device),
	}
}
