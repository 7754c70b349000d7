use serde::{Deserialize, Serialize};

/// Square matrix of prediction counts, rows indexed by true class and
/// columns by predicted class. Written once per evaluation run.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfusionMatrix {
	classes: usize,
	counts: Vec<u64>,
}

impl ConfusionMatrix {
	pub fn new(classes: usize) -> Self {
		Self {
			classes,
			counts: vec![0; classes * classes],
		}
	}

	pub fn record(&mut self, truth: usize, predicted: usize) {
		self.counts[truth * self.classes + predicted] += 1;
	}

	pub fn count(&self, truth: usize, predicted: usize) -> u64 {
		self.counts[truth * self.classes + predicted]
	}

	pub fn total(&self) -> u64 {
		self.counts.iter().sum()
	}

	pub fn correct(&self) -> u64 {
		(0..self.classes).map(|i| self.count(i, i)).sum()
	}

	pub fn accuracy(&self) -> f64 {
		let total = self.total();
		if total == 0 {
			return 0.0;
		}
		self.correct() as f64 / total as f64
	}

	/// Fraction of `class` predictions that were correct. 0 when the class
	/// was never predicted.
	pub fn precision(&self, class: usize) -> f64 {
		let predicted: u64 = (0..self.classes).map(|t| self.count(t, class)).sum();
		if predicted == 0 {
			return 0.0;
		}
		self.count(class, class) as f64 / predicted as f64
	}

	/// Fraction of true `class` samples that were recovered. 0 when the
	/// class has no samples.
	pub fn recall(&self, class: usize) -> f64 {
		let actual: u64 = (0..self.classes).map(|p| self.count(class, p)).sum();
		if actual == 0 {
			return 0.0;
		}
		self.count(class, class) as f64 / actual as f64
	}
}
