use burn::prelude::Backend;
use burn::tensor::activation::softmax;
use burn::tensor::Tensor;
use std::cmp::Ordering;

/// Softmax over the class dimension of a single-sample logits tensor.
pub fn probabilities<B: Backend>(logits: Tensor<B, 2>) -> Vec<f32> {
	softmax(logits, 1).into_data().iter::<f32>().collect()
}

/// The `k` highest-probability class indices in descending order of
/// probability. Equal probabilities rank by ascending index, so the lowest
/// index wins a tie.
pub fn top_k(probs: &[f32], k: usize) -> Vec<(usize, f32)> {
	let mut ranked: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
	ranked.sort_by(|a, b| {
		b.1.partial_cmp(&a.1)
			.unwrap_or(Ordering::Equal)
			.then_with(|| a.0.cmp(&b.0))
	});
	ranked.truncate(k);
	ranked
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ranks_by_descending_probability() {
		let top = top_k(&[0.1, 0.6, 0.05, 0.25], 3);
		assert_eq!(top, vec![(1, 0.6), (3, 0.25), (0, 0.1)]);
	}

	#[test]
	fn ties_rank_by_ascending_index() {
		let top = top_k(&[0.25, 0.25, 0.25, 0.25], 3);
		assert_eq!(top.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2]);
	}

	#[test]
	fn truncates_to_available_classes() {
		let top = top_k(&[0.7, 0.3], 3);
		assert_eq!(top.len(), 2);
		assert_eq!(top[0].0, 0);
	}
}
