use super::StreamingMetric;
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;

/// The prediction threshold applied to probabilities before counting.
pub const THRESHOLD: f32 = 0.5;

/// A 2x2 confusion matrix for a binary classifier, accumulated at the fixed 0.5 threshold.
pub struct BinaryConfusionMatrix {
	/// The rows are the actual label, the columns are the predicted label.
	pub counts: Array2<u64>,
}

pub struct BinaryConfusionMatrixInput<'a> {
	pub probabilities: ArrayView1<'a, f32>,
	pub labels: ArrayView1<'a, f32>,
}

#[derive(Debug)]
pub struct BinaryConfusionMatrixOutput {
	/// `counts[(actual, predicted)]`.
	pub counts: Array2<u64>,
	pub true_positives: u64,
	pub false_positives: u64,
	pub true_negatives: u64,
	pub false_negatives: u64,
	pub accuracy: f32,
	pub precision: f32,
	pub recall: f32,
	pub f1_score: f32,
}

impl BinaryConfusionMatrix {
	pub fn new() -> Self {
		Self {
			counts: Array2::zeros((2, 2)),
		}
	}
}

impl Default for BinaryConfusionMatrix {
	fn default() -> Self {
		Self::new()
	}
}

impl<'a> StreamingMetric<'a> for BinaryConfusionMatrix {
	type Input = BinaryConfusionMatrixInput<'a>;
	type Output = BinaryConfusionMatrixOutput;

	fn update(&mut self, value: BinaryConfusionMatrixInput) {
		for (probability, label) in izip!(value.probabilities.iter(), value.labels.iter()) {
			let predicted = if *probability >= THRESHOLD { 1 } else { 0 };
			let actual = if *label >= THRESHOLD { 1 } else { 0 };
			self.counts[(actual, predicted)] += 1;
		}
	}

	fn merge(&mut self, other: Self) {
		self.counts += &other.counts;
	}

	fn finalize(self) -> BinaryConfusionMatrixOutput {
		let true_negatives = self.counts[(0, 0)];
		let false_positives = self.counts[(0, 1)];
		let false_negatives = self.counts[(1, 0)];
		let true_positives = self.counts[(1, 1)];
		let n_examples = self.counts.sum();
		let accuracy = (true_positives + true_negatives).to_f32().unwrap()
			/ n_examples.to_f32().unwrap();
		let precision = true_positives.to_f32().unwrap()
			/ (true_positives + false_positives).to_f32().unwrap();
		let recall = true_positives.to_f32().unwrap()
			/ (true_positives + false_negatives).to_f32().unwrap();
		let f1_score = 2.0 * (precision * recall) / (precision + recall);
		BinaryConfusionMatrixOutput {
			counts: self.counts,
			true_positives,
			false_positives,
			true_negatives,
			false_negatives,
			accuracy,
			precision,
			recall,
			f1_score,
		}
	}
}

#[test]
fn test_perfect_predictions() {
	let mut metric = BinaryConfusionMatrix::new();
	let probabilities = arr1(&[0.9, 0.2, 0.4, 0.8]);
	let labels = arr1(&[1.0, 0.0, 0.0, 1.0]);
	metric.update(BinaryConfusionMatrixInput {
		probabilities: probabilities.view(),
		labels: labels.view(),
	});
	let output = metric.finalize();
	assert_eq!(output.counts, arr2(&[[2, 0], [0, 2]]));
	assert_eq!(output.accuracy, 1.0);
}

#[test]
fn test_counts() {
	let mut metric = BinaryConfusionMatrix::new();
	let probabilities = arr1(&[0.9, 0.9, 0.2, 0.2, 0.9, 0.2]);
	let labels = arr1(&[1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
	metric.update(BinaryConfusionMatrixInput {
		probabilities: probabilities.view(),
		labels: labels.view(),
	});
	let output = metric.finalize();
	insta::assert_debug_snapshot!(output.counts.as_slice().unwrap(), @r###"
	[
	    2,
	    1,
	    1,
	    2,
	]
	"###);
	assert_eq!(output.true_positives, 2);
	assert_eq!(output.false_positives, 1);
	assert_eq!(output.true_negatives, 2);
	assert_eq!(output.false_negatives, 1);
}
