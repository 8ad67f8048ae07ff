use super::StreamingMetric;
use num_traits::ToPrimitive;

/// The accuracy is the proportion of examples where predicted == label, tracked as exact counts so merging loses no precision.
#[derive(Clone, Debug, Default)]
pub struct Accuracy {
	n_correct: u64,
	n_examples: u64,
}

impl Accuracy {
	pub fn new() -> Self {
		Self::default()
	}
}

impl StreamingMetric<'_> for Accuracy {
	type Input = (usize, usize);
	type Output = Option<f32>;

	fn update(&mut self, (prediction, label): Self::Input) {
		self.n_examples += 1;
		if prediction == label {
			self.n_correct += 1;
		}
	}

	fn merge(&mut self, other: Self) {
		self.n_correct += other.n_correct;
		self.n_examples += other.n_examples;
	}

	fn finalize(self) -> Option<f32> {
		if self.n_examples == 0 {
			return None;
		}
		Some(self.n_correct.to_f32().unwrap() / self.n_examples.to_f32().unwrap())
	}
}
