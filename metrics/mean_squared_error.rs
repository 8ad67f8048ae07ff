use super::{mean::Mean, StreamingMetric};

/// The mean of the squared differences between predictions and labels. This is the loss the pipeline trains with, so it is also the loss it reports.
#[derive(Clone, Debug, Default)]
pub struct MeanSquaredError(Mean);

/// The input to [MeanSquaredError](struct.MeanSquaredError.html).
pub struct MeanSquaredErrorInput {
	pub prediction: f32,
	pub label: f32,
}

impl MeanSquaredError {
	pub fn new() -> Self {
		Self::default()
	}
}

impl StreamingMetric<'_> for MeanSquaredError {
	type Input = MeanSquaredErrorInput;
	type Output = Option<f32>;

	fn update(&mut self, value: MeanSquaredErrorInput) {
		let error = value.prediction - value.label;
		self.0.update(error * error);
	}

	fn merge(&mut self, other: Self) {
		self.0.merge(other.0)
	}

	fn finalize(self) -> Option<f32> {
		self.0.finalize()
	}
}

#[test]
fn test() {
	let mut mse = MeanSquaredError::new();
	mse.update(MeanSquaredErrorInput {
		prediction: 1.0,
		label: 0.0,
	});
	mse.update(MeanSquaredErrorInput {
		prediction: 0.0,
		label: 0.0,
	});
	assert_eq!(mse.finalize(), Some(0.5));
}
