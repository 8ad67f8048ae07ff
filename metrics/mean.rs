use super::StreamingMetric;
use num_traits::ToPrimitive;

/// A running mean over a stream of `f32` values.
#[derive(Clone, Debug, Default)]
pub struct Mean {
	n: u64,
	sum: f64,
}

impl Mean {
	pub fn new() -> Self {
		Self::default()
	}
}

impl StreamingMetric<'_> for Mean {
	type Input = f32;
	type Output = Option<f32>;

	fn update(&mut self, input: Self::Input) {
		self.n += 1;
		self.sum += input.to_f64().unwrap();
	}

	fn merge(&mut self, other: Self) {
		self.n += other.n;
		self.sum += other.sum;
	}

	fn finalize(self) -> Option<f32> {
		if self.n == 0 {
			None
		} else {
			Some((self.sum / self.n.to_f64().unwrap()).to_f32().unwrap())
		}
	}
}

#[test]
fn test() {
	let mut mean = Mean::new();
	assert_eq!(mean.clone().finalize(), None);
	mean.update(1.0);
	mean.update(2.0);
	let mut other = Mean::new();
	other.update(3.0);
	mean.merge(other);
	assert_eq!(mean.finalize(), Some(2.0));
}
