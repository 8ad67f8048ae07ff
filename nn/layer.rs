use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use std::ops::Neg;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Activation {
	Relu,
	Sigmoid,
}

/// A fully connected layer. `weights` has shape `(n_inputs, n_outputs)`.
#[derive(Clone, Debug)]
pub struct Dense {
	pub weights: Array2<f32>,
	pub biases: Array1<f32>,
	pub activation: Activation,
}

impl Dense {
	/// Create a layer with Glorot uniform initial weights drawn from a seeded rng and zero biases.
	pub fn new(n_inputs: usize, n_outputs: usize, activation: Activation, seed: u64) -> Self {
		let mut rng = Xoshiro256Plus::seed_from_u64(seed);
		let limit = (6.0 / (n_inputs + n_outputs).to_f32().unwrap()).sqrt();
		let weights =
			Array2::from_shape_fn((n_inputs, n_outputs), |_| rng.gen_range(-limit, limit));
		Self {
			weights,
			biases: Array1::zeros(n_outputs),
			activation,
		}
	}

	pub fn forward(&self, input: ArrayView2<f32>) -> Array2<f32> {
		let mut output = input.dot(&self.weights) + &self.biases;
		match self.activation {
			Activation::Relu => {
				output.mapv_inplace(|value| value.max(0.0));
			}
			Activation::Sigmoid => {
				output.mapv_inplace(|value| 1.0 / (value.neg().exp() + 1.0));
			}
		}
		output
	}
}
