use crate::layer::Dense;
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;

const BETA_1: f32 = 0.9;
const BETA_2: f32 = 0.999;
const EPSILON: f32 = 1e-7;

/// Adam keeps per-parameter first and second moment estimates, one pair of buffers per layer.
pub struct AdamOptimizer {
	learning_rate: f32,
	step: u64,
	moments: Vec<LayerMoments>,
}

struct LayerMoments {
	m_weights: Array2<f32>,
	v_weights: Array2<f32>,
	m_biases: Array1<f32>,
	v_biases: Array1<f32>,
}

impl AdamOptimizer {
	pub fn new(layers: &[Dense], learning_rate: f32) -> Self {
		let moments = layers
			.iter()
			.map(|layer| LayerMoments {
				m_weights: Array2::zeros(layer.weights.raw_dim()),
				v_weights: Array2::zeros(layer.weights.raw_dim()),
				m_biases: Array1::zeros(layer.biases.raw_dim()),
				v_biases: Array1::zeros(layer.biases.raw_dim()),
			})
			.collect();
		Self {
			learning_rate,
			step: 0,
			moments,
		}
	}

	pub fn update(
		&mut self,
		layer_index: usize,
		layer: &mut Dense,
		weight_gradients: ArrayView2<f32>,
		bias_gradients: ArrayView1<f32>,
	) {
		// One step per batch. The backward pass reaches layer 0 last, so the first batch runs before the counter first advances, hence the `max(1)` below.
		if layer_index == 0 {
			self.step += 1;
		}
		let step = self.step.max(1).to_i32().unwrap();
		let moments = &mut self.moments[layer_index];
		let correction_1 = 1.0 - BETA_1.powi(step);
		let correction_2 = 1.0 - BETA_2.powi(step);
		for (weight, gradient, m, v) in izip!(
			layer.weights.iter_mut(),
			weight_gradients.iter(),
			moments.m_weights.iter_mut(),
			moments.v_weights.iter_mut(),
		) {
			*m = BETA_1 * *m + (1.0 - BETA_1) * gradient;
			*v = BETA_2 * *v + (1.0 - BETA_2) * gradient * gradient;
			let m_hat = *m / correction_1;
			let v_hat = *v / correction_2;
			*weight -= self.learning_rate * m_hat / (v_hat.sqrt() + EPSILON);
		}
		for (bias, gradient, m, v) in izip!(
			layer.biases.iter_mut(),
			bias_gradients.iter(),
			moments.m_biases.iter_mut(),
			moments.v_biases.iter_mut(),
		) {
			*m = BETA_1 * *m + (1.0 - BETA_1) * gradient;
			*v = BETA_2 * *v + (1.0 - BETA_2) * gradient * gradient;
			let m_hat = *m / correction_1;
			let v_hat = *v / correction_2;
			*bias -= self.learning_rate * m_hat / (v_hat.sqrt() + EPSILON);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::layer::Activation;

	#[test]
	fn test_update_moves_against_gradient() {
		let mut layer = Dense {
			weights: ndarray::arr2(&[[0.0], [0.0]]),
			biases: ndarray::arr1(&[0.0]),
			activation: Activation::Relu,
		};
		let mut optimizer = AdamOptimizer::new(std::slice::from_ref(&layer), 0.1);
		let weight_gradients = ndarray::arr2(&[[1.0], [-1.0]]);
		let bias_gradients = ndarray::arr1(&[1.0]);
		optimizer.update(0, &mut layer, weight_gradients.view(), bias_gradients.view());
		assert!(layer.weights[(0, 0)] < 0.0);
		assert!(layer.weights[(1, 0)] > 0.0);
		assert!(layer.biases[0] < 0.0);
	}
}
