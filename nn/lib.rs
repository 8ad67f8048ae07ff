/*!
This crate is an implementation of a multilayer perceptron for binary classification. The network has ReLU hidden layers and a single sigmoid output unit, and is trained with mini-batch gradient descent on a mean squared error loss using the Adam optimizer.

Training is single threaded and fully deterministic given `TrainOptions::seed`: the same options and data always produce the same weights, losses, and predictions.
*/

use anyhow::{bail, Result};
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;

mod adam;
mod layer;

pub use layer::{Activation, Dense};

use adam::AdamOptimizer;
use cohort_metrics::{
	Accuracy, MeanSquaredError, MeanSquaredErrorInput, StreamingMetric,
};

/// These are the options passed to [`MlpBinaryClassifier::train`](struct.MlpBinaryClassifier.html#method.train).
#[derive(Clone, Debug)]
pub struct TrainOptions {
	/// The width of each hidden layer, in order. The output layer is always a single sigmoid unit.
	pub hidden_layer_sizes: Vec<usize>,
	/// This is the Adam step size.
	pub learning_rate: f32,
	/// This is the maximum number of epochs to train.
	pub max_epochs: usize,
	/// This is the number of examples to use for each batch of training.
	pub n_examples_per_batch: usize,
	/// This is the fraction of the training data that is held out to compute the per-epoch validation metrics.
	pub validation_fraction: f32,
	/// Weight initialization and everything downstream of it is derived from this seed.
	pub seed: u64,
}

impl Default for TrainOptions {
	fn default() -> Self {
		Self {
			hidden_layer_sizes: vec![32],
			learning_rate: 0.001,
			max_epochs: 100,
			n_examples_per_batch: 256,
			validation_fraction: 0.33,
			seed: 0,
		}
	}
}

/// A fitted multilayer perceptron that maps a feature vector to the probability of the positive class.
#[derive(Clone, Debug)]
pub struct MlpBinaryClassifier {
	pub layers: Vec<Dense>,
}

/// The validation metrics recorded after each epoch of training.
#[derive(Clone, Debug)]
pub struct EpochMetrics {
	pub val_loss: f32,
	pub val_accuracy: f32,
}

/// The result of a completed training run: the fitted model and the per-epoch validation metrics.
#[derive(Debug)]
pub struct TrainingRun {
	pub model: MlpBinaryClassifier,
	pub epoch_metrics: Vec<EpochMetrics>,
}

/// This is the training progress, which tracks the current epoch.
#[derive(Clone, Copy, Debug)]
pub struct Progress {
	pub epoch: usize,
	pub max_epochs: usize,
}

impl MlpBinaryClassifier {
	/// Train a network on `features` and binary `labels` (0.0 or 1.0). The trailing `validation_fraction` rows are held out to compute the per-epoch validation metrics and never used for gradient updates. A non-finite loss surfaces as an error.
	pub fn train(
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
		options: &TrainOptions,
		update_progress: &mut dyn FnMut(Progress),
	) -> Result<TrainingRun> {
		if !(options.validation_fraction > 0.0 && options.validation_fraction < 1.0) {
			bail!(
				"validation_fraction must be between 0 and 1, got {}",
				options.validation_fraction,
			);
		}
		let n_features = features.ncols();
		let (features_train, labels_train, features_val, labels_val) =
			train_validation_split(features, labels, options.validation_fraction);
		if features_train.nrows() == 0 {
			bail!("the validation fraction leaves no training examples");
		}
		if features_val.nrows() == 0 {
			bail!("the validation fraction leaves no validation examples");
		}
		let mut model = Self::new(n_features, &options.hidden_layer_sizes, options.seed);
		let mut optimizer = AdamOptimizer::new(&model.layers, options.learning_rate);
		let mut epoch_metrics = Vec::with_capacity(options.max_epochs);
		let mut val_probabilities = Array1::zeros(features_val.nrows());
		for epoch in 0..options.max_epochs {
			update_progress(Progress {
				epoch,
				max_epochs: options.max_epochs,
			});
			for (batch_features, batch_labels) in izip!(
				features_train.axis_chunks_iter(Axis(0), options.n_examples_per_batch),
				labels_train.axis_chunks_iter(Axis(0), options.n_examples_per_batch),
			) {
				model.train_batch(batch_features, batch_labels, &mut optimizer)?;
			}
			model.predict(features_val, val_probabilities.view_mut());
			let metrics = compute_validation_metrics(val_probabilities.view(), labels_val);
			if !metrics.val_loss.is_finite() {
				bail!(
					"training diverged: the validation loss was not finite at epoch {}",
					epoch
				);
			}
			epoch_metrics.push(metrics);
		}
		Ok(TrainingRun {
			model,
			epoch_metrics,
		})
	}

	fn new(n_features: usize, hidden_layer_sizes: &[usize], seed: u64) -> Self {
		let mut layers = Vec::with_capacity(hidden_layer_sizes.len() + 1);
		let mut n_inputs = n_features;
		// Each layer draws its weights from its own stream so a layer's init does not depend on the widths of the layers before it.
		for (layer_index, n_outputs) in hidden_layer_sizes.iter().enumerate() {
			layers.push(Dense::new(
				n_inputs,
				*n_outputs,
				Activation::Relu,
				seed ^ (layer_index.to_u64().unwrap() + 1),
			));
			n_inputs = *n_outputs;
		}
		layers.push(Dense::new(
			n_inputs,
			1,
			Activation::Sigmoid,
			seed ^ (hidden_layer_sizes.len().to_u64().unwrap() + 1),
		));
		Self { layers }
	}

	fn train_batch(
		&mut self,
		features: ArrayView2<f32>,
		labels: ArrayView1<f32>,
		optimizer: &mut AdamOptimizer,
	) -> Result<()> {
		let n_examples = features.nrows().to_f32().unwrap();
		// Forward pass, keeping each layer's activations for backprop.
		let mut activations: Vec<Array2<f32>> = Vec::with_capacity(self.layers.len());
		let mut input = features.to_owned();
		for layer in self.layers.iter() {
			let output = layer.forward(input.view());
			activations.push(output.clone());
			input = output;
		}
		let output = activations.last().unwrap();
		if output.iter().any(|value| !value.is_finite()) {
			bail!("training diverged: the network produced a non-finite activation");
		}
		// Backward pass. The loss is mean squared error on the sigmoid output, so the output delta is d(mse)/d(prediction) * sigmoid'(z), with the 1/n of the mean folded in.
		let predictions = output.column(0);
		let mut delta = Array2::zeros((features.nrows(), 1));
		for (delta, prediction, label) in izip!(
			delta.column_mut(0).iter_mut(),
			predictions.iter(),
			labels.iter()
		) {
			*delta = 2.0 * (prediction - label) / n_examples * prediction * (1.0 - prediction);
		}
		for layer_index in (0..self.layers.len()).rev() {
			let layer_input = if layer_index == 0 {
				features.view()
			} else {
				activations[layer_index - 1].view()
			};
			let weight_gradients = layer_input.t().dot(&delta);
			let bias_gradients = delta.sum_axis(Axis(0));
			if layer_index > 0 {
				let mut next_delta = delta.dot(&self.layers[layer_index].weights.t());
				// ReLU derivative: pass gradient only where the activation was positive.
				for (delta, activation) in izip!(
					next_delta.iter_mut(),
					activations[layer_index - 1].iter()
				) {
					if *activation <= 0.0 {
						*delta = 0.0;
					}
				}
				optimizer.update(
					layer_index,
					&mut self.layers[layer_index],
					weight_gradients.view(),
					bias_gradients.view(),
				);
				delta = next_delta;
			} else {
				optimizer.update(
					layer_index,
					&mut self.layers[layer_index],
					weight_gradients.view(),
					bias_gradients.view(),
				);
			}
		}
		Ok(())
	}

	/// Write the predicted probability of the positive class into `probabilities` for each row of `features`.
	pub fn predict(&self, features: ArrayView2<f32>, mut probabilities: ArrayViewMut1<f32>) {
		let mut input = features.to_owned();
		for layer in self.layers.iter() {
			input = layer.forward(input.view());
		}
		for (probability, output) in izip!(probabilities.iter_mut(), input.column(0).iter()) {
			*probability = *output;
		}
	}

	pub fn n_features(&self) -> usize {
		self.layers.first().map(|layer| layer.weights.nrows()).unwrap_or(0)
	}
}

fn compute_validation_metrics(
	probabilities: ArrayView1<f32>,
	labels: ArrayView1<f32>,
) -> EpochMetrics {
	let mut loss = MeanSquaredError::new();
	let mut accuracy = Accuracy::new();
	for (probability, label) in izip!(probabilities.iter(), labels.iter()) {
		loss.update(MeanSquaredErrorInput {
			prediction: *probability,
			label: *label,
		});
		let predicted = if *probability >= 0.5 { 1 } else { 0 };
		let actual = if *label >= 0.5 { 1 } else { 0 };
		accuracy.update((predicted, actual));
	}
	EpochMetrics {
		val_loss: loss.finalize().unwrap_or(f32::NAN),
		val_accuracy: accuracy.finalize().unwrap_or(f32::NAN),
	}
}

/// Split `features` and `labels` so that the trailing `validation_fraction` of the rows becomes the validation set.
fn train_validation_split<'features, 'labels>(
	features: ArrayView2<'features, f32>,
	labels: ArrayView1<'labels, f32>,
	validation_fraction: f32,
) -> (
	ArrayView2<'features, f32>,
	ArrayView1<'labels, f32>,
	ArrayView2<'features, f32>,
	ArrayView1<'labels, f32>,
) {
	let split_index = ((1.0 - validation_fraction) * features.nrows().to_f32().unwrap())
		.to_usize()
		.unwrap();
	let (features_train, features_val) = features.split_at(Axis(0), split_index);
	let (labels_train, labels_val) = labels.split_at(Axis(0), split_index);
	(features_train, labels_train, features_val, labels_val)
}

#[cfg(test)]
mod test {
	use super::*;

	fn linearly_separable_data() -> (Array2<f32>, Array1<f32>) {
		// Label is 1 exactly when the first feature clears 0.5. 32 examples, alternating so both splits see both classes.
		let n = 32;
		let mut features = Array2::zeros((n, 2));
		let mut labels = Array1::zeros(n);
		for i in 0..n {
			let positive = i % 2 == 0;
			features[(i, 0)] = if positive { 0.9 } else { 0.1 };
			features[(i, 1)] = (i.to_f32().unwrap() / n.to_f32().unwrap()) * 0.1;
			labels[i] = if positive { 1.0 } else { 0.0 };
		}
		(features, labels)
	}

	#[test]
	fn test_train_learns_separable_data() {
		let (features, labels) = linearly_separable_data();
		let options = TrainOptions {
			hidden_layer_sizes: vec![8],
			learning_rate: 0.05,
			max_epochs: 200,
			n_examples_per_batch: 8,
			validation_fraction: 0.25,
			seed: 42,
		};
		let run =
			MlpBinaryClassifier::train(features.view(), labels.view(), &options, &mut |_| {})
				.unwrap();
		assert_eq!(run.epoch_metrics.len(), 200);
		let last = run.epoch_metrics.last().unwrap();
		assert!(last.val_accuracy > 0.9);
		assert!(last.val_loss < 0.25);
	}

	#[test]
	fn test_predictions_are_probabilities() {
		let (features, labels) = linearly_separable_data();
		let options = TrainOptions {
			hidden_layer_sizes: vec![4, 4],
			max_epochs: 10,
			validation_fraction: 0.25,
			seed: 1,
			..Default::default()
		};
		let run =
			MlpBinaryClassifier::train(features.view(), labels.view(), &options, &mut |_| {})
				.unwrap();
		let mut probabilities = Array1::zeros(features.nrows());
		run.model.predict(features.view(), probabilities.view_mut());
		for probability in probabilities.iter() {
			assert!(*probability >= 0.0 && *probability <= 1.0);
		}
	}

	#[test]
	fn test_invalid_validation_fraction_is_an_error() {
		let (features, labels) = linearly_separable_data();
		let options = TrainOptions {
			validation_fraction: 1.5,
			..Default::default()
		};
		let result =
			MlpBinaryClassifier::train(features.view(), labels.view(), &options, &mut |_| {});
		assert!(result.is_err());
	}

	#[test]
	fn test_train_deterministic_under_seed() {
		let (features, labels) = linearly_separable_data();
		let options = TrainOptions {
			hidden_layer_sizes: vec![8],
			max_epochs: 20,
			validation_fraction: 0.25,
			seed: 7,
			..Default::default()
		};
		let run_a =
			MlpBinaryClassifier::train(features.view(), labels.view(), &options, &mut |_| {})
				.unwrap();
		let run_b =
			MlpBinaryClassifier::train(features.view(), labels.view(), &options, &mut |_| {})
				.unwrap();
		for (a, b) in izip!(run_a.epoch_metrics.iter(), run_b.epoch_metrics.iter()) {
			assert_eq!(a.val_loss, b.val_loss);
			assert_eq!(a.val_accuracy, b.val_accuracy);
		}
		for (layer_a, layer_b) in izip!(run_a.model.layers.iter(), run_b.model.layers.iter()) {
			assert_eq!(layer_a.weights, layer_b.weights);
		}
	}
}
