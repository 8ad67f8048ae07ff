/*!
This module ranks features by permutation importance: how much the model's score drops when one feature column is shuffled and every other column is left alone. A feature the model never uses scores near zero, and a feature can score slightly negative when shuffling it helps by chance.
*/

use anyhow::{bail, Result};
use cohort_metrics::{Accuracy, StreamingMetric, THRESHOLD};
use cohort_nn::MlpBinaryClassifier;
use itertools::izip;
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;

/// Something that can assign a score to a model's behavior on a dataset, where higher is better.
pub trait Scorer: Sync {
	fn score(&self, features: ArrayView2<f32>, labels: ArrayView1<f32>) -> f32;
}

/// Scores a fitted classifier by its accuracy at the fixed prediction threshold.
pub struct AccuracyScorer<'a> {
	pub model: &'a MlpBinaryClassifier,
}

impl<'a> Scorer for AccuracyScorer<'a> {
	fn score(&self, features: ArrayView2<f32>, labels: ArrayView1<f32>) -> f32 {
		let mut probabilities = Array1::zeros(features.nrows());
		self.model.predict(features, probabilities.view_mut());
		let mut accuracy = Accuracy::new();
		for (probability, label) in izip!(probabilities.iter(), labels.iter()) {
			let predicted = if *probability >= THRESHOLD { 1 } else { 0 };
			let actual = if *label >= THRESHOLD { 1 } else { 0 };
			accuracy.update((predicted, actual));
		}
		accuracy.finalize().unwrap_or(f32::NAN)
	}
}

/// A feature's name and its permutation importance, the drop in score when the feature is shuffled.
#[derive(Clone, Debug, serde::Serialize)]
pub struct FeatureImportance {
	pub feature_name: String,
	pub importance: f32,
}

/**
Compute the permutation importance of every feature. For each feature, the feature's column is shuffled `n_repeats` times, the scorer is evaluated on each shuffled copy, and the importance is the baseline score minus the mean shuffled score.

The features are processed in parallel, and each feature's shuffles are seeded from `seed` and the feature's index, so the result does not depend on how the work is scheduled.
*/
pub fn compute_permutation_importance(
	scorer: &dyn Scorer,
	features: ArrayView2<f32>,
	labels: ArrayView1<f32>,
	feature_names: &[String],
	n_repeats: usize,
	seed: u64,
) -> Result<Vec<FeatureImportance>> {
	if n_repeats == 0 {
		bail!("n_repeats must be greater than zero");
	}
	if feature_names.len() != features.ncols() {
		bail!(
			"expected {} feature names but got {}",
			features.ncols(),
			feature_names.len(),
		);
	}
	let baseline = scorer.score(features, labels);
	let importances = feature_names
		.par_iter()
		.enumerate()
		.map(|(feature_index, feature_name)| {
			let mut rng =
				Xoshiro256Plus::seed_from_u64(seed.wrapping_add(feature_index.to_u64().unwrap()));
			let mut sum = 0.0;
			for _ in 0..n_repeats {
				let mut shuffled = features.to_owned();
				let mut column: Vec<f32> = features.column(feature_index).to_vec();
				column.shuffle(&mut rng);
				for (destination, value) in izip!(
					shuffled.column_mut(feature_index).iter_mut(),
					column.iter()
				) {
					*destination = *value;
				}
				sum += scorer.score(shuffled.view(), labels);
			}
			FeatureImportance {
				feature_name: feature_name.clone(),
				importance: baseline - sum / n_repeats.to_f32().unwrap(),
			}
		})
		.collect();
	Ok(importances)
}
