/*!
This module runs the whole pipeline: load the csv, shuffle, balance the classes, split off the test set, scale the features, search the hyperparameter space, fit the winning configuration, evaluate it on the test set, and rank the features by permutation importance.

Balancing happens on the whole dataset before the split, and the balanced dataframe is reshuffled so the oversampled rows do not cluster at the end. The scaler is fit on the training rows only and reapplied to the test rows, so no test statistics leak into training.
*/

use crate::balance::balance;
use crate::config::{Config, Shuffle};
use crate::grid::{HyperparameterSpace, Hyperparameters, IntRange};
use crate::importance::{compute_permutation_importance, AccuracyScorer};
use crate::progress::{Progress, ProgressCounter};
use crate::report::{ConfusionMatrixReport, EpochMetricsReport, Report};
use crate::scale::MinMaxScaler;
use crate::search::{search, SearchOptions};
use crate::test::test_model;
use anyhow::{bail, format_err, Context, Result};
use cohort_dataframe::DataFrame;
use cohort_nn::{MlpBinaryClassifier, TrainOptions};
use num_traits::ToPrimitive;
use std::path::Path;

const DEFAULT_TEST_FRACTION: f32 = 0.2;
const DEFAULT_SHUFFLE_SEED: u64 = 42;
const DEFAULT_VALIDATION_SPLIT: f32 = 0.33;
const DEFAULT_SEARCH_MAX_EPOCHS: usize = 50;
const SEARCH_N_EXAMPLES_PER_BATCH: usize = 1024;
const DEFAULT_FIT_LEARNING_RATE: f32 = 0.001;
const DEFAULT_FIT_MAX_EPOCHS: usize = 200;
const DEFAULT_FIT_N_EXAMPLES_PER_BATCH: usize = 2048;
const DEFAULT_IMPORTANCE_N_REPEATS: usize = 5;
const DEFAULT_IMPORTANCE_SEED: u64 = 1;

/// Run the pipeline on the csv at `file_path`, predicting `target_column_name`, and produce a [`Report`](../report/struct.Report.html).
pub fn train(
	file_path: &Path,
	target_column_name: &str,
	config_path: Option<&Path>,
	update_progress: &mut dyn FnMut(Progress),
) -> Result<Report> {
	let config = load_config(config_path)?;
	let n_bytes = std::fs::metadata(file_path)
		.with_context(|| format!("failed to read {}", file_path.display()))?
		.len();
	let progress_counter = ProgressCounter::new(n_bytes);
	update_progress(Progress::Loading(progress_counter.clone()));
	let dataframe = DataFrame::from_path(file_path, {
		let progress_counter = progress_counter.clone();
		move |byte| progress_counter.set(byte)
	})?;
	train_dataframe(dataframe, target_column_name, &config, update_progress)
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
	match config_path {
		Some(config_path) => {
			let config = std::fs::read_to_string(config_path)
				.with_context(|| format!("failed to read config file {}", config_path.display()))?;
			serde_yaml::from_str(&config)
				.with_context(|| format!("failed to parse config file {}", config_path.display()))
		}
		None => Ok(Config::default()),
	}
}

pub(crate) fn train_dataframe(
	mut dataframe: DataFrame,
	target_column_name: &str,
	config: &Config,
	update_progress: &mut dyn FnMut(Progress),
) -> Result<Report> {
	let n_records = dataframe.nrows();
	if n_records == 0 {
		bail!("the csv file has no records");
	}
	let target_column_index = dataframe
		.column_index(target_column_name)
		.ok_or_else(|| format_err!("the file has no column named \"{}\"", target_column_name))?;
	let test_fraction = config.test_fraction.unwrap_or(DEFAULT_TEST_FRACTION);
	if !(test_fraction > 0.0 && test_fraction < 1.0) {
		bail!("test_fraction must be between 0 and 1, got {}", test_fraction);
	}
	let (shuffle_enabled, shuffle_seed) = match &config.shuffle {
		None => (true, DEFAULT_SHUFFLE_SEED),
		Some(Shuffle::Enabled(enabled)) => (*enabled, DEFAULT_SHUFFLE_SEED),
		Some(Shuffle::Options { seed }) => (true, *seed),
	};
	if shuffle_enabled {
		update_progress(Progress::Shuffling);
		dataframe.shuffle(shuffle_seed);
	}
	update_progress(Progress::Balancing);
	let balance_seed = config.balance.as_ref().and_then(|balance| balance.seed);
	let mut balanced = balance(&dataframe.view(), target_column_index, balance_seed)?;
	if shuffle_enabled {
		// The oversampled rows land at the end of the balanced dataframe, so reshuffle before splitting.
		balanced.shuffle(shuffle_seed.wrapping_add(1));
	}
	let n_records_after_balancing = balanced.nrows();
	let split_index = ((1.0 - test_fraction) * n_records_after_balancing.to_f32().unwrap())
		.to_usize()
		.unwrap();
	let balanced_view = balanced.view();
	let (train_view, test_view) = balanced_view.split_at_row(split_index);
	if train_view.nrows() == 0 || test_view.nrows() == 0 {
		bail!(
			"a test fraction of {} leaves {} training records and {} test records",
			test_fraction,
			train_view.nrows(),
			test_view.nrows(),
		);
	}
	let (train_labels, train_features) = train_view.split_off_column(target_column_index);
	let (test_labels, test_features) = test_view.split_off_column(target_column_index);
	let feature_names = train_features.column_names();
	let labels_train = train_labels.to_array();
	let labels_test = test_labels.to_array();
	let scaler = MinMaxScaler::fit(train_features.to_rows().view());
	let features_train = scaler.transform(train_features.to_rows().view());
	let features_test = scaler.transform(test_features.to_rows().view());

	// Hyperparameter search.
	let space = hyperparameter_space(config)?;
	let search_config = config.search.as_ref();
	let search_options = SearchOptions {
		max_trials: search_config
			.and_then(|search| search.max_trials)
			.unwrap_or(10),
		executions_per_trial: search_config
			.and_then(|search| search.executions_per_trial)
			.unwrap_or(1),
		n_startup_trials: search_config
			.and_then(|search| search.n_startup_trials)
			.unwrap_or(3),
		n_trials_without_improvement_to_stop: search_config
			.and_then(|search| search.n_trials_without_improvement_to_stop),
		seed: search_config.and_then(|search| search.seed).unwrap_or(0),
	};
	let validation_split = search_config
		.and_then(|search| search.validation_split)
		.unwrap_or(DEFAULT_VALIDATION_SPLIT);
	if !(validation_split > 0.0 && validation_split < 1.0) {
		bail!(
			"search.validation_split must be between 0 and 1, got {}",
			validation_split,
		);
	}
	let search_max_epochs = search_config
		.and_then(|search| search.max_epochs)
		.unwrap_or(DEFAULT_SEARCH_MAX_EPOCHS);
	let mut execution_index = 0u64;
	let trial_results = search(
		&space,
		&search_options,
		|hyperparameters| {
			execution_index += 1;
			let options = TrainOptions {
				hidden_layer_sizes: hidden_layer_sizes(hyperparameters)?,
				learning_rate: DEFAULT_FIT_LEARNING_RATE,
				max_epochs: search_max_epochs,
				n_examples_per_batch: SEARCH_N_EXAMPLES_PER_BATCH,
				validation_fraction: validation_split,
				seed: search_options.seed.wrapping_add(execution_index),
			};
			let run = MlpBinaryClassifier::train(
				features_train.view(),
				labels_train.view(),
				&options,
				&mut |_| {},
			)?;
			// The objective is the best validation accuracy the trial reached across its epochs.
			run.epoch_metrics
				.iter()
				.map(|metrics| metrics.val_accuracy)
				.max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Less))
				.ok_or_else(|| format_err!("the trial produced no epoch metrics"))
		},
		&mut |progress| {
			update_progress(Progress::Searching {
				trial_index: progress.trial_index,
				max_trials: progress.max_trials,
			})
		},
	)?;
	let n_trials = trial_results.len();
	let best_trial = trial_results
		.into_iter()
		.next()
		.ok_or_else(|| format_err!("the search produced no trials"))?;
	if !best_trial.objective.is_finite() {
		bail!("every trial of the hyperparameter search failed");
	}

	// Final fit with the winning hyperparameters.
	let fit_config = config.fit.as_ref();
	let fit_options = TrainOptions {
		hidden_layer_sizes: hidden_layer_sizes(&best_trial.hyperparameters)?,
		learning_rate: fit_config
			.and_then(|fit| fit.learning_rate)
			.unwrap_or(DEFAULT_FIT_LEARNING_RATE),
		max_epochs: fit_config
			.and_then(|fit| fit.max_epochs)
			.unwrap_or(DEFAULT_FIT_MAX_EPOCHS),
		n_examples_per_batch: fit_config
			.and_then(|fit| fit.n_examples_per_batch)
			.unwrap_or(DEFAULT_FIT_N_EXAMPLES_PER_BATCH),
		validation_fraction: validation_split,
		seed: search_options.seed,
	};
	let run = MlpBinaryClassifier::train(
		features_train.view(),
		labels_train.view(),
		&fit_options,
		&mut |progress| update_progress(Progress::Training(progress)),
	)?;

	// Test set evaluation.
	update_progress(Progress::Testing);
	let test_metrics = test_model(&run.model, features_test.view(), labels_test.view());
	let n_positive_test = labels_test.iter().filter(|label| **label >= 0.5).count();
	let positive_share = n_positive_test.to_f32().unwrap() / labels_test.len().to_f32().unwrap();
	let baseline_accuracy = positive_share.max(1.0 - positive_share);

	// Permutation importance on the test set.
	update_progress(Progress::ComputingFeatureImportances);
	let importance_config = config.importance.as_ref();
	let scorer = AccuracyScorer { model: &run.model };
	let mut feature_importances = compute_permutation_importance(
		&scorer,
		features_test.view(),
		labels_test.view(),
		&feature_names,
		importance_config
			.and_then(|importance| importance.n_repeats)
			.unwrap_or(DEFAULT_IMPORTANCE_N_REPEATS),
		importance_config
			.and_then(|importance| importance.seed)
			.unwrap_or(DEFAULT_IMPORTANCE_SEED),
	)?;
	feature_importances.sort_by(|a, b| {
		b.importance
			.partial_cmp(&a.importance)
			.unwrap_or(std::cmp::Ordering::Equal)
	});

	Ok(Report {
		target_column_name: target_column_name.to_owned(),
		n_records,
		n_records_after_balancing,
		n_train_records: train_view.nrows(),
		n_test_records: test_view.nrows(),
		best_hyperparameters: best_trial.hyperparameters,
		best_trial_objective: best_trial.objective,
		n_trials,
		epoch_metrics: run
			.epoch_metrics
			.iter()
			.enumerate()
			.map(|(epoch, metrics)| EpochMetricsReport {
				epoch,
				val_loss: metrics.val_loss,
				val_accuracy: metrics.val_accuracy,
			})
			.collect(),
		test_loss: test_metrics.loss,
		test_accuracy: test_metrics.confusion_matrix.accuracy,
		baseline_accuracy,
		confusion_matrix: ConfusionMatrixReport {
			true_negatives: test_metrics.confusion_matrix.true_negatives,
			false_positives: test_metrics.confusion_matrix.false_positives,
			false_negatives: test_metrics.confusion_matrix.false_negatives,
			true_positives: test_metrics.confusion_matrix.true_positives,
			precision: test_metrics.confusion_matrix.precision,
			recall: test_metrics.confusion_matrix.recall,
			f1_score: test_metrics.confusion_matrix.f1_score,
		},
		feature_importances,
	})
}

fn hyperparameter_space(config: &Config) -> Result<HyperparameterSpace> {
	let space_config = config.space.as_ref();
	let max_hidden_layers = space_config
		.and_then(|space| space.max_hidden_layers)
		.unwrap_or(2);
	let units = IntRange {
		min: space_config.and_then(|space| space.min_units).unwrap_or(32),
		max: space_config.and_then(|space| space.max_units).unwrap_or(512),
		step: space_config.and_then(|space| space.units_step).unwrap_or(32),
	};
	if max_hidden_layers == 0 {
		bail!("space.max_hidden_layers must be greater than zero");
	}
	if units.step <= 0 {
		bail!("space.units_step must be greater than zero, got {}", units.step);
	}
	if units.min <= 0 {
		bail!("space.min_units must be greater than zero, got {}", units.min);
	}
	if units.min > units.max {
		bail!(
			"space.min_units ({}) must not exceed space.max_units ({})",
			units.min,
			units.max,
		);
	}
	Ok(HyperparameterSpace::mlp(max_hidden_layers, units))
}

/// Translate a hyperparameter vector into the widths of the network's hidden layers: `input_units` first, then the first `n_layers` of the `layer_{i}` widths.
fn hidden_layer_sizes(hyperparameters: &Hyperparameters) -> Result<Vec<usize>> {
	let input_units = get_hyperparameter(hyperparameters, "input_units")?;
	let n_layers = get_hyperparameter(hyperparameters, "n_layers")?;
	let mut sizes = Vec::with_capacity(1 + n_layers);
	sizes.push(input_units);
	for layer_index in 0..n_layers {
		sizes.push(get_hyperparameter(
			hyperparameters,
			&format!("layer_{}", layer_index),
		)?);
	}
	Ok(sizes)
}

fn get_hyperparameter(hyperparameters: &Hyperparameters, name: &str) -> Result<usize> {
	hyperparameters
		.get(name)
		.and_then(|value| value.to_usize())
		.ok_or_else(|| format_err!("missing or invalid hyperparameter \"{}\"", name))
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::config::{FitConfig, SearchConfig, SpaceConfig};
	use cohort_dataframe::NumberColumn;

	#[test]
	fn test_hidden_layer_sizes() {
		let hyperparameters = Hyperparameters::new(vec![
			("input_units".to_owned(), 96),
			("n_layers".to_owned(), 1),
			("layer_0".to_owned(), 64),
			("layer_1".to_owned(), 32),
		]);
		assert_eq!(hidden_layer_sizes(&hyperparameters).unwrap(), vec![96, 64]);
	}

	fn synthetic_dataframe() -> DataFrame {
		// 60 records, imbalanced 3:1 in favor of the negative class, and separable on "risk".
		let n = 60;
		let mut risk = Vec::with_capacity(n);
		let mut noise = Vec::with_capacity(n);
		let mut label = Vec::with_capacity(n);
		for i in 0..n {
			let positive = i % 4 == 0;
			risk.push(if positive { 8.0 } else { 2.0 });
			noise.push((i % 7).to_f32().unwrap());
			label.push(if positive { 1.0 } else { 0.0 });
		}
		DataFrame {
			columns: vec![
				NumberColumn {
					name: "risk".to_owned(),
					data: risk,
				},
				NumberColumn {
					name: "noise".to_owned(),
					data: noise,
				},
				NumberColumn {
					name: "outcome".to_owned(),
					data: label,
				},
			],
		}
	}

	fn small_config() -> Config {
		Config {
			balance: Some(crate::config::BalanceConfig { seed: Some(0) }),
			space: Some(SpaceConfig {
				max_hidden_layers: Some(1),
				min_units: Some(4),
				max_units: Some(8),
				units_step: Some(4),
			}),
			search: Some(SearchConfig {
				max_trials: Some(2),
				executions_per_trial: None,
				n_startup_trials: None,
				n_trials_without_improvement_to_stop: None,
				validation_split: Some(0.25),
				max_epochs: Some(5),
				seed: Some(0),
			}),
			fit: Some(FitConfig {
				learning_rate: None,
				max_epochs: Some(10),
				n_examples_per_batch: Some(16),
			}),
			importance: Some(crate::config::ImportanceConfig {
				n_repeats: Some(2),
				seed: Some(1),
			}),
			..Default::default()
		}
	}

	#[test]
	fn test_pipeline_end_to_end() {
		let report = train_dataframe(
			synthetic_dataframe(),
			"outcome",
			&small_config(),
			&mut |_| {},
		)
		.unwrap();
		assert_eq!(report.target_column_name, "outcome");
		assert_eq!(report.n_records, 60);
		// 45 negative records, so balancing brings the total to 90.
		assert_eq!(report.n_records_after_balancing, 90);
		assert_eq!(
			report.n_train_records + report.n_test_records,
			report.n_records_after_balancing,
		);
		assert_eq!(report.n_trials, 2);
		assert_eq!(report.epoch_metrics.len(), 10);
		assert_eq!(report.feature_importances.len(), 2);
		let n_counted = report.confusion_matrix.true_negatives
			+ report.confusion_matrix.false_positives
			+ report.confusion_matrix.false_negatives
			+ report.confusion_matrix.true_positives;
		assert_eq!(n_counted, report.n_test_records as u64);
		assert!(report.baseline_accuracy >= 0.5);
	}

	#[test]
	fn test_unknown_target_column_fails() {
		let error = train_dataframe(
			synthetic_dataframe(),
			"missing",
			&Config::default(),
			&mut |_| {},
		)
		.unwrap_err();
		assert!(error.to_string().contains("missing"));
	}

	#[test]
	fn test_invalid_test_fraction_fails() {
		let config = Config {
			test_fraction: Some(1.5),
			..Default::default()
		};
		let result = train_dataframe(synthetic_dataframe(), "outcome", &config, &mut |_| {});
		assert!(result.is_err());
	}

	#[test]
	fn test_zero_units_step_fails() {
		let config = Config {
			space: Some(SpaceConfig {
				max_hidden_layers: Some(1),
				min_units: Some(32),
				max_units: Some(64),
				units_step: Some(0),
			}),
			..Default::default()
		};
		let error = train_dataframe(synthetic_dataframe(), "outcome", &config, &mut |_| {})
			.unwrap_err();
		assert!(error.to_string().contains("units_step"));
	}

	#[test]
	fn test_inverted_units_range_fails() {
		let config = Config {
			space: Some(SpaceConfig {
				max_hidden_layers: Some(1),
				min_units: Some(64),
				max_units: Some(32),
				units_step: Some(32),
			}),
			..Default::default()
		};
		let error = train_dataframe(synthetic_dataframe(), "outcome", &config, &mut |_| {})
			.unwrap_err();
		assert!(error.to_string().contains("min_units"));
	}

	#[test]
	fn test_zero_hidden_layers_fails() {
		let config = Config {
			space: Some(SpaceConfig {
				max_hidden_layers: Some(0),
				min_units: Some(32),
				max_units: Some(64),
				units_step: Some(32),
			}),
			..Default::default()
		};
		let error = train_dataframe(synthetic_dataframe(), "outcome", &config, &mut |_| {})
			.unwrap_err();
		assert!(error.to_string().contains("max_hidden_layers"));
	}

	#[test]
	fn test_invalid_validation_split_fails() {
		let config = Config {
			search: Some(SearchConfig {
				max_trials: Some(2),
				executions_per_trial: None,
				n_startup_trials: None,
				n_trials_without_improvement_to_stop: None,
				validation_split: Some(1.5),
				max_epochs: Some(5),
				seed: None,
			}),
			..Default::default()
		};
		let error = train_dataframe(synthetic_dataframe(), "outcome", &config, &mut |_| {})
			.unwrap_err();
		assert!(error.to_string().contains("validation_split"));
	}
}
