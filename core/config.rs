/*!
This module defines the `Config` struct, which is used to configure training with [`train`](../train/fn.train.html). Every field is optional; absent fields fall back to the defaults the pipeline documents.
*/

#[derive(Debug, Default, serde::Deserialize)]
pub struct Config {
	pub test_fraction: Option<f32>,
	pub shuffle: Option<Shuffle>,
	pub balance: Option<BalanceConfig>,
	pub space: Option<SpaceConfig>,
	pub search: Option<SearchConfig>,
	pub fit: Option<FitConfig>,
	pub importance: Option<ImportanceConfig>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
pub enum Shuffle {
	Enabled(bool),
	Options { seed: u64 },
}

#[derive(Debug, serde::Deserialize)]
pub struct BalanceConfig {
	/// If unset, balancing draws from entropy and results vary run to run.
	pub seed: Option<u64>,
}

#[derive(Debug, serde::Deserialize)]
pub struct SpaceConfig {
	pub max_hidden_layers: Option<usize>,
	pub min_units: Option<i64>,
	pub max_units: Option<i64>,
	pub units_step: Option<i64>,
}

#[derive(Debug, serde::Deserialize)]
pub struct SearchConfig {
	pub max_trials: Option<usize>,
	pub executions_per_trial: Option<usize>,
	pub n_startup_trials: Option<usize>,
	pub n_trials_without_improvement_to_stop: Option<usize>,
	pub validation_split: Option<f32>,
	pub max_epochs: Option<usize>,
	pub seed: Option<u64>,
}

#[derive(Debug, serde::Deserialize)]
pub struct FitConfig {
	pub learning_rate: Option<f32>,
	pub max_epochs: Option<usize>,
	pub n_examples_per_batch: Option<usize>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ImportanceConfig {
	pub n_repeats: Option<usize>,
	pub seed: Option<u64>,
}
