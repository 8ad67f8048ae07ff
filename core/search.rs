/*!
This module implements the hyperparameter search. The engine is model-agnostic: it hands each proposed [`Hyperparameters`](../grid/struct.Hyperparameters.html) vector to a caller-supplied trial function and records the objective value the function returns, where higher is better. The first `n_startup_trials` proposals are drawn uniformly at random from the space. After that, proposals come from a kernel surrogate fit to the observations so far: a pool of random candidates is scored by a radial-basis-kernel weighted mean of the observed objectives plus an exploration bonus that grows where the pool is far from every observation, and the highest scoring candidate becomes the next trial.

A trial whose function errors or returns a non-finite objective is recorded with objective `f32::NEG_INFINITY` and the search continues. The returned results are sorted by objective descending, with ties broken by earlier trial index.
*/

use crate::grid::{HyperparameterSpace, Hyperparameters};
use anyhow::{bail, Result};
use itertools::izip;
use num_traits::ToPrimitive;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/// The width of the radial basis kernel in the encoded unit hypercube.
const KERNEL_BANDWIDTH: f32 = 0.2;
/// How many random candidates the surrogate scores per proposal.
const N_CANDIDATES: usize = 64;

#[derive(Clone, Debug)]
pub struct SearchOptions {
	/// The total number of trials to run.
	pub max_trials: usize,
	/// How many times to evaluate the trial function per trial. The recorded objective is the mean.
	pub executions_per_trial: usize,
	/// How many trials to propose uniformly at random before the surrogate takes over.
	pub n_startup_trials: usize,
	/// If set, stop early after this many consecutive trials without improving on the best objective.
	pub n_trials_without_improvement_to_stop: Option<usize>,
	pub seed: u64,
}

impl Default for SearchOptions {
	fn default() -> Self {
		Self {
			max_trials: 10,
			executions_per_trial: 1,
			n_startup_trials: 3,
			n_trials_without_improvement_to_stop: None,
			seed: 0,
		}
	}
}

/// One completed trial: the hyperparameters that were evaluated and the objective they achieved.
#[derive(Clone, Debug)]
pub struct TrialResult {
	pub trial_index: usize,
	pub hyperparameters: Hyperparameters,
	pub objective: f32,
}

pub struct SearchProgress {
	pub trial_index: usize,
	pub max_trials: usize,
}

/// Run the search and return the trial results ranked best first.
pub fn search(
	space: &HyperparameterSpace,
	options: &SearchOptions,
	mut trial_fn: impl FnMut(&Hyperparameters) -> Result<f32>,
	update_progress: &mut dyn FnMut(SearchProgress),
) -> Result<Vec<TrialResult>> {
	if options.max_trials == 0 {
		bail!("max_trials must be greater than zero");
	}
	if options.executions_per_trial == 0 {
		bail!("executions_per_trial must be greater than zero");
	}
	let mut rng = Xoshiro256Plus::seed_from_u64(options.seed);
	let mut trials: Vec<TrialResult> = Vec::with_capacity(options.max_trials);
	// Observations the surrogate is fit to, in the encoded unit hypercube. Failed trials are excluded so they do not drag the predicted mean to negative infinity.
	let mut observations: Vec<(Vec<f32>, f32)> = Vec::with_capacity(options.max_trials);
	let mut n_trials_without_improvement = 0;
	for trial_index in 0..options.max_trials {
		update_progress(SearchProgress {
			trial_index,
			max_trials: options.max_trials,
		});
		let hyperparameters = if trial_index < options.n_startup_trials || observations.len() < 2 {
			space.sample(&mut rng)
		} else {
			propose(space, &observations, &mut rng)
		};
		space.validate(&hyperparameters)?;
		let objective = run_trial(&hyperparameters, options.executions_per_trial, &mut trial_fn);
		if objective.is_finite() {
			observations.push((space.encode(&hyperparameters), objective));
		}
		let improved = match best_objective(&trials) {
			Some(best) => objective > best,
			None => objective.is_finite(),
		};
		trials.push(TrialResult {
			trial_index,
			hyperparameters,
			objective,
		});
		if improved {
			n_trials_without_improvement = 0;
		} else {
			n_trials_without_improvement += 1;
		}
		if let Some(n) = options.n_trials_without_improvement_to_stop {
			if n_trials_without_improvement >= n {
				break;
			}
		}
	}
	// Stable sort, so ties keep the earlier trial first.
	trials.sort_by(|a, b| b.objective.partial_cmp(&a.objective).unwrap());
	Ok(trials)
}

fn run_trial(
	hyperparameters: &Hyperparameters,
	executions_per_trial: usize,
	trial_fn: &mut impl FnMut(&Hyperparameters) -> Result<f32>,
) -> f32 {
	let mut sum = 0.0;
	for _ in 0..executions_per_trial {
		match trial_fn(hyperparameters) {
			Ok(objective) if objective.is_finite() => sum += objective,
			_ => return f32::NEG_INFINITY,
		}
	}
	sum / executions_per_trial.to_f32().unwrap()
}

fn best_objective(trials: &[TrialResult]) -> Option<f32> {
	trials
		.iter()
		.map(|trial| trial.objective)
		.filter(|objective| objective.is_finite())
		.max_by(|a, b| a.partial_cmp(b).unwrap())
}

/// Score a pool of random candidates under the surrogate and return the best one.
fn propose(
	space: &HyperparameterSpace,
	observations: &[(Vec<f32>, f32)],
	rng: &mut Xoshiro256Plus,
) -> Hyperparameters {
	let mean_objective = observations
		.iter()
		.map(|(_, objective)| objective)
		.sum::<f32>()
		/ observations.len().to_f32().unwrap();
	let objective_spread = observations
		.iter()
		.map(|(_, objective)| (objective - mean_objective).powi(2))
		.sum::<f32>()
		.sqrt()
		/ observations.len().to_f32().unwrap()
		+ f32::EPSILON;
	let mut best: Option<(Hyperparameters, f32)> = None;
	for _ in 0..N_CANDIDATES {
		let candidate = space.sample(rng);
		let encoded = space.encode(&candidate);
		let mut kernel_mass = 0.0;
		let mut weighted_sum = 0.0;
		for (observed, objective) in observations.iter() {
			let distance_squared: f32 = izip!(encoded.iter(), observed.iter())
				.map(|(a, b)| (a - b).powi(2))
				.sum();
			let weight = (-distance_squared / (2.0 * KERNEL_BANDWIDTH * KERNEL_BANDWIDTH)).exp();
			kernel_mass += weight;
			weighted_sum += weight * objective;
		}
		let predicted = if kernel_mass > f32::EPSILON {
			weighted_sum / kernel_mass
		} else {
			mean_objective
		};
		// Candidates far from every observation get a larger bonus, which keeps the search exploring.
		let exploration_bonus = objective_spread / (1.0 + kernel_mass);
		let score = predicted + exploration_bonus;
		match &best {
			Some((_, best_score)) if score <= *best_score => {}
			_ => best = Some((candidate, score)),
		}
	}
	best.unwrap().0
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::grid::IntRange;

	fn test_space() -> HyperparameterSpace {
		HyperparameterSpace::mlp(
			2,
			IntRange {
				min: 32,
				max: 512,
				step: 32,
			},
		)
	}

	#[test]
	fn test_results_are_ranked_descending() {
		let space = test_space();
		let options = SearchOptions {
			max_trials: 8,
			..Default::default()
		};
		let mut counter = 0.0;
		let results = search(
			&space,
			&options,
			|_| {
				counter += 1.0;
				Ok(counter)
			},
			&mut |_| {},
		)
		.unwrap();
		assert_eq!(results.len(), 8);
		for pair in results.windows(2) {
			assert!(pair[0].objective >= pair[1].objective);
		}
		assert_eq!(results[0].objective, 8.0);
	}

	#[test]
	fn test_failed_trials_are_recorded() {
		let space = test_space();
		let options = SearchOptions {
			max_trials: 4,
			..Default::default()
		};
		let mut trial_index = 0;
		let results = search(
			&space,
			&options,
			|_| {
				trial_index += 1;
				if trial_index == 2 {
					Ok(f32::NAN)
				} else if trial_index == 3 {
					Err(anyhow::format_err!("training diverged"))
				} else {
					Ok(0.5)
				}
			},
			&mut |_| {},
		)
		.unwrap();
		assert_eq!(results.len(), 4);
		let n_failed = results
			.iter()
			.filter(|result| result.objective == f32::NEG_INFINITY)
			.count();
		assert_eq!(n_failed, 2);
		assert_eq!(results[0].objective, 0.5);
	}

	#[test]
	fn test_search_is_deterministic() {
		let space = test_space();
		let options = SearchOptions {
			max_trials: 6,
			seed: 42,
			..Default::default()
		};
		let objective = |hyperparameters: &Hyperparameters| {
			Ok(hyperparameters.get("input_units").unwrap() as f32 / 512.0)
		};
		let first = search(&space, &options, objective, &mut |_| {}).unwrap();
		let second = search(&space, &options, objective, &mut |_| {}).unwrap();
		for (a, b) in first.iter().zip(second.iter()) {
			assert_eq!(a.trial_index, b.trial_index);
			assert_eq!(a.hyperparameters, b.hyperparameters);
			assert_eq!(a.objective, b.objective);
		}
	}

	#[test]
	fn test_no_improvement_stop() {
		let space = test_space();
		let options = SearchOptions {
			max_trials: 100,
			n_trials_without_improvement_to_stop: Some(3),
			..Default::default()
		};
		let results = search(&space, &options, |_| Ok(0.5), &mut |_| {}).unwrap();
		// The first trial sets the best, then three trials tie without improving.
		assert_eq!(results.len(), 4);
	}

	#[test]
	fn test_executions_are_averaged() {
		let space = test_space();
		let options = SearchOptions {
			max_trials: 1,
			executions_per_trial: 2,
			..Default::default()
		};
		let mut execution_index = 0;
		let results = search(
			&space,
			&options,
			|_| {
				execution_index += 1;
				Ok(execution_index as f32)
			},
			&mut |_| {},
		)
		.unwrap();
		assert_eq!(results[0].objective, 1.5);
	}
}
