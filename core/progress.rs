use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

/// The stages of a training run, reported through the `update_progress` callback passed to [`train`](../train/fn.train.html).
#[derive(Debug)]
pub enum Progress {
	Loading(ProgressCounter),
	Shuffling,
	Balancing,
	Searching { trial_index: usize, max_trials: usize },
	Training(cohort_nn::Progress),
	Testing,
	ComputingFeatureImportances,
}

/**
A counter the loader advances as it reads through the input file, measured in bytes. It is handed to the caller inside [`Progress::Loading`](enum.Progress.html) before loading starts, so a renderer can poll it from another thread while the load is in flight.
*/
#[derive(Clone, Debug)]
pub struct ProgressCounter {
	current: Arc<AtomicU64>,
	total: u64,
}

impl ProgressCounter {
	pub fn new(total: u64) -> Self {
		Self {
			current: Arc::new(AtomicU64::new(0)),
			total,
		}
	}

	pub fn total(&self) -> u64 {
		self.total
	}

	pub fn get(&self) -> u64 {
		self.current.load(Ordering::Relaxed)
	}

	pub fn set(&self, value: u64) {
		self.current.store(value, Ordering::Relaxed)
	}

	/// How far along the counter is, in [0, 1]. A zero total reads as done.
	pub fn fraction(&self) -> f32 {
		if self.total == 0 {
			return 1.0;
		}
		self.get() as f32 / self.total as f32
	}
}
