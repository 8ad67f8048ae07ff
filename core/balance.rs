use anyhow::{bail, Result};
use cohort_dataframe::{DataFrame, DataFrameView};
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

/**
Produce a dataset where both label classes have equal cardinality by sampling extra minority-class rows with replacement until the counts match. Majority-class rows are carried over unmodified, and every row in the result is a row of the input.

Balancing is deterministic only when `seed` is `Some`; with `None` the draws come from entropy and vary run to run.
*/
pub fn balance(
	dataframe: &DataFrameView,
	label_column_index: usize,
	seed: Option<u64>,
) -> Result<DataFrame> {
	let labels = &dataframe.columns[label_column_index];
	let mut class_zero: Vec<usize> = Vec::new();
	let mut class_one: Vec<usize> = Vec::new();
	for (row_index, label) in labels.data.iter().enumerate() {
		if *label == 0.0 {
			class_zero.push(row_index);
		} else if *label == 1.0 {
			class_one.push(row_index);
		} else {
			bail!(
				"column \"{}\" is not a binary label: found the value {} in record {}",
				labels.name,
				label,
				row_index + 1,
			);
		}
	}
	if class_zero.is_empty() || class_one.is_empty() {
		bail!(
			"column \"{}\" has records of only one class, so the dataset cannot be balanced",
			labels.name,
		);
	}
	let (minority, majority) = if class_zero.len() < class_one.len() {
		(class_zero, class_one)
	} else {
		(class_one, class_zero)
	};
	let mut balanced = DataFrame::new(
		dataframe
			.columns
			.iter()
			.map(|column| column.name.to_owned())
			.collect(),
	);
	for row_index in majority.iter() {
		balanced.push_row_from(dataframe, *row_index);
	}
	if minority.len() == majority.len() {
		// Already balanced: both partitions pass through unchanged.
		for row_index in minority.iter() {
			balanced.push_row_from(dataframe, *row_index);
		}
		return Ok(balanced);
	}
	let mut rng = match seed {
		Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
		None => Xoshiro256Plus::from_entropy(),
	};
	for _ in 0..majority.len() {
		let row_index = minority[rng.gen_range(0, minority.len())];
		balanced.push_row_from(dataframe, row_index);
	}
	Ok(balanced)
}
