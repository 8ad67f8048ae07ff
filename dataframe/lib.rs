/*!
This crate provides a minimal implementation of dataframes for numeric survey data, where every column holds `f32` values and shares one name per column. It only implements the features needed to support the cohort pipeline: loading from csv, borrowed views, row splits, row-coherent shuffling, and conversion to an `ndarray` matrix.
*/

use itertools::izip;
use ndarray::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

mod load;

#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
	pub columns: Vec<NumberColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberColumn {
	pub name: String,
	pub data: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataFrameView<'a> {
	pub columns: Vec<NumberColumnView<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberColumnView<'a> {
	pub name: &'a str,
	pub data: &'a [f32],
}

impl DataFrame {
	pub fn new(column_names: Vec<String>) -> Self {
		let columns = column_names
			.into_iter()
			.map(NumberColumn::new)
			.collect();
		Self { columns }
	}

	pub fn ncols(&self) -> usize {
		self.columns.len()
	}

	pub fn nrows(&self) -> usize {
		self.columns.first().map(|column| column.data.len()).unwrap_or(0)
	}

	pub fn view(&self) -> DataFrameView {
		let columns = self.columns.iter().map(|column| column.view()).collect();
		DataFrameView { columns }
	}

	pub fn column(&self, name: &str) -> Option<&NumberColumn> {
		self.columns.iter().find(|column| column.name == name)
	}

	pub fn column_index(&self, name: &str) -> Option<usize> {
		self.columns.iter().position(|column| column.name == name)
	}

	/// Reorder every column by the same seeded permutation, so rows stay coherent.
	pub fn shuffle(&mut self, seed: u64) {
		let mut permutation: Vec<usize> = (0..self.nrows()).collect();
		let mut rng = Xoshiro256Plus::seed_from_u64(seed);
		permutation.shuffle(&mut rng);
		for column in self.columns.iter_mut() {
			column.data = permutation.iter().map(|index| column.data[*index]).collect();
		}
	}

	/// Append row `index` of `other` to this dataframe. The two dataframes must share a schema.
	pub fn push_row_from(&mut self, other: &DataFrameView, index: usize) {
		for (column, other_column) in izip!(self.columns.iter_mut(), other.columns.iter()) {
			column.data.push(other_column.data[index]);
		}
	}
}

impl NumberColumn {
	pub fn new(name: String) -> Self {
		Self {
			name,
			data: Vec::new(),
		}
	}

	pub fn view(&self) -> NumberColumnView {
		NumberColumnView {
			name: &self.name,
			data: &self.data,
		}
	}
}

impl<'a> DataFrameView<'a> {
	pub fn ncols(&self) -> usize {
		self.columns.len()
	}

	pub fn nrows(&self) -> usize {
		self.columns.first().map(|column| column.data.len()).unwrap_or(0)
	}

	pub fn column_names(&self) -> Vec<String> {
		self.columns
			.iter()
			.map(|column| column.name.to_owned())
			.collect()
	}

	pub fn split_at_row(&self, index: usize) -> (Self, Self) {
		let iter = self.columns.iter().map(|column| column.split_at_row(index));
		let mut columns_a = Vec::with_capacity(self.columns.len());
		let mut columns_b = Vec::with_capacity(self.columns.len());
		for (column_a, column_b) in iter {
			columns_a.push(column_a);
			columns_b.push(column_b);
		}
		(Self { columns: columns_a }, Self { columns: columns_b })
	}

	/// Drop the column at `index`, returning its view alongside a view of the remaining columns.
	pub fn split_off_column(&self, index: usize) -> (NumberColumnView<'a>, Self) {
		let target = self.columns[index].clone();
		let columns = self
			.columns
			.iter()
			.enumerate()
			.filter(|(column_index, _)| *column_index != index)
			.map(|(_, column)| column.clone())
			.collect();
		(target, Self { columns })
	}

	pub fn to_rows(&self) -> Array2<f32> {
		let mut rows = Array2::zeros((self.nrows(), self.ncols()));
		for (mut ndarray_column, dataframe_column) in
			izip!(rows.gencolumns_mut(), self.columns.iter())
		{
			for (a, b) in izip!(ndarray_column.iter_mut(), dataframe_column.data) {
				*a = *b;
			}
		}
		rows
	}

	pub fn to_owned(&self) -> DataFrame {
		let columns = self
			.columns
			.iter()
			.map(|column| NumberColumn {
				name: column.name.to_owned(),
				data: column.data.to_vec(),
			})
			.collect();
		DataFrame { columns }
	}
}

impl<'a> NumberColumnView<'a> {
	pub fn split_at_row(&self, index: usize) -> (Self, Self) {
		let (data_a, data_b) = self.data.split_at(index);
		(
			NumberColumnView {
				name: self.name,
				data: data_a,
			},
			NumberColumnView {
				name: self.name,
				data: data_b,
			},
		)
	}

	pub fn to_array(&self) -> Array1<f32> {
		Array1::from(self.data.to_vec())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn test_dataframe() -> DataFrame {
		DataFrame {
			columns: vec![
				NumberColumn {
					name: "a".to_owned(),
					data: vec![1.0, 2.0, 3.0, 4.0],
				},
				NumberColumn {
					name: "b".to_owned(),
					data: vec![5.0, 6.0, 7.0, 8.0],
				},
			],
		}
	}

	#[test]
	fn test_split_at_row() {
		let dataframe = test_dataframe();
		let (left, right) = dataframe.view().split_at_row(3);
		assert_eq!(left.nrows(), 3);
		assert_eq!(right.nrows(), 1);
		assert_eq!(right.columns[0].data, &[4.0]);
		assert_eq!(right.columns[1].data, &[8.0]);
	}

	#[test]
	fn test_to_rows() {
		let dataframe = test_dataframe();
		let rows = dataframe.view().to_rows();
		assert_eq!(rows, ndarray::arr2(&[[1.0, 5.0], [2.0, 6.0], [3.0, 7.0], [4.0, 8.0]]));
	}

	#[test]
	fn test_shuffle_keeps_rows_coherent() {
		let mut dataframe = test_dataframe();
		dataframe.shuffle(42);
		// The pairing (a, a + 4) must survive the shuffle.
		for (a, b) in izip!(
			dataframe.columns[0].data.iter(),
			dataframe.columns[1].data.iter()
		) {
			assert_eq!(*b, *a + 4.0);
		}
	}

	#[test]
	fn test_shuffle_deterministic_under_seed() {
		let mut dataframe_a = test_dataframe();
		let mut dataframe_b = test_dataframe();
		dataframe_a.shuffle(7);
		dataframe_b.shuffle(7);
		assert_eq!(dataframe_a, dataframe_b);
	}

	#[test]
	fn test_split_off_column() {
		let dataframe = test_dataframe();
		let view = dataframe.view();
		let (target, features) = view.split_off_column(1);
		assert_eq!(target.name, "b");
		assert_eq!(features.ncols(), 1);
		assert_eq!(features.columns[0].name, "a");
	}
}
