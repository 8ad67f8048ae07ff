use ndarray::prelude::*;

/**
A per-column min/max scaler. `fit` records each column's observed range from the fit set only; `transform` maps values linearly so the fit minimum lands on 0 and the fit maximum on 1, and is reapplied to later data without refitting, so no statistics leak from the test set.

A constant column maps to 0.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct MinMaxScaler {
	pub mins: Vec<f32>,
	pub maxs: Vec<f32>,
}

impl MinMaxScaler {
	pub fn fit(features: ArrayView2<f32>) -> Self {
		let mut mins = Vec::with_capacity(features.ncols());
		let mut maxs = Vec::with_capacity(features.ncols());
		for column in features.gencolumns() {
			let mut min = f32::INFINITY;
			let mut max = f32::NEG_INFINITY;
			for value in column.iter() {
				min = min.min(*value);
				max = max.max(*value);
			}
			mins.push(min);
			maxs.push(max);
		}
		Self { mins, maxs }
	}

	pub fn transform(&self, features: ArrayView2<f32>) -> Array2<f32> {
		let mut scaled = features.to_owned();
		for (column_index, mut column) in scaled.gencolumns_mut().into_iter().enumerate() {
			let min = self.mins[column_index];
			let range = self.maxs[column_index] - min;
			if range == 0.0 {
				column.fill(0.0);
			} else {
				column.mapv_inplace(|value| (value - min) / range);
			}
		}
		scaled
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_fit_transform_maps_min_to_zero_and_max_to_one() {
		let features = arr2(&[[2.0, 10.0], [4.0, 30.0], [6.0, 20.0]]);
		let scaler = MinMaxScaler::fit(features.view());
		let scaled = scaler.transform(features.view());
		assert_eq!(scaled.column(0).to_vec(), vec![0.0, 0.5, 1.0]);
		assert_eq!(scaled.column(1).to_vec(), vec![0.0, 1.0, 0.5]);
	}

	#[test]
	fn test_transform_does_not_refit() {
		let fit_features = arr2(&[[0.0], [10.0]]);
		let scaler = MinMaxScaler::fit(fit_features.view());
		// Values outside the fit range land outside [0, 1] rather than shifting the range.
		let other = arr2(&[[20.0], [-10.0]]);
		let scaled = scaler.transform(other.view());
		assert_eq!(scaled.column(0).to_vec(), vec![2.0, -1.0]);
	}

	#[test]
	fn test_constant_column_maps_to_zero() {
		let features = arr2(&[[7.0], [7.0], [7.0]]);
		let scaler = MinMaxScaler::fit(features.view());
		let scaled = scaler.transform(features.view());
		assert_eq!(scaled.column(0).to_vec(), vec![0.0, 0.0, 0.0]);
	}
}
