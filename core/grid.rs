/*!
This module describes the hyperparameter space the search engine draws from. A space is a list of named integer ranges; one concrete assignment of every parameter is a [`Hyperparameters`](struct.Hyperparameters.html) value, which is validated against the space before any model is built from it.
*/

use anyhow::{bail, Result};
use num_traits::ToPrimitive;
use rand::Rng;
use rand_xoshiro::Xoshiro256Plus;

/// An inclusive integer range with a step, like the tuner ranges the network widths are drawn from.
#[derive(Clone, Debug, PartialEq)]
pub struct IntRange {
	pub min: i64,
	pub max: i64,
	pub step: i64,
}

impl IntRange {
	pub fn n_values(&self) -> i64 {
		(self.max - self.min) / self.step + 1
	}

	pub fn contains(&self, value: i64) -> bool {
		value >= self.min && value <= self.max && (value - self.min) % self.step == 0
	}

	fn sample(&self, rng: &mut Xoshiro256Plus) -> i64 {
		self.min + rng.gen_range(0, self.n_values()) * self.step
	}

	/// The position of `value` in the range, normalized to [0, 1], for the search surrogate's distance computations.
	fn position(&self, value: i64) -> f32 {
		if self.n_values() == 1 {
			return 0.0;
		}
		(value - self.min).to_f32().unwrap() / (self.max - self.min).to_f32().unwrap()
	}
}

/// The named hyperparameters a search run may assign, with their declared bounds.
#[derive(Clone, Debug)]
pub struct HyperparameterSpace {
	pub parameters: Vec<(String, IntRange)>,
}

/// One concrete assignment of every parameter in a space: a single candidate model configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Hyperparameters {
	values: Vec<(String, i64)>,
}

impl HyperparameterSpace {
	/**
	The space for the multilayer perceptron: the width of the first hidden layer (`input_units`), how many additional hidden layers to stack (`n_layers`), and the width of each additional layer (`layer_{i}`). Every `layer_{i}` is always assigned, but the model builder only reads the first `n_layers` of them.
	*/
	pub fn mlp(max_extra_layers: usize, units: IntRange) -> Self {
		let mut parameters = vec![
			("input_units".to_owned(), units.clone()),
			(
				"n_layers".to_owned(),
				IntRange {
					min: 1,
					max: max_extra_layers.to_i64().unwrap(),
					step: 1,
				},
			),
		];
		for layer_index in 0..max_extra_layers {
			parameters.push((format!("layer_{}", layer_index), units.clone()));
		}
		Self { parameters }
	}

	pub fn sample(&self, rng: &mut Xoshiro256Plus) -> Hyperparameters {
		let values = self
			.parameters
			.iter()
			.map(|(name, range)| (name.clone(), range.sample(rng)))
			.collect();
		Hyperparameters { values }
	}

	/// Check a hyperparameter vector against the declared bounds. This runs before any model is built, so an out-of-bounds vector never consumes a trial.
	pub fn validate(&self, hyperparameters: &Hyperparameters) -> Result<()> {
		if hyperparameters.values.len() != self.parameters.len() {
			bail!(
				"expected {} hyperparameters but got {}",
				self.parameters.len(),
				hyperparameters.values.len(),
			);
		}
		for (name, value) in hyperparameters.values.iter() {
			let range = match self
				.parameters
				.iter()
				.find(|(parameter_name, _)| parameter_name == name)
			{
				Some((_, range)) => range,
				None => bail!("unknown hyperparameter \"{}\"", name),
			};
			if !range.contains(*value) {
				bail!(
					"hyperparameter \"{}\" = {} is outside its declared range {}..={} step {}",
					name,
					value,
					range.min,
					range.max,
					range.step,
				);
			}
		}
		Ok(())
	}

	/// Encode a vector as normalized positions in [0, 1] per dimension, in the space's parameter order.
	pub fn encode(&self, hyperparameters: &Hyperparameters) -> Vec<f32> {
		self.parameters
			.iter()
			.map(|(name, range)| range.position(hyperparameters.get(name).unwrap()))
			.collect()
	}
}

impl Hyperparameters {
	pub fn new(values: Vec<(String, i64)>) -> Self {
		Self { values }
	}

	pub fn get(&self, name: &str) -> Option<i64> {
		self.values
			.iter()
			.find(|(value_name, _)| value_name == name)
			.map(|(_, value)| *value)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
		self.values.iter().map(|(name, value)| (name.as_str(), *value))
	}
}

impl serde::Serialize for Hyperparameters {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		use serde::ser::SerializeMap;
		let mut map = serializer.serialize_map(Some(self.values.len()))?;
		for (name, value) in self.values.iter() {
			map.serialize_entry(name, value)?;
		}
		map.end()
	}
}

impl std::fmt::Display for Hyperparameters {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		for (index, (name, value)) in self.values.iter().enumerate() {
			if index > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{} = {}", name, value)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use rand::SeedableRng;

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
	fn test_sample_is_in_bounds() {
		let space = test_space();
		let mut rng = Xoshiro256Plus::seed_from_u64(0);
		for _ in 0..100 {
			let hyperparameters = space.sample(&mut rng);
			space.validate(&hyperparameters).unwrap();
		}
	}

	#[test]
	fn test_validate_rejects_out_of_bounds() {
		let space = test_space();
		let hyperparameters = Hyperparameters::new(vec![
			("input_units".to_owned(), 31),
			("n_layers".to_owned(), 1),
			("layer_0".to_owned(), 32),
			("layer_1".to_owned(), 32),
		]);
		let error = space.validate(&hyperparameters).unwrap_err();
		assert!(error.to_string().contains("input_units"));
	}

	#[test]
	fn test_validate_rejects_off_step() {
		let space = test_space();
		let hyperparameters = Hyperparameters::new(vec![
			("input_units".to_owned(), 48),
			("n_layers".to_owned(), 1),
			("layer_0".to_owned(), 32),
			("layer_1".to_owned(), 32),
		]);
		assert!(space.validate(&hyperparameters).is_err());
	}

	#[test]
	fn test_validate_rejects_unknown_name() {
		let space = test_space();
		let hyperparameters = Hyperparameters::new(vec![
			("input_units".to_owned(), 32),
			("n_layers".to_owned(), 1),
			("layer_0".to_owned(), 32),
			("dropout".to_owned(), 1),
		]);
		let error = space.validate(&hyperparameters).unwrap_err();
		assert!(error.to_string().contains("dropout"));
	}

	#[test]
	fn test_encode_normalizes() {
		let space = test_space();
		let hyperparameters = Hyperparameters::new(vec![
			("input_units".to_owned(), 32),
			("n_layers".to_owned(), 2),
			("layer_0".to_owned(), 512),
			("layer_1".to_owned(), 272),
		]);
		let encoded = space.encode(&hyperparameters);
		assert_eq!(encoded, vec![0.0, 1.0, 1.0, 0.5]);
	}
}
