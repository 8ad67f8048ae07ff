use super::*;
use anyhow::{bail, Result};
use std::path::Path;

/// Values that are treated as missing rather than malformed. They still fail the load, because the pipeline has no imputation, but they produce a clearer message.
const INVALID_VALUES: &[&str] = &[
	"", "null", "NULL", "n/a", "N/A", "nan", "-nan", "NaN", "-NaN", "?",
];

impl DataFrame {
	pub fn from_path(path: &Path, progress: impl Fn(u64)) -> Result<Self> {
		Self::from_csv(&mut csv::Reader::from_path(path)?, progress)
	}

	/// Read a csv into a dataframe. The header row defines the column names. Every cell must parse as a finite number, otherwise the load fails naming the offending column and record.
	pub fn from_csv<R>(reader: &mut csv::Reader<R>, progress: impl Fn(u64)) -> Result<Self>
	where
		R: std::io::Read,
	{
		let column_names: Vec<String> = reader
			.headers()?
			.into_iter()
			.map(|column_name| column_name.to_owned())
			.collect();
		if column_names.is_empty() {
			bail!("the csv file has no columns");
		}
		let mut dataframe = DataFrame::new(column_names);
		let mut record = csv::StringRecord::new();
		let mut record_index = 0usize;
		while reader.read_record(&mut record)? {
			record_index += 1;
			for (column, value) in dataframe.columns.iter_mut().zip(record.iter()) {
				let value = value.trim();
				if INVALID_VALUES.contains(&value) {
					bail!(
						"column \"{}\" has a missing value in record {}",
						column.name,
						record_index,
					);
				}
				let value: f32 = match lexical::parse(value) {
					Ok(value) => value,
					Err(_) => bail!(
						"column \"{}\" has a non-numeric value \"{}\" in record {}",
						column.name,
						value,
						record_index,
					),
				};
				if !value.is_finite() {
					bail!(
						"column \"{}\" has a non-finite value in record {}",
						column.name,
						record_index,
					);
				}
				column.data.push(value);
			}
			progress(record.position().map(|position| position.byte()).unwrap_or(0));
		}
		if dataframe.nrows() == 0 {
			bail!("the csv file has no records");
		}
		Ok(dataframe)
	}
}
