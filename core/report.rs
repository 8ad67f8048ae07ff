/*!
This module defines the [`Report`](struct.Report.html) a training run produces: everything the run learned, in a form that renders as text with `Display` and as json with serde.
*/

use crate::grid::Hyperparameters;
use crate::importance::FeatureImportance;

/// The result of a full training run.
#[derive(Debug, serde::Serialize)]
pub struct Report {
	/// The name of the column the model predicts.
	pub target_column_name: String,
	/// The number of records in the input file.
	pub n_records: usize,
	/// The number of records after the minority class was oversampled.
	pub n_records_after_balancing: usize,
	pub n_train_records: usize,
	pub n_test_records: usize,
	/// The hyperparameters of the winning trial.
	pub best_hyperparameters: Hyperparameters,
	/// The validation accuracy the winning trial achieved during the search.
	pub best_trial_objective: f32,
	pub n_trials: usize,
	/// The per-epoch validation metrics of the final fit.
	pub epoch_metrics: Vec<EpochMetricsReport>,
	pub test_loss: f32,
	pub test_accuracy: f32,
	/// The accuracy of always predicting the most common class in the test set.
	pub baseline_accuracy: f32,
	pub confusion_matrix: ConfusionMatrixReport,
	/// The features ranked by permutation importance, highest first.
	pub feature_importances: Vec<FeatureImportance>,
}

#[derive(Debug, serde::Serialize)]
pub struct EpochMetricsReport {
	pub epoch: usize,
	pub val_loss: f32,
	pub val_accuracy: f32,
}

#[derive(Debug, serde::Serialize)]
pub struct ConfusionMatrixReport {
	pub true_negatives: u64,
	pub false_positives: u64,
	pub false_negatives: u64,
	pub true_positives: u64,
	pub precision: f32,
	pub recall: f32,
	pub f1_score: f32,
}

impl std::fmt::Display for Report {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		writeln!(f, "target column: {}", self.target_column_name)?;
		writeln!(
			f,
			"records: {} loaded, {} after balancing, {} train, {} test",
			self.n_records,
			self.n_records_after_balancing,
			self.n_train_records,
			self.n_test_records,
		)?;
		writeln!(
			f,
			"best of {} trials (validation accuracy {:.4}): {}",
			self.n_trials, self.best_trial_objective, self.best_hyperparameters,
		)?;
		if let Some(last) = self.epoch_metrics.last() {
			writeln!(
				f,
				"final fit: {} epochs, val_loss {:.4}, val_accuracy {:.4}",
				self.epoch_metrics.len(),
				last.val_loss,
				last.val_accuracy,
			)?;
		}
		writeln!(
			f,
			"test: loss {:.4}, accuracy {:.4} (baseline {:.4})",
			self.test_loss, self.test_accuracy, self.baseline_accuracy,
		)?;
		writeln!(f, "confusion matrix (rows actual, columns predicted):")?;
		writeln!(
			f,
			"	[{} {}]",
			self.confusion_matrix.true_negatives, self.confusion_matrix.false_positives,
		)?;
		writeln!(
			f,
			"	[{} {}]",
			self.confusion_matrix.false_negatives, self.confusion_matrix.true_positives,
		)?;
		writeln!(
			f,
			"precision {:.4}, recall {:.4}, f1 {:.4}",
			self.confusion_matrix.precision,
			self.confusion_matrix.recall,
			self.confusion_matrix.f1_score,
		)?;
		writeln!(f, "feature importances:")?;
		for feature_importance in self.feature_importances.iter() {
			writeln!(
				f,
				"	{:+.4} {}",
				feature_importance.importance, feature_importance.feature_name,
			)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn test_report() -> Report {
		Report {
			target_column_name: "Diabetes_binary".to_owned(),
			n_records: 10,
			n_records_after_balancing: 16,
			n_train_records: 12,
			n_test_records: 4,
			best_hyperparameters: Hyperparameters::new(vec![
				("input_units".to_owned(), 96),
				("n_layers".to_owned(), 1),
				("layer_0".to_owned(), 64),
				("layer_1".to_owned(), 32),
			]),
			best_trial_objective: 0.75,
			n_trials: 10,
			epoch_metrics: vec![EpochMetricsReport {
				epoch: 0,
				val_loss: 0.25,
				val_accuracy: 0.5,
			}],
			test_loss: 0.125,
			test_accuracy: 0.75,
			baseline_accuracy: 0.5,
			confusion_matrix: ConfusionMatrixReport {
				true_negatives: 2,
				false_positives: 0,
				false_negatives: 1,
				true_positives: 1,
				precision: 1.0,
				recall: 0.5,
				f1_score: 2.0 / 3.0,
			},
			feature_importances: vec![
				FeatureImportance {
					feature_name: "HighBP".to_owned(),
					importance: 0.05,
				},
				FeatureImportance {
					feature_name: "AnyHealthcare".to_owned(),
					importance: -0.0025,
				},
			],
		}
	}

	#[test]
	fn test_display() {
		let rendered = test_report().to_string();
		assert!(rendered.contains("target column: Diabetes_binary"));
		assert!(rendered.contains("input_units = 96"));
		assert!(rendered.contains("+0.0500 HighBP"));
		assert!(rendered.contains("-0.0025 AnyHealthcare"));
	}

	#[test]
	fn test_serialize() {
		let json = serde_json::to_string(&test_report()).unwrap();
		assert!(json.contains("\"feature_importances\":["));
	}

	#[test]
	fn test_serialize_hyperparameters() {
		let json = serde_json::to_string(&test_report().best_hyperparameters).unwrap();
		insta::assert_snapshot!(
			json,
			@r#"{"input_units":96,"n_layers":1,"layer_0":64,"layer_1":32}"#
		);
	}
}
