/*!
This crate defines the [`StreamingMetric`](trait.StreamingMetric.html) trait and the concrete metrics the cohort pipeline reports: [`Mean`](struct.Mean.html), [`Accuracy`](struct.Accuracy.html), [`MeanSquaredError`](struct.MeanSquaredError.html), and [`BinaryConfusionMatrix`](struct.BinaryConfusionMatrix.html).
*/

#![allow(clippy::tabs_in_doc_comments)]

mod accuracy;
mod confusion_matrix;
mod mean;
mod mean_squared_error;

pub use self::accuracy::Accuracy;
pub use self::confusion_matrix::{
	BinaryConfusionMatrix, BinaryConfusionMatrixInput, BinaryConfusionMatrixOutput, THRESHOLD,
};
pub use self::mean::Mean;
pub use self::mean_squared_error::{MeanSquaredError, MeanSquaredErrorInput};

/**
The `StreamingMetric` trait defines a common interface to metrics that can be computed in a streaming manner, where the input is available in chunks.

After being initialized, a value of a type implementing the `StreamingMetric` trait can have `update()` called on it with values of the associated type `Input`. Multiple values can be merged together by calling `merge()`, which is useful when a metric is computed across multiple threads. When finished aggregating, call `finalize()` to produce the associated type `Output`.

The seemingly unused generic lifetime `'a` exists here to allow `Input`s and `Output`s to borrow from their enclosing scope. When Rust stabilizes Generic Associated Types (GATs), the generic lifetime will move to the associated types.
*/
pub trait StreamingMetric<'a> {
	/// `Input` is the type to aggregate in calls to `update()`.
	type Input;
	/// `Output` is the return type of `finalize()`.
	type Output;
	/// Update this streaming metric with the `Input` `input`.
	fn update(&mut self, input: Self::Input);
	/// Merge multiple independently computed streaming metrics.
	fn merge(&mut self, other: Self);
	/// When you are done aggregating `Input`s, call `finalize()` to produce an `Output`.
	fn finalize(self) -> Self::Output;
}
