/*!
This crate implements the cohort training pipeline: load a survey csv, balance the classes by oversampling, scale the features, search a hyperparameter space for the best multilayer perceptron, evaluate it on a held-out test set, and rank the features by permutation importance.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod config;

pub mod balance;
pub mod grid;
pub mod importance;
pub mod progress;
pub mod report;
pub mod scale;
pub mod search;
pub mod train;

pub use self::report::Report;
pub use self::train::train;
