//! This module contains the main entrypoint to the cohort cli.

use anyhow::Result;
use clap::Parser;
use cohort_core::progress::Progress;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(about = "Train a survey risk model from a csv file.")]
enum Options {
	#[clap(name = "train")]
	Train(TrainOptions),
}

#[derive(clap::Args, Debug)]
#[clap(about = "train a model from a csv file and report its metrics and feature importances")]
struct TrainOptions {
	#[clap(short, long, help = "the path to your .csv file")]
	file: PathBuf,
	#[clap(short, long, help = "the name of the column to predict")]
	target: String,
	#[clap(short, long, help = "the path to a config file")]
	config: Option<PathBuf>,
	#[clap(short, long, help = "the path to write the report json to")]
	output: Option<PathBuf>,
	#[clap(long = "no-progress", help = "disable progress messages")]
	no_progress: bool,
}

fn main() {
	let options = Options::parse();
	let result = match options {
		Options::Train(options) => cli_train(options),
	};
	if let Err(error) = result {
		eprintln!("{}: {}", "error".red().bold(), error);
		std::process::exit(1);
	}
}

fn cli_train(options: TrainOptions) -> Result<()> {
	let progress_enabled = !options.no_progress;
	let mut training_announced = false;
	let report = cohort_core::train(
		&options.file,
		&options.target,
		options.config.as_deref(),
		&mut |progress| {
			if !progress_enabled {
				return;
			}
			match progress {
				Progress::Loading(_) => eprintln!("loading {}", options.file.display()),
				Progress::Shuffling => eprintln!("shuffling"),
				Progress::Balancing => eprintln!("balancing classes"),
				Progress::Searching {
					trial_index,
					max_trials,
				} => eprintln!("searching: trial {} of {}", trial_index + 1, max_trials),
				Progress::Training(progress) => {
					if !training_announced {
						training_announced = true;
						eprintln!("training the final model for {} epochs", progress.max_epochs);
					}
				}
				Progress::Testing => eprintln!("evaluating on the test set"),
				Progress::ComputingFeatureImportances => {
					eprintln!("computing feature importances")
				}
			}
		},
	)?;
	println!("{}", report);
	if let Some(output_path) = options.output {
		let file = std::fs::File::create(&output_path)?;
		serde_json::to_writer_pretty(file, &report)?;
		eprintln!("The report was written to {}.", output_path.display());
	}
	Ok(())
}
