use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grounder")]
#[command(version, about = "A lightweight open-vocabulary object detection runtime", long_about = None)]
pub struct Cli {
	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Detect objects matching a text prompt in an image
	Detect {
		/// Path to the input image
		#[arg(long)]
		image: PathBuf,

		/// What to look for (e.g., "a cat")
		#[arg(long)]
		prompt: String,

		/// Model name from the registry
		#[arg(long, default_value = crate::model::DEFAULT_MODEL)]
		model: String,

		/// Confidence threshold; only detections strictly above it are kept
		#[arg(long, default_value_t = 0.3)]
		threshold: f32,

		/// Device to run on (e.g., "cpu" or "cuda:0")
		#[arg(long, default_value = "cpu")]
		device: String,

		/// Write a copy of the image with boxes drawn to this path
		#[arg(long)]
		output: Option<PathBuf>,

		/// Label each drawn box with its index (requires --font)
		#[arg(long)]
		show_index: bool,

		/// TTF/OTF font used for index labels
		#[arg(long)]
		font: Option<PathBuf>,
	},

	/// Download a model's checkpoint and tokenizer ahead of time
	Pull {
		/// Model name from the registry
		#[arg(default_value = crate::model::DEFAULT_MODEL)]
		model: String,
	},

	/// Start the HTTP API server (models loaded on-demand)
	Serve {
		/// Device to run on (e.g., "cpu" or "cuda:0")
		#[arg(long, default_value = "cpu")]
		device: String,

		/// Port to listen on
		#[arg(long, default_value = "8080")]
		port: u16,

		/// Host to bind to
		#[arg(long, default_value = "0.0.0.0")]
		host: String,
	},

	/// List the models in the registry
	List,
}
