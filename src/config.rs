use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	pub data_dir: PathBuf,
	pub models_dir: PathBuf,
	pub settings_path: PathBuf,
	pub low_memory: bool,
}

// Shared runtime settings, read from <data_dir>/settings.toml when present.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Settings {
	#[serde(default)]
	low_memory: bool,
}

impl Config {
	pub fn new() -> crate::error::Result<Self> {
		let project_dirs = ProjectDirs::from("", "", "grounder")
			.ok_or_else(|| crate::error::Error::ConfigError("Could not determine config directory".to_string()))?;

		Self::at_data_dir(project_dirs.data_dir().to_path_buf())
	}

	pub fn from_env() -> crate::error::Result<Self> {
		if let Ok(data_dir) = std::env::var("GROUNDER_DATA_DIR") {
			Self::at_data_dir(PathBuf::from(data_dir))
		} else {
			Self::new()
		}
	}

	fn at_data_dir(data_dir: PathBuf) -> crate::error::Result<Self> {
		let models_dir = data_dir.join("models");
		let settings_path = data_dir.join("settings.toml");

		std::fs::create_dir_all(&data_dir)?;
		std::fs::create_dir_all(&models_dir)?;

		let settings = if settings_path.exists() {
			let content = std::fs::read_to_string(&settings_path)?;
			toml::from_str::<Settings>(&content)?
		} else {
			Settings::default()
		};

		let low_memory = match std::env::var("GROUNDER_LOW_MEMORY") {
			Ok(value) => matches!(value.as_str(), "1" | "true" | "yes"),
			Err(_) => settings.low_memory,
		};

		Ok(Self {
			data_dir,
			models_dir,
			settings_path,
			low_memory,
		})
	}
}
