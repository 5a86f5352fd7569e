use std::fmt;

#[derive(Debug)]
pub enum Error {
	ModelNotFound(String),
	ModelLoadFailed(String),
	DownloadFailed(String),
	InferenceFailed(String),
	InvalidInput(String),
	ConfigError(String),
	IoError(std::io::Error),
	ImageError(image::ImageError),
	SerializationError(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::ModelNotFound(name) => write!(f, "Model not found: {}", name),
			Error::ModelLoadFailed(msg) => write!(f, "Failed to load model: {}", msg),
			Error::DownloadFailed(msg) => write!(f, "Download failed: {}", msg),
			Error::InferenceFailed(msg) => write!(f, "Inference failed: {}", msg),
			Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
			Error::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
			Error::IoError(e) => write!(f, "IO error: {}", e),
			Error::ImageError(e) => write!(f, "Image error: {}", e),
			Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
		}
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Error::IoError(err)
	}
}

impl From<image::ImageError> for Error {
	fn from(err: image::ImageError) -> Self {
		Error::ImageError(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::SerializationError(err.to_string())
	}
}

impl From<toml::de::Error> for Error {
	fn from(err: toml::de::Error) -> Self {
		Error::SerializationError(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, Error>;
