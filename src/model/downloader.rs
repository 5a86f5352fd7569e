use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::ModelDescriptor;
use hf_hub::api::sync::ApiBuilder;
use std::path::PathBuf;

/// Local paths of everything a model needs at load time.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub checkpoint: PathBuf,
    pub tokenizer: PathBuf,
}

pub struct CheckpointFetcher {
    models_dir: PathBuf,
}

impl CheckpointFetcher {
    pub fn new(config: &Config) -> Self {
        Self {
            models_dir: config.models_dir.clone(),
        }
    }

    /// Resolve the descriptor's files, downloading on first use. Fetched
    /// files land under the models directory and are reused afterwards.
    pub fn fetch(&self, descriptor: &ModelDescriptor) -> Result<ModelFiles> {
        tracing::info!("Fetching checkpoint files for {}", descriptor.name);

        let api = ApiBuilder::new()
            .with_cache_dir(self.models_dir.clone())
            .build()
            .map_err(|e| Error::DownloadFailed(e.to_string()))?;

        let repo = api.model(descriptor.repo_id.to_string());

        let checkpoint = repo.get(descriptor.checkpoint).map_err(|e| {
            Error::DownloadFailed(format!(
                "Could not fetch {} from {}: {}",
                descriptor.checkpoint, descriptor.repo_id, e
            ))
        })?;

        let tokenizer = repo.get(descriptor.tokenizer).map_err(|e| {
            Error::DownloadFailed(format!(
                "Could not fetch {} from {}: {}",
                descriptor.tokenizer, descriptor.repo_id, e
            ))
        })?;

        tracing::info!("Checkpoint for {} is ready", descriptor.name);

        Ok(ModelFiles {
            checkpoint,
            tokenizer,
        })
    }
}
