use crate::config::Config;
use crate::detector::network::{
    ComputeDevice, GroundingNetwork, Location, NetworkLoader, RawPredictions, RuntimeGate,
};
use crate::error::{Error, Result};
use crate::model::{CheckpointFetcher, ModelDescriptor};
use ndarray::{Array2, Array3, Array4, Axis, Ix2};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokenizers::Tokenizer;

const SUPPORT_URL: &str = "https://github.com/grounder/grounder/issues";

static RUNTIME_PROBE: OnceLock<bool> = OnceLock::new();

/// Availability gate over the ONNX Runtime library. The probe runs once per
/// session; a failure disables detection rather than erroring out of calls.
pub struct OnnxRuntime;

impl RuntimeGate for OnnxRuntime {
    fn ensure_available(&self) -> bool {
        *RUNTIME_PROBE.get_or_init(|| match Session::builder() {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(
                    "ONNX Runtime could not be initialized: {}. Grounded detection is \
                     disabled for this session. If the problem persists, submit an issue to {}",
                    e,
                    SUPPORT_URL
                );
                false
            }
        })
    }
}

/// Builds networks from registry entries: fetches the exported graph and
/// its tokenizer, handing back a network parked in host memory.
pub struct OnnxLoader {
    fetcher: CheckpointFetcher,
    device: ComputeDevice,
}

impl OnnxLoader {
    pub fn new(config: &Config, device: ComputeDevice) -> Self {
        Self {
            fetcher: CheckpointFetcher::new(config),
            device,
        }
    }
}

impl NetworkLoader for OnnxLoader {
    fn load(&self, descriptor: &ModelDescriptor) -> Result<Box<dyn GroundingNetwork>> {
        let files = self.fetcher.fetch(descriptor)?;

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| Error::ModelLoadFailed(format!("Failed to load tokenizer: {}", e)))?;

        Ok(Box::new(OnnxGroundingNetwork {
            model_path: files.checkpoint,
            tokenizer,
            device: self.device,
            session: None,
        }))
    }
}

/// GroundingDINO as an exported ONNX graph. The session exists only while
/// the network is on the accelerator; moving to host drops it and the next
/// move back rebuilds from the cached checkpoint.
pub struct OnnxGroundingNetwork {
    model_path: PathBuf,
    tokenizer: Tokenizer,
    device: ComputeDevice,
    session: Option<Session>,
}

fn build_session(model_path: &Path, device: ComputeDevice) -> Result<Session> {
    let load_err = |e: ort::Error| Error::ModelLoadFailed(e.to_string());

    let builder = Session::builder()
        .map_err(load_err)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(load_err)?
        .with_intra_threads(4)
        .map_err(load_err)?;

    let builder = match device {
        ComputeDevice::Cuda(ordinal) => builder
            .with_execution_providers([
                CUDAExecutionProvider::default()
                    .with_device_id(ordinal as i32)
                    .build(),
                CPUExecutionProvider::default().build(),
            ])
            .map_err(load_err)?,
        ComputeDevice::Cpu => builder
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(load_err)?,
    };

    builder.commit_from_file(model_path).map_err(|e| {
        Error::ModelLoadFailed(format!(
            "Could not load checkpoint {}: {}",
            model_path.display(),
            e
        ))
    })
}

impl GroundingNetwork for OnnxGroundingNetwork {
    fn forward(&mut self, pixels: &Array4<f32>, caption: &str) -> Result<RawPredictions> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::InferenceFailed("Network is parked in host memory".to_string()))?;

        let encoding = self
            .tokenizer
            .encode(caption, true)
            .map_err(|e| Error::InferenceFailed(format!("Caption tokenization failed: {}", e)))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
        let seq_len = input_ids.len();

        let shape_err =
            |e: ndarray::ShapeError| Error::InferenceFailed(format!("Bad input shape: {}", e));
        let tensor_err =
            |e: ort::Error| Error::InferenceFailed(format!("Failed to build input tensor: {}", e));

        let (_, _, height, width) = pixels.dim();
        let pixel_values = Value::from_array(pixels.to_owned()).map_err(tensor_err)?;
        let pixel_mask =
            Value::from_array(Array3::<i64>::ones((1, height, width))).map_err(tensor_err)?;
        let input_ids =
            Value::from_array(Array2::from_shape_vec((1, seq_len), input_ids).map_err(shape_err)?)
                .map_err(tensor_err)?;
        let attention_mask = Value::from_array(
            Array2::from_shape_vec((1, seq_len), attention_mask).map_err(shape_err)?,
        )
        .map_err(tensor_err)?;
        let token_type_ids = Value::from_array(
            Array2::from_shape_vec((1, seq_len), token_type_ids).map_err(shape_err)?,
        )
        .map_err(tensor_err)?;

        let outputs = session
            .run(ort::inputs![
                "pixel_values" => pixel_values,
                "pixel_mask" => pixel_mask,
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids
            ])
            .map_err(|e| Error::InferenceFailed(e.to_string()))?;

        let extract = |name: &str| -> Result<Array2<f32>> {
            let value = outputs
                .get(name)
                .ok_or_else(|| Error::InferenceFailed(format!("Missing model output {}", name)))?;
            let view = value
                .try_extract_array::<f32>()
                .map_err(|e| Error::InferenceFailed(format!("Failed to extract {}: {}", name, e)))?;
            view.index_axis(Axis(0), 0)
                .to_owned()
                .into_dimensionality::<Ix2>()
                .map_err(|e| {
                    Error::InferenceFailed(format!("Unexpected shape for {}: {}", name, e))
                })
        };

        Ok(RawPredictions {
            logits: extract("logits")?,
            boxes: extract("pred_boxes")?,
        })
    }

    fn location(&self) -> Location {
        if self.session.is_some() {
            Location::Accelerator
        } else {
            Location::Host
        }
    }

    fn move_to(&mut self, location: Location) -> Result<()> {
        match location {
            Location::Accelerator if self.session.is_none() => {
                self.session = Some(build_session(&self.model_path, self.device)?);
            }
            Location::Accelerator => {}
            Location::Host => {
                // Dropping the session releases device arenas; the weights
                // stay in the download cache for the next rebuild.
                self.session = None;
            }
        }
        Ok(())
    }
}
