use crate::error::Result;
use crate::model::ModelDescriptor;
use ndarray::{Array2, Array4};

/// Where a loaded network currently resides. `Host` keeps only what is
/// needed to rebuild on the compute device; `Accelerator` is ready to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Host,
    Accelerator,
}

/// Compute device the caller selected for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeDevice {
    Cpu,
    Cuda(usize),
}

impl std::fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputeDevice::Cpu => write!(f, "cpu"),
            ComputeDevice::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
        }
    }
}

/// Raw model outputs for one caption batch: per-query class logits
/// (nq x 256, pre-sigmoid) and normalized center-size boxes (nq x 4).
#[derive(Debug, Clone)]
pub struct RawPredictions {
    pub logits: Array2<f32>,
    pub boxes: Array2<f32>,
}

/// A loaded grounded-detection network. Implementations run a forward pass
/// over one image and one caption; they do not filter or rescale.
pub trait GroundingNetwork {
    fn forward(&mut self, pixels: &Array4<f32>, caption: &str) -> Result<RawPredictions>;

    fn location(&self) -> Location;

    fn move_to(&mut self, location: Location) -> Result<()>;
}

/// Builds a network for a registry entry. The cache calls this exactly once
/// per miss; a returned error must leave no residue behind.
pub trait NetworkLoader {
    fn load(&self, descriptor: &ModelDescriptor) -> Result<Box<dyn GroundingNetwork>>;
}

/// Reports whether the detection backend is usable this session. A `false`
/// answer is a soft failure: the pipeline returns no result instead of
/// erroring, and the caller disables the feature.
pub trait RuntimeGate {
    fn ensure_available(&self) -> bool;
}

/// Decides when networks are shuttled between host and accelerator memory,
/// driven by the shared low-memory flag.
#[derive(Debug, Clone, Copy)]
pub struct MemoryPolicy {
    low_memory: bool,
}

impl MemoryPolicy {
    pub fn new(low_memory: bool) -> Self {
        Self { low_memory }
    }

    /// Park the network in host memory between passes, paying a reload on
    /// the next use in exchange for a smaller accelerator footprint.
    pub fn offload_when_idle(&self) -> bool {
        self.low_memory
    }
}
