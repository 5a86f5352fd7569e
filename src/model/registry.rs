use crate::error::{Error, Result};

/// A detection checkpoint known at build time: where its exported weights
/// live and which tokenizer file drives the text branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: &'static str,
    pub repo_id: &'static str,
    pub checkpoint: &'static str,
    pub tokenizer: &'static str,
    pub description: &'static str,
}

pub const DEFAULT_MODEL: &str = "grounding-dino-tiny";

const MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        name: "grounding-dino-tiny",
        repo_id: "onnx-community/grounding-dino-tiny-ONNX",
        checkpoint: "onnx/model.onnx",
        tokenizer: "tokenizer.json",
        description: "GroundingDINO with a Swin-T backbone (~690MB checkpoint)",
    },
    ModelDescriptor {
        name: "grounding-dino-base",
        repo_id: "onnx-community/grounding-dino-base-ONNX",
        checkpoint: "onnx/model.onnx",
        tokenizer: "tokenizer.json",
        description: "GroundingDINO with a Swin-B backbone (~940MB checkpoint)",
    },
];

pub fn find(name: &str) -> Result<&'static ModelDescriptor> {
    MODELS
        .iter()
        .find(|descriptor| descriptor.name == name)
        .ok_or_else(|| Error::ModelNotFound(name.to_string()))
}

pub fn all() -> &'static [ModelDescriptor] {
    MODELS
}
