pub mod boxes;
pub mod network;
pub mod onnx;
pub mod preprocess;

pub use boxes::BoundingBox;
pub use network::ComputeDevice;

use crate::config::Config;
use crate::error::Result;
use crate::model::{registry, ModelCache};
use image::DynamicImage;
use network::{Location, MemoryPolicy, NetworkLoader, RuntimeGate};

/// One grounded-detection session: owns the model cache and the backend
/// collaborators. Lives as long as the hosting session, not the process.
pub struct DetectionSession {
    cache: ModelCache,
    loader: Box<dyn NetworkLoader>,
    runtime: Box<dyn RuntimeGate>,
    policy: MemoryPolicy,
}

impl DetectionSession {
    pub fn new(config: &Config, device: ComputeDevice) -> Self {
        Self::with_parts(
            Box::new(onnx::OnnxLoader::new(config, device)),
            Box::new(onnx::OnnxRuntime),
            MemoryPolicy::new(config.low_memory),
        )
    }

    pub fn with_parts(
        loader: Box<dyn NetworkLoader>,
        runtime: Box<dyn RuntimeGate>,
        policy: MemoryPolicy,
    ) -> Self {
        Self {
            cache: ModelCache::new(),
            loader,
            runtime,
            policy,
        }
    }

    /// Detect everything the caption names in `image`. `Ok(None)` means the
    /// detection backend is unavailable this session; `Ok(Some(vec))` is a
    /// successful pass, and an empty vec is a valid result.
    pub fn predict(
        &mut self,
        image: &DynamicImage,
        model_name: &str,
        prompt: &str,
        box_threshold: f32,
    ) -> Result<Option<Vec<BoundingBox>>> {
        if !self.runtime.ensure_available() {
            return Ok(None);
        }

        let descriptor = registry::find(model_name)?;
        let caption = normalize_caption(prompt);

        tracing::info!("Running grounded detection for \"{}\"", caption);
        let pixels = preprocess::image_to_tensor(image);

        let network = self.cache.load(descriptor, self.loader.as_ref(), self.policy)?;
        let predictions = network.forward(&pixels, &caption)?;
        if self.policy.offload_when_idle() {
            network.move_to(Location::Host)?;
        }
        drop(pixels);

        let detections = boxes::filter_by_confidence(&predictions, box_threshold);
        let result = detections
            .iter()
            .map(|detection| boxes::to_pixel_corners(detection.center, image.width(), image.height()))
            .collect();

        Ok(Some(result))
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cached_model(&self) -> Option<&str> {
        self.cache.cached_key()
    }
}

/// The model expects sentence-like captions: lowercase, trimmed, ending in
/// a period.
fn normalize_caption(prompt: &str) -> String {
    let mut caption = prompt.to_lowercase().trim().to_string();
    if !caption.ends_with('.') {
        caption.push('.');
    }
    caption
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::network::{GroundingNetwork, RawPredictions};
    use crate::error::Error;
    use crate::model::ModelDescriptor;
    use ndarray::{Array2, Array4};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FixedNetwork {
        logit: f32,
        center: [f32; 4],
        location: Location,
        parked: Arc<AtomicBool>,
        seen_captions: Arc<Mutex<Vec<String>>>,
    }

    impl GroundingNetwork for FixedNetwork {
        fn forward(&mut self, _pixels: &Array4<f32>, caption: &str) -> Result<RawPredictions> {
            self.seen_captions.lock().unwrap().push(caption.to_string());
            let mut logits = Array2::from_elem((1, 256), -20.0);
            logits[[0, 0]] = self.logit;
            let mut boxes = Array2::zeros((1, 4));
            for (j, value) in self.center.iter().enumerate() {
                boxes[[0, j]] = *value;
            }
            Ok(RawPredictions { logits, boxes })
        }

        fn location(&self) -> Location {
            self.location
        }

        fn move_to(&mut self, location: Location) -> Result<()> {
            self.location = location;
            self.parked.store(location == Location::Host, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FixedLoader {
        logit: f32,
        center: [f32; 4],
        loads: Arc<AtomicUsize>,
        parked: Arc<AtomicBool>,
        seen_captions: Arc<Mutex<Vec<String>>>,
    }

    impl FixedLoader {
        fn new(confidence: f32, center: [f32; 4]) -> Self {
            Self {
                logit: (confidence / (1.0 - confidence)).ln(),
                center,
                loads: Arc::new(AtomicUsize::new(0)),
                parked: Arc::new(AtomicBool::new(false)),
                seen_captions: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl NetworkLoader for FixedLoader {
        fn load(&self, _descriptor: &ModelDescriptor) -> Result<Box<dyn GroundingNetwork>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FixedNetwork {
                logit: self.logit,
                center: self.center,
                location: Location::Host,
                parked: self.parked.clone(),
                seen_captions: self.seen_captions.clone(),
            }))
        }
    }

    fn stub_session(loader: FixedLoader, available: bool, low_memory: bool) -> DetectionSession {
        DetectionSession::with_parts(
            Box::new(loader),
            Box::new(FixedGate(available)),
            MemoryPolicy::new(low_memory),
        )
    }

    struct FixedGate(bool);

    impl RuntimeGate for FixedGate {
        fn ensure_available(&self) -> bool {
            self.0
        }
    }

    struct RefusingLoader(Arc<AtomicUsize>);

    impl NetworkLoader for RefusingLoader {
        fn load(&self, descriptor: &ModelDescriptor) -> Result<Box<dyn GroundingNetwork>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(Error::ModelLoadFailed(descriptor.name.to_string()))
        }
    }

    fn test_image() -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::new(640, 480))
    }

    #[test]
    fn confident_query_becomes_one_pixel_box() {
        let loader = FixedLoader::new(0.5, [0.5, 0.5, 0.2, 0.4]);
        let mut session = stub_session(loader, true, false);

        let result = session
            .predict(&test_image(), "grounding-dino-tiny", "a cat.", 0.35)
            .unwrap()
            .expect("backend should be available");

        assert_eq!(result.len(), 1);
        let bx = &result[0];
        assert!((bx.x0 - 256.0).abs() < 1e-3);
        assert!((bx.y0 - 144.0).abs() < 1e-3);
        assert!((bx.x1 - 384.0).abs() < 1e-3);
        assert!((bx.y1 - 336.0).abs() < 1e-3);
    }

    #[test]
    fn below_threshold_is_an_empty_success() {
        let loader = FixedLoader::new(0.2, [0.5, 0.5, 0.2, 0.4]);
        let mut session = stub_session(loader, true, false);

        let result = session
            .predict(&test_image(), "grounding-dino-tiny", "a cat.", 0.35)
            .unwrap();

        assert_eq!(result, Some(Vec::new()));
    }

    #[test]
    fn unavailable_runtime_soft_fails_without_loading() {
        let loads = Arc::new(AtomicUsize::new(0));
        let mut session = DetectionSession::with_parts(
            Box::new(RefusingLoader(loads.clone())),
            Box::new(FixedGate(false)),
            MemoryPolicy::new(false),
        );

        let result = session
            .predict(&test_image(), "grounding-dino-tiny", "a cat", 0.3)
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn prompts_are_normalized_into_captions() {
        let loader = FixedLoader::new(0.9, [0.5, 0.5, 0.1, 0.1]);
        let captions = loader.seen_captions.clone();
        let mut session = stub_session(loader, true, false);

        session
            .predict(&test_image(), "grounding-dino-tiny", "  A Cat ", 0.3)
            .unwrap();

        assert_eq!(captions.lock().unwrap().as_slice(), ["a cat."]);
    }

    #[test]
    fn second_call_reuses_the_cached_network() {
        let loader = FixedLoader::new(0.9, [0.5, 0.5, 0.1, 0.1]);
        let loads = loader.loads.clone();
        let mut session = stub_session(loader, true, false);

        for _ in 0..2 {
            session
                .predict(&test_image(), "grounding-dino-tiny", "a cat", 0.3)
                .unwrap();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(session.cached_model(), Some("grounding-dino-tiny"));
    }

    #[test]
    fn unknown_model_name_errors() {
        let loader = FixedLoader::new(0.9, [0.5, 0.5, 0.1, 0.1]);
        let mut session = stub_session(loader, true, false);

        let err = session
            .predict(&test_image(), "grounding-dino-giant", "a cat", 0.3)
            .unwrap_err();
        assert!(matches!(err, Error::ModelNotFound(_)));
    }

    #[test]
    fn caption_normalization_rules() {
        assert_eq!(normalize_caption("A Cat"), "a cat.");
        assert_eq!(normalize_caption("  two dogs.  "), "two dogs.");
        assert_eq!(normalize_caption("BIRD"), "bird.");
    }

    #[test]
    fn low_memory_mode_parks_the_network_after_the_pass() {
        let loader = FixedLoader::new(0.9, [0.5, 0.5, 0.1, 0.1]);
        let parked = loader.parked.clone();
        let mut session = stub_session(loader, true, true);

        session
            .predict(&test_image(), "grounding-dino-tiny", "a cat", 0.3)
            .unwrap();
        assert!(parked.load(Ordering::SeqCst));

        // The next pass must bring it back and still reuse the cached entry.
        let result = session
            .predict(&test_image(), "grounding-dino-tiny", "a cat", 0.3)
            .unwrap();
        assert!(result.is_some());
        assert!(parked.load(Ordering::SeqCst));
    }
}
