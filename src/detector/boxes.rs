use crate::detector::network::RawPredictions;
use serde::{Deserialize, Serialize};

/// Pixel-space box in corner format, as returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// A query that survived thresholding: its normalized center-size box
/// (cx, cy, w, h) and the peak class confidence that kept it.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub center: [f32; 4],
    pub confidence: f32,
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Keep queries whose peak sigmoid confidence is strictly above the
/// threshold. Query order is preserved; an empty result is a valid outcome.
pub fn filter_by_confidence(predictions: &RawPredictions, threshold: f32) -> Vec<Detection> {
    predictions
        .logits
        .outer_iter()
        .zip(predictions.boxes.outer_iter())
        .filter_map(|(logits, center)| {
            let confidence = logits
                .iter()
                .map(|&logit| sigmoid(logit))
                .fold(f32::NEG_INFINITY, f32::max);
            (confidence > threshold).then(|| Detection {
                center: [center[0], center[1], center[2], center[3]],
                confidence,
            })
        })
        .collect()
}

/// Scale a normalized center-size box up to pixels and convert to corner
/// format: top-left = center - size/2, bottom-right = top-left + size.
pub fn to_pixel_corners(center: [f32; 4], image_width: u32, image_height: u32) -> BoundingBox {
    let (w, h) = (image_width as f32, image_height as f32);
    let scaled = [center[0] * w, center[1] * h, center[2] * w, center[3] * h];

    let x0 = scaled[0] - scaled[2] / 2.0;
    let y0 = scaled[1] - scaled[3] / 2.0;

    BoundingBox {
        x0,
        y0,
        x1: x0 + scaled[2],
        y1: y0 + scaled[3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn predictions(queries: &[(f32, [f32; 4])]) -> RawPredictions {
        let mut logits = Array2::from_elem((queries.len(), 256), -20.0);
        let mut boxes = Array2::zeros((queries.len(), 4));
        for (i, (logit, center)) in queries.iter().enumerate() {
            logits[[i, 7]] = *logit;
            for (j, value) in center.iter().enumerate() {
                boxes[[i, j]] = *value;
            }
        }
        RawPredictions { logits, boxes }
    }

    // logit whose sigmoid is the given confidence
    fn logit_for(confidence: f32) -> f32 {
        (confidence / (1.0 - confidence)).ln()
    }

    #[test]
    fn sigmoid_is_centered_at_half() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn filtering_is_strict_and_order_preserving() {
        let preds = predictions(&[
            (logit_for(0.9), [0.1, 0.1, 0.05, 0.05]),
            (logit_for(0.5), [0.2, 0.2, 0.05, 0.05]),
            (logit_for(0.4), [0.3, 0.3, 0.05, 0.05]),
        ]);

        let kept = filter_by_confidence(&preds, 0.5);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].center[0] - 0.1).abs() < 1e-6);

        let kept = filter_by_confidence(&preds, 0.45);
        assert_eq!(kept.len(), 2);
        assert!(kept[0].confidence > kept[1].confidence);
        assert!((kept[1].center[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn raising_the_threshold_never_adds_detections() {
        let preds = predictions(&[
            (logit_for(0.2), [0.5, 0.5, 0.1, 0.1]),
            (logit_for(0.45), [0.5, 0.5, 0.1, 0.1]),
            (logit_for(0.6), [0.5, 0.5, 0.1, 0.1]),
            (logit_for(0.85), [0.5, 0.5, 0.1, 0.1]),
        ]);

        let thresholds = [0.0, 0.1, 0.3, 0.5, 0.7, 0.9];
        let counts: Vec<usize> = thresholds
            .iter()
            .map(|&t| filter_by_confidence(&preds, t).len())
            .collect();

        for pair in counts.windows(2) {
            assert!(pair[1] <= pair[0], "counts not monotonic: {:?}", counts);
        }
    }

    #[test]
    fn center_box_maps_to_expected_pixel_corners() {
        let out = to_pixel_corners([0.5, 0.5, 0.2, 0.4], 640, 480);
        assert!((out.x0 - 256.0).abs() < 1e-4);
        assert!((out.y0 - 144.0).abs() < 1e-4);
        assert!((out.x1 - 384.0).abs() < 1e-4);
        assert!((out.y1 - 336.0).abs() < 1e-4);
    }

    #[test]
    fn corner_conversion_round_trips() {
        let center = [0.37, 0.62, 0.11, 0.23];
        let (w, h) = (1024u32, 768u32);

        let corners = to_pixel_corners(center, w, h);
        let back = [
            (corners.x0 + corners.width() / 2.0) / w as f32,
            (corners.y0 + corners.height() / 2.0) / h as f32,
            corners.width() / w as f32,
            corners.height() / h as f32,
        ];

        for (a, b) in center.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
        }
    }
}
