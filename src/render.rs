use crate::detector::BoundingBox;
use crate::error::{Error, Result};
use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;

const INDEX_FONT_SIZE: f32 = 24.0;

pub struct DrawStyle {
    pub color: Rgba<u8>,
    pub thickness: u32,
    pub show_index: bool,
    pub font: Option<FontVec>,
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self {
            color: Rgba([255, 0, 0, 255]),
            thickness: 2,
            show_index: false,
            font: None,
        }
    }
}

impl DrawStyle {
    /// Load a TTF/OTF font for index labels. Index drawing needs a font;
    /// without one the labels are skipped.
    pub fn with_font_file(mut self, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| Error::InvalidInput(format!("Unreadable font {}: {}", path.display(), e)))?;
        self.font = Some(font);
        Ok(self)
    }
}

/// Draw box outlines on a copy of `image`; the input is never mutated.
/// With `show_index` set, each box gets its zero-based index rendered just
/// inside its top-left corner, pushed down by the text height.
pub fn draw_boxes(image: &RgbaImage, boxes: &[BoundingBox], style: &DrawStyle) -> RgbaImage {
    let mut canvas = image.clone();
    if boxes.is_empty() {
        return canvas;
    }

    if style.show_index && style.font.is_none() {
        tracing::warn!("Box indices requested but no font is configured; drawing outlines only");
    }

    for (index, bx) in boxes.iter().enumerate() {
        let x0 = bx.x0.round() as i32;
        let y0 = bx.y0.round() as i32;
        let width = bx.width().round().max(1.0) as u32;
        let height = bx.height().round().max(1.0) as u32;

        for inset in 0..style.thickness {
            let w = width.saturating_sub(2 * inset);
            let h = height.saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at(x0 + inset as i32, y0 + inset as i32).of_size(w, h);
            draw_hollow_rect_mut(&mut canvas, rect, style.color);
        }

        if style.show_index {
            if let Some(font) = &style.font {
                let label = index.to_string();
                let scale = PxScale::from(INDEX_FONT_SIZE);
                let (_, text_height) = text_size(scale, font, &label);
                draw_text_mut(
                    &mut canvas,
                    style.color,
                    x0,
                    y0 + text_height as i32,
                    scale,
                    font,
                    &label,
                );
            }
        }
    }

    canvas
}
