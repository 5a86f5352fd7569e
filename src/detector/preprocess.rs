use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;

pub const RESIZE_TARGET: u32 = 800;
pub const RESIZE_MAX: u32 = 1333;

pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Output dimensions for an aspect-preserving resize of the shortest side
/// to `RESIZE_TARGET`, capped so the longest side stays within `RESIZE_MAX`.
pub fn scaled_dims(width: u32, height: u32) -> (u32, u32) {
    let (short, long) = (width.min(height) as f32, width.max(height) as f32);

    let mut target = RESIZE_TARGET as f32;
    if long / short * target > RESIZE_MAX as f32 {
        target = (RESIZE_MAX as f32 * short / long).round();
    }

    if width <= height {
        // truncating division, matching the reference resize arithmetic
        (target as u32, (target * height as f32 / width as f32) as u32)
    } else {
        ((target * width as f32 / height as f32) as u32, target as u32)
    }
}

/// Resize and normalize an image into a 1x3xHxW tensor: bilinear resample,
/// RGB scaled to [0,1], then per-channel mean/std normalization.
pub fn image_to_tensor(image: &DynamicImage) -> Array4<f32> {
    let (width, height) = (image.width(), image.height());
    let (out_w, out_h) = scaled_dims(width, height);

    let resized = image
        .resize_exact(out_w, out_h, FilterType::Triangle)
        .to_rgb8();

    let mut tensor = Array4::zeros((1, 3, out_h as usize, out_w as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for channel in 0..3 {
            let value = pixel[channel] as f32 / 255.0;
            tensor[[0, channel, y as usize, x as usize]] =
                (value - CHANNEL_MEAN[channel]) / CHANNEL_STD[channel];
        }
    }

    tensor
}
