//! Image staging for the harness: decode, resize, and conversion between
//! RGB pixels and the row-major channel-fastest sample order the pipeline
//! consumes. Input channels are scaled to `[0, 1]`; output scores are
//! rescaled by 255 when rebuilding an image.

use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array3;

use crate::fixed::Fixed;

/// Decode an image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();
    image::open(path).with_context(|| format!("failed to decode image {}", path.display()))
}

/// Resize to a square RGB image, skipping the resample when already sized.
pub fn resize_to_square(image: &DynamicImage, size: u32) -> RgbImage {
    if image.width() == size && image.height() == size {
        image.to_rgb8()
    } else {
        image
            .resize_exact(size, size, FilterType::Triangle)
            .to_rgb8()
    }
}

/// Convert RGB pixels into an HWC sample array scaled to `[0, 1]`.
pub fn rgb_to_samples(image: &RgbImage) -> Array3<Fixed> {
    let (width, height) = image.dimensions();
    let mut samples = Array3::from_elem((height as usize, width as usize, 3), Fixed::ZERO);
    for (x, y, pixel) in image.enumerate_pixels() {
        for (chn, &value) in pixel.0.iter().enumerate() {
            samples[[y as usize, x as usize, chn]] = Fixed::from_f32(value as f32 / 255.0);
        }
    }
    samples
}

/// Flatten HWC samples into the stream order the pipeline consumes.
///
/// `ndarray`'s default layout is already row-major with the channel axis
/// fastest, so this is a plain contiguous copy.
pub fn flatten_samples(samples: &Array3<Fixed>) -> Vec<Fixed> {
    samples.iter().copied().collect()
}

/// Rebuild an RGB image from per-pixel channel scores, rescaling by 255.
pub fn samples_to_rgb(scores: &[Fixed], size: usize) -> Result<RgbImage> {
    let expected = size * size * 3;
    anyhow::ensure!(
        scores.len() == expected,
        "expected {expected} output samples for a {size}x{size} image, got {}",
        scores.len()
    );
    let mut image = RgbImage::new(size as u32, size as u32);
    for y in 0..size {
        for x in 0..size {
            let base = (y * size + x) * 3;
            let mut rgb = [0u8; 3];
            for (chn, slot) in rgb.iter_mut().enumerate() {
                let value = (scores[base + chn].to_f32() * 255.0).round();
                *slot = value.clamp(0.0, 255.0) as u8;
            }
            image.put_pixel(x as u32, y as u32, Rgb(rgb));
        }
    }
    Ok(image)
}
