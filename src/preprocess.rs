//! Turns raw camera frames into model-ready pixel buffers.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::error::{DetectorError, Result};

/// A borrowed H×W×3 camera frame in BGR channel order, the layout capture
/// components hand over.
#[derive(Debug, Clone, Copy)]
pub struct BgrFrame<'a> {
    width: u32,
    height: u32,
    data: &'a [u8],
}

impl<'a> BgrFrame<'a> {
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(DetectorError::shape_mismatch(format!(
                "BGR frame is {} bytes but {}x{}x3 takes {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(BgrFrame {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Copies the frame into an RGB image, swapping the channel order.
    pub fn to_rgb(&self) -> RgbImage {
        let mut rgb = RgbImage::new(self.width, self.height);
        for (i, pixel) in rgb.pixels_mut().enumerate() {
            let at = i * 3;
            *pixel = Rgb([self.data[at + 2], self.data[at + 1], self.data[at]]);
        }
        rgb
    }
}

/// Aspect-ratio-preserving resize onto a zero-filled square canvas.
///
/// The image is scaled by `target / max(width, height)` and pasted centered,
/// so the model sees black bars instead of a distorted stretch.
pub fn letterbox(img: &RgbImage, target: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    let scale = target as f32 / width.max(height) as f32;
    let new_width = (width as f32 * scale) as u32;
    let new_height = (height as f32 * scale) as u32;

    let resized = imageops::resize(img, new_width, new_height, FilterType::Triangle);

    // RgbImage::new zero-fills, which is exactly the padding we want.
    let mut canvas = RgbImage::new(target, target);
    let left = (target - new_width) / 2;
    let top = (target - new_height) / 2;
    imageops::replace(&mut canvas, &resized, left as i64, top as i64);
    canvas
}

/// Prepares one frame for the model: BGR to RGB, then letterboxed to the
/// model's input side when the frame is not already that size.
pub fn prepare_frame(frame: &BgrFrame<'_>, input_width: u32, input_height: u32) -> RgbImage {
    let rgb = frame.to_rgb();
    if frame.width() == input_width && frame.height() == input_height {
        rgb
    } else {
        letterbox(&rgb, input_width)
    }
}
