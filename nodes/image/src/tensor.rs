//! Convert decoded frames into tensors

use image::DynamicImage;
use reel_piper::data::{ImageTensor, MaskTensor};
use tracing::debug;

/// Frames without alpha get an empty mask of this size
const EMPTY_MASK_SIZE: usize = 64;

/// Stack `frames` into one image tensor and one mask tensor.
///
/// Frames whose size differs from the first frame are skipped.
/// Masks are `1 - alpha`. If the first frame has no alpha channel,
/// every mask is a `64x64` block of zeros.
///
/// Returns `None` if `frames` is empty.
pub fn stack_frames(frames: &[DynamicImage]) -> Option<(ImageTensor, MaskTensor)> {
	let first = frames.first()?;
	let (width, height) = (first.width(), first.height());
	let has_alpha = first.color().has_alpha();

	let mut pixels: Vec<f32> = Vec::new();
	let mut alpha: Vec<f32> = Vec::new();
	let mut n_frames = 0usize;

	for (i, frame) in frames.iter().enumerate() {
		if frame.width() != width || frame.height() != height {
			debug!(
				message = "Skipping frame with mismatched size",
				frame = i,
				width = frame.width(),
				height = frame.height(),
			);
			continue;
		}

		if has_alpha {
			for p in frame.to_rgba32f().pixels() {
				pixels.extend_from_slice(&p.0[0..3]);
				alpha.push(1.0 - p.0[3]);
			}
		} else {
			pixels.extend(frame.to_rgb32f().into_raw());
		}

		n_frames += 1;
	}

	let (height, width) = (height as usize, width as usize);
	let image = ImageTensor::new(n_frames, height, width, pixels)?;

	let mask = if has_alpha {
		MaskTensor::new(n_frames, height, width, alpha)?
	} else {
		MaskTensor::new(
			n_frames,
			EMPTY_MASK_SIZE,
			EMPTY_MASK_SIZE,
			vec![0.0; n_frames * EMPTY_MASK_SIZE * EMPTY_MASK_SIZE],
		)?
	};

	return Some((image, mask));
}

#[cfg(test)]
mod tests {
	use image::{Rgb, RgbImage, Rgba, RgbaImage};

	use super::*;

	fn rgba(w: u32, h: u32, value: u8, a: u8) -> DynamicImage {
		DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([value, 0, 0, a])))
	}

	#[test]
	fn mismatched_frames_are_dropped() {
		let frames = vec![
			rgba(4, 2, 10, 255),
			rgba(3, 3, 20, 255),
			rgba(4, 2, 30, 0),
			rgba(2, 4, 40, 255),
		];

		let (image, mask) = stack_frames(&frames).unwrap();
		assert_eq!(image.shape(), [2, 2, 4, 3]);
		assert_eq!(mask.shape(), [2, 2, 4]);

		// Frame order is kept
		let red = |f, y, x| image.pixel(f, y, x).unwrap()[0];
		assert!((red(0, 0, 0) - 10.0 / 255.0).abs() < 1e-6);
		assert!((red(1, 1, 3) - 30.0 / 255.0).abs() < 1e-6);

		// Opaque is 0, transparent is 1
		assert_eq!(mask.value(0, 0, 0), Some(0.0));
		assert_eq!(mask.value(1, 0, 0), Some(1.0));
	}

	#[test]
	fn no_alpha_means_empty_mask() {
		let frames = vec![DynamicImage::ImageRgb8(RgbImage::from_pixel(
			5,
			7,
			Rgb([0, 255, 0]),
		))];

		let (image, mask) = stack_frames(&frames).unwrap();
		assert_eq!(image.shape(), [1, 7, 5, 3]);
		assert_eq!(image.pixel(0, 6, 4), Some([0.0, 1.0, 0.0]));
		assert_eq!(mask.shape(), [1, 64, 64]);
		assert!(mask.data().iter().all(|x| *x == 0.0));
	}

	#[test]
	fn empty_input() {
		assert!(stack_frames(&[]).is_none());
	}
}
