//! Decode image files into frames.

use image::{
	codecs::{gif::GifDecoder, png::PngDecoder, webp::WebPDecoder},
	AnimationDecoder, DynamicImage, Frames, ImageDecoder, ImageError, ImageFormat, ImageReader,
	ImageResult, Limits,
};
use std::{fs::File, io::BufReader, path::Path};
use tracing::{debug, warn};

/// How forgiving we are while decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePolicy {
	/// Trust the file extension, keep decoder limits,
	/// and fail on any broken frame.
	Strict,

	/// Sniff the format from file content, drop decoder limits,
	/// and keep the frames we decoded before a broken one.
	Relaxed,
}

/// Run `decode` with [`DecodePolicy::Strict`].
/// If that fails, run it once more with [`DecodePolicy::Relaxed`].
pub fn with_decode_retry<T>(
	mut decode: impl FnMut(DecodePolicy) -> ImageResult<T>,
) -> ImageResult<T> {
	match decode(DecodePolicy::Strict) {
		Ok(x) => return Ok(x),
		Err(error) if !is_retryable(&error) => return Err(error),
		Err(error) => {
			warn!(message = "Strict decode failed, retrying", ?error);
			return decode(DecodePolicy::Relaxed);
		}
	}
}

/// Decode every frame in the image at `path`, in order.
/// Each frame is rotated by the image's orientation tag.
pub fn decode_frames(path: &Path, policy: DecodePolicy) -> ImageResult<Vec<DynamicImage>> {
	let format = match policy {
		DecodePolicy::Strict => ImageFormat::from_path(path)?,
		DecodePolicy::Relaxed => match ImageReader::open(path)?.with_guessed_format()?.format() {
			Some(x) => x,
			None => ImageFormat::from_path(path)?,
		},
	};

	debug!(message = "Decoding image", ?path, ?format, ?policy);

	if let Some(frames) = decode_animation(path, format, policy)? {
		return Ok(frames);
	}

	let mut reader = ImageReader::open(path)?;
	reader.set_format(format);
	if policy == DecodePolicy::Relaxed {
		reader.no_limits();
	}

	let mut decoder = reader.into_decoder()?;
	let orientation = decoder.orientation()?;
	let mut image = DynamicImage::from_decoder(decoder)?;
	image.apply_orientation(orientation);
	return Ok(vec![image]);
}

fn relax(decoder: &mut impl ImageDecoder, policy: DecodePolicy) -> ImageResult<()> {
	if policy == DecodePolicy::Relaxed {
		decoder.set_limits(Limits::no_limits())?;
	}
	return Ok(());
}

/// Decode a multi-frame image.
/// Returns `None` if this format or file has only one frame.
fn decode_animation(
	path: &Path,
	format: ImageFormat,
	policy: DecodePolicy,
) -> ImageResult<Option<Vec<DynamicImage>>> {
	let open = || -> ImageResult<BufReader<File>> { Ok(BufReader::new(File::open(path)?)) };

	let (orientation, frames) = match format {
		ImageFormat::Gif => {
			let mut decoder = GifDecoder::new(open()?)?;
			relax(&mut decoder, policy)?;
			(decoder.orientation()?, decoder.into_frames())
		}

		ImageFormat::Png => {
			let mut decoder = PngDecoder::new(open()?)?;
			if !decoder.is_apng()? {
				return Ok(None);
			}
			relax(&mut decoder, policy)?;
			(decoder.orientation()?, decoder.apng()?.into_frames())
		}

		ImageFormat::WebP => {
			let mut decoder = WebPDecoder::new(open()?)?;
			if !decoder.has_animation() {
				return Ok(None);
			}
			relax(&mut decoder, policy)?;
			(decoder.orientation()?, decoder.into_frames())
		}

		_ => return Ok(None),
	};

	let mut frames = collect_frames(frames, policy)?;
	for frame in &mut frames {
		frame.apply_orientation(orientation);
	}
	return Ok(Some(frames));
}

fn collect_frames(frames: Frames<'_>, policy: DecodePolicy) -> ImageResult<Vec<DynamicImage>> {
	let mut out = Vec::new();

	for frame in frames {
		match frame {
			Ok(frame) => out.push(DynamicImage::ImageRgba8(frame.into_buffer())),

			Err(error) if policy == DecodePolicy::Relaxed && !out.is_empty() => {
				warn!(
					message = "Frame sequence is truncated, keeping decoded frames",
					n_frames = out.len(),
					?error
				);
				break;
			}

			Err(error) => return Err(error),
		}
	}

	return Ok(out);
}

/// Is this a decode error a relaxed retry could fix?
/// Missing files can't be fixed.
pub fn is_retryable(error: &ImageError) -> bool {
	!matches!(error, ImageError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound)
}
