use std::{convert::Infallible, fmt::Display, path::Path, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use tracing::trace;

/// A media type, conveniently parsed
#[derive(Debug, PartialEq, Eq, Clone, SerializeDisplay, DeserializeFromStr)]
pub enum MimeType {
	/// A mimetype we didn't recognize
	Other(String),

	/// An unstructured binary blob
	/// Use this whenever a mime type is unknown
	Blob,

	// Images
	Png,
	Jpg,
	Gif,
	Webp,
	Bmp,
	Tiff,

	// Video
	Mp4,
	Avi,
	Mov,
	Mkv,
}

impl FromStr for MimeType {
	// Must match `display` below, but may provide other alternatives.

	type Err = Infallible;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"application/octet-stream" => Self::Blob,
			"image/png" => Self::Png,
			"image/jpg" => Self::Jpg,
			"image/jpeg" => Self::Jpg,
			"image/gif" => Self::Gif,
			"image/webp" => Self::Webp,
			"image/bmp" => Self::Bmp,
			"image/tiff" => Self::Tiff,
			"video/mp4" => Self::Mp4,
			"video/x-msvideo" => Self::Avi,
			"video/quicktime" => Self::Mov,
			"video/x-matroska" => Self::Mkv,
			_ => Self::Other(s.into()),
		})
	}
}

impl Display for MimeType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Blob => write!(f, "application/octet-stream"),

			Self::Png => write!(f, "image/png"),
			Self::Jpg => write!(f, "image/jpeg"),
			Self::Gif => write!(f, "image/gif"),
			Self::Webp => write!(f, "image/webp"),
			Self::Bmp => write!(f, "image/bmp"),
			Self::Tiff => write!(f, "image/tiff"),

			Self::Mp4 => write!(f, "video/mp4"),
			Self::Avi => write!(f, "video/x-msvideo"),
			Self::Mov => write!(f, "video/quicktime"),
			Self::Mkv => write!(f, "video/x-matroska"),
			Self::Other(x) => write!(f, "{}", x),
		}
	}
}

impl MimeType {
	/// Try to guess a file's mime type from its extension.
	/// `ext` should NOT start with a dot. Case-insensitive.
	pub fn from_extension(ext: &str) -> Option<Self> {
		Some(match ext.to_ascii_lowercase().as_str() {
			"png" => Self::Png,
			"jpg" | "jpeg" => Self::Jpg,
			"gif" => Self::Gif,
			"webp" => Self::Webp,
			"bmp" => Self::Bmp,
			"tif" | "tiff" => Self::Tiff,
			"mp4" => Self::Mp4,
			"avi" => Self::Avi,
			"mov" => Self::Mov,
			"mkv" => Self::Mkv,
			_ => {
				trace!(
					message = "Could not determine mime type from extension",
					extension = ext
				);
				return None;
			}
		})
	}

	/// Guess the mime type of the file at `path` from its extension
	pub fn from_path(path: &Path) -> Option<Self> {
		let ext = path.extension()?.to_str()?;
		return Self::from_extension(ext);
	}

	/// Get the extension we use for files with this type.
	/// Includes a dot. Might be the empty string.
	pub fn extension(&self) -> &str {
		match self {
			Self::Blob => "",
			Self::Other(_) => "",

			Self::Png => ".png",
			Self::Jpg => ".jpg",
			Self::Gif => ".gif",
			Self::Webp => ".webp",
			Self::Bmp => ".bmp",
			Self::Tiff => ".tiff",

			Self::Mp4 => ".mp4",
			Self::Avi => ".avi",
			Self::Mov => ".mov",
			Self::Mkv => ".mkv",
		}
	}

	pub fn is_image(&self) -> bool {
		matches!(
			self,
			Self::Png | Self::Jpg | Self::Gif | Self::Webp | Self::Bmp | Self::Tiff
		)
	}

	pub fn is_video(&self) -> bool {
		matches!(self, Self::Mp4 | Self::Avi | Self::Mov | Self::Mkv)
	}
}
