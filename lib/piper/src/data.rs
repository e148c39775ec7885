use serde::{Deserialize, Serialize};
use smartstring::{LazyCompact, SmartString};
use std::{collections::BTreeMap, fmt::Display, sync::Arc};

/// A string-keyed configuration mapping, as produced by config collector nodes
pub type ConfigMap = BTreeMap<SmartString<LazyCompact>, ConfigValue>;

/// One value inside a [`ConfigMap`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
	Boolean(bool),
	Integer(i64),
	Float(f64),
	Text(SmartString<LazyCompact>),
	List(Vec<ConfigValue>),
}

impl Display for ConfigValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Boolean(x) => write!(f, "{x}"),
			Self::Integer(x) => write!(f, "{x}"),
			Self::Float(x) => write!(f, "{x}"),
			Self::Text(x) => write!(f, "{x}"),
			Self::List(x) => {
				write!(f, "[")?;
				for (i, v) in x.iter().enumerate() {
					if i != 0 {
						write!(f, ",")?;
					}
					write!(f, "{v}")?;
				}
				write!(f, "]")
			}
		}
	}
}

/// The kinds of config mappings that flow between nodes.
/// Each kind may only be connected to a port of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfigKind {
	Dit,
	Vae,
	TextEncoder,
	InferenceArgs,
}

impl ConfigKind {
	/// The name the host uses for this type
	pub fn type_name(&self) -> &'static str {
		match self {
			Self::Dit => "DIT_CONFIG",
			Self::Vae => "VAE_CONFIG",
			Self::TextEncoder => "TEXT_ENCODER_CONFIG",
			Self::InferenceArgs => "INFERENCE_ARGS",
		}
	}
}

/// A stack of RGB frames, stored as `[frames, height, width, 3]`
/// with every channel in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
	frames: usize,
	height: usize,
	width: usize,
	data: Vec<f32>,
}

impl ImageTensor {
	pub const CHANNELS: usize = 3;

	/// Returns `None` if `data` does not match the given shape
	pub fn new(frames: usize, height: usize, width: usize, data: Vec<f32>) -> Option<Self> {
		if data.len() != frames * height * width * Self::CHANNELS {
			return None;
		}

		return Some(Self {
			frames,
			height,
			width,
			data,
		});
	}

	pub fn shape(&self) -> [usize; 4] {
		[self.frames, self.height, self.width, Self::CHANNELS]
	}

	pub fn data(&self) -> &[f32] {
		&self.data
	}

	/// Get the pixel at (`x`, `y`) of frame `frame`
	pub fn pixel(&self, frame: usize, y: usize, x: usize) -> Option<[f32; 3]> {
		if frame >= self.frames || y >= self.height || x >= self.width {
			return None;
		}

		let i = ((frame * self.height + y) * self.width + x) * Self::CHANNELS;
		return Some([self.data[i], self.data[i + 1], self.data[i + 2]]);
	}
}

/// A stack of single-channel masks, stored as `[frames, height, width]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskTensor {
	frames: usize,
	height: usize,
	width: usize,
	data: Vec<f32>,
}

impl MaskTensor {
	/// Returns `None` if `data` does not match the given shape
	pub fn new(frames: usize, height: usize, width: usize, data: Vec<f32>) -> Option<Self> {
		if data.len() != frames * height * width {
			return None;
		}

		return Some(Self {
			frames,
			height,
			width,
			data,
		});
	}

	pub fn shape(&self) -> [usize; 3] {
		[self.frames, self.height, self.width]
	}

	pub fn data(&self) -> &[f32] {
		&self.data
	}

	pub fn value(&self, frame: usize, y: usize, x: usize) -> Option<f32> {
		if frame >= self.frames || y >= self.height || x >= self.width {
			return None;
		}

		return Some(self.data[(frame * self.height + y) * self.width + x]);
	}
}

/// Immutable bits of data that flow between nodes.
///
/// Cloning [`PipeData`] should be very fast,
/// big containers are wrapped in an [`Arc`].
#[derive(Debug, Clone, PartialEq)]
pub enum PipeData {
	/// A block of text
	Text { value: SmartString<LazyCompact> },

	/// An integer
	Integer { value: i64 },

	/// A float
	Float { value: f64 },

	/// A boolean
	Boolean { value: bool },

	/// A config mapping produced by a collector node
	Config { kind: ConfigKind, map: Arc<ConfigMap> },

	/// Decoded image frames
	Image { tensor: Arc<ImageTensor> },

	/// Transparency masks that go with an [`PipeData::Image`]
	Mask { tensor: Arc<MaskTensor> },
}

/// The type of a [`PipeData`], without its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeDataStub {
	Text,
	Integer,
	Float,
	Boolean,
	Config { kind: ConfigKind },
	Image,
	Mask,
}

impl PipeDataStub {
	/// The name the host uses for this type
	pub fn type_name(&self) -> &'static str {
		match self {
			Self::Text => "STRING",
			Self::Integer => "INT",
			Self::Float => "FLOAT",
			Self::Boolean => "BOOLEAN",
			Self::Config { kind } => kind.type_name(),
			Self::Image => "IMAGE",
			Self::Mask => "MASK",
		}
	}
}

impl PipeData {
	pub fn as_stub(&self) -> PipeDataStub {
		match self {
			Self::Text { .. } => PipeDataStub::Text,
			Self::Integer { .. } => PipeDataStub::Integer,
			Self::Float { .. } => PipeDataStub::Float,
			Self::Boolean { .. } => PipeDataStub::Boolean,
			Self::Config { kind, .. } => PipeDataStub::Config { kind: *kind },
			Self::Image { .. } => PipeDataStub::Image,
			Self::Mask { .. } => PipeDataStub::Mask,
		}
	}

	pub fn text(value: &str) -> Self {
		Self::Text {
			value: value.into(),
		}
	}

	pub fn config(kind: ConfigKind, map: ConfigMap) -> Self {
		Self::Config {
			kind,
			map: Arc::new(map),
		}
	}
}

impl From<i64> for PipeData {
	fn from(value: i64) -> Self {
		Self::Integer { value }
	}
}

impl From<f64> for PipeData {
	fn from(value: f64) -> Self {
		Self::Float { value }
	}
}

impl From<bool> for PipeData {
	fn from(value: bool) -> Self {
		Self::Boolean { value }
	}
}

impl From<&str> for PipeData {
	fn from(value: &str) -> Self {
		Self::text(value)
	}
}

/// Convert scalar pipe data into a config value.
/// Only scalars may live inside a config mapping.
impl TryFrom<&PipeData> for ConfigValue {
	type Error = PipeDataStub;

	fn try_from(value: &PipeData) -> Result<Self, Self::Error> {
		return Ok(match value {
			PipeData::Text { value } => Self::Text(value.clone()),
			PipeData::Integer { value } => Self::Integer(*value),
			PipeData::Float { value } => Self::Float(*value),
			PipeData::Boolean { value } => Self::Boolean(*value),
			x => return Err(x.as_stub()),
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tensor_shape_is_checked() {
		assert!(ImageTensor::new(2, 2, 2, vec![0.0; 24]).is_some());
		assert!(ImageTensor::new(2, 2, 2, vec![0.0; 23]).is_none());
		assert!(MaskTensor::new(1, 64, 64, vec![0.0; 64 * 64]).is_some());
		assert!(MaskTensor::new(1, 64, 64, vec![0.0; 3]).is_none());
	}

	#[test]
	fn tensor_indexing() {
		let data: Vec<f32> = (0..12).map(|x| x as f32).collect();
		let t = ImageTensor::new(1, 2, 2, data).unwrap();
		assert_eq!(t.pixel(0, 1, 0), Some([6.0, 7.0, 8.0]));
		assert_eq!(t.pixel(1, 0, 0), None);
	}

	#[test]
	fn config_value_display() {
		let v = ConfigValue::List(vec![ConfigValue::Text("fp16".into()), ConfigValue::Integer(3)]);
		assert_eq!(v.to_string(), "[fp16,3]");
	}

	#[test]
	fn only_scalars_become_config_values() {
		assert_eq!(
			ConfigValue::try_from(&PipeData::from(2.5)),
			Ok(ConfigValue::Float(2.5))
		);
		let cfg = PipeData::config(ConfigKind::Vae, ConfigMap::new());
		assert_eq!(
			ConfigValue::try_from(&cfg),
			Err(PipeDataStub::Config {
				kind: ConfigKind::Vae
			})
		);
	}
}
