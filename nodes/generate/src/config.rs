//! The generator's pipeline configuration, and the rules for overriding it
//! with mappings produced by config collector nodes.

use reel_piper::data::{ConfigMap, ConfigValue};
use serde::{Deserialize, Serialize};
use smartstring::{LazyCompact, SmartString};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;

use crate::generator::ResourceShape;

//
// MARK: Errors
//

/// An override targeted a known field with a value of the wrong type
#[derive(Debug, Clone, Error, PartialEq)]
#[error("cannot set `{key}` to `{value}`, expected {expected}")]
pub struct InvalidOverride {
	pub key: SmartString<LazyCompact>,
	pub expected: &'static str,
	pub value: ConfigValue,
}

//
// MARK: Field values
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
	Fp16,
	Bf16,
	Fp32,
}

impl Precision {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Fp16 => "fp16",
			Self::Bf16 => "bf16",
			Self::Fp32 => "fp32",
		}
	}
}

impl Display for Precision {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

impl FromStr for Precision {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"fp16" => Self::Fp16,
			"bf16" => Self::Bf16,
			"fp32" => Self::Fp32,
			_ => return Err(()),
		})
	}
}

/// A type a config field may have
trait FieldValue: Sized {
	/// How we describe this type in errors
	const EXPECTED: &'static str;

	fn from_config_value(value: &ConfigValue) -> Option<Self>;
}

impl FieldValue for bool {
	const EXPECTED: &'static str = "a boolean";

	fn from_config_value(value: &ConfigValue) -> Option<Self> {
		match value {
			ConfigValue::Boolean(x) => Some(*x),
			_ => None,
		}
	}
}

impl FieldValue for i64 {
	const EXPECTED: &'static str = "an integer";

	fn from_config_value(value: &ConfigValue) -> Option<Self> {
		match value {
			ConfigValue::Integer(x) => Some(*x),
			_ => None,
		}
	}
}

impl FieldValue for f64 {
	const EXPECTED: &'static str = "a number";

	fn from_config_value(value: &ConfigValue) -> Option<Self> {
		match value {
			ConfigValue::Float(x) => Some(*x),
			ConfigValue::Integer(x) => Some(*x as f64),
			_ => None,
		}
	}
}

impl FieldValue for SmartString<LazyCompact> {
	const EXPECTED: &'static str = "text";

	fn from_config_value(value: &ConfigValue) -> Option<Self> {
		match value {
			ConfigValue::Text(x) => Some(x.clone()),
			_ => None,
		}
	}
}

impl FieldValue for Precision {
	const EXPECTED: &'static str = "one of `fp16`, `bf16`, `fp32`";

	fn from_config_value(value: &ConfigValue) -> Option<Self> {
		match value {
			ConfigValue::Text(x) => x.parse().ok(),
			_ => None,
		}
	}
}

/// Lists are frozen into a fixed-order sequence
impl FieldValue for Box<[Precision]> {
	const EXPECTED: &'static str = "a list of precisions";

	fn from_config_value(value: &ConfigValue) -> Option<Self> {
		match value {
			ConfigValue::List(x) => x.iter().map(Precision::from_config_value).collect(),
			_ => None,
		}
	}
}

impl<T: FieldValue> FieldValue for Option<T> {
	const EXPECTED: &'static str = T::EXPECTED;

	fn from_config_value(value: &ConfigValue) -> Option<Self> {
		T::from_config_value(value).map(Some)
	}
}

fn set_field<T: FieldValue>(
	slot: &mut T,
	key: &str,
	value: &ConfigValue,
) -> Result<(), InvalidOverride> {
	*slot = T::from_config_value(value).ok_or_else(|| InvalidOverride {
		key: key.into(),
		expected: T::EXPECTED,
		value: value.clone(),
	})?;
	return Ok(());
}

//
// MARK: Targets
//

/// Something we can apply a [`ConfigMap`] to
pub trait ConfigTarget {
	/// Set the field named `key`.
	/// Returns `Ok(false)` if this target has no such field.
	fn set(&mut self, key: &str, value: &ConfigValue) -> Result<bool, InvalidOverride>;
}

/// Set every field of `target` named in `overrides`.
/// Keys `target` doesn't have are skipped.
pub fn apply_overrides(
	target: &mut dyn ConfigTarget,
	overrides: &ConfigMap,
) -> Result<(), InvalidOverride> {
	for (key, value) in overrides {
		target.set(key, value)?;
	}
	return Ok(());
}

/// Implement [`ConfigTarget`] for a struct, exposing the given fields
macro_rules! config_target {
	($ty:ty { $($field:ident),* $(,)? }) => {
		impl ConfigTarget for $ty {
			fn set(&mut self, key: &str, value: &ConfigValue) -> Result<bool, InvalidOverride> {
				match key {
					$(
						stringify!($field) => {
							set_field(&mut self.$field, key, value)?;
							return Ok(true);
						}
					)*
					_ => return Ok(false),
				}
			}
		}
	};
}

//
// MARK: Sub-configs
//

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DitConfig {
	pub prefix: SmartString<LazyCompact>,
	pub quant_config: SmartString<LazyCompact>,
}

config_target!(DitConfig { prefix, quant_config });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaeConfig {
	pub load_encoder: bool,
	pub load_decoder: bool,

	pub tile_sample_min_height: i64,
	pub tile_sample_min_width: i64,
	pub tile_sample_min_num_frames: i64,
	pub tile_sample_stride_height: i64,
	pub tile_sample_stride_width: i64,
	pub tile_sample_stride_num_frames: i64,
	pub blend_num_frames: i64,

	pub use_tiling: bool,
	pub use_temporal_tiling: bool,
	pub use_parallel_tiling: bool,
}

impl Default for VaeConfig {
	fn default() -> Self {
		Self {
			load_encoder: true,
			load_decoder: true,
			tile_sample_min_height: 256,
			tile_sample_min_width: 256,
			tile_sample_min_num_frames: 16,
			tile_sample_stride_height: 192,
			tile_sample_stride_width: 192,
			tile_sample_stride_num_frames: 12,
			blend_num_frames: 0,
			use_tiling: true,
			use_temporal_tiling: true,
			use_parallel_tiling: true,
		}
	}
}

config_target!(VaeConfig {
	load_encoder,
	load_decoder,
	tile_sample_min_height,
	tile_sample_min_width,
	tile_sample_min_num_frames,
	tile_sample_stride_height,
	tile_sample_stride_width,
	tile_sample_stride_num_frames,
	blend_num_frames,
	use_tiling,
	use_temporal_tiling,
	use_parallel_tiling,
});

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextEncoderConfig {
	pub prefix: SmartString<LazyCompact>,
	pub quant_config: SmartString<LazyCompact>,
	pub lora_config: SmartString<LazyCompact>,
}

config_target!(TextEncoderConfig {
	prefix,
	quant_config,
	lora_config
});

config_target!(ResourceShape {
	num_gpus,
	tp_size,
	sp_size,
	dit_cpu_offload
});

//
// MARK: PipelineConfig
//

/// Everything the generator needs to build a pipeline for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
	pub embedded_cfg_scale: f64,
	pub flow_shift: f64,

	pub precision: Precision,
	pub vae_precision: Precision,
	pub vae_tiling: bool,
	pub vae_sp: bool,

	/// One entry per text encoder, in order
	pub text_encoder_precisions: Box<[Precision]>,

	pub dit_config: DitConfig,
	pub vae_config: VaeConfig,
	pub text_encoder_configs: Vec<TextEncoderConfig>,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			embedded_cfg_scale: 6.0,
			flow_shift: 7.0,
			precision: Precision::Bf16,
			vae_precision: Precision::Fp16,
			vae_tiling: true,
			vae_sp: true,
			text_encoder_precisions: Box::new([Precision::Fp16, Precision::Fp16]),
			dit_config: DitConfig::default(),
			vae_config: VaeConfig::default(),
			text_encoder_configs: vec![TextEncoderConfig::default(), TextEncoderConfig::default()],
		}
	}
}

// Sub-configs are not scalar fields, so they can't be overridden here.
config_target!(PipelineConfig {
	embedded_cfg_scale,
	flow_shift,
	precision,
	vae_precision,
	vae_tiling,
	vae_sp,
	text_encoder_precisions,
});

impl PipelineConfig {
	/// Apply a text encoder override to every text encoder
	pub fn apply_text_encoder_overrides(
		&mut self,
		overrides: &ConfigMap,
	) -> Result<(), InvalidOverride> {
		for cfg in &mut self.text_encoder_configs {
			apply_overrides(cfg, overrides)?;
		}
		return Ok(());
	}
}
