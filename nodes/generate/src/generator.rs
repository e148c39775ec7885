//! Interfaces to the external video generator

use reel_piper::data::ConfigMap;
use serde::{Deserialize, Serialize};
use smartstring::{LazyCompact, SmartString};
use std::{error::Error, path::Path, sync::Arc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;

/// An error reported by a generator backend or handle
#[derive(Debug, Clone, Error)]
pub enum GeneratorError {
	/// We don't know how to load this model
	#[error("unknown model `{model}`: {message}")]
	UnknownModel {
		model: SmartString<LazyCompact>,
		message: String,
	},

	/// A model's stored pipeline config could not be parsed
	#[error("bad pipeline config for `{model}`")]
	BadPipelineConfig {
		model: SmartString<LazyCompact>,
		#[source]
		source: Arc<serde_json::Error>,
	},

	/// The requested GPU layout is impossible
	#[error("invalid resource shape: {message}")]
	InvalidShape { message: String },

	/// The generator ran and reported failure
	#[error("generator failed: {message}")]
	GenerationFailed { message: String },

	/// This handle can't interrupt its workers on this platform
	#[error("cancelling generator workers is not supported here")]
	CancellationUnsupported,

	#[error("i/o error")]
	IoError(#[from] Arc<std::io::Error>),

	#[error("{0}")]
	Other(Arc<dyn Error + Send + Sync + 'static>),
}

impl From<std::io::Error> for GeneratorError {
	fn from(value: std::io::Error) -> Self {
		Self::IoError(Arc::new(value))
	}
}

/// How a generator spreads work over GPUs.
///
/// Fields left as `None` use the generator's own defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceShape {
	pub num_gpus: Option<i64>,
	pub tp_size: Option<i64>,
	pub sp_size: Option<i64>,
	pub dit_cpu_offload: Option<bool>,
}

/// Builds generator handles.
///
/// Every method here may block, callers must run them
/// on a blocking thread.
pub trait GeneratorBackend: Send + Sync {
	/// Get the default pipeline config for `model`
	fn resolve_config(&self, model: &str) -> Result<PipelineConfig, GeneratorError>;

	/// Build a generator for `model`.
	/// This is expensive, handles should be reused.
	fn from_pretrained(
		&self,
		model: &str,
		shape: &ResourceShape,
		config: &PipelineConfig,
	) -> Result<Arc<dyn GeneratorHandle>, GeneratorError>;
}

/// A loaded generator
pub trait GeneratorHandle: Send + Sync {
	/// Generate one video into `output_dir`.
	///
	/// This blocks until generation finishes.
	/// Implementations may stop early once `cancel` is cancelled,
	/// but they are not required to.
	fn generate_video(
		&self,
		prompt: &str,
		output_dir: &Path,
		args: &ConfigMap,
		cancel: &CancellationToken,
	) -> Result<(), GeneratorError>;

	/// Ask this generator's workers to stop, out-of-band.
	/// This is advisory and may do nothing.
	fn request_cancellation(&self) -> Result<(), GeneratorError>;
}
