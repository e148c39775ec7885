use reel_piper::base::RunNodeError;
use smartstring::{LazyCompact, SmartString};
use std::sync::Arc;
use thiserror::Error;

use crate::{config::InvalidOverride, generator::GeneratorError};

/// The message we show when the user cancels a generation
pub const CANCELLED_MESSAGE: &str = "Generation was cancelled by user";

/// An error we encounter while generating a video
#[derive(Debug, Clone, Error)]
pub enum GenerateError {
	/// We couldn't load the pipeline config for a model
	#[error("could not resolve pipeline config for `{model}`")]
	ConfigResolution {
		model: SmartString<LazyCompact>,
		#[source]
		source: GeneratorError,
	},

	/// We couldn't build a generator for a model
	#[error("could not build generator for `{model}`")]
	GeneratorConstruction {
		model: SmartString<LazyCompact>,
		#[source]
		source: GeneratorError,
	},

	/// The generator itself failed.
	/// This is the error the generator reported, unchanged.
	#[error(transparent)]
	Generation(#[from] GeneratorError),

	/// The user interrupted this generation
	#[error("{message}")]
	Cancelled { message: SmartString<LazyCompact> },

	/// Generation ended without a result, an error, or a cancellation.
	/// This happens if the generation worker panics.
	#[error("generation finished without producing a result")]
	InconsistentCompletion,

	#[error(transparent)]
	InvalidOverride(#[from] InvalidOverride),
}

impl GenerateError {
	pub fn cancelled() -> Self {
		Self::Cancelled {
			message: CANCELLED_MESSAGE.into(),
		}
	}
}

impl From<GenerateError> for RunNodeError {
	fn from(value: GenerateError) -> Self {
		match value {
			GenerateError::Cancelled { message } => Self::Interrupted {
				message: message.into(),
			},
			x => Self::Other(Arc::new(x)),
		}
	}
}
