//! Config collector nodes.
//!
//! Each of these takes a set of optional fields and emits them as one
//! [`ConfigMap`], with "auto" (sentinel) fields removed.
//! They never fail on well-typed input.

use reel_piper::{
	base::{NodeDispatcher, PortName, RegisterNodeError, RunNodeError},
	data::{ConfigKind, PipeData},
	helpers::{collect_filtered, NodeInputs},
};
use std::collections::BTreeMap;
use tracing::trace;

mod dit;
mod inferenceargs;
mod textencoder;
mod vae;

pub use dit::DitConfig;
pub use inferenceargs::InferenceArgs;
pub use textencoder::TextEncoderConfig;
pub use vae::VaeConfig;

/// The host menu these nodes live in
pub const CATEGORY: &str = "fastvideo";

/// Register all nodes in this module into the given dispatcher.
pub fn register(dispatcher: &mut NodeDispatcher) -> Result<(), RegisterNodeError> {
	dispatcher.register_node(
		"InferenceArgs",
		"Inference Args",
		Box::new(|| Box::new(InferenceArgs {})),
	)?;
	dispatcher.register_node("VAEConfig", "VAE Config", Box::new(|| Box::new(VaeConfig {})))?;
	dispatcher.register_node(
		"TextEncoderConfig",
		"Text Encoder Config",
		Box::new(|| Box::new(TextEncoderConfig {})),
	)?;
	dispatcher.register_node("DITConfig", "DIT Config", Box::new(|| Box::new(DitConfig {})))?;

	return Ok(());
}

/// Turn every input into one filtered mapping on `port`
fn collect(
	kind: ConfigKind,
	port: &str,
	mut input: NodeInputs,
) -> Result<BTreeMap<PortName, PipeData>, RunNodeError> {
	let map = collect_filtered(input.drain_scalars()?);
	trace!(message = "Collected config", kind = kind.type_name(), n_fields = map.len());

	let mut out = BTreeMap::new();
	out.insert(PortName::new(port), PipeData::config(kind, map));
	return Ok(out);
}
