//! Video generation.
//!
//! [`VideoGenerator`] hands one prompt to an external generator through a
//! [`GenerationSession`], which builds generators once per model and stops
//! waiting when the host is interrupted.

use reel_piper::base::{NodeDispatcher, RegisterNodeError};
use std::sync::Arc;

pub mod backend;
pub mod cache;
pub mod config;
pub mod errors;
pub mod generator;
pub mod orchestrator;

mod node;
pub use node::VideoGenerator;

pub use orchestrator::{GenerationSession, WatchdogConfig};

/// The host menu these nodes live in
pub const CATEGORY: &str = "fastvideo";

/// Register all nodes in this module into the given dispatcher.
/// Every generator node shares `session`.
pub fn register(
	dispatcher: &mut NodeDispatcher,
	session: Arc<GenerationSession>,
) -> Result<(), RegisterNodeError> {
	dispatcher.register_node(
		"VideoGenerator",
		"Video Generator",
		Box::new(move || {
			Box::new(VideoGenerator {
				session: session.clone(),
			})
		}),
	)?;

	return Ok(());
}
