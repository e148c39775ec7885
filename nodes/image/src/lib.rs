//! Image loading nodes

use reel_piper::base::{NodeDispatcher, RegisterNodeError};

pub mod decode;
pub mod tensor;

mod loadimage;
pub use loadimage::{LoadImageError, LoadImagePath};

/// The host menu these nodes live in
pub const CATEGORY: &str = "fastvideo";

/// Register all nodes in this module into the given dispatcher.
pub fn register(dispatcher: &mut NodeDispatcher) -> Result<(), RegisterNodeError> {
	dispatcher.register_node(
		"LoadImagePath",
		"Load Image Path",
		Box::new(|| Box::new(LoadImagePath {})),
	)?;

	return Ok(());
}
