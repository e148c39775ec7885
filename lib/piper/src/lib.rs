pub mod base;
pub mod data;
pub mod helpers;

mod interrupt;
pub use interrupt::*;

use helpers::HostFolders;
use reel_util::HashType;
use std::sync::Arc;

/// Everything the host hands to a node when it runs.
/// One of these lives as long as the host process.
pub struct HostContext {
	/// Tells us if the user asked the host to stop the current execution.
	/// This is host-wide, not scoped to one node.
	pub interrupt: Arc<dyn InterruptSource>,

	/// Where the host keeps input, output, and temporary files
	pub folders: HostFolders,

	/// The hash function nodes should use for change detection
	pub hash_type: HashType,
}
