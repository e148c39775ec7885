use std::sync::atomic::{AtomicBool, Ordering};

/// The host's "was the current execution interrupted" predicate.
///
/// Implementations should return `true` promptly after the user
/// requests an interrupt, and keep returning `true` until the host
/// starts its next execution.
pub trait InterruptSource: Send + Sync {
	fn processing_interrupted(&self) -> bool;
}

/// An [`InterruptSource`] backed by a single flag.
#[derive(Debug, Default)]
pub struct InterruptFlag {
	interrupted: AtomicBool,
}

impl InterruptFlag {
	pub fn new() -> Self {
		Self {
			interrupted: AtomicBool::new(false),
		}
	}

	/// Ask the current execution to stop
	pub fn interrupt(&self) {
		self.interrupted.store(true, Ordering::Release);
	}

	/// Reset this flag. The host does this before each execution.
	pub fn clear(&self) {
		self.interrupted.store(false, Ordering::Release);
	}
}

impl InterruptSource for InterruptFlag {
	fn processing_interrupted(&self) -> bool {
		self.interrupted.load(Ordering::Acquire)
	}
}
