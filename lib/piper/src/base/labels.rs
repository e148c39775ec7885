//! Helpful types

use serde::{Deserialize, Serialize};
use smartstring::{LazyCompact, SmartString};
use std::fmt::Display;

/// The name of one of a node's input or output ports
#[derive(Debug, Hash, PartialEq, Eq, Clone, Serialize, Deserialize, PartialOrd, Ord)]
pub struct PortName(SmartString<LazyCompact>);

impl PortName {
	/// Make a new port name
	pub fn new(id: &str) -> Self {
		Self(id.into())
	}

	/// get the name
	pub fn id(&self) -> &SmartString<LazyCompact> {
		&self.0
	}
}

impl Display for PortName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

impl From<&str> for PortName {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for PortName {
	fn from(value: String) -> Self {
		Self::new(&value)
	}
}
