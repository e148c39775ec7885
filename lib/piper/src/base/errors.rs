use smartstring::{LazyCompact, SmartString};
use std::{error::Error, sync::Arc};
use thiserror::Error;
use tokio::task::JoinError;

use super::PortName;

/// An error we encounter while running a node
#[derive(Debug, Clone, Error)]
pub enum RunNodeError {
	//
	// MARK: Errors in graph definition
	//
	/// We tried to run a node type nobody registered
	#[error("no node type `{node_type}` is registered")]
	UnknownNodeType { node_type: SmartString<LazyCompact> },

	/// We did not receive a required input
	#[error("we did not receive input on port `{port}`")]
	MissingInput { port: PortName },

	/// We received an input on a port we don't recognize
	#[error("received input on unrecognized port `{port}`")]
	UnrecognizedInput { port: PortName },

	/// We received data with an invalid type on the given port
	#[error("received bad data type on port `{port}`")]
	BadInputType { port: PortName },

	/// An integer input was outside its declared bounds
	#[error("value {value} on port `{port}` is outside {min}..={max}")]
	InputOutOfRange {
		port: PortName,
		value: i64,
		min: i64,
		max: i64,
	},

	/// An input with fixed choices received something else
	#[error("value on port `{port}` is not one of its choices")]
	InvalidChoice { port: PortName },

	/// A node's pre-flight check rejected its inputs
	#[error("{message}")]
	InvalidInput { message: String },

	//
	// MARK: Node runtime errors
	//
	/// The user interrupted this node.
	/// The host treats this differently from a failure.
	#[error("{message}")]
	Interrupted { message: String },

	/// A generic I/O error
	#[error("i/o error")]
	IoError(#[from] Arc<std::io::Error>),

	/// An arbitrary error
	#[error("{0}")]
	Other(#[from] Arc<dyn Error + Sync + Send + 'static>),

	/// A node task threw a JoinError
	#[error("error while joining task")]
	NodeTaskJoinError(#[from] Arc<JoinError>),
}

impl From<std::io::Error> for RunNodeError {
	fn from(value: std::io::Error) -> Self {
		Self::IoError(Arc::new(value))
	}
}

impl From<JoinError> for RunNodeError {
	fn from(value: JoinError) -> Self {
		Self::NodeTaskJoinError(Arc::new(value))
	}
}

impl RunNodeError {
	/// Was this node stopped by the user?
	pub fn is_interrupt(&self) -> bool {
		matches!(self, Self::Interrupted { .. })
	}
}

/// An error we encounter when trying to register a node
#[derive(Debug, Error)]
pub enum RegisterNodeError {
	/// We tried to register a node with a type string that is already used
	#[error("A node with this name already exists")]
	AlreadyExists,
}
