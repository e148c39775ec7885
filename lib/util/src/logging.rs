use std::{fmt::Display, str::FromStr};

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
	Trace,
	Debug,
	#[default]
	Info,
	Warn,
	Error,
}

impl Display for LogLevel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Trace => write!(f, "trace"),
			Self::Debug => write!(f, "debug"),
			Self::Info => write!(f, "info"),
			Self::Warn => write!(f, "warn"),
			Self::Error => write!(f, "error"),
		}
	}
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub enum LoggingPreset {
	#[default]
	Default,
	Verbose,
	Develop,
	Trace,
}

impl LoggingPreset {
	pub fn get_config(&self) -> LoggingConfig {
		match self {
			Self::Default => LoggingConfig {
				other: LogLevel::Warn,
				reel: LogLevel::Info,
				piper: LogLevel::Info,
				nodes: LogLevel::Warn,
				generate: LogLevel::Info,
			},

			Self::Verbose => LoggingConfig {
				other: LogLevel::Warn,
				reel: LogLevel::Debug,
				piper: LogLevel::Debug,
				nodes: LogLevel::Info,
				generate: LogLevel::Debug,
			},

			Self::Develop => LoggingConfig {
				other: LogLevel::Debug,
				reel: LogLevel::Trace,
				piper: LogLevel::Trace,
				nodes: LogLevel::Debug,
				generate: LogLevel::Trace,
			},

			Self::Trace => LoggingConfig {
				other: LogLevel::Trace,
				reel: LogLevel::Trace,
				piper: LogLevel::Trace,
				nodes: LogLevel::Trace,
				generate: LogLevel::Trace,
			},
		}
	}
}

pub struct LoggingConfig {
	other: LogLevel,

	/// The host binary
	reel: LogLevel,

	/// Node dispatch
	piper: LogLevel,

	/// Config collectors and image loading
	nodes: LogLevel,

	/// The inference orchestrator.
	/// This is usually the only node worth watching.
	generate: LogLevel,
}

impl LoggingConfig {
	/// The filter directives for this config, joined with commas.
	pub fn directives(&self) -> String {
		[
			//
			// Non-configurable sources
			//
			format!("tokio={}", LogLevel::Warn),
			format!("runtime={}", LogLevel::Warn),
			//
			// Configurable sources
			//
			format!("reel={}", self.reel),
			format!("reel_piper={}", self.piper),
			// Node implementations
			format!("nodes_config={}", self.nodes),
			format!("nodes_image={}", self.nodes),
			format!("nodes_generate={}", self.generate),
			self.other.to_string(),
		]
		.join(",")
	}
}

impl From<LoggingConfig> for EnvFilter {
	fn from(value: LoggingConfig) -> Self {
		// Every directive above is well-formed, so this only fails if
		// a level's `Display` impl is broken.
		EnvFilter::from_str(&value.directives()).unwrap_or_else(|_| EnvFilter::new("info"))
	}
}
