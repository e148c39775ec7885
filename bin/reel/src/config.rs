use nodes_generate::WatchdogConfig;
use reel_piper::helpers::HostFolders;
use reel_util::{logging::LoggingPreset, HashType};
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

/// Note that the field of this struct are not capitalized.
/// Envy is case-insensitive, and expects Rust fields to be snake_case.
#[derive(Debug, Deserialize, Clone)]
pub struct ReelConfig {
	/// The logging level to run with
	#[serde(default)]
	pub reel_loglevel: LoggingPreset,

	/// Where `LoadImagePath` finds images
	#[serde(default = "ReelConfig::default_input_dir")]
	pub reel_input_dir: PathBuf,

	/// Where annotated `[output]` paths point
	#[serde(default = "ReelConfig::default_output_dir")]
	pub reel_output_dir: PathBuf,

	/// Scratch space. Generator job files are written here.
	#[serde(default = "std::env::temp_dir")]
	pub reel_temp_dir: PathBuf,

	/// The program we run to generate each video
	pub reel_generator_program: PathBuf,

	/// The hash nodes use to detect changed inputs
	#[serde(default)]
	pub reel_hash_function: HashType,

	/// How long we wait before checking for interrupts
	#[serde(default = "ReelConfig::default_grace_ms")]
	pub reel_watchdog_grace_ms: u64,

	/// How often we check for interrupts
	#[serde(default = "ReelConfig::default_poll_ms")]
	pub reel_watchdog_poll_ms: u64,

	/// How long we wait for the interrupt watchdog to stop
	#[serde(default = "ReelConfig::default_join_timeout_ms")]
	pub reel_watchdog_join_timeout_ms: u64,
}

impl ReelConfig {
	fn default_input_dir() -> PathBuf {
		PathBuf::from("./input")
	}

	fn default_output_dir() -> PathBuf {
		PathBuf::from("./output")
	}

	fn default_grace_ms() -> u64 {
		2000
	}

	fn default_poll_ms() -> u64 {
		500
	}

	fn default_join_timeout_ms() -> u64 {
		1000
	}

	pub fn folders(&self) -> HostFolders {
		HostFolders {
			input: self.reel_input_dir.clone(),
			output: self.reel_output_dir.clone(),
			temp: self.reel_temp_dir.clone(),
		}
	}

	pub fn watchdog(&self) -> WatchdogConfig {
		WatchdogConfig {
			grace: Duration::from_millis(self.reel_watchdog_grace_ms),
			poll_interval: Duration::from_millis(self.reel_watchdog_poll_ms),
			join_timeout: Duration::from_millis(self.reel_watchdog_join_timeout_ms),
		}
	}
}
