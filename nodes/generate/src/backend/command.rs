//! A generator that runs an external program for every video.
//!
//! The program gets one argument, the path to a json job file
//! that holds the prompt, output directory, pipeline config,
//! resource shape, and inference args.

use reel_piper::data::ConfigMap;
use serde::Serialize;
use smartstring::{LazyCompact, SmartString};
use std::{
	collections::BTreeSet,
	io::Write,
	path::{Path, PathBuf},
	process::{Command, Stdio},
	sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
	config::PipelineConfig,
	generator::{GeneratorBackend, GeneratorError, GeneratorHandle, ResourceShape},
};

/// The file we read a local model's pipeline config from
const CONFIG_FILE: &str = "pipeline_config.json";

/// The most GPUs one generator may use
const MAX_GPUS: i64 = 16;

pub struct CommandBackend {
	program: PathBuf,
	temp_dir: PathBuf,
}

impl CommandBackend {
	/// `program` is run once per video.
	/// Job files are written to `temp_dir`.
	pub fn new(program: PathBuf, temp_dir: PathBuf) -> Self {
		Self { program, temp_dir }
	}
}

/// Is `model` of the form `owner/name`?
fn is_repo_reference(model: &str) -> bool {
	let valid = |x: &str| {
		!x.is_empty()
			&& x
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
	};

	match model.split_once('/') {
		Some((owner, name)) => valid(owner) && valid(name),
		None => false,
	}
}

fn check_shape(shape: &ResourceShape) -> Result<(), GeneratorError> {
	let num_gpus = shape.num_gpus.unwrap_or(1);
	if !(1..=MAX_GPUS).contains(&num_gpus) {
		return Err(GeneratorError::InvalidShape {
			message: format!("num_gpus must be in 1..={MAX_GPUS}, got {num_gpus}"),
		});
	}

	for (name, size) in [("tp_size", shape.tp_size), ("sp_size", shape.sp_size)] {
		if let Some(size) = size {
			if !(1..=num_gpus).contains(&size) {
				return Err(GeneratorError::InvalidShape {
					message: format!("{name} must be in 1..={num_gpus}, got {size}"),
				});
			}
		}
	}

	return Ok(());
}

impl GeneratorBackend for CommandBackend {
	fn resolve_config(&self, model: &str) -> Result<PipelineConfig, GeneratorError> {
		let path = Path::new(model);

		if path.is_dir() {
			let file = path.join(CONFIG_FILE);
			if !file.is_file() {
				debug!(message = "Model has no pipeline config, using defaults", model);
				return Ok(PipelineConfig::default());
			}

			let text = std::fs::read_to_string(&file)?;
			return serde_json::from_str(&text).map_err(|source| {
				GeneratorError::BadPipelineConfig {
					model: model.into(),
					source: Arc::new(source),
				}
			});
		}

		if is_repo_reference(model) {
			return Ok(PipelineConfig::default());
		}

		return Err(GeneratorError::UnknownModel {
			model: model.into(),
			message: "not a local directory or an `owner/name` reference".into(),
		});
	}

	fn from_pretrained(
		&self,
		model: &str,
		shape: &ResourceShape,
		config: &PipelineConfig,
	) -> Result<Arc<dyn GeneratorHandle>, GeneratorError> {
		check_shape(shape)?;

		return Ok(Arc::new(CommandGenerator {
			program: self.program.clone(),
			temp_dir: self.temp_dir.clone(),
			model: model.into(),
			shape: shape.clone(),
			config: config.clone(),
			children: Mutex::new(BTreeSet::new()),
		}));
	}
}

//
// MARK: Generator
//

#[derive(Serialize)]
struct GenerationJob<'a> {
	model: &'a str,
	prompt: &'a str,
	output_path: &'a Path,
	resource_shape: &'a ResourceShape,
	pipeline_config: &'a PipelineConfig,
	inference_args: &'a ConfigMap,
}

pub struct CommandGenerator {
	program: PathBuf,
	temp_dir: PathBuf,
	model: SmartString<LazyCompact>,
	shape: ResourceShape,
	config: PipelineConfig,

	/// The pids of generator processes that are running right now
	children: Mutex<BTreeSet<u32>>,
}

impl CommandGenerator {
	fn children(&self) -> MutexGuard<'_, BTreeSet<u32>> {
		self.children.lock().unwrap_or_else(PoisonError::into_inner)
	}

	#[cfg(unix)]
	fn signal_children(&self) -> Result<(), GeneratorError> {
		use nix::{
			sys::signal::{kill, Signal},
			unistd::Pid,
		};

		let mut result = Ok(());
		for pid in self.children().iter() {
			let Ok(raw) = i32::try_from(*pid) else {
				continue;
			};

			debug!(message = "Sending SIGINT to generator process", pid);
			if let Err(error) = kill(Pid::from_raw(raw), Signal::SIGINT) {
				warn!(message = "Could not signal generator process", pid, ?error);
				result = Err(GeneratorError::Other(Arc::new(error)));
			}
		}

		return result;
	}

	#[cfg(not(unix))]
	fn signal_children(&self) -> Result<(), GeneratorError> {
		return Err(GeneratorError::CancellationUnsupported);
	}
}

impl GeneratorHandle for CommandGenerator {
	fn generate_video(
		&self,
		prompt: &str,
		output_dir: &Path,
		args: &ConfigMap,
		cancel: &CancellationToken,
	) -> Result<(), GeneratorError> {
		std::fs::create_dir_all(output_dir)?;
		std::fs::create_dir_all(&self.temp_dir)?;

		let mut job_file = tempfile::Builder::new()
			.prefix("reel-job-")
			.suffix(".json")
			.tempfile_in(&self.temp_dir)?;

		serde_json::to_writer(
			&mut job_file,
			&GenerationJob {
				model: &self.model,
				prompt,
				output_path: output_dir,
				resource_shape: &self.shape,
				pipeline_config: &self.config,
				inference_args: args,
			},
		)
		.map_err(|e| GeneratorError::Other(Arc::new(e)))?;
		job_file.flush()?;

		let child = Command::new(&self.program)
			.arg(job_file.path())
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.spawn()?;

		let pid = child.id();
		info!(
			message = "Started generator process",
			program = ?self.program,
			pid
		);
		self.children().insert(pid);
		let output = child.wait_with_output();
		self.children().remove(&pid);
		let output = output?;

		// Our own stdout belongs to the host
		for line in String::from_utf8_lossy(&output.stdout).lines() {
			debug!(message = "Generator output", pid, line);
		}

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			return Err(GeneratorError::GenerationFailed {
				message: format!(
					"{} exited with {}: {}",
					self.program.display(),
					output.status,
					stderr.trim()
				),
			});
		}

		if cancel.is_cancelled() {
			debug!(message = "Generator process finished after cancellation", pid);
		}

		return Ok(());
	}

	fn request_cancellation(&self) -> Result<(), GeneratorError> {
		self.signal_children()
	}
}
