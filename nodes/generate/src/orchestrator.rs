//! Runs one generation at a time against a cached generator,
//! and stops waiting for it when the host asks us to.

use reel_piper::{
	data::{ConfigMap, ConfigValue},
	helpers::filter_sentinels,
	InterruptSource,
};
use reel_util::MimeType;
use smartstring::{LazyCompact, SmartString};
use std::{
	path::{Path, PathBuf},
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, Mutex, PoisonError,
	},
	time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
	cache::GeneratorCache,
	config::{apply_overrides, PipelineConfig},
	errors::GenerateError,
	generator::{GeneratorBackend, GeneratorError, GeneratorHandle, ResourceShape},
};

/// Prompts are truncated to this many characters
/// when we derive an output file name.
const MAX_NAME_CHARS: usize = 100;

/// How the interrupt watchdog polls the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
	/// How long we wait before the first poll.
	/// This gives the generator time to start its workers.
	pub grace: Duration,

	/// How long we wait between polls
	pub poll_interval: Duration,

	/// How long we wait for the watchdog to exit once generation ends
	pub join_timeout: Duration,
}

impl Default for WatchdogConfig {
	fn default() -> Self {
		Self {
			grace: Duration::from_secs(2),
			poll_interval: Duration::from_millis(500),
			join_timeout: Duration::from_secs(1),
		}
	}
}

/// Everything we need to generate one video
#[derive(Debug, Clone)]
pub struct GenerationRequest {
	pub prompt: String,
	pub output_dir: PathBuf,
	pub model_path: SmartString<LazyCompact>,

	pub dit_overrides: Option<Arc<ConfigMap>>,
	pub vae_overrides: Option<Arc<ConfigMap>>,

	/// Applied to every text encoder
	pub text_encoder_overrides: Option<Arc<ConfigMap>>,

	/// Top-level pipeline fields, like `precision` or `vae_tiling`.
	/// `text_encoder_precision` is applied to all text encoders.
	pub pipeline_overrides: ConfigMap,

	/// `num_gpus`, `tp_size`, `sp_size` and `dit_cpu_offload`
	pub resource_overrides: ConfigMap,

	/// Handed to the generator as-is
	pub inference_args: Option<Arc<ConfigMap>>,
}

/// How one generation ended
#[derive(Debug)]
pub enum GenerationOutcome {
	ResultPath(PathBuf),
	Cancelled,
	Failed(GenerateError),
}

/// The path we expect the generator to write for `prompt`
pub fn result_path(output_dir: &Path, prompt: &str) -> PathBuf {
	let name: String = prompt.chars().take(MAX_NAME_CHARS).collect();
	return output_dir.join(format!("{name}.mp4"));
}

/// Find the first video in `dir`, sorted by name
pub fn find_output_video(dir: &Path) -> Option<PathBuf> {
	let entries = match std::fs::read_dir(dir) {
		Ok(x) => x,
		Err(error) => {
			debug!(message = "Could not list output directory", ?dir, ?error);
			return None;
		}
	};

	let mut videos: Vec<PathBuf> = entries
		.filter_map(|e| e.ok())
		.map(|e| e.path())
		.filter(|p| p.is_file())
		.filter(|p| MimeType::from_path(p).is_some_and(|m| m.is_video()))
		.collect();

	videos.sort();
	return videos.into_iter().next();
}

//
// MARK: Cycle state
//

/// State shared by the caller, the worker, and the watchdog
/// during one generation. Never reused.
struct Cycle {
	token: CancellationToken,

	/// Set by the watchdog if it saw a host interrupt
	cancel_requested: AtomicBool,

	/// Cleared by the caller once it stops waiting
	active: AtomicBool,

	/// Written once by the worker
	outcome: Mutex<Option<Result<PathBuf, GeneratorError>>>,
}

impl Cycle {
	fn new() -> Self {
		Self {
			token: CancellationToken::new(),
			cancel_requested: AtomicBool::new(false),
			active: AtomicBool::new(true),
			outcome: Mutex::new(None),
		}
	}

	fn record(&self, result: Result<PathBuf, GeneratorError>) {
		let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
		*outcome = Some(result);
	}

	/// Decide how this cycle ended.
	/// A host interrupt wins over everything the worker recorded.
	fn resolve(&self) -> GenerationOutcome {
		if self.cancel_requested.load(Ordering::SeqCst) {
			return GenerationOutcome::Cancelled;
		}

		let recorded = self
			.outcome
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take();

		return match recorded {
			Some(Err(error)) => GenerationOutcome::Failed(GenerateError::Generation(error)),
			Some(Ok(path)) => GenerationOutcome::ResultPath(path),
			None => GenerationOutcome::Failed(GenerateError::InconsistentCompletion),
		};
	}
}

async fn watchdog(
	cycle: Arc<Cycle>,
	interrupt: Arc<dyn InterruptSource>,
	handle: Arc<dyn GeneratorHandle>,
	config: WatchdogConfig,
) {
	tokio::select! {
		() = tokio::time::sleep(config.grace) => {}
		() = cycle.token.cancelled() => return,
	}

	loop {
		if !cycle.active.load(Ordering::SeqCst) || cycle.token.is_cancelled() {
			return;
		}

		if interrupt.processing_interrupted() {
			info!(message = "Generation interrupted by user");
			cycle.cancel_requested.store(true, Ordering::SeqCst);

			match handle.request_cancellation() {
				Ok(()) => debug!(message = "Sent interrupt to generator workers"),
				Err(error) => warn!(message = "Could not interrupt generator workers", ?error),
			}

			cycle.token.cancel();
			return;
		}

		tokio::select! {
			() = tokio::time::sleep(config.poll_interval) => {}
			() = cycle.token.cancelled() => return,
		}
	}
}

//
// MARK: Session
//

/// Runs generations.
/// One of these should live as long as the host.
pub struct GenerationSession {
	backend: Arc<dyn GeneratorBackend>,
	cache: Arc<GeneratorCache>,
	watchdog: WatchdogConfig,
}

impl GenerationSession {
	pub fn new(
		backend: Arc<dyn GeneratorBackend>,
		cache: Arc<GeneratorCache>,
		watchdog: WatchdogConfig,
	) -> Self {
		Self {
			backend,
			cache,
			watchdog,
		}
	}

	pub fn cache(&self) -> &GeneratorCache {
		&self.cache
	}

	/// Resolve the pipeline config for `request` and apply its overrides.
	/// Sentinel values in any override are ignored.
	pub async fn prepare(
		&self,
		request: &GenerationRequest,
	) -> Result<(PipelineConfig, ResourceShape), GenerateError> {
		let mut config = {
			let backend = self.backend.clone();
			let model = request.model_path.clone();
			tokio::task::spawn_blocking(move || backend.resolve_config(&model))
				.await
				.unwrap_or_else(|join_error| Err(GeneratorError::Other(Arc::new(join_error))))
				.map_err(|source| GenerateError::ConfigResolution {
					model: request.model_path.clone(),
					source,
				})?
		};

		if let Some(o) = &request.dit_overrides {
			apply_overrides(&mut config.dit_config, &filter_sentinels((**o).clone()))?;
		}

		if let Some(o) = &request.vae_overrides {
			apply_overrides(&mut config.vae_config, &filter_sentinels((**o).clone()))?;
		}

		if let Some(o) = &request.text_encoder_overrides {
			config.apply_text_encoder_overrides(&filter_sentinels((**o).clone()))?;
		}

		let mut top = filter_sentinels(request.pipeline_overrides.clone());
		if let Some(precision) = top.remove("text_encoder_precision") {
			top.insert(
				"text_encoder_precisions".into(),
				ConfigValue::List(vec![precision]),
			);
		}
		apply_overrides(&mut config, &top)?;

		let mut shape = ResourceShape::default();
		apply_overrides(
			&mut shape,
			&filter_sentinels(request.resource_overrides.clone()),
		)?;

		return Ok((config, shape));
	}

	/// Generate one video, returning the path it should be written to.
	///
	/// If the host is interrupted while we wait, this returns
	/// [`GenerateError::Cancelled`] even if generation also finished.
	/// The generator may keep running after we return.
	pub async fn launch_inference(
		&self,
		request: GenerationRequest,
		interrupt: Arc<dyn InterruptSource>,
	) -> Result<PathBuf, GenerateError> {
		info!(
			message = "Starting generation",
			model = request.model_path.as_str(),
			output_dir = ?request.output_dir,
		);

		let cycle = Arc::new(Cycle::new());
		let (config, shape) = self.prepare(&request).await?;
		debug!(message = "Pipeline config ready", ?config, ?shape);

		let handle = self
			.cache
			.get_or_build(self.backend.clone(), &request.model_path, &shape, &config)
			.await?;

		let args = request
			.inference_args
			.as_deref()
			.cloned()
			.map(filter_sentinels)
			.unwrap_or_default();
		debug!(message = "Inference args", ?args);

		let mut worker = {
			let cycle = cycle.clone();
			let handle = handle.clone();
			let prompt = request.prompt.clone();
			let output_dir = request.output_dir.clone();
			tokio::task::spawn_blocking(move || {
				let result = handle
					.generate_video(&prompt, &output_dir, &args, &cycle.token)
					.map(|()| result_path(&output_dir, &prompt));

				// Record first, the caller wakes up when we cancel.
				let failed = result.is_err();
				cycle.record(result);
				if failed {
					cycle.token.cancel();
				}
			})
		};

		let watchdog = tokio::spawn(watchdog(
			cycle.clone(),
			interrupt,
			handle.clone(),
			self.watchdog,
		));

		tokio::select! {
			joined = &mut worker => {
				if let Err(error) = joined {
					warn!(message = "Generation worker did not finish cleanly", ?error);
				}
			}
			() = cycle.token.cancelled() => {}
		}

		cycle.active.store(false, Ordering::SeqCst);
		cycle.token.cancel();
		if tokio::time::timeout(self.watchdog.join_timeout, watchdog)
			.await
			.is_err()
		{
			debug!(message = "Watchdog did not exit in time, leaving it behind");
		}

		match cycle.resolve() {
			GenerationOutcome::Cancelled => {
				info!(message = "Generation was cancelled by user");
				return Err(GenerateError::cancelled());
			}

			GenerationOutcome::Failed(error) => {
				warn!(message = "Generation failed", ?error);
				return Err(error);
			}

			GenerationOutcome::ResultPath(path) => {
				if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
					warn!(
						message = "Generator did not write the expected file",
						expected = ?path,
						found = ?find_output_video(&request.output_dir),
					);
				}

				info!(message = "Generation finished", ?path);
				return Ok(path);
			}
		}
	}
}
