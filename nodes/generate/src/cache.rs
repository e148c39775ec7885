use smartstring::{LazyCompact, SmartString};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
	config::PipelineConfig,
	errors::GenerateError,
	generator::{GeneratorBackend, GeneratorError, GeneratorHandle, ResourceShape},
};

struct CachedGenerator {
	/// The shape this generator was built with
	shape: ResourceShape,
	handle: Arc<dyn GeneratorHandle>,
}

/// Generator handles we've built, keyed by model path.
///
/// A handle is built once and lives as long as this cache.
pub struct GeneratorCache {
	generators: Mutex<BTreeMap<SmartString<LazyCompact>, CachedGenerator>>,
}

impl GeneratorCache {
	pub fn new() -> Self {
		Self {
			generators: Mutex::new(BTreeMap::new()),
		}
	}

	/// How many handles we hold
	pub async fn len(&self) -> usize {
		self.generators.lock().await.len()
	}

	/// Get the handle for `model`, building it if we don't have one.
	///
	/// If a handle exists but was built with another shape, we reuse it anyway.
	/// If building fails, nothing is cached and the next call tries again.
	pub async fn get_or_build(
		&self,
		backend: Arc<dyn GeneratorBackend>,
		model: &str,
		shape: &ResourceShape,
		config: &PipelineConfig,
	) -> Result<Arc<dyn GeneratorHandle>, GenerateError> {
		// Held across construction, so concurrent callers never build twice.
		let mut generators = self.generators.lock().await;

		if let Some(cached) = generators.get(model) {
			if cached.shape != *shape {
				warn!(
					message = "Reusing generator built with a different resource shape",
					model,
					cached_shape = ?cached.shape,
					requested_shape = ?shape,
				);
			} else {
				debug!(message = "Reusing cached generator", model);
			}
			return Ok(cached.handle.clone());
		}

		info!(message = "Building generator", model, ?shape);
		let built = {
			let model: SmartString<LazyCompact> = model.into();
			let shape = shape.clone();
			let config = config.clone();
			tokio::task::spawn_blocking(move || backend.from_pretrained(&model, &shape, &config))
				.await
				.unwrap_or_else(|join_error| Err(GeneratorError::Other(Arc::new(join_error))))
		};

		let handle = built.map_err(|source| GenerateError::GeneratorConstruction {
			model: model.into(),
			source,
		})?;

		generators.insert(
			model.into(),
			CachedGenerator {
				shape: shape.clone(),
				handle: handle.clone(),
			},
		);

		return Ok(handle);
	}
}

#[cfg(test)]
mod tests {
	use reel_piper::data::ConfigMap;
	use std::{
		path::Path,
		sync::atomic::{AtomicUsize, Ordering},
	};
	use tokio_util::sync::CancellationToken;

	use super::*;

	struct NoopHandle {}

	impl GeneratorHandle for NoopHandle {
		fn generate_video(
			&self,
			_prompt: &str,
			_output_dir: &Path,
			_args: &ConfigMap,
			_cancel: &CancellationToken,
		) -> Result<(), GeneratorError> {
			Ok(())
		}

		fn request_cancellation(&self) -> Result<(), GeneratorError> {
			Ok(())
		}
	}

	/// Fails the first `fail_first` builds
	struct CountingBackend {
		builds: AtomicUsize,
		fail_first: usize,
	}

	impl GeneratorBackend for CountingBackend {
		fn resolve_config(&self, _model: &str) -> Result<PipelineConfig, GeneratorError> {
			Ok(PipelineConfig::default())
		}

		fn from_pretrained(
			&self,
			_model: &str,
			_shape: &ResourceShape,
			_config: &PipelineConfig,
		) -> Result<Arc<dyn GeneratorHandle>, GeneratorError> {
			let n = self.builds.fetch_add(1, Ordering::SeqCst);
			if n < self.fail_first {
				return Err(GeneratorError::InvalidShape {
					message: "no gpus".into(),
				});
			}
			Ok(Arc::new(NoopHandle {}))
		}
	}

	fn shape(gpus: i64) -> ResourceShape {
		ResourceShape {
			num_gpus: Some(gpus),
			..Default::default()
		}
	}

	#[tokio::test]
	async fn builds_once_per_model() {
		let backend = Arc::new(CountingBackend {
			builds: AtomicUsize::new(0),
			fail_first: 0,
		});
		let cache = GeneratorCache::new();
		let cfg = PipelineConfig::default();

		let a = cache.get_or_build(backend.clone(), "m/a", &shape(2), &cfg).await.unwrap();
		let b = cache.get_or_build(backend.clone(), "m/a", &shape(4), &cfg).await.unwrap();
		assert!(Arc::ptr_eq(&a, &b));
		assert_eq!(backend.builds.load(Ordering::SeqCst), 1);

		cache.get_or_build(backend.clone(), "m/b", &shape(2), &cfg).await.unwrap();
		assert_eq!(backend.builds.load(Ordering::SeqCst), 2);
		assert_eq!(cache.len().await, 2);
	}

	#[tokio::test]
	async fn failed_builds_are_retried() {
		let backend = Arc::new(CountingBackend {
			builds: AtomicUsize::new(0),
			fail_first: 1,
		});
		let cache = GeneratorCache::new();
		let cfg = PipelineConfig::default();

		let r = cache.get_or_build(backend.clone(), "m/a", &shape(2), &cfg).await;
		assert!(matches!(r, Err(GenerateError::GeneratorConstruction { .. })));
		assert_eq!(cache.len().await, 0);

		cache.get_or_build(backend.clone(), "m/a", &shape(2), &cfg).await.unwrap();
		assert_eq!(backend.builds.load(Ordering::SeqCst), 2);
	}
}
