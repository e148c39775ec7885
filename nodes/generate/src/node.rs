use async_trait::async_trait;
use reel_piper::{
	base::{Node, NodeDescription, NodeInputSpec, NodeOutputSpec, PortName, RunNodeError},
	data::{ConfigKind, ConfigMap, ConfigValue, PipeData, PipeDataStub},
	helpers::NodeInputs,
	HostContext,
};
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use crate::orchestrator::{GenerationRequest, GenerationSession};

const DEFAULT_PROMPT: &str = "A ripe orange tumbles gently from a tree and lands on the head of a lounging capybara, \
	who blinks slowly in response. The moment is quietly humorous and oddly serene, framed by \
	lush green foliage and dappled sunlight. Mid-shot, warm and whimsical tones.";

const PRECISIONS: [&str; 2] = ["fp16", "bf16"];

/// Generate one video from a prompt
pub struct VideoGenerator {
	pub(crate) session: Arc<GenerationSession>,
}

fn config_port(name: &str, kind: ConfigKind) -> NodeInputSpec {
	NodeInputSpec::optional(name, PipeDataStub::Config { kind })
}

/// Move the scalar inputs named in `keys` into a config map
fn take_scalars(input: &mut NodeInputs, keys: &[&str]) -> Result<ConfigMap, RunNodeError> {
	let mut out = ConfigMap::new();
	for key in keys {
		if let Some(data) = input.pop_opt(key)? {
			match ConfigValue::try_from(&data) {
				Ok(value) => {
					out.insert((*key).into(), value);
				}
				Err(_) => {
					return Err(RunNodeError::BadInputType {
						port: PortName::new(key),
					})
				}
			}
		}
	}
	return Ok(out);
}

#[async_trait]
impl Node for VideoGenerator {
	fn describe(&self, _ctx: &HostContext) -> NodeDescription {
		NodeDescription {
			category: crate::CATEGORY,
			inputs: vec![
				NodeInputSpec::required("prompt", PipeDataStub::Text)
					.with_default(DEFAULT_PROMPT)
					.multiline(),
				NodeInputSpec::required("output_path", PipeDataStub::Text)
					.with_default("/workspace/ComfyUI/outputs_video/"),
				NodeInputSpec::required("num_gpus", PipeDataStub::Integer)
					.with_default(2i64)
					.with_range(1, 16),
				NodeInputSpec::required("model_path", PipeDataStub::Text)
					.with_default("FastVideo/FastHunyuan-diffusers"),
				//
				// MARK: optional
				//
				config_port("inference_args", ConfigKind::InferenceArgs),
				NodeInputSpec::optional("embedded_cfg_scale", PipeDataStub::Float).with_default(6.0),
				NodeInputSpec::optional("sp_size", PipeDataStub::Integer).with_default(2i64),
				NodeInputSpec::optional("tp_size", PipeDataStub::Integer).with_default(2i64),
				config_port("vae_config", ConfigKind::Vae),
				NodeInputSpec::optional("vae_precision", PipeDataStub::Text)
					.with_default("fp16")
					.with_text_choices(&PRECISIONS),
				NodeInputSpec::optional("vae_tiling", PipeDataStub::Boolean).with_default(true),
				NodeInputSpec::optional("vae_sp", PipeDataStub::Boolean).with_default(false),
				config_port("text_encoder_config", ConfigKind::TextEncoder),
				NodeInputSpec::optional("text_encoder_precision", PipeDataStub::Text)
					.with_default("fp16")
					.with_text_choices(&PRECISIONS),
				config_port("dit_config", ConfigKind::Dit),
				NodeInputSpec::optional("precision", PipeDataStub::Text)
					.with_default("fp16")
					.with_text_choices(&PRECISIONS),
				NodeInputSpec::optional("dit_cpu_offload", PipeDataStub::Boolean).with_default(false),
			],
			outputs: vec![NodeOutputSpec::new("video_path", PipeDataStub::Text)],
		}
	}

	async fn run(
		&self,
		ctx: &HostContext,
		mut input: NodeInputs,
	) -> Result<BTreeMap<PortName, PipeData>, RunNodeError> {
		let prompt = input.pop_text("prompt")?;
		let output_path = input.pop_text("output_path")?;
		let model_path = input.pop_text("model_path")?;

		let request = GenerationRequest {
			prompt: prompt.into(),
			output_dir: PathBuf::from(output_path.as_str()),
			model_path,
			dit_overrides: input.pop_opt_config("dit_config", ConfigKind::Dit)?,
			vae_overrides: input.pop_opt_config("vae_config", ConfigKind::Vae)?,
			text_encoder_overrides: input
				.pop_opt_config("text_encoder_config", ConfigKind::TextEncoder)?,
			inference_args: input.pop_opt_config("inference_args", ConfigKind::InferenceArgs)?,
			pipeline_overrides: take_scalars(
				&mut input,
				&[
					"embedded_cfg_scale",
					"precision",
					"vae_precision",
					"vae_tiling",
					"vae_sp",
					"text_encoder_precision",
				],
			)?,
			resource_overrides: take_scalars(
				&mut input,
				&["num_gpus", "tp_size", "sp_size", "dit_cpu_offload"],
			)?,
		};
		input.err_if_not_empty()?;

		let path = self
			.session
			.launch_inference(request, ctx.interrupt.clone())
			.await?;

		let mut out = BTreeMap::new();
		out.insert(
			PortName::new("video_path"),
			PipeData::text(&path.to_string_lossy()),
		);
		return Ok(out);
	}
}

#[cfg(test)]
mod tests {
	use reel_piper::{
		base::NodeDispatcher,
		helpers::{HostFolders, SENTINEL},
		InterruptFlag,
	};
	use std::{
		path::Path,
		sync::{Mutex, PoisonError},
		time::Duration,
	};
	use tokio_util::sync::CancellationToken;

	use super::*;
	use crate::{
		cache::GeneratorCache,
		config::{PipelineConfig, Precision},
		generator::{GeneratorBackend, GeneratorError, GeneratorHandle, ResourceShape},
		orchestrator::WatchdogConfig,
	};

	/// Blocks until cancelled
	struct StubHandle {}

	impl GeneratorHandle for StubHandle {
		fn generate_video(
			&self,
			_prompt: &str,
			_output_dir: &Path,
			_args: &ConfigMap,
			cancel: &CancellationToken,
		) -> Result<(), GeneratorError> {
			while !cancel.is_cancelled() {
				std::thread::sleep(Duration::from_millis(2));
			}
			Ok(())
		}

		fn request_cancellation(&self) -> Result<(), GeneratorError> {
			Ok(())
		}
	}

	/// Finishes right away
	struct QuickHandle {}

	impl GeneratorHandle for QuickHandle {
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

	struct StubBackend {
		quick: bool,
		shape: Mutex<Option<ResourceShape>>,
		config: Mutex<Option<PipelineConfig>>,
	}

	impl GeneratorBackend for StubBackend {
		fn resolve_config(&self, _model: &str) -> Result<PipelineConfig, GeneratorError> {
			Ok(PipelineConfig::default())
		}

		fn from_pretrained(
			&self,
			_model: &str,
			shape: &ResourceShape,
			config: &PipelineConfig,
		) -> Result<Arc<dyn GeneratorHandle>, GeneratorError> {
			*self.shape.lock().unwrap_or_else(PoisonError::into_inner) = Some(shape.clone());
			*self.config.lock().unwrap_or_else(PoisonError::into_inner) = Some(config.clone());
			if self.quick {
				return Ok(Arc::new(QuickHandle {}));
			}
			return Ok(Arc::new(StubHandle {}));
		}
	}

	fn setup(quick: bool, interrupted: bool) -> (NodeDispatcher, HostContext, Arc<StubBackend>) {
		let backend = Arc::new(StubBackend {
			quick,
			shape: Mutex::new(None),
			config: Mutex::new(None),
		});

		let session = Arc::new(GenerationSession::new(
			backend.clone(),
			Arc::new(GeneratorCache::new()),
			WatchdogConfig {
				grace: Duration::from_millis(10),
				poll_interval: Duration::from_millis(5),
				join_timeout: Duration::from_millis(200),
			},
		));

		let mut d = NodeDispatcher::new();
		crate::register(&mut d, session).unwrap();

		let flag = InterruptFlag::new();
		if interrupted {
			flag.interrupt();
		}

		let ctx = HostContext {
			interrupt: Arc::new(flag),
			folders: HostFolders {
				input: "/in".into(),
				output: "/out".into(),
				temp: "/tmp".into(),
			},
			hash_type: Default::default(),
		};

		(d, ctx, backend)
	}

	fn input(pairs: Vec<(&str, PipeData)>) -> BTreeMap<PortName, PipeData> {
		pairs.into_iter().map(|(k, v)| (PortName::new(k), v)).collect()
	}

	#[tokio::test]
	async fn returns_video_path() {
		let (d, ctx, backend) = setup(true, false);
		let out = d
			.run_node(
				"VideoGenerator",
				&ctx,
				input(vec![
					("prompt", "cat".into()),
					("output_path", "/out/".into()),
					("tp_size", SENTINEL.into()),
				]),
			)
			.await
			.unwrap();

		assert_eq!(
			out.get(&PortName::new("video_path")),
			Some(&PipeData::text("/out/cat.mp4"))
		);

		let shape = backend.shape.lock().unwrap().clone().unwrap();
		assert_eq!(shape.num_gpus, Some(2));
		assert_eq!(shape.tp_size, None);
		assert_eq!(shape.sp_size, Some(2));
	}

	#[tokio::test]
	async fn auto_fields_keep_pipeline_defaults() {
		let (d, ctx, backend) = setup(true, false);
		d.run_node(
			"VideoGenerator",
			&ctx,
			input(vec![
				("prompt", "cat".into()),
				("precision", SENTINEL.into()),
				("vae_precision", "-99999".into()),
				("vae_sp", SENTINEL.into()),
				("dit_cpu_offload", SENTINEL.into()),
				("text_encoder_precision", "bf16".into()),
			]),
		)
		.await
		.unwrap();

		let config = backend.config.lock().unwrap().clone().unwrap();
		let defaults = PipelineConfig::default();
		assert_eq!(config.precision, defaults.precision);
		assert_eq!(config.vae_precision, defaults.vae_precision);
		assert_eq!(config.vae_sp, defaults.vae_sp);
		assert_eq!(&*config.text_encoder_precisions, &[Precision::Bf16]);

		let shape = backend.shape.lock().unwrap().clone().unwrap();
		assert_eq!(shape.dit_cpu_offload, None);
	}

	#[tokio::test]
	async fn node_defaults_override_pipeline_defaults() {
		let (d, ctx, backend) = setup(true, false);
		d.run_node("VideoGenerator", &ctx, input(vec![("prompt", "cat".into())]))
			.await
			.unwrap();

		let config = backend.config.lock().unwrap().clone().unwrap();
		assert_eq!(config.precision, Precision::Fp16);
		assert!(!config.vae_sp);
	}

	#[tokio::test]
	async fn cancellation_is_an_interrupt() {
		let (d, ctx, _) = setup(false, true);
		let r = d
			.run_node("VideoGenerator", &ctx, input(vec![("prompt", "cat".into())]))
			.await;

		match r {
			Err(e @ RunNodeError::Interrupted { .. }) => {
				assert!(e.is_interrupt());
				assert_eq!(e.to_string(), "Generation was cancelled by user");
			}
			_ => panic!("expected an interrupt"),
		}
	}

	#[tokio::test]
	async fn rejects_bad_inputs() {
		let (d, ctx, _) = setup(true, false);

		let r = d
			.run_node("VideoGenerator", &ctx, input(vec![("num_gpus", 32i64.into())]))
			.await;
		assert!(matches!(r, Err(RunNodeError::InputOutOfRange { .. })));

		let r = d
			.run_node("VideoGenerator", &ctx, input(vec![("precision", "fp8".into())]))
			.await;
		assert!(matches!(r, Err(RunNodeError::InvalidChoice { .. })));

		let r = d
			.run_node(
				"VideoGenerator",
				&ctx,
				input(vec![(
					"vae_config",
					PipeData::config(ConfigKind::Dit, ConfigMap::new()),
				)]),
			)
			.await;
		assert!(matches!(r, Err(RunNodeError::BadInputType { .. })));
	}
}
