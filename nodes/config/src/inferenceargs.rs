use async_trait::async_trait;
use reel_piper::{
	base::{Node, NodeDescription, NodeInputSpec, NodeOutputSpec, PortName, RunNodeError},
	data::{ConfigKind, PipeData, PipeDataStub},
	helpers::NodeInputs,
	HostContext,
};
use std::collections::BTreeMap;

use crate::{collect, CATEGORY};

/// Collect per-run sampling parameters.
///
/// These are not part of the pipeline config,
/// they are handed to the generator with every request.
pub struct InferenceArgs {}

#[async_trait]
impl Node for InferenceArgs {
	fn describe(&self, _ctx: &HostContext) -> NodeDescription {
		let int = |name: &str, default: i64| {
			NodeInputSpec::optional(name, PipeDataStub::Integer).with_default(default)
		};

		NodeDescription {
			category: CATEGORY,
			inputs: vec![
				int("height", 720),
				int("width", 1280),
				int("num_frames", 45),
				int("num_inference_steps", 6),
				NodeInputSpec::optional("guidance_scale", PipeDataStub::Float).with_default(1.0),
				int("flow_shift", 17),
				int("seed", 1024),
				int("fps", 24),
				NodeInputSpec::optional("image_path", PipeDataStub::Text)
					.with_default("X://insert/path/here.mp4"),
				NodeInputSpec::optional("enable_teacache", PipeDataStub::Boolean)
					.with_default(false),
			],
			outputs: vec![NodeOutputSpec::new(
				"inference_args",
				PipeDataStub::Config {
					kind: ConfigKind::InferenceArgs,
				},
			)],
		}
	}

	async fn run(
		&self,
		_ctx: &HostContext,
		input: NodeInputs,
	) -> Result<BTreeMap<PortName, PipeData>, RunNodeError> {
		return collect(ConfigKind::InferenceArgs, "inference_args", input);
	}
}
