use async_trait::async_trait;
use reel_piper::{
	base::{Node, NodeDescription, NodeInputSpec, NodeOutputSpec, PortName, RunNodeError},
	data::{ConfigKind, PipeData, PipeDataStub},
	helpers::NodeInputs,
	HostContext,
};
use std::collections::BTreeMap;

use crate::{collect, CATEGORY};

/// Collect text encoder settings.
/// The generator applies these to every text encoder the model has.
pub struct TextEncoderConfig {}

#[async_trait]
impl Node for TextEncoderConfig {
	fn describe(&self, _ctx: &HostContext) -> NodeDescription {
		NodeDescription {
			category: CATEGORY,
			inputs: vec![
				NodeInputSpec::optional("prefix", PipeDataStub::Text).with_default(""),
				NodeInputSpec::optional("quant_config", PipeDataStub::Text).with_default(""),
				NodeInputSpec::optional("lora_config", PipeDataStub::Text).with_default(""),
			],
			outputs: vec![NodeOutputSpec::new(
				"text_encoder_config",
				PipeDataStub::Config {
					kind: ConfigKind::TextEncoder,
				},
			)],
		}
	}

	async fn run(
		&self,
		_ctx: &HostContext,
		input: NodeInputs,
	) -> Result<BTreeMap<PortName, PipeData>, RunNodeError> {
		return collect(ConfigKind::TextEncoder, "text_encoder_config", input);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::run;

	#[tokio::test]
	async fn rejects_non_text() {
		let r = run("TextEncoderConfig", vec![("prefix", 3i64.into())]).await;
		assert!(matches!(r, Err(RunNodeError::BadInputType { .. })));
	}
}
