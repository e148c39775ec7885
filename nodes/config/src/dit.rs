use async_trait::async_trait;
use reel_piper::{
	base::{Node, NodeDescription, NodeInputSpec, NodeOutputSpec, PortName, RunNodeError},
	data::{ConfigKind, PipeData, PipeDataStub},
	helpers::NodeInputs,
	HostContext,
};
use std::collections::BTreeMap;

use crate::{collect, CATEGORY};

/// Collect denoising-transformer settings
pub struct DitConfig {}

#[async_trait]
impl Node for DitConfig {
	fn describe(&self, _ctx: &HostContext) -> NodeDescription {
		NodeDescription {
			category: CATEGORY,
			inputs: vec![
				NodeInputSpec::optional("prefix", PipeDataStub::Text).with_default(""),
				NodeInputSpec::optional("quant_config", PipeDataStub::Text).with_default(""),
			],
			outputs: vec![NodeOutputSpec::new(
				"dit_config",
				PipeDataStub::Config {
					kind: ConfigKind::Dit,
				},
			)],
		}
	}

	async fn run(
		&self,
		_ctx: &HostContext,
		input: NodeInputs,
	) -> Result<BTreeMap<PortName, PipeData>, RunNodeError> {
		return collect(ConfigKind::Dit, "dit_config", input);
	}
}

#[cfg(test)]
mod tests {
	use reel_piper::data::ConfigValue;

	use super::*;
	use crate::tests::run;

	#[tokio::test]
	async fn defaults_are_kept() {
		let out = run("DITConfig", vec![]).await.unwrap();
		let Some(PipeData::Config { kind, map }) = out.get(&PortName::new("dit_config")) else {
			panic!("missing output");
		};

		assert_eq!(*kind, ConfigKind::Dit);
		assert_eq!(map.len(), 2);
		assert_eq!(map.get("prefix"), Some(&ConfigValue::Text("".into())));
	}
}
