use async_trait::async_trait;
use reel_piper::{
	base::{Node, NodeDescription, NodeInputSpec, NodeOutputSpec, PortName, RunNodeError},
	data::{ConfigKind, PipeData, PipeDataStub},
	helpers::NodeInputs,
	HostContext,
};
use std::collections::BTreeMap;

use crate::{collect, CATEGORY};

/// Collect VAE tiling settings
pub struct VaeConfig {}

// MARK: fields

const BOOL_FIELDS: [(&str, bool); 5] = [
	("load_encoder", true),
	("load_decoder", true),
	("use_tiling", true),
	("use_temporal_tiling", true),
	("use_parallel_tiling", true),
];

const INT_FIELDS: [(&str, i64); 7] = [
	("tile_sample_min_height", 256),
	("tile_sample_min_width", 256),
	("tile_sample_min_num_frames", 16),
	("tile_sample_stride_height", 192),
	("tile_sample_stride_width", 192),
	("tile_sample_stride_num_frames", 12),
	("blend_num_frames", 0),
];

// MARK: node

#[async_trait]
impl Node for VaeConfig {
	fn describe(&self, _ctx: &HostContext) -> NodeDescription {
		let mut inputs = Vec::with_capacity(BOOL_FIELDS.len() + INT_FIELDS.len());
		for (name, default) in BOOL_FIELDS {
			inputs.push(NodeInputSpec::optional(name, PipeDataStub::Boolean).with_default(default));
		}
		for (name, default) in INT_FIELDS {
			inputs.push(NodeInputSpec::optional(name, PipeDataStub::Integer).with_default(default));
		}

		NodeDescription {
			category: CATEGORY,
			inputs,
			outputs: vec![NodeOutputSpec::new(
				"vae_config",
				PipeDataStub::Config {
					kind: ConfigKind::Vae,
				},
			)],
		}
	}

	async fn run(
		&self,
		_ctx: &HostContext,
		input: NodeInputs,
	) -> Result<BTreeMap<PortName, PipeData>, RunNodeError> {
		return collect(ConfigKind::Vae, "vae_config", input);
	}
}

#[cfg(test)]
mod tests {
	use reel_piper::{data::ConfigValue, helpers::SENTINEL};

	use super::*;
	use crate::tests::run;

	#[tokio::test]
	async fn auto_fields_fall_through() {
		let out = run(
			"VAEConfig",
			vec![
				("tile_sample_min_height", SENTINEL.into()),
				("tile_sample_stride_width", 128i64.into()),
				("use_tiling", false.into()),
			],
		)
		.await
		.unwrap();

		let Some(PipeData::Config { map, .. }) = out.get(&PortName::new("vae_config")) else {
			panic!("missing output");
		};

		assert!(map.get("tile_sample_min_height").is_none());
		assert_eq!(map.get("tile_sample_stride_width"), Some(&ConfigValue::Integer(128)));
		assert_eq!(map.get("use_tiling"), Some(&ConfigValue::Boolean(false)));
		assert_eq!(map.get("blend_num_frames"), Some(&ConfigValue::Integer(0)));
		assert_eq!(map.len(), BOOL_FIELDS.len() + INT_FIELDS.len() - 1);
	}

	#[tokio::test]
	async fn auto_booleans_fall_through() {
		let out = run(
			"VAEConfig",
			vec![
				("use_tiling", SENTINEL.into()),
				("load_decoder", PipeData::text("-99999")),
				("load_encoder", false.into()),
			],
		)
		.await
		.unwrap();

		let Some(PipeData::Config { map, .. }) = out.get(&PortName::new("vae_config")) else {
			panic!("missing output");
		};

		assert!(map.get("use_tiling").is_none());
		assert!(map.get("load_decoder").is_none());
		assert_eq!(map.get("load_encoder"), Some(&ConfigValue::Boolean(false)));
		assert_eq!(map.len(), BOOL_FIELDS.len() + INT_FIELDS.len() - 2);
	}
}
