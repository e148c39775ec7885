//! A job is a list of node invocations, run in order.
//!
//! ```json
//! [
//!   { "id": "vae", "node_type": "VAEConfig", "inputs": { "load_encoder": false } },
//!   {
//!     "id": "gen",
//!     "node_type": "VideoGenerator",
//!     "inputs": { "prompt": "a cat", "vae_config": { "link": ["vae", "vae_config"] } }
//!   }
//! ]
//! ```

use reel_piper::{
	base::{NodeDescription, NodeDispatcher, PortName, RunNodeError},
	data::{ConfigValue, PipeData},
	HostContext,
};
use serde::Deserialize;
use smartstring::{LazyCompact, SmartString};
use std::{collections::BTreeMap, path::Path};
use thiserror::Error;
use tracing::{debug, info};

/// One node invocation in a job
#[derive(Debug, Deserialize)]
pub struct JobStep {
	/// A unique name for this step. Later steps use it to link to our outputs.
	pub id: SmartString<LazyCompact>,

	/// The registered type of the node to run
	pub node_type: SmartString<LazyCompact>,

	#[serde(default)]
	pub inputs: BTreeMap<SmartString<LazyCompact>, JobInput>,
}

/// The value of one node input
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum JobInput {
	/// An output of an earlier step, as `(step id, port)`
	Link {
		link: (SmartString<LazyCompact>, SmartString<LazyCompact>),
	},

	/// A scalar value
	Literal(serde_json::Value),
}

#[derive(Debug, Error)]
pub enum JobError {
	#[error("could not read job file")]
	Io(#[from] std::io::Error),

	#[error("could not parse job file")]
	Parse(#[from] serde_json::Error),

	#[error("step id `{id}` is used twice")]
	DuplicateStep { id: SmartString<LazyCompact> },

	#[error("step `{step}` links to `{target}.{port}`, which does not exist")]
	UnknownLink {
		step: SmartString<LazyCompact>,
		target: SmartString<LazyCompact>,
		port: SmartString<LazyCompact>,
	},

	#[error("step `{step}` has a bad value on input `{port}`")]
	BadLiteral {
		step: SmartString<LazyCompact>,
		port: SmartString<LazyCompact>,
	},

	#[error("step `{step}` failed")]
	Node {
		step: SmartString<LazyCompact>,
		#[source]
		source: RunNodeError,
	},

	#[error("job was interrupted before step `{step}`")]
	Interrupted { step: SmartString<LazyCompact> },
}

/// The outputs of every step that ran, by step id
pub type JobOutputs = BTreeMap<SmartString<LazyCompact>, BTreeMap<PortName, PipeData>>;

pub fn load_job(path: &Path) -> Result<Vec<JobStep>, JobError> {
	let text = std::fs::read_to_string(path)?;
	return Ok(serde_json::from_str(&text)?);
}

fn literal(value: &serde_json::Value) -> Option<PipeData> {
	return Some(match value {
		serde_json::Value::Bool(value) => PipeData::from(*value),
		serde_json::Value::String(value) => PipeData::text(value),
		serde_json::Value::Number(n) => match n.as_i64() {
			Some(value) => PipeData::from(value),
			None => PipeData::from(n.as_f64()?),
		},
		_ => return None,
	});
}

/// Run every step in `steps`, in order.
/// Stops at the first failure, or as soon as the host is interrupted.
pub async fn run_job(
	dispatcher: &NodeDispatcher,
	ctx: &HostContext,
	steps: Vec<JobStep>,
) -> Result<JobOutputs, JobError> {
	let mut outputs = JobOutputs::new();

	for step in steps {
		if outputs.contains_key(&step.id) {
			return Err(JobError::DuplicateStep { id: step.id });
		}

		if ctx.interrupt.processing_interrupted() {
			return Err(JobError::Interrupted { step: step.id });
		}

		let mut input = BTreeMap::new();
		for (port, value) in step.inputs {
			let data = match value {
				JobInput::Link {
					link: (target, out_port),
				} => outputs
					.get(&target)
					.and_then(|x| x.get(&PortName::new(&out_port)))
					.cloned()
					.ok_or_else(|| JobError::UnknownLink {
						step: step.id.clone(),
						target,
						port: out_port,
					})?,

				JobInput::Literal(value) => literal(&value).ok_or_else(|| JobError::BadLiteral {
					step: step.id.clone(),
					port: port.clone(),
				})?,
			};
			input.insert(PortName::new(&port), data);
		}

		info!(message = "Running step", step = ?step.id, node_type = ?step.node_type);
		let out = dispatcher
			.run_node(&step.node_type, ctx, input)
			.await
			.map_err(|source| JobError::Node {
				step: step.id.clone(),
				source,
			})?;
		debug!(message = "Step finished", step = ?step.id, n_outputs = out.len());

		outputs.insert(step.id, out);
	}

	return Ok(outputs);
}

//
// MARK: Display
//

fn config_value_json(value: &ConfigValue) -> serde_json::Value {
	match value {
		ConfigValue::Boolean(x) => serde_json::Value::from(*x),
		ConfigValue::Integer(x) => serde_json::Value::from(*x),
		ConfigValue::Float(x) => serde_json::Value::from(*x),
		ConfigValue::Text(x) => serde_json::Value::from(x.as_str()),
		ConfigValue::List(x) => x.iter().map(config_value_json).collect(),
	}
}

/// A json summary of `value`.
/// Tensors are summarized by their shape.
pub fn describe_value(value: &PipeData) -> serde_json::Value {
	match value {
		PipeData::Text { value } => serde_json::Value::from(value.as_str()),
		PipeData::Integer { value } => serde_json::Value::from(*value),
		PipeData::Float { value } => serde_json::Value::from(*value),
		PipeData::Boolean { value } => serde_json::Value::from(*value),
		PipeData::Config { kind, map } => serde_json::json!({
			"type": kind.type_name(),
			"values": map
				.iter()
				.map(|(k, v)| (k.to_string(), config_value_json(v)))
				.collect::<serde_json::Map<_, _>>(),
		}),
		PipeData::Image { tensor } => serde_json::json!({ "type": "IMAGE", "shape": tensor.shape() }),
		PipeData::Mask { tensor } => serde_json::json!({ "type": "MASK", "shape": tensor.shape() }),
	}
}

/// A json summary of a node's ports, in the host's type names
pub fn describe_node(display_name: &str, description: &NodeDescription) -> serde_json::Value {
	let inputs: Vec<serde_json::Value> = description
		.inputs
		.iter()
		.map(|x| {
			serde_json::json!({
				"name": x.name.id().as_str(),
				"type": x.data_type.type_name(),
				"optional": x.is_optional,
				"default": x.default.as_ref().map(describe_value),
				"range": x.range,
				"choices": x
					.choices
					.as_ref()
					.map(|c| c.iter().map(describe_value).collect::<Vec<_>>()),
				"multiline": x.multiline,
			})
		})
		.collect();

	let outputs: Vec<serde_json::Value> = description
		.outputs
		.iter()
		.map(|x| serde_json::json!({ "name": x.name.id().as_str(), "type": x.data_type.type_name() }))
		.collect();

	return serde_json::json!({
		"display_name": display_name,
		"category": description.category,
		"inputs": inputs,
		"outputs": outputs,
	});
}
