use smartstring::{LazyCompact, SmartString};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use super::{Node, NodeDescription, NodeInputSpec, PortName, RegisterNodeError, RunNodeError};
use crate::{
	data::{PipeData, PipeDataStub},
	helpers::{is_sentinel_data, NodeInputs},
	HostContext,
};

// This type must be send + sync, since we use this inside tokio's async runtime.
type NodeInitFnType = Box<dyn Fn() -> Box<dyn Node> + Send + Sync>;

/// A node type we've registered inside a [`NodeDispatcher`]
struct RegisteredNode {
	/// The name the host shows users
	display_name: SmartString<LazyCompact>,

	/// A method that constructs a new node of this type
	node_init: NodeInitFnType,
}

/// One row of the registration table
#[derive(Debug, Clone)]
pub struct RegisteredNodeInfo {
	pub type_name: SmartString<LazyCompact>,
	pub display_name: SmartString<LazyCompact>,
	pub description: NodeDescription,
}

/// A factory struct that constructs and runs graph nodes
pub struct NodeDispatcher {
	nodes: BTreeMap<SmartString<LazyCompact>, RegisteredNode>,
}

impl NodeDispatcher {
	/// Create a new [`NodeDispatcher`]
	pub fn new() -> Self {
		return Self {
			nodes: BTreeMap::new(),
		};
	}

	/// Register a new node type.
	///
	/// - `type_name` must be a new node type, we'll return an error if it already exists.
	/// - `display_name` is the name the host shows users.
	/// - `node_init` is a method that constructs a new node of the given type.
	pub fn register_node(
		&mut self,
		type_name: &str,
		display_name: &str,
		node_init: NodeInitFnType,
	) -> Result<(), RegisterNodeError> {
		if self.nodes.contains_key(type_name) {
			return Err(RegisterNodeError::AlreadyExists);
		}

		self.nodes.insert(
			type_name.into(),
			RegisteredNode {
				display_name: display_name.into(),
				node_init,
			},
		);

		return Ok(());
	}

	pub fn display_name(&self, node_type: &str) -> Option<&str> {
		self.nodes.get(node_type).map(|x| x.display_name.as_str())
	}

	pub fn init_node(&self, node_type: &str) -> Option<Box<dyn Node>> {
		if let Some(node) = self.nodes.get(node_type) {
			return Some((node.node_init)());
		} else {
			return None;
		}
	}

	/// Describe every registered node, sorted by type name
	pub fn list_nodes(&self, ctx: &HostContext) -> Vec<RegisteredNodeInfo> {
		self.nodes
			.iter()
			.map(|(type_name, node)| RegisteredNodeInfo {
				type_name: type_name.clone(),
				display_name: node.display_name.clone(),
				description: (node.node_init)().describe(ctx),
			})
			.collect()
	}

	fn get_node(&self, node_type: &str) -> Result<Box<dyn Node>, RunNodeError> {
		self.init_node(node_type)
			.ok_or_else(|| RunNodeError::UnknownNodeType {
				node_type: node_type.into(),
			})
	}

	/// Validate and run one node.
	pub async fn run_node(
		&self,
		node_type: &str,
		ctx: &HostContext,
		input: BTreeMap<PortName, PipeData>,
	) -> Result<BTreeMap<PortName, PipeData>, RunNodeError> {
		let node = self.get_node(node_type)?;
		let input = prepare_inputs(&node.describe(ctx), input)?;

		trace!(message = "Validating node", node_type);
		node.validate(ctx, &input).await?;

		debug!(message = "Running node", node_type, n_inputs = input.len());
		return node.run(ctx, input).await;
	}

	/// Compute a node's change-detection fingerprint
	pub async fn fingerprint_node(
		&self,
		node_type: &str,
		ctx: &HostContext,
		input: BTreeMap<PortName, PipeData>,
	) -> Result<Option<String>, RunNodeError> {
		let node = self.get_node(node_type)?;
		let input = prepare_inputs(&node.describe(ctx), input)?;
		return node.fingerprint(ctx, &input).await;
	}
}

/// Check `input` against `description` and fill in defaults.
pub fn prepare_inputs(
	description: &NodeDescription,
	mut input: BTreeMap<PortName, PipeData>,
) -> Result<NodeInputs, RunNodeError> {
	let mut out = BTreeMap::new();

	for spec in &description.inputs {
		let value = match input.remove(&spec.name) {
			Some(x) => check_input(spec, x)?,
			None => match &spec.default {
				Some(x) => x.clone(),
				None if spec.is_optional => continue,
				None => {
					return Err(RunNodeError::MissingInput {
						port: spec.name.clone(),
					})
				}
			},
		};

		out.insert(spec.name.clone(), value);
	}

	if let Some((port, _)) = input.pop_first() {
		return Err(RunNodeError::UnrecognizedInput { port });
	}

	return Ok(NodeInputs::new(out));
}

fn check_input(spec: &NodeInputSpec, value: PipeData) -> Result<PipeData, RunNodeError> {
	// An optional scalar set to "auto" skips every check.
	// The node drops it before its fields reach a config.
	let scalar = matches!(
		spec.data_type,
		PipeDataStub::Text | PipeDataStub::Integer | PipeDataStub::Float | PipeDataStub::Boolean
	);
	if spec.is_optional && scalar && is_sentinel_data(&value) {
		trace!(message = "Input is unset", port = ?spec.name);
		return Ok(value);
	}

	// Integers may be given to float inputs
	let value = match (spec.data_type, value) {
		(PipeDataStub::Float, PipeData::Integer { value }) => PipeData::Float {
			value: value as f64,
		},
		(_, x) => x,
	};

	if value.as_stub() != spec.data_type {
		return Err(RunNodeError::BadInputType {
			port: spec.name.clone(),
		});
	}

	if let (Some((min, max)), PipeData::Integer { value }) = (spec.range, &value) {
		if *value < min || *value > max {
			return Err(RunNodeError::InputOutOfRange {
				port: spec.name.clone(),
				value: *value,
				min,
				max,
			});
		}
	}

	if let Some(choices) = spec.choices.as_ref().filter(|_| !spec.node_validated) {
		if !choices.contains(&value) {
			return Err(RunNodeError::InvalidChoice {
				port: spec.name.clone(),
			});
		}
	}

	return Ok(value);
}

#[cfg(test)]
mod tests {
	use async_trait::async_trait;
	use std::sync::Arc;

	use super::*;
	use crate::{
		base::NodeOutputSpec,
		helpers::{HostFolders, SENTINEL},
		InterruptFlag,
	};

	struct Echo {}

	#[async_trait]
	impl Node for Echo {
		fn describe(&self, _ctx: &HostContext) -> NodeDescription {
			NodeDescription {
				category: "test",
				inputs: vec![
					NodeInputSpec::required("text", PipeDataStub::Text),
					NodeInputSpec::optional("gpus", PipeDataStub::Integer)
						.with_default(2i64)
						.with_range(1, 16),
					NodeInputSpec::optional("precision", PipeDataStub::Text)
						.with_text_choices(&["fp16", "bf16"]),
					NodeInputSpec::optional("scale", PipeDataStub::Float),
					NodeInputSpec::optional("tiling", PipeDataStub::Boolean).with_default(true),
					NodeInputSpec::optional("file", PipeDataStub::Text)
						.with_text_choices(&["a.png"])
						.validated_by_node(),
				],
				outputs: vec![NodeOutputSpec::new("out", PipeDataStub::Text)],
			}
		}

		async fn run(
			&self,
			_ctx: &HostContext,
			mut input: NodeInputs,
		) -> Result<BTreeMap<PortName, PipeData>, RunNodeError> {
			let text = input.pop_text("text")?;
			let gpus = input.pop_int("gpus")?;
			let mut out = BTreeMap::new();
			out.insert(PortName::new("out"), PipeData::text(&format!("{text}{gpus}")));
			return Ok(out);
		}
	}

	fn ctx() -> HostContext {
		HostContext {
			interrupt: Arc::new(InterruptFlag::new()),
			folders: HostFolders {
				input: "/in".into(),
				output: "/out".into(),
				temp: "/tmp".into(),
			},
			hash_type: Default::default(),
		}
	}

	fn dispatcher() -> NodeDispatcher {
		let mut d = NodeDispatcher::new();
		d.register_node("Echo", "Echo Node", Box::new(|| Box::new(Echo {})))
			.unwrap();
		return d;
	}

	fn input(pairs: Vec<(&str, PipeData)>) -> BTreeMap<PortName, PipeData> {
		pairs.into_iter().map(|(k, v)| (PortName::new(k), v)).collect()
	}

	#[test]
	fn duplicate_registration_fails() {
		let mut d = dispatcher();
		assert!(matches!(
			d.register_node("Echo", "Again", Box::new(|| Box::new(Echo {}))),
			Err(RegisterNodeError::AlreadyExists)
		));
		assert_eq!(d.display_name("Echo"), Some("Echo Node"));
		assert_eq!(d.list_nodes(&ctx()).len(), 1);
	}

	#[tokio::test]
	async fn defaults_are_filled() {
		let out = dispatcher()
			.run_node("Echo", &ctx(), input(vec![("text", "gpu".into())]))
			.await
			.unwrap();
		assert_eq!(out.get(&PortName::new("out")), Some(&PipeData::text("gpu2")));
	}

	#[tokio::test]
	async fn inputs_are_checked() {
		let d = dispatcher();
		let c = ctx();

		let r = d.run_node("Echo", &c, input(vec![])).await;
		assert!(matches!(r, Err(RunNodeError::MissingInput { .. })));

		let r = d
			.run_node("Echo", &c, input(vec![("text", "a".into()), ("gpus", 17i64.into())]))
			.await;
		assert!(matches!(r, Err(RunNodeError::InputOutOfRange { value: 17, .. })));

		let r = d
			.run_node(
				"Echo",
				&c,
				input(vec![("text", "a".into()), ("precision", "fp8".into())]),
			)
			.await;
		assert!(matches!(r, Err(RunNodeError::InvalidChoice { .. })));

		let r = d
			.run_node("Echo", &c, input(vec![("text", "a".into()), ("bogus", 1i64.into())]))
			.await;
		assert!(matches!(r, Err(RunNodeError::UnrecognizedInput { .. })));

		let r = d.run_node("Nope", &c, input(vec![])).await;
		assert!(matches!(r, Err(RunNodeError::UnknownNodeType { .. })));
	}

	#[test]
	fn integers_widen_to_floats() {
		let desc = Echo {}.describe(&ctx());
		let i = prepare_inputs(&desc, input(vec![("text", "a".into()), ("scale", 6i64.into())]))
			.unwrap();
		assert_eq!(i.get("scale"), Some(&PipeData::Float { value: 6.0 }));
		assert!(i.get("precision").is_none());
	}

	#[test]
	fn unset_optional_inputs_skip_checks() {
		let desc = Echo {}.describe(&ctx());
		let i = prepare_inputs(
			&desc,
			input(vec![
				("text", "a".into()),
				("precision", "-99999".into()),
				("tiling", PipeData::from(SENTINEL)),
				("gpus", PipeData::from(SENTINEL)),
				("scale", PipeData::from(SENTINEL)),
			]),
		)
		.unwrap();
		assert_eq!(i.get("precision"), Some(&PipeData::text("-99999")));
		assert_eq!(i.get("tiling"), Some(&PipeData::from(SENTINEL)));
		assert_eq!(i.get("gpus"), Some(&PipeData::from(SENTINEL)));
		assert_eq!(i.get("scale"), Some(&PipeData::from(SENTINEL)));

		// Required inputs are still checked
		let r = prepare_inputs(&desc, input(vec![("text", PipeData::from(SENTINEL))]));
		assert!(matches!(r, Err(RunNodeError::BadInputType { .. })));

		// So is anything that isn't the sentinel
		let r = prepare_inputs(
			&desc,
			input(vec![("text", "a".into()), ("tiling", PipeData::from(-1i64))]),
		);
		assert!(matches!(r, Err(RunNodeError::BadInputType { .. })));
	}

	#[test]
	fn node_validated_inputs_skip_choices() {
		let desc = Echo {}.describe(&ctx());
		let i = prepare_inputs(
			&desc,
			input(vec![("text", "a".into()), ("file", "b.png [output]".into())]),
		)
		.unwrap();
		assert_eq!(i.get("file"), Some(&PipeData::text("b.png [output]")));

		// The type is still checked
		let r = prepare_inputs(
			&desc,
			input(vec![("text", "a".into()), ("file", PipeData::from(true))]),
		);
		assert!(matches!(r, Err(RunNodeError::BadInputType { .. })));
	}
}
