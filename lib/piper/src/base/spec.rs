use super::PortName;
use crate::data::{PipeData, PipeDataStub};

/// A description of one input a node accepts
#[derive(Debug, Clone)]
pub struct NodeInputSpec {
	pub name: PortName,

	/// The type of data this input takes
	pub data_type: PipeDataStub,

	/// If true, this input may be left unconnected
	pub is_optional: bool,

	/// The value we use if this input is not given
	pub default: Option<PipeData>,

	/// Inclusive bounds for integer inputs
	pub range: Option<(i64, i64)>,

	/// If set, this input only accepts one of these values
	pub choices: Option<Vec<PipeData>>,

	/// A hint for the host's editor. Has no effect on validation.
	pub multiline: bool,

	/// If true, `choices` only populate the host's editor.
	/// The node's own `validate` decides what is accepted.
	pub node_validated: bool,
}

impl NodeInputSpec {
	pub fn required(name: &str, data_type: PipeDataStub) -> Self {
		Self {
			name: PortName::new(name),
			data_type,
			is_optional: false,
			default: None,
			range: None,
			choices: None,
			multiline: false,
			node_validated: false,
		}
	}

	pub fn optional(name: &str, data_type: PipeDataStub) -> Self {
		Self {
			is_optional: true,
			..Self::required(name, data_type)
		}
	}

	pub fn with_default(mut self, default: impl Into<PipeData>) -> Self {
		self.default = Some(default.into());
		self
	}

	pub fn with_range(mut self, min: i64, max: i64) -> Self {
		self.range = Some((min, max));
		self
	}

	/// Restrict this input to a fixed set of text values
	pub fn with_text_choices(mut self, choices: &[&str]) -> Self {
		self.choices = Some(choices.iter().map(|x| PipeData::text(x)).collect());
		self
	}

	pub fn multiline(mut self) -> Self {
		self.multiline = true;
		self
	}

	/// Skip the dispatcher's choice check for this input
	pub fn validated_by_node(mut self) -> Self {
		self.node_validated = true;
		self
	}
}

/// A description of one output a node produces
#[derive(Debug, Clone)]
pub struct NodeOutputSpec {
	pub name: PortName,
	pub data_type: PipeDataStub,
}

impl NodeOutputSpec {
	pub fn new(name: &str, data_type: PipeDataStub) -> Self {
		Self {
			name: PortName::new(name),
			data_type,
		}
	}
}

/// Everything the host needs to know to draw and wire a node
#[derive(Debug, Clone)]
pub struct NodeDescription {
	/// The menu this node lives in
	pub category: &'static str,

	pub inputs: Vec<NodeInputSpec>,
	pub outputs: Vec<NodeOutputSpec>,
}
