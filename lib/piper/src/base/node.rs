use async_trait::async_trait;
use std::collections::BTreeMap;

use super::{NodeDescription, PortName, RunNodeError};
use crate::{data::PipeData, helpers::NodeInputs, HostContext};

#[async_trait]
pub trait Node: Sync + Send {
	/// Describe this node's inputs and outputs.
	///
	/// This may depend on the host's state
	/// (e.g, a file picker lists the files that exist right now).
	fn describe(&self, ctx: &HostContext) -> NodeDescription;

	/// Check inputs before running.
	/// Returning an error here means this node won't run.
	async fn validate(&self, _ctx: &HostContext, _input: &NodeInputs) -> Result<(), RunNodeError> {
		return Ok(());
	}

	/// A value that changes whenever this node's output would change
	/// for the same inputs. The host re-runs a node when this changes.
	///
	/// `None` means "only the inputs matter".
	async fn fingerprint(
		&self,
		_ctx: &HostContext,
		_input: &NodeInputs,
	) -> Result<Option<String>, RunNodeError> {
		return Ok(None);
	}

	/// Run this node.
	///
	/// `input` contains every declared input that was given or has a default.
	/// Optional inputs without a default may be missing.
	async fn run(
		&self,
		ctx: &HostContext,
		input: NodeInputs,
	) -> Result<BTreeMap<PortName, PipeData>, RunNodeError>;
}
