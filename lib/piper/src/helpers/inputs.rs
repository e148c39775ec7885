use smartstring::{LazyCompact, SmartString};
use std::{collections::BTreeMap, sync::Arc};

use crate::{
	base::{PortName, RunNodeError},
	data::{ConfigKind, ConfigMap, ConfigValue, PipeData},
};

/// The inputs a node receives, after the dispatcher
/// has filled in defaults and checked types.
#[derive(Debug, Clone, Default)]
pub struct NodeInputs {
	inputs: BTreeMap<PortName, PipeData>,
}

impl From<BTreeMap<PortName, PipeData>> for NodeInputs {
	fn from(value: BTreeMap<PortName, PipeData>) -> Self {
		Self::new(value)
	}
}

impl NodeInputs {
	pub fn new(inputs: BTreeMap<PortName, PipeData>) -> Self {
		Self { inputs }
	}

	pub fn get(&self, port: &str) -> Option<&PipeData> {
		self.inputs.get(&PortName::new(port))
	}

	pub fn len(&self) -> usize {
		self.inputs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inputs.is_empty()
	}

	/// Return `Err(RunNodeError::UnrecognizedInput)` if we still have unhandled inputs.
	/// Otherwise, return `Ok(())`.
	pub fn err_if_not_empty(self) -> Result<(), RunNodeError> {
		if let Some((port, _)) = self.inputs.into_iter().next() {
			return Err(RunNodeError::UnrecognizedInput { port });
		}

		return Ok(());
	}

	/// Remove every remaining scalar input and return it as a config mapping.
	/// This is how collector nodes turn their fields into output.
	pub fn drain_scalars(&mut self) -> Result<Vec<(SmartString<LazyCompact>, ConfigValue)>, RunNodeError> {
		let mut out = Vec::with_capacity(self.inputs.len());
		for (port, data) in std::mem::take(&mut self.inputs) {
			match ConfigValue::try_from(&data) {
				Ok(v) => out.push((port.id().clone(), v)),
				Err(_) => return Err(RunNodeError::BadInputType { port }),
			}
		}
		return Ok(out);
	}
}

impl NodeInputs {
	/// Remove an input, or return `None` if it wasn't given.
	/// If the input exists but `extract` rejects it, this is a type error.
	fn pop_opt_with<T>(
		&mut self,
		port: &str,
		extract: impl FnOnce(PipeData) -> Option<T>,
	) -> Result<Option<T>, RunNodeError> {
		let port = PortName::new(port);
		match self.inputs.remove(&port) {
			None => return Ok(None),
			Some(x) => match extract(x) {
				Some(x) => return Ok(Some(x)),
				None => return Err(RunNodeError::BadInputType { port }),
			},
		}
	}

	fn pop_with<T>(
		&mut self,
		port: &str,
		extract: impl FnOnce(PipeData) -> Option<T>,
	) -> Result<T, RunNodeError> {
		match self.pop_opt_with(port, extract)? {
			Some(x) => return Ok(x),
			None => {
				return Err(RunNodeError::MissingInput {
					port: PortName::new(port),
				})
			}
		}
	}

	pub fn pop_opt(&mut self, port: &str) -> Result<Option<PipeData>, RunNodeError> {
		self.pop_opt_with(port, Some)
	}

	pub fn pop_text(&mut self, port: &str) -> Result<SmartString<LazyCompact>, RunNodeError> {
		self.pop_with(port, |x| match x {
			PipeData::Text { value } => Some(value),
			_ => None,
		})
	}

	pub fn pop_int(&mut self, port: &str) -> Result<i64, RunNodeError> {
		self.pop_with(port, |x| match x {
			PipeData::Integer { value } => Some(value),
			_ => None,
		})
	}

	/// Take a config mapping of the given kind.
	/// A mapping of another kind is a type error.
	pub fn pop_opt_config(
		&mut self,
		port: &str,
		want: ConfigKind,
	) -> Result<Option<Arc<ConfigMap>>, RunNodeError> {
		self.pop_opt_with(port, |x| match x {
			PipeData::Config { kind, map } if kind == want => Some(map),
			_ => None,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn inputs(pairs: &[(&str, PipeData)]) -> NodeInputs {
		NodeInputs::new(
			pairs
				.iter()
				.map(|(k, v)| (PortName::new(k), v.clone()))
				.collect(),
		)
	}

	#[test]
	fn pop_checks_types() {
		let mut i = inputs(&[("a", 3i64.into()), ("b", "x".into())]);
		assert!(matches!(
			i.pop_text("a"),
			Err(RunNodeError::BadInputType { .. })
		));
		assert_eq!(i.pop_text("b").unwrap().as_str(), "x");
		assert!(matches!(
			i.pop_int("b"),
			Err(RunNodeError::MissingInput { .. })
		));
		assert!(i.is_empty());
	}

	#[test]
	fn config_kind_must_match() {
		let mut i = inputs(&[(
			"vae_config",
			PipeData::config(ConfigKind::Dit, ConfigMap::new()),
		)]);
		assert!(i.pop_opt_config("vae_config", ConfigKind::Vae).is_err());
	}

	#[test]
	fn leftovers_are_reported() {
		let i = inputs(&[("extra", true.into())]);
		match i.err_if_not_empty() {
			Err(RunNodeError::UnrecognizedInput { port }) => assert_eq!(port.id(), "extra"),
			_ => panic!("expected an unrecognized input error"),
		}
	}

	#[test]
	fn drain_rejects_non_scalars() {
		let mut i = inputs(&[
			("a", 1i64.into()),
			("cfg", PipeData::config(ConfigKind::Vae, ConfigMap::new())),
		]);
		assert!(i.drain_scalars().is_err());

		let mut i = inputs(&[("a", 1i64.into()), ("b", false.into())]);
		let d = i.drain_scalars().unwrap();
		assert_eq!(d.len(), 2);
		assert!(i.is_empty());
	}
}
