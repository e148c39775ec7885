//! The "leave this unset" marker used by config collector nodes.
//!
//! The host's editor lets users mark any field as "auto" by setting it
//! to [`SENTINEL`]. Auto fields must never override downstream defaults,
//! so we strip them before a mapping leaves its node.

use smartstring::{LazyCompact, SmartString};

use crate::data::{ConfigMap, ConfigValue, PipeData};

/// The reserved "unset" value
pub const SENTINEL: i64 = -99999;

/// Is this value the sentinel?
///
/// A value is the sentinel if its canonical string form is `-99999`.
/// That is `Integer(-99999)`, `Float(-99999.0)`, or `Text("-99999")`.
/// Booleans and lists never are.
pub fn is_sentinel(value: &ConfigValue) -> bool {
	match value {
		ConfigValue::Integer(x) => *x == SENTINEL,
		// Exact comparison, only -99999.0 is the sentinel
		ConfigValue::Float(x) => *x == SENTINEL as f64,
		ConfigValue::Text(x) => x.as_str() == "-99999",
		ConfigValue::Boolean(_) | ConfigValue::List(_) => false,
	}
}

/// Is this scalar pipe data the sentinel?
/// Non-scalar data never is.
pub fn is_sentinel_data(value: &PipeData) -> bool {
	ConfigValue::try_from(value).is_ok_and(|x| is_sentinel(&x))
}

/// Remove every sentinel value from `map`.
/// Every other value is kept as-is.
pub fn filter_sentinels(mut map: ConfigMap) -> ConfigMap {
	map.retain(|_, v| !is_sentinel(v));
	return map;
}

/// Build a filtered [`ConfigMap`] from `(key, value)` pairs
pub fn collect_filtered<I, K>(pairs: I) -> ConfigMap
where
	I: IntoIterator<Item = (K, ConfigValue)>,
	K: Into<SmartString<LazyCompact>>,
{
	return pairs
		.into_iter()
		.filter(|(_, v)| !is_sentinel(v))
		.map(|(k, v)| (k.into(), v))
		.collect();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sentinel_forms() {
		assert!(is_sentinel(&ConfigValue::Integer(-99999)));
		assert!(is_sentinel(&ConfigValue::Float(-99999.0)));
		assert!(is_sentinel(&ConfigValue::Text("-99999".into())));

		assert!(!is_sentinel(&ConfigValue::Integer(-99998)));
		assert!(!is_sentinel(&ConfigValue::Float(-99999.5)));
		assert!(!is_sentinel(&ConfigValue::Text("-99999 ".into())));
		assert!(!is_sentinel(&ConfigValue::Text("".into())));
		assert!(!is_sentinel(&ConfigValue::Boolean(false)));
		assert!(!is_sentinel(&ConfigValue::List(vec![
			ConfigValue::Integer(-99999)
		])));
	}

	#[test]
	fn sentinel_pipe_data() {
		assert!(is_sentinel_data(&PipeData::from(SENTINEL)));
		assert!(is_sentinel_data(&PipeData::text("-99999")));
		assert!(!is_sentinel_data(&PipeData::from(true)));
		assert!(!is_sentinel_data(&PipeData::config(
			crate::data::ConfigKind::Vae,
			ConfigMap::new()
		)));
	}

	#[test]
	fn filter_keeps_everything_else_unchanged() {
		let map = collect_filtered([
			("height", ConfigValue::Integer(-99999)),
			("width", ConfigValue::Integer(1280)),
			("guidance_scale", ConfigValue::Float(1.0)),
			("image_path", ConfigValue::Text("-99999".into())),
			("prefix", ConfigValue::Text("".into())),
			("enable_teacache", ConfigValue::Boolean(false)),
		]);

		assert_eq!(map.len(), 4);
		assert!(!map.contains_key("height"));
		assert!(!map.contains_key("image_path"));
		assert_eq!(map.get("width"), Some(&ConfigValue::Integer(1280)));
		assert_eq!(map.get("guidance_scale"), Some(&ConfigValue::Float(1.0)));
		assert_eq!(map.get("prefix"), Some(&ConfigValue::Text("".into())));
		assert_eq!(
			map.get("enable_teacache"),
			Some(&ConfigValue::Boolean(false))
		);

		// Filtering twice changes nothing
		assert_eq!(filter_sentinels(map.clone()), map);
	}
}
