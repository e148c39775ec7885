use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::{
	fmt::Write,
	fs::File,
	io::{BufReader, Read},
	path::Path,
};

/// The types of hashes we support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum HashType {
	MD5,
	#[default]
	SHA256,
	SHA512,
}

/// An in-progress hash of some data
pub enum HashComputer {
	MD5 { context: md5::Context },
	SHA256 { hasher: Sha256 },
	SHA512 { hasher: Sha512 },
}

impl HashComputer {
	pub fn new(hash_type: HashType) -> Self {
		match hash_type {
			HashType::MD5 => Self::MD5 {
				context: md5::Context::new(),
			},
			HashType::SHA256 => Self::SHA256 {
				hasher: Sha256::new(),
			},
			HashType::SHA512 => Self::SHA512 {
				hasher: Sha512::new(),
			},
		}
	}

	pub fn update(&mut self, data: &mut dyn Read) -> Result<(), std::io::Error> {
		match self {
			Self::MD5 { context } => {
				std::io::copy(data, context)?;
			}
			Self::SHA256 { hasher } => {
				std::io::copy(data, hasher)?;
			}
			Self::SHA512 { hasher } => {
				std::io::copy(data, hasher)?;
			}
		}

		return Ok(());
	}

	pub fn hash_type(&self) -> HashType {
		match self {
			Self::MD5 { .. } => HashType::MD5,
			Self::SHA256 { .. } => HashType::SHA256,
			Self::SHA512 { .. } => HashType::SHA512,
		}
	}

	/// Finish this hash and return its lowercase hex digest
	pub fn finish_hex(self) -> String {
		let data = match self {
			Self::MD5 { context } => context.compute().to_vec(),
			Self::SHA256 { hasher } => hasher.finalize().to_vec(),
			Self::SHA512 { hasher } => hasher.finalize().to_vec(),
		};

		let mut out = String::with_capacity(data.len() * 2);
		for b in data {
			// Writing to a `String` never fails
			let _ = write!(out, "{b:02x}");
		}
		return out;
	}
}

/// Hash the full content of the file at `path`
pub fn hash_file(path: &Path, hash_type: HashType) -> Result<String, std::io::Error> {
	let mut hasher = HashComputer::new(hash_type);
	let mut r = BufReader::new(File::open(path)?);
	hasher.update(&mut r)?;
	return Ok(hasher.finish_hex());
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_digests() {
		let mut h = HashComputer::new(HashType::SHA256);
		h.update(&mut "abc".as_bytes()).unwrap();
		assert_eq!(
			h.finish_hex(),
			"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
		);

		let mut h = HashComputer::new(HashType::MD5);
		h.update(&mut "abc".as_bytes()).unwrap();
		assert_eq!(h.finish_hex(), "900150983cd24fb0d6963f7d28e17f72");
	}

	#[test]
	fn hash_type_survives() {
		for t in [HashType::MD5, HashType::SHA256, HashType::SHA512] {
			assert_eq!(HashComputer::new(t).hash_type(), t);
		}
	}
}
