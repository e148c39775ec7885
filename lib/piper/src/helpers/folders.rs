use reel_util::MimeType;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Which host folder an annotated file name points into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderKind {
	Input,
	Output,
	Temp,
}

/// The folders the host reads and writes files in
#[derive(Debug, Clone)]
pub struct HostFolders {
	pub input: PathBuf,
	pub output: PathBuf,
	pub temp: PathBuf,
}

impl HostFolders {
	/// Split a name like `cat.png [output]` into `("cat.png", Some(Output))`.
	/// Names without an annotation return `None`.
	pub fn split_annotation(name: &str) -> (&str, Option<FolderKind>) {
		for (suffix, kind) in [
			("[input]", FolderKind::Input),
			("[output]", FolderKind::Output),
			("[temp]", FolderKind::Temp),
		] {
			if let Some(stripped) = name.strip_suffix(suffix) {
				return (stripped.trim_end(), Some(kind));
			}
		}

		return (name, None);
	}

	pub fn folder(&self, kind: FolderKind) -> &Path {
		match kind {
			FolderKind::Input => &self.input,
			FolderKind::Output => &self.output,
			FolderKind::Temp => &self.temp,
		}
	}

	/// Resolve an annotated file name to a path.
	/// Unannotated names live in the input folder.
	pub fn resolve_annotated(&self, name: &str) -> PathBuf {
		let (name, kind) = Self::split_annotation(name);
		return self.folder(kind.unwrap_or(FolderKind::Input)).join(name);
	}

	pub fn annotated_exists(&self, name: &str) -> bool {
		self.resolve_annotated(name).is_file()
	}

	/// List the files in the input folder whose type passes `filter`.
	/// Returns file names, sorted.
	pub fn list_input_files(&self, filter: impl Fn(&MimeType) -> bool) -> Vec<String> {
		let entries = match std::fs::read_dir(&self.input) {
			Ok(x) => x,
			Err(error) => {
				warn!(
					message = "Could not list input folder",
					folder = ?self.input,
					?error
				);
				return Vec::new();
			}
		};

		let mut out: Vec<String> = entries
			.filter_map(|e| e.ok())
			.filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
			.filter(|e| MimeType::from_path(&e.path()).is_some_and(|m| filter(&m)))
			.filter_map(|e| e.file_name().into_string().ok())
			.collect();

		out.sort();
		return out;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn folders(root: &Path) -> HostFolders {
		HostFolders {
			input: root.join("input"),
			output: root.join("output"),
			temp: root.join("temp"),
		}
	}

	#[test]
	fn annotations() {
		assert_eq!(
			HostFolders::split_annotation("a.png [output]"),
			("a.png", Some(FolderKind::Output))
		);
		assert_eq!(
			HostFolders::split_annotation("a.png[temp]"),
			("a.png", Some(FolderKind::Temp))
		);
		assert_eq!(HostFolders::split_annotation("a.png"), ("a.png", None));

		let f = folders(Path::new("/host"));
		assert_eq!(f.resolve_annotated("a.png"), Path::new("/host/input/a.png"));
		assert_eq!(
			f.resolve_annotated("a.png [temp]"),
			Path::new("/host/temp/a.png")
		);
	}

	#[test]
	fn lists_only_images() {
		let dir = tempfile::tempdir().unwrap();
		let f = folders(dir.path());
		std::fs::create_dir_all(&f.input).unwrap();
		for name in ["b.png", "a.JPG", "notes.txt", "clip.mp4"] {
			std::fs::write(f.input.join(name), b"x").unwrap();
		}
		std::fs::create_dir_all(f.input.join("dir.png")).unwrap();

		assert_eq!(f.list_input_files(MimeType::is_image), vec!["a.JPG", "b.png"]);
		assert!(f.annotated_exists("b.png"));
		assert!(!f.annotated_exists("dir.png"));
	}
}
