use async_trait::async_trait;
use image::ImageError;
use reel_piper::{
	base::{Node, NodeDescription, NodeInputSpec, NodeOutputSpec, PortName, RunNodeError},
	data::{PipeData, PipeDataStub},
	helpers::NodeInputs,
	HostContext,
};
use reel_util::{hash_file, MimeType};
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};
use thiserror::Error;
use tracing::debug;

use crate::{
	decode::{decode_frames, with_decode_retry},
	tensor::stack_frames,
};

#[derive(Debug, Error)]
pub enum LoadImageError {
	#[error("could not decode `{path}`")]
	Decode {
		path: PathBuf,
		#[source]
		source: ImageError,
	},

	#[error("`{path}` has no usable frames")]
	NoFrames { path: PathBuf },
}

impl From<LoadImageError> for RunNodeError {
	fn from(value: LoadImageError) -> Self {
		Self::Other(Arc::new(value))
	}
}

/// Load an image from the host's input folder.
///
/// Outputs its resolved path, its frames, and their masks.
pub struct LoadImagePath {}

fn image_name(input: &NodeInputs) -> Result<&str, RunNodeError> {
	match input.get("image") {
		Some(PipeData::Text { value }) => Ok(value.as_str()),
		Some(_) => Err(RunNodeError::BadInputType {
			port: PortName::new("image"),
		}),
		None => Err(RunNodeError::MissingInput {
			port: PortName::new("image"),
		}),
	}
}

#[async_trait]
impl Node for LoadImagePath {
	fn describe(&self, ctx: &HostContext) -> NodeDescription {
		let files = ctx.folders.list_input_files(MimeType::is_image);
		let files: Vec<&str> = files.iter().map(|x| x.as_str()).collect();

		NodeDescription {
			category: crate::CATEGORY,
			inputs: vec![NodeInputSpec::required("image", PipeDataStub::Text)
				.with_text_choices(&files)
				.validated_by_node()],
			outputs: vec![
				NodeOutputSpec::new("image_path", PipeDataStub::Text),
				NodeOutputSpec::new("IMAGE", PipeDataStub::Image),
				NodeOutputSpec::new("MASK", PipeDataStub::Mask),
			],
		}
	}

	async fn validate(&self, ctx: &HostContext, input: &NodeInputs) -> Result<(), RunNodeError> {
		let name = image_name(input)?;
		if !ctx.folders.annotated_exists(name) {
			return Err(RunNodeError::InvalidInput {
				message: format!("Invalid image file: {name}"),
			});
		}

		return Ok(());
	}

	async fn fingerprint(
		&self,
		ctx: &HostContext,
		input: &NodeInputs,
	) -> Result<Option<String>, RunNodeError> {
		let path = ctx.folders.resolve_annotated(image_name(input)?);
		let hash_type = ctx.hash_type;
		let digest = tokio::task::spawn_blocking(move || hash_file(&path, hash_type)).await??;
		return Ok(Some(digest));
	}

	async fn run(
		&self,
		ctx: &HostContext,
		mut input: NodeInputs,
	) -> Result<BTreeMap<PortName, PipeData>, RunNodeError> {
		let name = input.pop_text("image")?;
		input.err_if_not_empty()?;

		let path = ctx.folders.resolve_annotated(&name);
		debug!(message = "Loading image", ?path);

		let (image, mask) = {
			let path = path.clone();
			tokio::task::spawn_blocking(move || {
				let frames = with_decode_retry(|policy| decode_frames(&path, policy))
					.map_err(|source| LoadImageError::Decode {
						path: path.clone(),
						source,
					})?;

				stack_frames(&frames).ok_or(LoadImageError::NoFrames { path })
			})
			.await??
		};

		debug!(
			message = "Loaded image",
			?path,
			shape = ?image.shape(),
			mask_shape = ?mask.shape()
		);

		let mut out = BTreeMap::new();
		out.insert(
			PortName::new("image_path"),
			PipeData::text(&path.to_string_lossy()),
		);
		out.insert(
			PortName::new("IMAGE"),
			PipeData::Image {
				tensor: Arc::new(image),
			},
		);
		out.insert(
			PortName::new("MASK"),
			PipeData::Mask {
				tensor: Arc::new(mask),
			},
		);
		return Ok(out);
	}
}
