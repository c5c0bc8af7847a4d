//! Loading the on-disk description of a document's tags and the build's chunk graph.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{BuildContext, Chunk, Tag, TagGroups};

/// Deserialised build manifest consumed by the command-line front end.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
  /// Prefix the host prepends to asset URLs.
  #[serde(default)]
  pub public_path: Option<String>,
  /// Whether asset URLs carry a `?hash` query.
  #[serde(default)]
  pub hash: bool,
  /// Tags destined for `<head>`.
  #[serde(default)]
  pub head: Vec<Tag>,
  /// Tags destined for `<body>`.
  #[serde(default)]
  pub body: Vec<Tag>,
  /// Chunks produced by the build.
  #[serde(default)]
  pub chunks: Vec<Chunk>,
}

impl BuildManifest {
  /// Option context for the document described by the manifest.
  pub fn context(&self) -> BuildContext {
    BuildContext {
      public_path: self.public_path.clone(),
      hash: self.hash,
    }
  }

  /// Split into the document's tag groups and the chunk graph.
  pub fn into_parts(self) -> (TagGroups, Vec<Chunk>) {
    (
      TagGroups {
        head: self.head,
        body: self.body,
      },
      self.chunks,
    )
  }
}

/// Load a build manifest from disk.
pub fn load_manifest(path: &Path) -> Result<BuildManifest> {
  let content = fs::read_to_string(path)
    .with_context(|| format!("build manifest not found at {}", path.display()))?;
  let manifest: BuildManifest =
    serde_json::from_str(&content).context("failed to parse build manifest JSON")?;
  Ok(manifest)
}
