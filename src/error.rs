//! Error types reported by the tag rewriting and pruning phases.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::Phase;

/// Errors raised while loading or normalising a plugin configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// Failed to read the configuration file from disk.
  #[error("failed to read {}", .path.display())]
  Io {
    /// Path that caused the error.
    path: PathBuf,
    /// Source I/O error.
    #[source]
    source: std::io::Error,
  },
  /// Failed to parse a JSON configuration file.
  #[error("failed to parse {}", .path.display())]
  Json {
    /// Path that caused the error.
    path: PathBuf,
    /// Source parse error.
    #[source]
    source: serde_json::Error,
  },
  /// Failed to parse a YAML configuration file.
  #[error("failed to parse {}", .path.display())]
  Yaml {
    /// Path that caused the error.
    path: PathBuf,
    /// Source parse error.
    #[source]
    source: serde_yaml::Error,
  },
  /// A `regex` matcher did not compile.
  #[error("invalid pattern for `{option}`")]
  InvalidRegex {
    /// Option the pattern belongs to.
    option: String,
    /// Source regex error.
    #[source]
    source: regex::Error,
  },
}

/// Errors raised while rewriting a document's tag groups.
#[derive(Debug, Error)]
pub enum RewriteError {
  /// The asset selected for inlining is not valid UTF-8.
  #[error("asset `{name}` cannot be inlined: content is not valid UTF-8")]
  InvalidUtf8 {
    /// Asset name.
    name: String,
  },
  /// A tag is missing the attribute that identifies it.
  #[error("malformed <{tag}> element: {reason}")]
  MalformedTag {
    /// Tag name of the offending element.
    tag: &'static str,
    /// Human readable description.
    reason: String,
  },
}

/// Errors raised while deleting inlined assets from the output asset map.
#[derive(Debug, Error)]
pub enum PruneError {
  /// The asset was listed but no longer present when removal was attempted.
  #[error("asset `{0}` disappeared before it could be removed")]
  Missing(String),
  /// Removing the backing file failed.
  #[error("failed to remove asset `{name}` at {}", .path.display())]
  Io {
    /// Asset name.
    name: String,
    /// File backing the asset.
    path: PathBuf,
    /// Source I/O error.
    #[source]
    source: std::io::Error,
  },
}

/// A phase was entered out of order for the current build.
#[derive(Debug, Error)]
#[error("cannot run {requested} while the build is in {current:?}")]
pub struct PhaseError {
  /// Name of the operation that was attempted.
  pub requested: &'static str,
  /// Phase the controller was in.
  pub current: Phase,
}

/// Umbrella error surfaced to the host pipeline.
#[derive(Debug, Error)]
pub enum PluginError {
  /// Tag alteration failed for one document.
  #[error("script-ext: tag alteration failed")]
  Rewrite(#[from] RewriteError),
  /// Removing inlined assets failed.
  #[error("script-ext: asset emission failed")]
  Prune(#[from] PruneError),
  /// Hooks were invoked out of order.
  #[error("script-ext: {0}")]
  Phase(#[from] PhaseError),
}
