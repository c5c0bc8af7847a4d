#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod assets;
pub mod config;
pub mod error;
pub mod hooks;
pub mod manifest;
pub mod models;
pub mod options;
pub mod pattern;
pub mod pipeline;
pub mod tags;

pub use assets::{AssetStore, DirectoryAssets, prune_inlined_assets};
pub use config::PluginConfig;
pub use error::{ConfigError, PhaseError, PluginError, PruneError, RewriteError};
pub use hooks::{HookRegistrar, Host, ScriptExtPlugin, select_registrar};
pub use manifest::{BuildManifest, load_manifest};
pub use models::{Asset, AttrValue, Attributes, BuildContext, Chunk, ChunkRole, Tag, TagGroups, TagKind};
pub use options::{
  AttributeSource, ChunkSelector, CustomAttributeGroup, HintOptions, HintRelation, Options,
  ScriptAttribute,
};
pub use pattern::{Matcher, PatternSet, matches};
pub use pipeline::{Phase, PipelineController};
