//! Per-build orchestration of tag alteration and asset emission.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{Dispatch, debug, warn};

use crate::assets::{AssetStore, prune_inlined_assets};
use crate::error::{PhaseError, PluginError, RewriteError};
use crate::models::{BuildContext, Chunk, Tag, TagGroups};
use crate::options::Options;
use crate::tags::hints::resource_hints;
use crate::tags::{apply_custom_attributes, rewrite_elements};

/// Phase of the current build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  /// No hook has run since the build started.
  Idle,
  /// At least one document has been rewritten.
  TagAlteration,
  /// Assets have been finalised; terminal for the build.
  AssetEmission,
}

/// Runs the rewriting steps in their fixed order and guards the phase sequence.
#[derive(Debug)]
pub struct PipelineController {
  options: Arc<Options>,
  logger: Option<Dispatch>,
  phase: Phase,
  unresolved: BTreeSet<String>,
}

impl PipelineController {
  /// Create a controller for one plugin instance.
  pub fn new(options: Arc<Options>) -> Self {
    Self {
      options,
      logger: None,
      phase: Phase::Idle,
      unresolved: BTreeSet::new(),
    }
  }

  /// Route this controller's diagnostics to a specific subscriber.
  pub fn with_logger(mut self, logger: Dispatch) -> Self {
    self.logger = Some(logger);
    self
  }

  /// Options the controller was built with.
  pub fn options(&self) -> &Options {
    &self.options
  }

  /// Current phase.
  pub fn phase(&self) -> Phase {
    self.phase
  }

  /// Inline-matched assets still loaded externally by a document whose alteration failed.
  pub fn unresolved_assets(&self) -> &BTreeSet<String> {
    &self.unresolved
  }

  /// Start a new build.
  pub fn begin_build(&mut self) {
    self.phase = Phase::Idle;
    self.unresolved.clear();
  }

  /// Rewrite the head and body tags of one generated document.
  ///
  /// Runs element rewriting, then resource hints, then custom attributes. `groups` is
  /// only replaced once every step succeeded; on error it is left as received and the
  /// inline-matched assets it references are kept out of pruning for this build.
  pub fn alter_asset_tags<S>(
    &mut self,
    groups: &mut TagGroups,
    assets: &S,
    chunks: &[Chunk],
    context: &BuildContext,
  ) -> Result<(), PluginError>
  where
    S: AssetStore + ?Sized,
  {
    if self.phase == Phase::AssetEmission {
      return Err(
        PhaseError {
          requested: "tag alteration",
          current: self.phase,
        }
        .into(),
      );
    }
    self.phase = Phase::TagAlteration;

    match self.logged(|| alter_tag_groups(groups, assets, chunks, context, &self.options)) {
      Ok(altered) => {
        *groups = altered;
        Ok(())
      }
      Err(err) => {
        let pending = external_inline_refs(groups, context, &self.options);
        if !pending.is_empty() {
          self.logged(|| warn!("alter asset tags failed; keeping {pending:?} for this build"));
        }
        self.unresolved.extend(pending);
        Err(err.into())
      }
    }
  }

  /// Finalise the output assets, deleting inlined ones when configured.
  ///
  /// Returns the names of removed assets. Runs at most once per build.
  pub fn emit<S>(&mut self, assets: &mut S) -> Result<Vec<String>, PluginError>
  where
    S: AssetStore + ?Sized,
  {
    if self.phase == Phase::AssetEmission {
      return Err(
        PhaseError {
          requested: "asset emission",
          current: self.phase,
        }
        .into(),
      );
    }
    self.phase = Phase::AssetEmission;

    let removed =
      self.logged(|| prune_inlined_assets(assets, &self.options, &self.unresolved))?;
    Ok(removed)
  }

  fn logged<T>(&self, f: impl FnOnce() -> T) -> T {
    match &self.logger {
      Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
      None => f(),
    }
  }
}

fn external_inline_refs(
  groups: &TagGroups,
  context: &BuildContext,
  options: &Options,
) -> Vec<String> {
  groups
    .head
    .iter()
    .chain(&groups.body)
    .filter(|tag| tag.is_script())
    .filter_map(|tag| tag.attributes.text("src"))
    .map(|src| context.asset_name(src))
    .filter(|name| options.inline.matches(name))
    .map(str::to_string)
    .collect()
}

fn alter_tag_groups<S>(
  groups: &TagGroups,
  assets: &S,
  chunks: &[Chunk],
  context: &BuildContext,
  options: &Options,
) -> Result<TagGroups, RewriteError>
where
  S: AssetStore + ?Sized,
{
  debug!("alter asset tags: starting");
  let mut head = groups.head.clone();
  let mut body = groups.body.clone();

  if options.should_update_elements() {
    debug!("alter asset tags: replacing <head> <script> elements");
    head = rewrite_elements(&head, assets, options, context)?;
    debug!("alter asset tags: replacing <body> <script> elements");
    body = rewrite_elements(&body, assets, options, context)?;
  }

  if options.should_add_resource_hints() {
    debug!("alter asset tags: adding resource hints");
    let hints: Vec<Tag> = resource_hints(options, context, &head, &body, chunks);
    head.extend(hints);
  }

  if options.should_add_custom_attributes() {
    debug!("alter asset tags: adding custom attributes");
    head = apply_custom_attributes(&head, options, context);
    body = apply_custom_attributes(&body, options, context);
  }

  debug!("alter asset tags: completed");
  Ok(TagGroups { head, body })
}
