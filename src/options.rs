//! Normalised plugin options shared by every build.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::{Attributes, Tag};
use crate::pattern::PatternSet;

/// Loading attribute applied to scripts that match no explicit policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptAttribute {
  /// Plain blocking script.
  #[default]
  Sync,
  /// `async`
  Async,
  /// `defer`
  Defer,
}

impl ScriptAttribute {
  /// Attribute name written onto the tag, if any.
  pub fn attribute(self) -> Option<&'static str> {
    match self {
      Self::Sync => None,
      Self::Async => Some("async"),
      Self::Defer => Some("defer"),
    }
  }
}

/// Which chunks a resource hint policy considers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkSelector {
  /// Only assets already referenced by the document.
  Initial,
  /// Only files of async chunks.
  Async,
  /// Both.
  #[default]
  All,
}

impl ChunkSelector {
  /// Returns true when referenced (initial) assets are considered.
  pub fn includes_initial(self) -> bool {
    matches!(self, Self::Initial | Self::All)
  }

  /// Returns true when async chunk files are considered.
  pub fn includes_async(self) -> bool {
    matches!(self, Self::Async | Self::All)
  }
}

/// Relation of a resource hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HintRelation {
  /// `rel="preload"`
  Preload,
  /// `rel="prefetch"`
  Prefetch,
}

impl HintRelation {
  /// Value of the `rel` attribute.
  pub fn rel(self) -> &'static str {
    match self {
      Self::Preload => "preload",
      Self::Prefetch => "prefetch",
    }
  }

  /// Parse a `rel` attribute value.
  pub fn from_rel(rel: &str) -> Option<Self> {
    match rel {
      "preload" => Some(Self::Preload),
      "prefetch" => Some(Self::Prefetch),
      _ => None,
    }
  }
}

/// Pattern set plus chunk selector for one hint relation.
#[derive(Debug, Clone, Default)]
pub struct HintOptions {
  /// Asset names to hint.
  pub test: PatternSet,
  /// Chunks the policy applies to.
  pub chunks: ChunkSelector,
}

impl HintOptions {
  /// Hint policy over all chunks.
  pub fn new(test: PatternSet) -> Self {
    Self {
      test,
      chunks: ChunkSelector::All,
    }
  }

  /// Restrict the policy to a chunk selector.
  pub fn with_chunks(mut self, chunks: ChunkSelector) -> Self {
    self.chunks = chunks;
    self
  }

  /// Returns true when the policy can never match.
  pub fn is_disabled(&self) -> bool {
    self.test.is_empty()
  }
}

/// Function producing attributes for a matched tag.
pub type AttributeFn = dyn Fn(&str, &Tag) -> Attributes + Send + Sync;

/// Attributes contributed by a custom attribute group.
#[derive(Clone)]
pub enum AttributeSource {
  /// Fixed attribute map.
  Static(Attributes),
  /// Attributes computed from the asset name and the tag being updated.
  Computed(Arc<AttributeFn>),
}

impl AttributeSource {
  /// Wrap a closure as a computed source.
  pub fn computed<F>(f: F) -> Self
  where
    F: Fn(&str, &Tag) -> Attributes + Send + Sync + 'static,
  {
    Self::Computed(Arc::new(f))
  }

  /// Resolve the attributes for one tag.
  pub fn resolve(&self, asset_name: &str, tag: &Tag) -> Attributes {
    match self {
      Self::Static(attributes) => attributes.clone(),
      Self::Computed(f) => f(asset_name, tag),
    }
  }
}

impl fmt::Debug for AttributeSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Static(attributes) => f.debug_tuple("Static").field(attributes).finish(),
      Self::Computed(_) => f.write_str("Computed(..)"),
    }
  }
}

/// Named group of custom attributes applied to matching script tags.
#[derive(Debug, Clone)]
pub struct CustomAttributeGroup {
  /// Group name used in diagnostics.
  pub name: String,
  /// Asset names the group applies to.
  pub test: PatternSet,
  /// Attributes merged onto matching tags.
  pub attributes: AttributeSource,
}

impl CustomAttributeGroup {
  /// Group with a fixed attribute map.
  pub fn new(name: impl Into<String>, test: PatternSet, attributes: Attributes) -> Self {
    Self {
      name: name.into(),
      test,
      attributes: AttributeSource::Static(attributes),
    }
  }

  /// Group with computed attributes.
  pub fn computed<F>(name: impl Into<String>, test: PatternSet, f: F) -> Self
  where
    F: Fn(&str, &Tag) -> Attributes + Send + Sync + 'static,
  {
    Self {
      name: name.into(),
      test,
      attributes: AttributeSource::computed(f),
    }
  }
}

/// Complete, immutable plugin options.
#[derive(Debug, Clone, Default)]
pub struct Options {
  /// Scripts whose content is embedded in the document.
  pub inline: PatternSet,
  /// Scripts forced to load without `async`/`defer`.
  pub sync: PatternSet,
  /// Scripts given the `async` attribute.
  pub asynchronous: PatternSet,
  /// Scripts given the `defer` attribute.
  pub defer: PatternSet,
  /// Scripts given `type="module"`.
  pub module: PatternSet,
  /// Attribute for scripts matching none of `sync`, `async` or `defer`.
  pub default_attribute: ScriptAttribute,
  /// `rel="preload"` policy.
  pub preload: HintOptions,
  /// `rel="prefetch"` policy.
  pub prefetch: HintOptions,
  /// Delete assets from the output once inlined.
  pub remove_inlined_assets: bool,
  /// Custom attribute groups in evaluation order.
  pub custom: Vec<CustomAttributeGroup>,
}

impl Options {
  /// Returns true when script elements may need rewriting.
  pub fn should_update_elements(&self) -> bool {
    !self.inline.is_empty()
      || !self.asynchronous.is_empty()
      || !self.defer.is_empty()
      || !self.module.is_empty()
      || self.default_attribute != ScriptAttribute::Sync
  }

  /// Returns true when resource hints may be produced.
  pub fn should_add_resource_hints(&self) -> bool {
    !self.preload.is_disabled() || !self.prefetch.is_disabled()
  }

  /// Returns true when custom attribute groups are configured.
  pub fn should_add_custom_attributes(&self) -> bool {
    !self.custom.is_empty()
  }

  /// Returns true when the emission phase may delete assets.
  pub fn should_prune(&self) -> bool {
    self.remove_inlined_assets && !self.inline.is_empty()
  }

  /// Policy for one hint relation.
  pub fn hint(&self, relation: HintRelation) -> &HintOptions {
    match relation {
      HintRelation::Preload => &self.preload,
      HintRelation::Prefetch => &self.prefetch,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn assert_shareable<T: Send + Sync>() {}

  #[test]
  fn options_are_shareable_across_builds() {
    assert_shareable::<Options>();
  }

  #[test]
  fn default_options_do_nothing() {
    let options = Options::default();
    assert!(!options.should_update_elements());
    assert!(!options.should_add_resource_hints());
    assert!(!options.should_add_custom_attributes());
    assert!(!options.should_prune());
  }

  #[test]
  fn default_attribute_alone_enables_rewriting() {
    let options = Options {
      default_attribute: ScriptAttribute::Defer,
      ..Options::default()
    };
    assert!(options.should_update_elements());
    assert_eq!(options.default_attribute.attribute(), Some("defer"));
  }

  #[test]
  fn pruning_requires_inline_patterns() {
    let mut options = Options {
      remove_inlined_assets: true,
      ..Options::default()
    };
    assert!(!options.should_prune());
    options.inline.push("runtime");
    assert!(options.should_prune());
  }

  #[test]
  fn chunk_selectors() {
    assert!(ChunkSelector::All.includes_initial() && ChunkSelector::All.includes_async());
    assert!(!ChunkSelector::Initial.includes_async());
    assert!(!ChunkSelector::Async.includes_initial());
    assert_eq!(HintRelation::from_rel("prefetch"), Some(HintRelation::Prefetch));
    assert_eq!(HintRelation::from_rel("stylesheet"), None);
  }
}
