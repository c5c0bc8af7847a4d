//! Preload and prefetch resource hints for initial and async chunks.

use std::collections::BTreeSet;

use tracing::debug;

use crate::models::{BuildContext, Chunk, Tag, TagKind};
use crate::options::{HintRelation, Options};

const RELATIONS: [HintRelation; 2] = [HintRelation::Preload, HintRelation::Prefetch];

/// Collects resource hint tags without ever emitting two hints of one relation for the
/// same asset, whatever URL form the asset was referenced by.
///
/// Hints are produced in call order: the controller feeds referenced scripts first and
/// async chunks second, so hints for assets the document already loads come before
/// anticipatory ones.
pub struct ResourceHintGenerator<'a> {
  options: &'a Options,
  context: &'a BuildContext,
  seen: BTreeSet<(HintRelation, String)>,
  hints: Vec<Tag>,
}

impl<'a> ResourceHintGenerator<'a> {
  /// Create a generator, treating hints already present in `existing_head` as emitted.
  pub fn new(options: &'a Options, context: &'a BuildContext, existing_head: &[Tag]) -> Self {
    let seen = existing_head
      .iter()
      .filter(|tag| tag.tag_name == TagKind::Link)
      .filter_map(|tag| {
        let relation = HintRelation::from_rel(tag.attributes.text("rel")?)?;
        let href = tag.attributes.text("href")?;
        Some((relation, context.asset_name(href).to_string()))
      })
      .collect();

    Self {
      options,
      context,
      seen,
      hints: Vec::new(),
    }
  }

  /// Add hints for every external script already referenced by `tags`.
  pub fn add_initial_hints(&mut self, tags: &[Tag]) {
    for tag in tags.iter().filter(|tag| tag.is_script()) {
      let Some(src) = tag.attributes.text("src") else {
        continue;
      };
      let name = self.context.asset_name(src);
      for relation in RELATIONS {
        let policy = self.options.hint(relation);
        if policy.chunks.includes_initial() && policy.test.matches(name) {
          self.push(relation, name, src.to_string());
        }
      }
    }
  }

  /// Add anticipatory hints for the files of every async chunk.
  pub fn add_async_hints(&mut self, chunks: &[Chunk]) {
    for chunk in chunks.iter().filter(|chunk| !chunk.is_initial()) {
      for file in &chunk.files {
        for relation in RELATIONS {
          let policy = self.options.hint(relation);
          if policy.chunks.includes_async() && policy.test.matches(file) {
            debug!("async chunk '{}' contributes {} hint for '{file}'", chunk.id, relation.rel());
            self.push(relation, file, self.context.public_url(file));
          }
        }
      }
    }
  }

  /// Hints collected so far, in emission order.
  pub fn finish(self) -> Vec<Tag> {
    self.hints
  }

  fn push(&mut self, relation: HintRelation, name: &str, href: String) {
    if !self.seen.insert((relation, name.to_string())) {
      debug!("skipping duplicate {} hint for '{name}'", relation.rel());
      return;
    }
    let mut hint = Tag::link(relation.rel(), href);
    hint.attributes.set("as", destination_for(name));
    self.hints.push(hint);
  }
}

/// Compute the hints for one document: referenced head scripts, then body scripts, then
/// async chunk files.
pub fn resource_hints(
  options: &Options,
  context: &BuildContext,
  head: &[Tag],
  body: &[Tag],
  chunks: &[Chunk],
) -> Vec<Tag> {
  let mut generator = ResourceHintGenerator::new(options, context, head);
  generator.add_initial_hints(head);
  generator.add_initial_hints(body);
  generator.add_async_hints(chunks);
  generator.finish()
}

/// Value of the `as` attribute for an asset, derived from its extension.
fn destination_for(name: &str) -> &'static str {
  let path = name.split(['?', '#']).next().unwrap_or(name);
  let extension = path
    .rsplit_once('.')
    .map(|(_, extension)| extension.to_ascii_lowercase())
    .unwrap_or_default();

  match extension.as_str() {
    "js" | "mjs" | "cjs" => "script",
    "css" => "style",
    "woff" | "woff2" | "ttf" | "otf" => "font",
    "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "svg" => "image",
    _ => "fetch",
  }
}
