//! Rewrites external `<script>` elements into inline, async, defer or module form.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::assets::AssetStore;
use crate::error::RewriteError;
use crate::models::{AttrValue, BuildContext, Tag};
use crate::options::Options;

/// Attributes that only make sense on externally loaded scripts.
const LOADING_ATTRIBUTES: [&str; 3] = ["src", "async", "defer"];

fn script_close_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"(?i)<(/script)").expect("invalid script close regex"))
}

/// Escape every `</script` sequence so the body cannot terminate its element early.
///
/// The `<` becomes the JavaScript escape `\x3C`, which only appears inside string,
/// template or regex literals in valid scripts, so evaluation is unchanged.
pub fn escape_inline_script(source: &str) -> Cow<'_, str> {
  script_close_pattern().replace_all(source, r"\x3C$1")
}

/// Rewrite the script elements of one tag list.
///
/// Tags keep their position; only attributes and bodies change. Scripts that do not
/// reference a known asset and every non-script element are passed through untouched.
pub fn rewrite_elements<S>(
  tags: &[Tag],
  assets: &S,
  options: &Options,
  context: &BuildContext,
) -> Result<Vec<Tag>, RewriteError>
where
  S: AssetStore + ?Sized,
{
  tags
    .iter()
    .map(|tag| rewrite_element(tag, assets, options, context))
    .collect()
}

fn rewrite_element<S>(
  tag: &Tag,
  assets: &S,
  options: &Options,
  context: &BuildContext,
) -> Result<Tag, RewriteError>
where
  S: AssetStore + ?Sized,
{
  if !tag.is_script() {
    return Ok(tag.clone());
  }

  let src = match tag.attributes.get("src") {
    None => return Ok(tag.clone()),
    Some(AttrValue::Text(src)) => src.as_str(),
    Some(AttrValue::Flag(_)) => {
      return Err(RewriteError::MalformedTag {
        tag: "script",
        reason: "`src` must be a URL, found a boolean attribute".into(),
      });
    }
  };

  let name = context.asset_name(src);
  let Some(source) = assets.source(name) else {
    debug!("leaving <script src=\"{src}\">: no asset named '{name}'");
    return Ok(tag.clone());
  };

  if let Some(matcher) = options.inline.first_match(name) {
    debug!("inlining '{name}' (matched {matcher})");
    return inline_element(tag, name, source);
  }

  let mut updated = tag.clone();
  apply_loading_attributes(&mut updated, name, options);
  Ok(updated)
}

fn inline_element(tag: &Tag, name: &str, source: &[u8]) -> Result<Tag, RewriteError> {
  let text = std::str::from_utf8(source).map_err(|_| RewriteError::InvalidUtf8 {
    name: name.to_string(),
  })?;

  let mut inline = tag.clone();
  for attribute in LOADING_ATTRIBUTES {
    inline.attributes.remove(attribute);
  }
  if inline.attributes.text("type") == Some("module") {
    inline.attributes.remove("type");
  }
  inline.inner_html = Some(escape_inline_script(text).into_owned());
  inline.void_tag = false;
  inline.inlined_from = Some(name.to_string());
  Ok(inline)
}

fn apply_loading_attributes(tag: &mut Tag, name: &str, options: &Options) {
  if options.sync.matches(name) {
    debug!("'{name}' stays synchronous");
  } else {
    let is_async = options.asynchronous.matches(name);
    let is_defer = options.defer.matches(name);
    if is_async {
      tag.attributes.set("async", true);
    }
    if is_defer {
      tag.attributes.set("defer", true);
    }
    if !is_async
      && !is_defer
      && let Some(attribute) = options.default_attribute.attribute()
    {
      tag.attributes.set(attribute, true);
    }
  }

  if options.module.matches(name) {
    tag.attributes.set("type", "module");
  }
}
