//! Data structures exchanged with the host pipeline while rewriting tags.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Element name of a tag handled by the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
  /// `<script>`
  Script,
  /// `<link>`
  Link,
}

impl TagKind {
  /// Lowercase element name.
  pub fn name(self) -> &'static str {
    match self {
      Self::Script => "script",
      Self::Link => "link",
    }
  }
}

/// Value of a single attribute.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
  /// Boolean attribute; `true` renders bare, `false` is omitted.
  Flag(bool),
  /// Attribute with a text value.
  Text(String),
}

impl AttrValue {
  /// Text content of the value, if it carries any.
  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(value) => Some(value),
      Self::Flag(_) => None,
    }
  }
}

impl From<bool> for AttrValue {
  fn from(value: bool) -> Self {
    Self::Flag(value)
  }
}

impl From<&str> for AttrValue {
  fn from(value: &str) -> Self {
    Self::Text(value.to_string())
  }
}

impl From<String> for AttrValue {
  fn from(value: String) -> Self {
    Self::Text(value)
  }
}

/// Attribute mapping that keeps insertion order and unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
  entries: Vec<(String, AttrValue)>,
}

impl Attributes {
  /// Create an empty mapping.
  pub fn new() -> Self {
    Self::default()
  }

  /// Look up an attribute by name.
  pub fn get(&self, key: &str) -> Option<&AttrValue> {
    self
      .entries
      .iter()
      .find(|(name, _)| name == key)
      .map(|(_, value)| value)
  }

  /// Text value of an attribute, ignoring boolean flags.
  pub fn text(&self, key: &str) -> Option<&str> {
    self.get(key).and_then(AttrValue::as_text)
  }

  /// Returns true when the attribute is present and not a `false` flag.
  pub fn is_set(&self, key: &str) -> bool {
    !matches!(self.get(key), None | Some(AttrValue::Flag(false)))
  }

  /// Insert or overwrite an attribute, keeping the original position on overwrite.
  pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
    let key = key.into();
    let value = value.into();
    match self.entries.iter_mut().find(|(name, _)| *name == key) {
      Some((_, existing)) => *existing = value,
      None => self.entries.push((key, value)),
    }
  }

  /// Builder-style variant of [`Attributes::set`].
  pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
    self.set(key, value);
    self
  }

  /// Remove an attribute, returning its previous value.
  pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
    let index = self.entries.iter().position(|(name, _)| name == key)?;
    Some(self.entries.remove(index).1)
  }

  /// Overwrite attributes with every entry from `other`, in its order.
  pub fn merge(&mut self, other: &Attributes) {
    for (key, value) in other.iter() {
      self.set(key, value.clone());
    }
  }

  /// Iterate attributes in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
    self.entries.iter().map(|(key, value)| (key.as_str(), value))
  }

  /// Number of attributes.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Returns true when no attributes are present.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for Attributes {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut attributes = Self::new();
    for (key, value) in iter {
      attributes.set(key, value);
    }
    attributes
  }
}

impl Serialize for Attributes {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.entries.len()))?;
    for (key, value) in &self.entries {
      map.serialize_entry(key, value)?;
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for Attributes {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct AttributesVisitor;

    impl<'de> Visitor<'de> for AttributesVisitor {
      type Value = Attributes;

      fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of attribute names to strings or booleans")
      }

      fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut attributes = Attributes::new();
        while let Some((key, value)) = access.next_entry::<String, AttrValue>()? {
          attributes.set(key, value);
        }
        Ok(attributes)
      }
    }

    deserializer.deserialize_map(AttributesVisitor)
  }
}

/// Element destined for a generated document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
  /// Element name.
  pub tag_name: TagKind,
  /// Ordered attribute mapping.
  #[serde(default)]
  pub attributes: Attributes,
  /// Inline body text.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub inner_html: Option<String>,
  /// Whether the element is written without a closing tag.
  #[serde(default)]
  pub void_tag: bool,
  /// Asset this tag was inlined from; kept for matching, never rendered.
  #[serde(skip)]
  pub inlined_from: Option<String>,
}

impl Tag {
  /// External `<script src="...">` element.
  pub fn script(src: impl Into<String>) -> Self {
    Self {
      tag_name: TagKind::Script,
      attributes: Attributes::new().with("src", src.into()),
      inner_html: None,
      void_tag: false,
      inlined_from: None,
    }
  }

  /// Self-closing `<link rel="..." href="...">` element.
  pub fn link(rel: &str, href: impl Into<String>) -> Self {
    Self {
      tag_name: TagKind::Link,
      attributes: Attributes::new().with("rel", rel).with("href", href.into()),
      inner_html: None,
      void_tag: true,
      inlined_from: None,
    }
  }

  /// Returns true for `<script>` elements.
  pub fn is_script(&self) -> bool {
    self.tag_name == TagKind::Script
  }

  /// Referenced URL: `src` for scripts, `href` for links.
  pub fn asset_ref(&self) -> Option<&str> {
    match self.tag_name {
      TagKind::Script => self.attributes.text("src"),
      TagKind::Link => self.attributes.text("href"),
    }
  }

  /// Render the element as HTML.
  pub fn to_html(&self) -> String {
    let mut html = format!("<{}", self.tag_name.name());
    for (key, value) in self.attributes.iter() {
      match value {
        AttrValue::Flag(true) => {
          html.push(' ');
          html.push_str(key);
        }
        AttrValue::Flag(false) => {}
        AttrValue::Text(text) => {
          html.push_str(&format!(" {key}=\"{}\"", escape_attribute(text)));
        }
      }
    }
    if self.void_tag {
      html.push('>');
      return html;
    }
    html.push('>');
    if let Some(body) = &self.inner_html {
      html.push_str(body);
    }
    html.push_str(&format!("</{}>", self.tag_name.name()));
    html
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_html())
  }
}

fn escape_attribute(value: &str) -> String {
  value
    .replace('&', "&amp;")
    .replace('"', "&quot;")
    .replace('<', "&lt;")
}

/// Head and body tag lists of one generated document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TagGroups {
  /// Tags written into `<head>`.
  #[serde(default)]
  pub head: Vec<Tag>,
  /// Tags written into `<body>`.
  #[serde(default)]
  pub body: Vec<Tag>,
}

/// Named build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
  /// Raw content.
  pub source: Vec<u8>,
}

impl Asset {
  /// Wrap raw content.
  pub fn new(source: impl Into<Vec<u8>>) -> Self {
    Self {
      source: source.into(),
    }
  }
}

/// Whether a chunk is loaded at page start or on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkRole {
  /// Loaded by the initial document.
  Initial,
  /// Loaded on demand by the runtime.
  Async,
}

/// Group of assets produced by the bundling step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Chunk {
  /// Chunk identifier.
  pub id: String,
  /// File names in declaration order.
  #[serde(default)]
  pub files: Vec<String>,
  /// Loading role.
  pub role: ChunkRole,
}

impl Chunk {
  /// Returns true for chunks loaded at page start.
  pub fn is_initial(&self) -> bool {
    self.role == ChunkRole::Initial
  }
}

/// Per-call option context supplied by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildContext {
  /// Prefix the host prepends to asset URLs.
  #[serde(default)]
  pub public_path: Option<String>,
  /// Whether the host appends a `?hash` query to asset URLs.
  #[serde(default)]
  pub hash: bool,
}

impl BuildContext {
  /// Resolve the asset name a tag URL refers to.
  pub fn asset_name<'a>(&self, url: &'a str) -> &'a str {
    let mut name = url;
    if let Some(prefix) = self.public_path.as_deref().filter(|prefix| !prefix.is_empty()) {
      name = name.strip_prefix(prefix).unwrap_or(name);
    }
    if self.hash
      && let Some((path, _)) = name.split_once('?')
    {
      name = path;
    }
    name
  }

  /// URL the document should use for a chunk file.
  pub fn public_url(&self, file: &str) -> String {
    match self.public_path.as_deref() {
      Some(prefix) => format!("{prefix}{file}"),
      None => file.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn attributes_keep_order_and_overwrite_in_place() {
    let mut attributes = Attributes::new().with("src", "a.js").with("async", true);
    attributes.set("src", "b.js");
    attributes.set("nonce", "abc");

    let keys: Vec<&str> = attributes.iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec!["src", "async", "nonce"]);
    assert_eq!(attributes.text("src"), Some("b.js"));
    assert!(attributes.is_set("async"));

    attributes.set("async", false);
    assert!(!attributes.is_set("async"));
    assert_eq!(attributes.remove("nonce"), Some(AttrValue::from("abc")));
    assert_eq!(attributes.len(), 2);
  }

  #[test]
  fn renders_script_and_link_elements() {
    let mut script = Tag::script("app.js");
    script.attributes.set("defer", true);
    script.attributes.set("integrity", false);
    assert_eq!(script.to_html(), "<script src=\"app.js\" defer></script>");

    let link = Tag::link("preload", "a\"b.js");
    assert_eq!(link.to_html(), "<link rel=\"preload\" href=\"a&quot;b.js\">");
  }

  #[test]
  fn deserialises_tags_from_host_json() {
    let tag: Tag = serde_json::from_str(
      r#"{"tagName": "script", "attributes": {"src": "main.js", "async": true}}"#,
    )
    .unwrap();

    assert!(tag.is_script());
    assert_eq!(tag.asset_ref(), Some("main.js"));
    assert!(tag.attributes.is_set("async"));
    assert!(!tag.void_tag);

    let json = serde_json::to_string(&tag).unwrap();
    assert!(json.contains(r#""attributes":{"src":"main.js","async":true}"#));
  }

  #[test]
  fn strips_public_path_and_hash_query() {
    let context = BuildContext {
      public_path: Some("/static/".into()),
      hash: true,
    };
    assert_eq!(context.asset_name("/static/app.js?3f2a"), "app.js");
    assert_eq!(context.asset_name("other/app.js"), "other/app.js");
    assert_eq!(context.public_url("1.chunk.js"), "/static/1.chunk.js");

    let plain = BuildContext::default();
    assert_eq!(plain.asset_name("app.js?v=1"), "app.js?v=1");
    assert_eq!(plain.public_url("1.chunk.js"), "1.chunk.js");
  }
}
