//! Plugin configuration loader producing normalised [`Options`].

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigError;
use crate::models::{AttrValue, Attributes};
use crate::options::{ChunkSelector, CustomAttributeGroup, HintOptions, Options, ScriptAttribute};
use crate::pattern::{Matcher, PatternSet};

const DEFAULT_CONFIG_FILE: &str = "script-ext.config.json";

/// One matcher as written in a configuration file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MatcherConfig {
  /// Substring test.
  Substring(String),
  /// Whole-name test.
  Exact {
    /// Name to compare with.
    exact: String,
  },
  /// Regular expression test.
  Regex {
    /// Expression source.
    regex: String,
  },
}

/// Pattern shorthand accepted for every policy.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PatternConfig {
  /// A single matcher.
  One(MatcherConfig),
  /// Several matchers, OR-ed in order.
  Many(Vec<MatcherConfig>),
  /// Object form with an explicit `test` key.
  Test {
    /// Wrapped matchers.
    test: Box<PatternConfig>,
  },
}

impl Default for PatternConfig {
  fn default() -> Self {
    Self::Many(Vec::new())
  }
}

/// Resource hint policy as written in a configuration file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum HintConfig {
  /// Object form with a chunk selector.
  Detailed {
    /// Asset names to hint.
    test: PatternConfig,
    /// Chunks the policy applies to.
    #[serde(default)]
    chunks: ChunkSelector,
  },
  /// Bare pattern shorthand, applied to all chunks.
  Patterns(PatternConfig),
}

impl Default for HintConfig {
  fn default() -> Self {
    Self::Patterns(PatternConfig::default())
  }
}

/// Custom attribute group as written in a configuration file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomConfig {
  /// Optional group name used in diagnostics.
  #[serde(default)]
  pub name: Option<String>,
  /// Asset names the group applies to.
  pub test: PatternConfig,
  /// Attribute map merged onto matching tags.
  #[serde(default)]
  pub attributes: Attributes,
  /// Single attribute name (short form).
  #[serde(default)]
  pub attribute: Option<String>,
  /// Value for the single attribute; defaults to a bare flag.
  #[serde(default)]
  pub value: Option<AttrValue>,
}

/// Discoverable plugin configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginConfig {
  /// Scripts to inline.
  pub inline: PatternConfig,
  /// Scripts forced to stay synchronous.
  pub sync: PatternConfig,
  /// Scripts given `async`.
  #[serde(rename = "async")]
  pub asynchronous: PatternConfig,
  /// Scripts given `defer`.
  pub defer: PatternConfig,
  /// Scripts given `type="module"`.
  pub module: PatternConfig,
  /// Attribute for scripts matching no explicit policy.
  pub default_attribute: ScriptAttribute,
  /// Preload policy.
  pub preload: HintConfig,
  /// Prefetch policy.
  pub prefetch: HintConfig,
  /// Delete inlined assets from the output.
  pub remove_inlined_assets: bool,
  /// Custom attribute groups.
  pub custom: Vec<CustomConfig>,
}

impl PluginConfig {
  /// Load configuration from `dir`, falling back to defaults when it is missing or invalid.
  pub fn discover(dir: &Path) -> Self {
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    if !candidate.exists() {
      return Self::default();
    }
    Self::from_path(&candidate).unwrap_or_else(|err| {
      warn!("ignoring {}: {err}", candidate.display());
      Self::default()
    })
  }

  /// Read configuration from a JSON file, or YAML for `.yaml`/`.yml` extensions.
  pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    let is_yaml = path
      .extension()
      .and_then(|extension| extension.to_str())
      .is_some_and(|extension| matches!(extension, "yaml" | "yml"));
    if is_yaml {
      serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
      })
    } else {
      serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
      })
    }
  }

  /// Normalise into immutable options, compiling every regex.
  pub fn into_options(self) -> Result<Options, ConfigError> {
    let custom = self
      .custom
      .into_iter()
      .enumerate()
      .map(|(index, group)| group.into_group(index))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Options {
      inline: compile("inline", self.inline)?,
      sync: compile("sync", self.sync)?,
      asynchronous: compile("async", self.asynchronous)?,
      defer: compile("defer", self.defer)?,
      module: compile("module", self.module)?,
      default_attribute: self.default_attribute,
      preload: self.preload.into_hint("preload")?,
      prefetch: self.prefetch.into_hint("prefetch")?,
      remove_inlined_assets: self.remove_inlined_assets,
      custom,
    })
  }
}

impl HintConfig {
  fn into_hint(self, option: &str) -> Result<HintOptions, ConfigError> {
    match self {
      Self::Detailed { test, chunks } => Ok(HintOptions::new(compile(option, test)?).with_chunks(chunks)),
      Self::Patterns(test) => Ok(HintOptions::new(compile(option, test)?)),
    }
  }
}

impl CustomConfig {
  fn into_group(self, index: usize) -> Result<CustomAttributeGroup, ConfigError> {
    let name = self.name.unwrap_or_else(|| format!("custom[{index}]"));
    let test = compile(&name, self.test)?;
    let mut attributes = self.attributes;
    if let Some(attribute) = self.attribute {
      attributes.set(attribute, self.value.unwrap_or(AttrValue::Flag(true)));
    }
    Ok(CustomAttributeGroup::new(name, test, attributes))
  }
}

fn compile(option: &str, config: PatternConfig) -> Result<PatternSet, ConfigError> {
  let mut patterns = PatternSet::default();
  collect_matchers(option, config, &mut patterns)?;
  Ok(patterns)
}

fn collect_matchers(
  option: &str,
  config: PatternConfig,
  patterns: &mut PatternSet,
) -> Result<(), ConfigError> {
  match config {
    PatternConfig::One(matcher) => patterns.push(compile_matcher(option, matcher)?),
    PatternConfig::Many(matchers) => {
      for matcher in matchers {
        patterns.push(compile_matcher(option, matcher)?);
      }
    }
    PatternConfig::Test { test } => collect_matchers(option, *test, patterns)?,
  }
  Ok(())
}

fn compile_matcher(option: &str, config: MatcherConfig) -> Result<Matcher, ConfigError> {
  match config {
    MatcherConfig::Substring(value) => Ok(Matcher::Substring(value)),
    MatcherConfig::Exact { exact } => Ok(Matcher::Exact(exact)),
    MatcherConfig::Regex { regex } => Regex::new(&regex)
      .map(Matcher::Regex)
      .map_err(|source| ConfigError::InvalidRegex {
        option: option.to_string(),
        source,
      }),
  }
}

/// Default configuration file location inside `dir`.
pub fn default_config_path(dir: &Path) -> PathBuf {
  dir.join(DEFAULT_CONFIG_FILE)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn accepts_every_pattern_shorthand() {
    let config: PluginConfig = serde_json::from_str(
      r#"{
        "inline": "runtime",
        "async": ["vendor", {"exact": "main.js"}],
        "defer": {"test": {"regex": "\\.lazy\\.js$"}},
        "defaultAttribute": "defer"
      }"#,
    )
    .unwrap();

    let options = config.into_options().unwrap();
    assert!(options.inline.matches("js/runtime.abc.js"));
    assert!(options.asynchronous.matches("vendor.js"));
    assert!(options.asynchronous.matches("main.js"));
    assert!(!options.asynchronous.matches("js/main.js"));
    assert!(options.defer.matches("route.lazy.js"));
    assert!(options.module.is_empty());
    assert_eq!(options.default_attribute, ScriptAttribute::Defer);
  }

  #[test]
  fn hint_shorthand_defaults_to_all_chunks() {
    let config: PluginConfig = serde_json::from_str(
      r#"{
        "preload": {"regex": "\\.js$"},
        "prefetch": {"test": "chunk", "chunks": "async"}
      }"#,
    )
    .unwrap();

    let options = config.into_options().unwrap();
    assert_eq!(options.preload.chunks, ChunkSelector::All);
    assert!(options.preload.test.matches("a.js"));
    assert_eq!(options.prefetch.chunks, ChunkSelector::Async);
    assert!(options.prefetch.test.matches("1.chunk.js"));
  }

  #[test]
  fn custom_groups_accept_both_forms() {
    let config: PluginConfig = serde_json::from_str(
      r#"{
        "custom": [
          {"test": "vendor", "attribute": "crossorigin", "value": "anonymous"},
          {"name": "flags", "test": ".js", "attribute": "nomodule"},
          {"test": "app", "attributes": {"data-app": "yes", "async": true}}
        ]
      }"#,
    )
    .unwrap();

    let options = config.into_options().unwrap();
    assert_eq!(options.custom.len(), 3);
    assert_eq!(options.custom[0].name, "custom[0]");
    assert_eq!(options.custom[1].name, "flags");

    let tag = crate::models::Tag::script("app.js");
    let first = options.custom[0].attributes.resolve("vendor.js", &tag);
    assert_eq!(first.text("crossorigin"), Some("anonymous"));
    let second = options.custom[1].attributes.resolve("app.js", &tag);
    assert!(second.is_set("nomodule"));
    let third = options.custom[2].attributes.resolve("app.js", &tag);
    assert_eq!(third.text("data-app"), Some("yes"));
    assert!(third.is_set("async"));
  }

  #[test]
  fn invalid_regex_names_the_option() {
    let config: PluginConfig = serde_json::from_str(r#"{"module": {"regex": "("}}"#).unwrap();
    let err = config.into_options().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidRegex { ref option, .. } if option == "module"));
  }

  #[test]
  fn loads_yaml_files() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("script-ext.yaml");
    fs::write(
      &path,
      "inline: runtime\nremoveInlinedAssets: true\npreload:\n  test:\n    - regex: '\\.js$'\n  chunks: initial\n",
    )
    .unwrap();

    let options = PluginConfig::from_path(&path).unwrap().into_options().unwrap();
    assert!(options.should_prune());
    assert_eq!(options.preload.chunks, ChunkSelector::Initial);
    assert!(options.preload.test.matches("main.js"));
  }

  #[test]
  fn discover_falls_back_to_defaults() {
    let temp = tempdir().unwrap();
    assert_eq!(PluginConfig::discover(temp.path()), PluginConfig::default());

    fs::write(default_config_path(temp.path()), "{ not json").unwrap();
    assert_eq!(PluginConfig::discover(temp.path()), PluginConfig::default());

    fs::write(default_config_path(temp.path()), r#"{"defer": "main"}"#).unwrap();
    let config = PluginConfig::discover(temp.path());
    assert_eq!(
      config.defer,
      PatternConfig::One(MatcherConfig::Substring("main".into()))
    );
  }
}
