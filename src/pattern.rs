//! Asset-name matchers used to decide which policies apply to a tag.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

/// Trait describing an arbitrary test over an asset name.
pub trait NameFilter: Send + Sync {
  /// Returns `true` when the asset name satisfies the filter.
  fn accepts(&self, name: &str) -> bool;
}

impl<F> NameFilter for F
where
  F: Fn(&str) -> bool + Send + Sync,
{
  fn accepts(&self, name: &str) -> bool {
    self(name)
  }
}

/// A single test against an asset name.
#[derive(Clone)]
pub enum Matcher {
  /// The whole name must equal the value.
  Exact(String),
  /// The value must occur somewhere in the name.
  Substring(String),
  /// The expression must match somewhere in the name.
  Regex(Regex),
  /// Caller supplied predicate.
  Predicate(Arc<dyn NameFilter>),
}

impl Matcher {
  /// Build a predicate matcher from a closure.
  pub fn predicate<F>(filter: F) -> Self
  where
    F: Fn(&str) -> bool + Send + Sync + 'static,
  {
    Self::Predicate(Arc::new(filter))
  }

  /// Determine whether the matcher accepts the asset name.
  pub fn is_match(&self, name: &str) -> bool {
    match self {
      Self::Exact(value) => name == value,
      Self::Substring(value) => name.contains(value.as_str()),
      Self::Regex(pattern) => pattern.is_match(name),
      Self::Predicate(filter) => filter.accepts(name),
    }
  }
}

impl fmt::Debug for Matcher {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Exact(value) => f.debug_tuple("Exact").field(value).finish(),
      Self::Substring(value) => f.debug_tuple("Substring").field(value).finish(),
      Self::Regex(pattern) => f.debug_tuple("Regex").field(&pattern.as_str()).finish(),
      Self::Predicate(_) => f.write_str("Predicate(..)"),
    }
  }
}

impl fmt::Display for Matcher {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Exact(value) => write!(f, "exact '{value}'"),
      Self::Substring(value) => write!(f, "'{value}'"),
      Self::Regex(pattern) => write!(f, "/{}/", pattern.as_str()),
      Self::Predicate(_) => f.write_str("<predicate>"),
    }
  }
}

impl From<Regex> for Matcher {
  fn from(pattern: Regex) -> Self {
    Self::Regex(pattern)
  }
}

impl From<&str> for Matcher {
  fn from(value: &str) -> Self {
    Self::Substring(value.to_string())
  }
}

impl From<String> for Matcher {
  fn from(value: String) -> Self {
    Self::Substring(value)
  }
}

/// Ordered list of matchers combined with logical OR.
///
/// An empty set matches nothing, which is how a policy is disabled.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
  matchers: Vec<Matcher>,
}

impl PatternSet {
  /// Create a set from the provided matchers, keeping declaration order.
  pub fn new(matchers: impl IntoIterator<Item = Matcher>) -> Self {
    Self {
      matchers: matchers.into_iter().collect(),
    }
  }

  /// Append a matcher to the end of the set.
  pub fn push(&mut self, matcher: impl Into<Matcher>) {
    self.matchers.push(matcher.into());
  }

  /// Builder-style variant of [`PatternSet::push`].
  pub fn with(mut self, matcher: impl Into<Matcher>) -> Self {
    self.push(matcher);
    self
  }

  /// Returns true when the set has no matchers.
  pub fn is_empty(&self) -> bool {
    self.matchers.is_empty()
  }

  /// Matchers in declaration order.
  pub fn matchers(&self) -> &[Matcher] {
    &self.matchers
  }

  /// First matcher, in declaration order, that accepts the name.
  pub fn first_match(&self, name: &str) -> Option<&Matcher> {
    self.matchers.iter().find(|matcher| matcher.is_match(name))
  }

  /// Determine whether any matcher accepts the name.
  pub fn matches(&self, name: &str) -> bool {
    self.first_match(name).is_some()
  }
}

impl<M: Into<Matcher>> FromIterator<M> for PatternSet {
  fn from_iter<I: IntoIterator<Item = M>>(iter: I) -> Self {
    Self::new(iter.into_iter().map(Into::into))
  }
}

/// Determine whether an asset name satisfies a pattern set.
pub fn matches(name: &str, patterns: &PatternSet) -> bool {
  patterns.matches(name)
}
