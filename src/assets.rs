//! Output asset lookup and removal of assets that were inlined into documents.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::PruneError;
use crate::models::Asset;
use crate::options::Options;

/// Host-owned mapping from asset name to content.
pub trait AssetStore {
  /// Content of a named asset.
  fn source(&self, name: &str) -> Option<&[u8]>;

  /// Every asset name, in the store's iteration order.
  fn names(&self) -> Vec<String>;

  /// Delete an asset from the output.
  fn remove(&mut self, name: &str) -> Result<(), PruneError>;

  /// Returns true when the asset exists.
  fn contains(&self, name: &str) -> bool {
    self.source(name).is_some()
  }
}

impl AssetStore for BTreeMap<String, Asset> {
  fn source(&self, name: &str) -> Option<&[u8]> {
    self.get(name).map(|asset| asset.source.as_slice())
  }

  fn names(&self) -> Vec<String> {
    self.keys().cloned().collect()
  }

  fn remove(&mut self, name: &str) -> Result<(), PruneError> {
    BTreeMap::remove(self, name)
      .map(|_| ())
      .ok_or_else(|| PruneError::Missing(name.to_string()))
  }
}

/// Assets written to an output directory, loaded eagerly.
///
/// Names are paths relative to the root using forward slashes, which is how the
/// document refers to them.
#[derive(Debug)]
pub struct DirectoryAssets {
  root: PathBuf,
  assets: BTreeMap<String, Asset>,
}

impl DirectoryAssets {
  /// Load every file below `root`.
  pub fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
    let root = root.into();
    let mut assets = BTreeMap::new();
    collect_files(&root, Path::new(""), &mut assets)?;
    Ok(Self { root, assets })
  }

  /// Directory the assets were read from.
  pub fn root(&self) -> &Path {
    &self.root
  }

  fn path_of(&self, name: &str) -> PathBuf {
    name
      .split('/')
      .fold(self.root.clone(), |path, segment| path.join(segment))
  }
}

fn collect_files(
  root: &Path,
  relative: &Path,
  assets: &mut BTreeMap<String, Asset>,
) -> std::io::Result<()> {
  let current = root.join(relative);
  for entry in fs::read_dir(&current)? {
    let entry = entry?;
    let child_relative = relative.join(entry.file_name());
    if entry.file_type()?.is_dir() {
      collect_files(root, &child_relative, assets)?;
    } else {
      let name = child_relative.to_string_lossy().replace('\\', "/");
      assets.insert(name, Asset::new(fs::read(entry.path())?));
    }
  }
  Ok(())
}

impl AssetStore for DirectoryAssets {
  fn source(&self, name: &str) -> Option<&[u8]> {
    self.assets.source(name)
  }

  fn names(&self) -> Vec<String> {
    self.assets.names()
  }

  fn remove(&mut self, name: &str) -> Result<(), PruneError> {
    let path = self.path_of(name);
    match fs::remove_file(&path) {
      Ok(()) => {}
      Err(err) if err.kind() == ErrorKind::NotFound => {
        self.assets.remove(name);
        return Err(PruneError::Missing(name.to_string()));
      }
      Err(err) => {
        return Err(PruneError::Io {
          name: name.to_string(),
          path,
          source: err,
        });
      }
    }
    AssetStore::remove(&mut self.assets, name)
  }
}

/// Delete every asset matching the inline patterns when `remove_inlined_assets` is set.
///
/// Must only run once every document referencing those assets has been rewritten.
/// Names in `retained` are still loaded externally by some document and are kept.
/// Returns the removed names in store order; the first failure aborts pruning.
pub fn prune_inlined_assets<S>(
  store: &mut S,
  options: &Options,
  retained: &BTreeSet<String>,
) -> Result<Vec<String>, PruneError>
where
  S: AssetStore + ?Sized,
{
  if !options.should_prune() {
    return Ok(Vec::new());
  }

  debug!("emit: deleting inlined assets");
  let mut removed = Vec::new();
  for name in store.names() {
    if let Some(matcher) = options.inline.first_match(&name) {
      if retained.contains(&name) {
        warn!("emit: keeping '{name}', a document still references it externally");
        continue;
      }
      debug!("emit: deleting asset '{name}' (matched {matcher})");
      store.remove(&name)?;
      removed.push(name);
    }
  }
  Ok(removed)
}
