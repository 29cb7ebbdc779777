//! Content-addressed store of concatenated bundle artifacts.
//!
//! Artifacts live at `<cache_dir>/<fingerprint>` and are served from
//! `<url_prefix>/<fingerprint>`. A build is written to a uniquely named staging file inside
//! the cache directory and renamed into place only once complete, so readers either see the
//! whole artifact or nothing. Racing builders of one fingerprint produce identical bytes and the
//! last rename wins.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::assets::fetcher::AssetFetcher;
use crate::assets::transform::{transform, AssetKind};
use crate::error::ViewError;

/// Group key used for the single implicit script bundle.
pub const SCRIPT_GROUP: &str = "";

/// Derive the cache key for an ordered group of locators.
///
/// SHA-256 over the locators in their given order, then the group key, then the version,
/// with no delimiters, rendered as lowercase hex.
pub fn fingerprint<S: AsRef<str>>(locators: &[S], group: &str, version: &str) -> String {
  let mut hasher = Sha256::new();
  for locator in locators {
    hasher.update(locator.as_ref().as_bytes());
  }
  hasher.update(group.as_bytes());
  hasher.update(version.as_bytes());
  format!("{:x}", hasher.finalize())
}

/// A published bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleArtifact {
  /// Cache key of the bundle.
  pub fingerprint: String,
  /// Location of the artifact on disk.
  pub path: PathBuf,
  /// Public URL the surrounding web layer serves the artifact under.
  pub url: String,
  /// Whether this call built the artifact rather than finding it cached.
  pub built: bool,
}

/// Owner of the on-disk bundle cache directory.
pub struct BundleCache {
  cache_dir: PathBuf,
  url_prefix: String,
  fetcher: Box<dyn AssetFetcher>,
}

impl BundleCache {
  /// Create a cache rooted at `cache_dir`, publishing URLs under `url_prefix`.
  pub fn new(
    cache_dir: impl Into<PathBuf>,
    url_prefix: &str,
    fetcher: impl AssetFetcher + 'static,
  ) -> Self {
    Self {
      cache_dir: cache_dir.into(),
      url_prefix: url_prefix.trim_end_matches('/').to_string(),
      fetcher: Box::new(fetcher),
    }
  }

  /// Directory holding published artifacts.
  pub fn cache_dir(&self) -> &Path {
    &self.cache_dir
  }

  /// Disk location for a fingerprint.
  pub fn artifact_path(&self, fingerprint: &str) -> PathBuf {
    self.cache_dir.join(fingerprint)
  }

  /// Public URL for a fingerprint.
  pub fn artifact_url(&self, fingerprint: &str) -> String {
    format!("{}/{}", self.url_prefix, fingerprint)
  }

  /// Return the artifact for the group, building and publishing it first when absent.
  pub fn get_or_build<S: AsRef<str>>(
    &self,
    locators: &[S],
    group: &str,
    version: &str,
    kind: AssetKind,
  ) -> Result<BundleArtifact> {
    let fingerprint = fingerprint(locators, group, version);
    let path = self.artifact_path(&fingerprint);
    let url = self.artifact_url(&fingerprint);

    if path.is_file() {
      debug!(fingerprint = %fingerprint, group, kind = kind.label(), "bundle cache hit");
      return Ok(BundleArtifact {
        fingerprint,
        path,
        url,
        built: false,
      });
    }

    let content = self.build_content(locators, kind)?;
    self.publish(&path, content.as_bytes())?;
    info!(
      fingerprint = %fingerprint,
      group,
      kind = kind.label(),
      assets = locators.len(),
      bytes = content.len(),
      "published bundle"
    );

    Ok(BundleArtifact {
      fingerprint,
      path,
      url,
      built: true,
    })
  }

  fn build_content<S: AsRef<str>>(&self, locators: &[S], kind: AssetKind) -> Result<String> {
    let mut buffer = String::new();
    for locator in locators {
      let locator = locator.as_ref();
      let content = self
        .fetcher
        .fetch(locator)
        .map_err(|source| ViewError::AssetFetch {
          locator: locator.to_string(),
          source,
        })?;
      buffer.push_str(&transform(kind, &content));
    }
    Ok(buffer)
  }

  fn publish(&self, destination: &Path, content: &[u8]) -> Result<()> {
    fs::create_dir_all(&self.cache_dir)
      .with_context(|| format!("failed to create {}", self.cache_dir.display()))?;

    let mut staging = NamedTempFile::new_in(&self.cache_dir).with_context(|| {
      format!(
        "failed to create staging file in {}",
        self.cache_dir.display()
      )
    })?;
    let staging_path = staging.path().to_path_buf();
    staging
      .write_all(content)
      .and_then(|()| staging.flush())
      .with_context(|| format!("failed to write staging file {}", staging_path.display()))?;
    staging
      .persist(destination)
      .map_err(|err| err.error)
      .with_context(|| format!("failed to publish {}", destination.display()))?;
    Ok(())
  }
}
