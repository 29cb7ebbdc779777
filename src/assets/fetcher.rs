//! Retrieval of a single asset's content.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

/// Source of raw asset content for bundle builds.
pub trait AssetFetcher: Send + Sync {
  /// Return the full text of the asset named by `locator`.
  fn fetch(&self, locator: &str) -> io::Result<String>;
}

/// Where a normalised locator points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
  /// Absolute `http(s)` URL.
  Remote(String),
  /// File under the working root.
  Local(PathBuf),
}

/// Classify `locator`, upgrading protocol-relative references to `https:`.
///
/// Locators with an `http://` or `https://` scheme (any case) are URLs; everything else is a
/// path under the working root, with or without a leading separator.
pub fn resolve_locator(locator: &str, working_root: &Path) -> AssetSource {
  let upgraded = if locator.starts_with("//") {
    format!("https:{locator}")
  } else {
    locator.to_string()
  };

  let lowered = upgraded.to_ascii_lowercase();
  if lowered.starts_with("http://") || lowered.starts_with("https://") {
    AssetSource::Remote(upgraded)
  } else {
    AssetSource::Local(working_root.join(upgraded.trim_start_matches(['/', '\\'])))
  }
}

/// Fetcher reading local files from the working root and remote URLs over HTTP.
pub struct WorkingRootFetcher {
  working_root: PathBuf,
  agent: ureq::Agent,
}

impl WorkingRootFetcher {
  /// Create a fetcher whose remote requests are bounded by `timeout`.
  pub fn new(working_root: impl Into<PathBuf>, timeout: Duration) -> Self {
    let agent = ureq::AgentBuilder::new()
      .timeout_connect(timeout)
      .timeout_read(timeout)
      .timeout_write(timeout)
      .build();
    Self {
      working_root: working_root.into(),
      agent,
    }
  }

  fn fetch_remote(&self, url: &str) -> io::Result<String> {
    match self.agent.get(url).call() {
      Ok(response) => response.into_string(),
      Err(ureq::Error::Status(code, _)) => Err(io::Error::other(format!(
        "{url} responded with status {code}"
      ))),
      Err(ureq::Error::Transport(err)) => Err(io::Error::other(format!(
        "http transport error for {url}: {err}"
      ))),
    }
  }
}

impl AssetFetcher for WorkingRootFetcher {
  fn fetch(&self, locator: &str) -> io::Result<String> {
    match resolve_locator(locator, &self.working_root) {
      AssetSource::Remote(url) => {
        debug!(url = %url, "fetching remote asset");
        self.fetch_remote(&url)
      }
      AssetSource::Local(path) => {
        debug!(path = %path.display(), "reading local asset");
        fs::read_to_string(&path)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn upgrades_protocol_relative_urls() {
    let source = resolve_locator("//cdn.example.com/lib.js", Path::new("/srv/public"));
    assert_eq!(
      source,
      AssetSource::Remote("https://cdn.example.com/lib.js".into())
    );
  }

  #[test]
  fn keeps_explicit_urls() {
    let source = resolve_locator("HTTP://cdn.example.com/a.css", Path::new("/srv"));
    assert_eq!(source, AssetSource::Remote("HTTP://cdn.example.com/a.css".into()));
  }

  #[test]
  fn http_inside_a_path_stays_local() {
    let source = resolve_locator("/css/http-errors.css", Path::new("/srv"));
    assert_eq!(source, AssetSource::Local(PathBuf::from("/srv/css/http-errors.css")));
  }

  #[test]
  fn appends_local_locators_to_the_root() {
    let source = resolve_locator("/css/site.css", Path::new("/srv/public"));
    assert_eq!(
      source,
      AssetSource::Local(PathBuf::from("/srv/public/css/site.css"))
    );
    assert_eq!(
      resolve_locator("a.css", Path::new("/srv")),
      AssetSource::Local(PathBuf::from("/srv/a.css"))
    );
  }

  #[test]
  fn reads_local_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.css"), ".a{}").unwrap();

    let fetcher = WorkingRootFetcher::new(dir.path(), Duration::from_secs(1));
    assert_eq!(fetcher.fetch("/a.css").unwrap(), ".a{}");
    assert_eq!(
      fetcher.fetch("/missing.css").unwrap_err().kind(),
      io::ErrorKind::NotFound
    );
  }
}
