//! Renderer configuration loader.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

const DEFAULT_CONFIG_FILE: &str = "view.config.json";

/// Discoverable renderer configuration describing template, cache and asset settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
  /// Directory templates are resolved against.
  pub template_path: String,
  /// Bundle cache directory, relative to the working root unless absolute.
  pub cache_dir: String,
  /// Public URL prefix under which the cache directory is served.
  pub cache_url_prefix: String,
  /// Global cache-busting tag folded into every bundle fingerprint.
  pub asset_version: String,
  /// Attribute holding the stylesheet locator to group mapping.
  pub css_attribute: String,
  /// Attribute holding the ordered script locator list.
  pub js_attribute: String,
  /// Bound applied to connect, read and write of remote asset fetches.
  pub http_timeout_ms: u64,
  /// Root prepended to paths in overlay editor links; the working root when unset.
  pub editor_link_root: Option<String>,
}

impl Default for RendererConfig {
  fn default() -> Self {
    Self {
      template_path: "templates".into(),
      cache_dir: "_cache".into(),
      cache_url_prefix: "/_cache".into(),
      asset_version: "1".into(),
      css_attribute: "lo_css".into(),
      js_attribute: "lo_js".into(),
      http_timeout_ms: 5000,
      editor_link_root: None,
    }
  }
}

impl RendererConfig {
  /// Attempt to load configuration from the provided directory.
  ///
  /// A missing or malformed file yields the defaults.
  pub fn discover(dir: &Path) -> Self {
    let candidate = dir.join(DEFAULT_CONFIG_FILE);
    Self::from_path(&candidate).unwrap_or_default()
  }

  /// Read configuration from a specific JSON file.
  pub fn from_path(path: &Path) -> Option<Self> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
      Ok(config) => Some(config),
      Err(err) => {
        warn!(path = %path.display(), error = %err, "ignoring malformed renderer config");
        None
      }
    }
  }

  /// Absolute cache directory for the given working root.
  pub fn cache_dir_path(&self, working_root: &Path) -> PathBuf {
    working_root.join(&self.cache_dir)
  }

  /// Timeout applied to remote asset fetches.
  pub fn http_timeout(&self) -> Duration {
    Duration::from_millis(self.http_timeout_ms)
  }
}
