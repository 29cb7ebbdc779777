//! Typed failures raised by the render pipeline and the bundle cache.

use std::path::PathBuf;

/// Structural failures that must reach the caller of a render or bundle operation.
///
/// Library functions return `anyhow::Result`, with one of these as the root cause, so callers
/// can recover the variant through `anyhow::Error::downcast_ref` even after context was added.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
  /// No file exists at the resolved template location.
  #[error("view cannot render `{}` because the template does not exist (base `{}`)", .path.display(), .base.display())]
  TemplateNotFound {
    /// Template directory the identifier was resolved against.
    base: PathBuf,
    /// Path that was checked.
    path: PathBuf,
  },

  /// Call-supplied render data contains the reserved template key.
  #[error("duplicate `{key}` key found in render data")]
  DuplicateKey {
    /// The reserved key that collided.
    key: String,
  },

  /// An asset referenced by a bundle group could not be retrieved.
  #[error("failed to fetch asset `{locator}`: {source}")]
  AssetFetch {
    /// Locator as it appeared in the bundle group.
    locator: String,
    /// Underlying transport or filesystem failure.
    source: std::io::Error,
  },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_not_found_names_both_paths() {
    let err = ViewError::TemplateNotFound {
      base: PathBuf::from("/views/"),
      path: PathBuf::from("/views/missing.tmpl"),
    };
    let msg = err.to_string();
    assert!(msg.contains("/views/missing.tmpl"));
    assert!(msg.contains("base `/views/`"));
  }

  #[test]
  fn asset_fetch_names_locator_and_keeps_source() {
    let err = ViewError::AssetFetch {
      locator: "/css/site.css".into(),
      source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
    };
    assert!(err.to_string().contains("/css/site.css"));
    assert!(std::error::Error::source(&err).is_some());
  }
}
