//! Per-request facts the renderer needs, passed in explicitly.

use std::path::{Path, PathBuf};

/// Cookie that opts a browser session into the template overlay.
pub const HELPER_COOKIE: &str = "templateHelper";

/// Value of `X-Requested-With` sent by XHR-based clients.
const AJAX_MARKER: &str = "xmlhttprequest";

/// Request-scoped switches and the working root used for local asset lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
  /// Session-level opt-in for debug wrapping and the overlay.
  pub debug_enabled: bool,
  /// Whether the current request was issued by a script rather than a page load.
  pub is_ajax: bool,
  /// Directory that local asset locators and the cache directory are resolved against.
  pub working_root: PathBuf,
}

impl RequestContext {
  /// Context for a plain page request with debugging switched off.
  pub fn new(working_root: impl Into<PathBuf>) -> Self {
    Self {
      debug_enabled: false,
      is_ajax: false,
      working_root: working_root.into(),
    }
  }

  /// Build a context from the raw helper cookie value and `X-Requested-With` header.
  pub fn from_request(
    helper_cookie: Option<&str>,
    requested_with: Option<&str>,
    working_root: &Path,
  ) -> Self {
    Self {
      debug_enabled: helper_cookie.map(str::trim) == Some("1"),
      is_ajax: requested_with.is_some_and(|value| value.trim().eq_ignore_ascii_case(AJAX_MARKER)),
      working_root: working_root.to_path_buf(),
    }
  }

  /// Enable or disable the debug opt-in.
  pub fn with_debug(mut self, enabled: bool) -> Self {
    self.debug_enabled = enabled;
    self
  }

  /// Mark the request as AJAX.
  pub fn with_ajax(mut self, is_ajax: bool) -> Self {
    self.is_ajax = is_ajax;
    self
  }

  /// Debug wrapping, tracking and the overlay are only active for opted-in page loads.
  pub fn overlay_active(&self) -> bool {
    self.debug_enabled && !self.is_ajax
  }
}
