//! Request-scoped log of the templates and assets a render touched, plus the developer overlay
//! that lists them.

use indexmap::IndexMap;
use serde_json::Value;

use crate::assets::AssetKind;

const OVERLAY_STYLE: &str = "<style>#renderInfo{border-top:3px solid red;width: 100vw; height: 32px;overflow: scroll;position: fixed; left: 0px; bottom: 0px; background-color: #ccc; z-index: 10000;}#renderInfo.on{height: 500px;}</style>";

const OVERLAY_TOGGLE_SCRIPT: &str = r#"<script type="application/javascript">
  document.getElementById("renderInfo").addEventListener("click", function () {
    this.classList.toggle("on");
  });
</script>
"#;

/// What a log entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
  /// A resolved template file.
  Template,
  /// A stylesheet or script reference.
  Asset(AssetKind),
}

impl EntryKind {
  fn label(self) -> &'static str {
    match self {
      EntryKind::Template => "TEMPLATE",
      EntryKind::Asset(kind) => kind.label(),
    }
  }
}

/// One resolved template or asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsedEntry {
  /// Entry kind.
  pub kind: EntryKind,
  /// Template path or asset locator.
  pub target: String,
}

impl UsedEntry {
  /// Entry for a resolved template path.
  pub fn template(path: impl Into<String>) -> Self {
    Self {
      kind: EntryKind::Template,
      target: path.into(),
    }
  }

  /// Entry for an asset locator.
  pub fn asset(kind: AssetKind, locator: impl Into<String>) -> Self {
    Self {
      kind: EntryKind::Asset(kind),
      target: locator.into(),
    }
  }
}

/// Ordered record of everything resolved during one request, keyed by caller site.
#[derive(Debug, Clone, Default)]
pub struct DebugTracker {
  editor_root: String,
  entries: IndexMap<String, UsedEntry>,
}

impl DebugTracker {
  /// Create a tracker whose editor links are rooted at `editor_root`.
  pub fn new(editor_root: impl Into<String>) -> Self {
    Self {
      editor_root: editor_root.into(),
      entries: IndexMap::new(),
    }
  }

  /// Record `entry` under `caller_site`; a repeated site keeps its slot and takes the new entry.
  pub fn record(&mut self, caller_site: impl Into<String>, entry: UsedEntry) {
    self.entries.insert(caller_site.into(), entry);
  }

  /// Entries in resolution order.
  pub fn entries(&self) -> impl Iterator<Item = (&str, &UsedEntry)> {
    self.entries.iter().map(|(site, entry)| (site.as_str(), entry))
  }

  /// Number of recorded entries.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Whether nothing was recorded.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Forget everything; called at the start of each request.
  pub fn reset(&mut self) {
    self.entries.clear();
  }

  /// Editor deep link for one entry.
  pub fn render_link(&self, entry: &UsedEntry) -> String {
    let relative = entry
      .target
      .strip_prefix(self.editor_root.as_str())
      .unwrap_or(&entry.target);
    let separator = if relative.starts_with(['/', '\\']) || self.editor_root.is_empty() {
      ""
    } else {
      "/"
    };
    format!(
      "<a href=\"phpstorm://open?url=file://{}{}{}&line=1\">{}: {}</a>",
      escape_html(&self.editor_root),
      separator,
      escape_html(relative),
      entry.kind.label(),
      escape_html(&entry.target)
    )
  }

  /// Fixed-position panel listing every entry, newest first, followed by a dump of `payload`.
  pub fn render_overlay(&self, payload: &Value) -> String {
    let mut overlay = String::from(OVERLAY_STYLE);
    overlay.push_str("<div id=\"renderInfo\">");
    overlay.push_str(OVERLAY_TOGGLE_SCRIPT);
    for entry in self.entries.values().rev() {
      overlay.push_str(&self.render_link(entry));
      overlay.push_str("<br>");
    }
    let dump = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    overlay.push_str("<pre>");
    overlay.push_str(&escape_html(&dump));
    overlay.push_str("</pre></div>");
    overlay
  }
}

pub(crate) fn escape_html(s: &str) -> String {
  s.replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
    .replace('\'', "&#39;")
}
