//! Light per-kind cleanup applied to each asset before concatenation.
//!
//! The script compaction is a line-oriented text heuristic, not a JavaScript parser. A `//`
//! inside a string literal or regex keeps its line break, and a line inside a multi-line
//! literal that starts with `//` is blanked. Bundles depend on these exact bytes, so the
//! heuristic is kept as-is.

use std::sync::OnceLock;

use regex::Regex;

/// Separator written ahead of every asset chunk.
pub const CHUNK_SEPARATOR: &str = " \n ";

/// The asset kinds a bundle can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
  /// Stylesheets.
  Css,
  /// Scripts.
  Js,
}

impl AssetKind {
  /// Short label used in logs and overlay entries.
  pub fn label(self) -> &'static str {
    match self {
      AssetKind::Css => "CSS",
      AssetKind::Js => "JS",
    }
  }
}

/// Turn fetched `content` into the chunk appended to a bundle of `kind`.
///
/// Empty content yields an empty chunk.
pub fn transform(kind: AssetKind, content: &str) -> String {
  if content.is_empty() {
    return String::new();
  }
  match kind {
    AssetKind::Css => transform_css(content),
    AssetKind::Js => transform_js(content),
  }
}

fn transform_css(content: &str) -> String {
  format!("{CHUNK_SEPARATOR}{}", content.replace(['\n', '\r'], " "))
}

fn leading_indent_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"(?m)^[ \t\n\r\x0B\x0C]+(.*)$").expect("invalid indentation regex")
  })
}

fn line_comment_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"(?m)^//.*$").expect("invalid line comment regex"))
}

fn transform_js(content: &str) -> String {
  let text = format!("{CHUNK_SEPARATOR}{content}");
  let text = leading_indent_pattern().replace_all(&text, " ${1} ");
  let text = line_comment_pattern().replace_all(&text, " ");
  let text = fold_line_endings(&text);
  format!("{CHUNK_SEPARATOR}{text}{CHUNK_SEPARATOR}")
}

/// Collapse line terminators to spaces when a file has more than three lines.
///
/// Runs once for `\r` and once for `\n`. Every piece is padded with a space on each side, and
/// pieces containing `//` keep their terminator so a trailing comment cannot swallow the code
/// that follows it.
pub fn fold_line_endings(text: &str) -> String {
  let mut folded = text.to_string();
  for terminator in ['\r', '\n'] {
    let pieces: Vec<&str> = folded.split(terminator).collect();
    if pieces.len() <= 3 {
      continue;
    }

    let mut clean = String::with_capacity(folded.len() + pieces.len() * 2);
    for piece in pieces {
      clean.push(' ');
      clean.push_str(piece);
      if piece.contains("//") {
        clean.push(terminator);
      }
      clean.push(' ');
    }
    folded = clean;
  }
  folded
}
