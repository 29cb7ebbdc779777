//! The template execution capability the render engine drives.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde_json::{Map, Value};

/// Executes a resolved template file against a set of bindings and returns its output.
pub trait TemplateExecutor {
  /// Run the template at `path` with `bindings` in scope, producing its textual output.
  fn execute(&self, path: &Path, bindings: &Map<String, Value>) -> Result<String>;
}

impl<F> TemplateExecutor for F
where
  F: Fn(&Path, &Map<String, Value>) -> Result<String>,
{
  fn execute(&self, path: &Path, bindings: &Map<String, Value>) -> Result<String> {
    self(path, bindings)
  }
}

/// Minimal executor substituting `{{ name }}` placeholders with bound values.
///
/// Strings are inserted verbatim, other values as compact JSON and unknown names as nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderExecutor;

fn placeholder_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.-]*)\s*\}\}").expect("invalid placeholder regex")
  })
}

impl TemplateExecutor for PlaceholderExecutor {
  fn execute(&self, path: &Path, bindings: &Map<String, Value>) -> Result<String> {
    let source = fs::read_to_string(path)
      .with_context(|| format!("failed to read template {}", path.display()))?;

    let rendered = placeholder_pattern().replace_all(&source, |caps: &Captures| {
      match bindings.get(&caps[1]) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
      }
    });
    Ok(rendered.into_owned())
  }
}
