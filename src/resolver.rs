//! Template identifier to file path resolution.
//!
//! Identifiers may use either separator style. An absolute identifier that already names an
//! existing file is used as-is; anything else is resolved underneath the renderer's base
//! directory. Relative identifiers never touch the process working directory.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use anyhow::Result;
use tracing::debug;

use crate::error::ViewError;

/// Rewrite every `/` and `\` to the host separator.
pub fn normalize_separators(value: &str) -> String {
  value
    .chars()
    .map(|ch| if ch == '/' || ch == '\\' { MAIN_SEPARATOR } else { ch })
    .collect()
}

/// Normalise a template base directory so it ends with exactly one native separator.
pub fn normalize_base(base: &str) -> String {
  let trimmed = base.trim_end_matches(['/', '\\']);
  format!("{}{}", normalize_separators(trimmed), MAIN_SEPARATOR)
}

/// Resolve `template` against `base` into a canonical path to an existing file.
pub fn resolve_template(base: &str, template: &str) -> Result<PathBuf> {
  let base = normalize_separators(base);
  let template = normalize_separators(template);

  let literal = Path::new(&template);
  if literal.is_absolute() {
    if let Some(found) = existing_file(literal) {
      debug!(template = %template, path = %found.display(), "template resolved literally");
      return Ok(found);
    }
  }

  let candidate = PathBuf::from(format!(
    "{}{}",
    base,
    template.trim_start_matches(MAIN_SEPARATOR)
  ));
  match existing_file(&candidate) {
    Some(found) => {
      debug!(template = %template, path = %found.display(), "template resolved against base");
      Ok(found)
    }
    None => Err(
      ViewError::TemplateNotFound {
        base: PathBuf::from(base),
        path: candidate,
      }
      .into(),
    ),
  }
}

fn existing_file(path: &Path) -> Option<PathBuf> {
  let canonical = path.canonicalize().ok()?;
  canonical.is_file().then_some(canonical)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  #[test]
  fn base_gains_a_single_trailing_separator() {
    let expected = format!("{MAIN_SEPARATOR}views{MAIN_SEPARATOR}");
    assert_eq!(normalize_base("/views"), expected);
    assert_eq!(normalize_base("/views//"), expected);
    assert_eq!(normalize_base("/views\\"), expected);
  }

  #[test]
  fn resolves_relative_identifiers_under_base() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("partials")).unwrap();
    let file = dir.path().join("partials").join("nav.tmpl");
    fs::write(&file, "<nav></nav>").unwrap();

    let base = normalize_base(&dir.path().to_string_lossy());
    let resolved = resolve_template(&base, "partials\\nav.tmpl").unwrap();
    assert_eq!(resolved, file.canonicalize().unwrap());
  }

  #[test]
  fn existing_absolute_paths_bypass_the_base() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("standalone.tmpl");
    fs::write(&file, "x").unwrap();

    let resolved = resolve_template("/nowhere/", &file.to_string_lossy()).unwrap();
    assert_eq!(resolved, file.canonicalize().unwrap());
  }

  #[test]
  fn relative_identifiers_ignore_the_process_working_directory() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("Cargo.toml"), "<p>view</p>").unwrap();
    assert!(Path::new("Cargo.toml").is_file());
    let base = normalize_base(&dir.path().to_string_lossy());

    let resolved = resolve_template(&base, "Cargo.toml").unwrap();
    assert_eq!(resolved, dir.path().join("Cargo.toml").canonicalize().unwrap());
    assert_eq!(fs::read_to_string(resolved).unwrap(), "<p>view</p>");
  }

  #[test]
  fn leading_separator_still_resolves_under_base() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("home.tmpl"), "x").unwrap();
    let base = normalize_base(&dir.path().to_string_lossy());

    let resolved = resolve_template(&base, "/home.tmpl").unwrap();
    assert!(resolved.ends_with("home.tmpl"));
  }

  #[test]
  fn missing_templates_report_base_and_path() {
    let dir = tempdir().unwrap();
    let base = normalize_base(&dir.path().to_string_lossy());
    let err = resolve_template(&base, "missing.tmpl").unwrap_err();
    match err.downcast_ref::<ViewError>() {
      Some(ViewError::TemplateNotFound { base: seen, path }) => {
        assert_eq!(seen, &PathBuf::from(&base));
        assert!(path.ends_with("missing.tmpl"));
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }
}
