//! Template rendering with optional debug instrumentation.

use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::assets::{AssetBundler, BundleCache, WorkingRootFetcher};
use crate::attributes::{RendererAttributes, RESERVED_TEMPLATE_KEY};
use crate::config::RendererConfig;
use crate::context::RequestContext;
use crate::error::ViewError;
use crate::executor::TemplateExecutor;
use crate::resolver::{normalize_base, normalize_separators, resolve_template};
use crate::response::ResponseSink;
use crate::tracker::{escape_html, DebugTracker, UsedEntry};

/// Per-call switches for [`RenderEngine::fetch_with`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
  /// Skip the debug markers even when the overlay is active.
  pub suppress_debug_wrap: bool,
  /// Caller tag the tracker files this template under; the template id when unset.
  pub caller: Option<String>,
}

/// Resolves, executes and optionally annotates templates for one request at a time.
pub struct RenderEngine<E> {
  template_path: String,
  attributes: RendererAttributes,
  executor: E,
  request: RequestContext,
  editor_root: String,
  tracker: Option<DebugTracker>,
  bundler: Option<AssetBundler>,
}

impl<E: TemplateExecutor> RenderEngine<E> {
  /// Create a renderer rooted at `template_path` with default `attributes`.
  pub fn new(
    template_path: &str,
    attributes: RendererAttributes,
    executor: E,
    request: RequestContext,
  ) -> Self {
    let editor_root = request.working_root.to_string_lossy().into_owned();
    let mut engine = Self {
      template_path: normalize_base(template_path),
      attributes,
      executor,
      request: request.clone(),
      editor_root,
      tracker: None,
      bundler: None,
    };
    engine.begin_request(request);
    engine
  }

  /// Build a renderer, bundler included, from configuration.
  pub fn from_config(config: &RendererConfig, executor: E, request: RequestContext) -> Self {
    let root = request.working_root.clone();
    let template_path = root.join(&config.template_path);
    let fetcher = WorkingRootFetcher::new(&root, config.http_timeout());
    let cache = BundleCache::new(
      config.cache_dir_path(&root),
      &config.cache_url_prefix,
      fetcher,
    );
    let bundler = AssetBundler::new(
      cache,
      config.asset_version.clone(),
      config.css_attribute.clone(),
      config.js_attribute.clone(),
    );

    let mut engine = Self::new(
      &template_path.to_string_lossy(),
      RendererAttributes::new(),
      executor,
      request,
    )
    .with_bundler(bundler);
    if let Some(editor_root) = &config.editor_link_root {
      engine = engine.with_editor_root(editor_root.clone());
    }
    engine
  }

  /// Bundle asset attributes during [`RenderEngine::render`].
  pub fn with_bundler(mut self, bundler: AssetBundler) -> Self {
    self.bundler = Some(bundler);
    self
  }

  /// Root used for overlay editor links.
  pub fn with_editor_root(mut self, editor_root: impl Into<String>) -> Self {
    self.editor_root = editor_root.into();
    self.begin_request(self.request.clone());
    self
  }

  /// Start a new request: swap in its context and clear the tracker.
  pub fn begin_request(&mut self, request: RequestContext) {
    self.tracker = request
      .overlay_active()
      .then(|| DebugTracker::new(self.editor_root.clone()));
    self.request = request;
  }

  /// The current request context.
  pub fn request(&self) -> &RequestContext {
    &self.request
  }

  /// The tracker, present only while the overlay is active.
  pub fn tracker(&self) -> Option<&DebugTracker> {
    self.tracker.as_ref()
  }

  /// The bundler, when configured.
  pub fn bundler(&self) -> Option<&AssetBundler> {
    self.bundler.as_ref()
  }

  /// Base directory templates resolve against, always ending in a separator.
  pub fn template_path(&self) -> &str {
    &self.template_path
  }

  /// Change the base directory for subsequent renders.
  pub fn set_template_path(&mut self, template_path: &str) {
    self.template_path = normalize_base(template_path);
  }

  /// All renderer attributes.
  pub fn attributes(&self) -> &Map<String, Value> {
    self.attributes.as_map()
  }

  /// Replace every renderer attribute.
  pub fn set_attributes(&mut self, attributes: Map<String, Value>) -> Result<()> {
    self.attributes.replace(attributes)
  }

  /// Set one attribute, overwriting any previous value.
  pub fn add_attribute(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
    self.attributes.set(key, value)
  }

  /// Accumulate into one attribute; see [`RendererAttributes::append_distinct`].
  pub fn append_attribute(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
    self.attributes.append_distinct(key, value)
  }

  /// One attribute, or `None` when unset.
  pub fn attribute(&self, key: &str) -> Option<&Value> {
    self.attributes.get(key)
  }

  /// Render `template` with `data` and return the output.
  pub fn fetch(&mut self, template: &str, data: &Map<String, Value>) -> Result<String> {
    self.fetch_with(template, data, FetchOptions::default())
  }

  /// Render `template` with `data`, honouring `options`.
  ///
  /// Fails before any file access when `data` holds the reserved template key, and before
  /// execution when the template does not resolve. A failed execution discards its output.
  pub fn fetch_with(
    &mut self,
    template: &str,
    data: &Map<String, Value>,
    options: FetchOptions,
  ) -> Result<String> {
    reject_reserved_data(data)?;
    self.fetch_in_scope(template, data, options, None)
  }

  /// Bundle assets, render `template` and write the result into `response`.
  ///
  /// Bundling works on a copy of the renderer attributes, so the registered asset references
  /// survive for the next request and map onto the same cached artifacts.
  pub fn render<R: ResponseSink>(
    &mut self,
    mut response: R,
    template: &str,
    data: &Map<String, Value>,
  ) -> Result<R> {
    reject_reserved_data(data)?;

    let mut scope = self.attributes.clone();
    if let Some(bundler) = &self.bundler {
      if let Some(tracker) = self.tracker.as_mut() {
        for (kind, locator) in bundler.pending_references(&scope)? {
          tracker.record(locator.clone(), UsedEntry::asset(kind, locator));
        }
      }
      bundler.bundle(&mut scope)?;
    }

    let mut output = self.fetch_in_scope(template, data, FetchOptions::default(), Some(&scope))?;
    if let Some(tracker) = &self.tracker {
      output.push_str(&tracker.render_overlay(&self.diagnostics(&scope)));
    }

    response
      .write_body(output.as_bytes())
      .context("failed to write rendered output to the response body")?;
    Ok(response)
  }

  fn fetch_in_scope(
    &mut self,
    template: &str,
    data: &Map<String, Value>,
    options: FetchOptions,
    scope: Option<&RendererAttributes>,
  ) -> Result<String> {
    let path = resolve_template(&self.template_path, template)?;
    let template_id = normalize_separators(template);

    if let Some(tracker) = self.tracker.as_mut() {
      let caller = options.caller.unwrap_or_else(|| template_id.clone());
      tracker.record(caller, UsedEntry::template(path.to_string_lossy()));
    }

    let bindings = scope.unwrap_or(&self.attributes).merged_with(data)?;
    let output = self
      .executor
      .execute(&path, &bindings)
      .with_context(|| format!("failed to execute template {}", path.display()))?;
    debug!(template = %template_id, path = %path.display(), bytes = output.len(), "rendered template");

    if self.request.overlay_active() && !options.suppress_debug_wrap {
      return Ok(annotate_output(&output, &self.template_path, &template_id));
    }
    Ok(output)
  }

  fn diagnostics(&self, attributes: &RendererAttributes) -> Value {
    json!({
      "template_path": self.template_path,
      "working_root": self.request.working_root.display().to_string(),
      "attributes": Value::Object(attributes.as_map().clone()),
    })
  }
}

fn reject_reserved_data(data: &Map<String, Value>) -> Result<()> {
  if data.contains_key(RESERVED_TEMPLATE_KEY) {
    return Err(
      ViewError::DuplicateKey {
        key: RESERVED_TEMPLATE_KEY.to_string(),
      }
      .into(),
    );
  }
  Ok(())
}

fn first_tag_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"<(\w+)[^>]*>").expect("invalid first tag regex"))
}

/// Mark captured output with the template it came from.
///
/// A text match, not an HTML parse: the first `<name ...>` sequence gains a `data-template`
/// attribute and the `templateInfo` class. Output without one is wrapped in a `<span>`.
/// Either way the result sits between START and END marker comments.
pub fn annotate_output(output: &str, template_path: &str, template_id: &str) -> String {
  let id = escape_html(template_id);
  let body = match first_tag_pattern().captures(output) {
    Some(caps) => {
      let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
        return output.to_string();
      };
      let tag = whole.as_str();
      let tagged = if tag.contains("class=\"") {
        tag.replacen(
          "class=\"",
          &format!("data-template=\"{id}\" class=\"templateInfo "),
          1,
        )
      } else {
        let opening = format!("<{}", name.as_str());
        tag.replacen(
          &opening,
          &format!("{opening} data-template=\"{id}\" class=\"templateInfo\" "),
          1,
        )
      };
      format!("{}{}{}", &output[..whole.start()], tagged, &output[whole.end()..])
    }
    None => format!("<span data-template=\"{id}\" class=\"templateInfo\">{output}</span>"),
  };
  format!(
    "<!--START {}{}-->{body}<!-- {} END-->",
    comment_safe(template_path),
    comment_safe(template_id),
    comment_safe(template_id)
  )
}

// `--` may not appear inside an HTML comment.
fn comment_safe(text: &str) -> String {
  let mut safe = text.to_string();
  while safe.contains("--") {
    safe = safe.replace("--", "- -");
  }
  safe
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::{Cell, RefCell};
  use std::fs;
  use std::path::Path;
  use std::rc::Rc;
  use tempfile::{tempdir, TempDir};

  use crate::executor::PlaceholderExecutor;

  fn object(value: Value) -> Map<String, Value> {
    match value {
      Value::Object(map) => map,
      other => panic!("expected object, got {other}"),
    }
  }

  fn views() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("home.tmpl"), "<div>Hello</div>").unwrap();
    fs::write(dir.path().join("plain.tmpl"), "just text").unwrap();
    fs::write(
      dir.path().join("classy.tmpl"),
      "<section class=\"hero\"><p>x</p></section>",
    )
    .unwrap();
    dir
  }

  fn engine(dir: &TempDir, debug: bool) -> RenderEngine<PlaceholderExecutor> {
    let request = RequestContext::new(dir.path()).with_debug(debug);
    RenderEngine::new(
      &dir.path().to_string_lossy(),
      RendererAttributes::new(),
      PlaceholderExecutor,
      request,
    )
  }

  #[test]
  fn fetch_returns_raw_output_without_debugging() {
    let dir = views();
    let mut engine = engine(&dir, false);
    assert_eq!(engine.fetch("home.tmpl", &Map::new()).unwrap(), "<div>Hello</div>");
    assert!(engine.tracker().is_none());
  }

  #[test]
  fn debug_mode_tags_the_first_element_and_adds_markers() {
    let dir = views();
    let mut engine = engine(&dir, true);
    let output = engine.fetch("home.tmpl", &Map::new()).unwrap();

    assert!(output.starts_with(&format!("<!--START {}home.tmpl-->", engine.template_path())));
    assert!(output.ends_with("<!-- home.tmpl END-->"));
    assert!(output.contains("<div data-template=\"home.tmpl\" class=\"templateInfo\" >Hello</div>"));
    assert_eq!(engine.tracker().unwrap().len(), 1);
  }

  #[test]
  fn existing_class_attribute_absorbs_the_marker_class() {
    let output = annotate_output("<section class=\"hero\"><p>x</p></section>", "/v/", "c.tmpl");
    assert_eq!(
      output,
      "<!--START /v/c.tmpl--><section data-template=\"c.tmpl\" class=\"templateInfo hero\"><p>x</p></section><!-- c.tmpl END-->"
    );
  }

  #[test]
  fn only_the_first_matching_tag_is_annotated() {
    let output = annotate_output("<li>a</li><li>b</li>", "/v/", "list.tmpl");
    assert_eq!(output.matches("data-template").count(), 1);
    assert!(output.contains("<li>b</li>"));
  }

  #[test]
  fn marker_comments_cannot_be_closed_by_the_identifier() {
    let output = annotate_output("<p>x</p>", "/v/", "evil-->.tmpl");
    assert!(output.starts_with("<!--START /v/evil- ->.tmpl-->"));
    assert!(output.ends_with("<!-- evil- ->.tmpl END-->"));
    assert_eq!(output.matches("-->").count(), 2);

    let output = annotate_output("<p>x</p>", "/v/", "a---b.tmpl");
    assert!(output.ends_with("<!-- a- - -b.tmpl END-->"));
  }

  #[test]
  fn tagless_output_gets_a_span_wrapper() {
    let dir = views();
    let mut engine = engine(&dir, true);
    let output = engine.fetch("plain.tmpl", &Map::new()).unwrap();
    assert!(output.contains("<span data-template=\"plain.tmpl\" class=\"templateInfo\">just text</span>"));
  }

  #[test]
  fn suppressed_wrap_still_records_the_template() {
    let dir = views();
    let mut engine = engine(&dir, true);
    let options = FetchOptions {
      suppress_debug_wrap: true,
      caller: Some("layout:12".into()),
    };
    let output = engine.fetch_with("home.tmpl", &Map::new(), options).unwrap();
    assert_eq!(output, "<div>Hello</div>");
    let (site, _) = engine.tracker().unwrap().entries().next().unwrap();
    assert_eq!(site, "layout:12");
  }

  #[test]
  fn ajax_requests_are_never_annotated() {
    let dir = views();
    let request = RequestContext::new(dir.path()).with_debug(true).with_ajax(true);
    let mut engine = RenderEngine::new(
      &dir.path().to_string_lossy(),
      RendererAttributes::new(),
      PlaceholderExecutor,
      request,
    );
    assert_eq!(engine.fetch("home.tmpl", &Map::new()).unwrap(), "<div>Hello</div>");
  }

  #[test]
  fn call_data_overrides_defaults() {
    let dir = views();
    let seen = Rc::new(RefCell::new(Map::new()));
    let captured = Rc::clone(&seen);
    let executor = move |_: &Path, bindings: &Map<String, Value>| -> Result<String> {
      *captured.borrow_mut() = bindings.clone();
      Ok(String::new())
    };
    let attributes = RendererAttributes::from_map(object(json!({"x": 0, "y": 9}))).unwrap();
    let mut engine = RenderEngine::new(
      &dir.path().to_string_lossy(),
      attributes,
      executor,
      RequestContext::new(dir.path()),
    );

    engine.fetch("home.tmpl", &object(json!({"x": 1}))).unwrap();
    assert_eq!(Value::Object(seen.borrow().clone()), json!({"x": 1, "y": 9}));
  }

  #[test]
  fn reserved_key_is_rejected_before_execution() {
    let dir = views();
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let executor = move |_: &Path, _: &Map<String, Value>| -> Result<String> {
      counter.set(counter.get() + 1);
      Ok(String::new())
    };
    let mut engine = RenderEngine::new(
      &dir.path().to_string_lossy(),
      RendererAttributes::new(),
      executor,
      RequestContext::new(dir.path()),
    );

    let err = engine
      .fetch("missing.tmpl", &object(json!({"template": "x"})))
      .unwrap_err();
    assert!(matches!(
      err.downcast_ref::<ViewError>(),
      Some(ViewError::DuplicateKey { .. })
    ));
    assert_eq!(calls.get(), 0);
  }

  #[test]
  fn missing_template_is_reported() {
    let dir = views();
    let mut engine = engine(&dir, false);
    let err = engine.fetch("nope.tmpl", &Map::new()).unwrap_err();
    assert!(matches!(
      err.downcast_ref::<ViewError>(),
      Some(ViewError::TemplateNotFound { .. })
    ));
  }

  #[test]
  fn failed_execution_propagates_without_output() {
    let dir = views();
    let executor = |_: &Path, _: &Map<String, Value>| -> Result<String> {
      Err(anyhow::anyhow!("boom"))
    };
    let mut engine = RenderEngine::new(
      &dir.path().to_string_lossy(),
      RendererAttributes::new(),
      executor,
      RequestContext::new(dir.path()).with_debug(true),
    );

    let err = engine
      .render(Vec::new(), "home.tmpl", &Map::new())
      .unwrap_err();
    assert!(format!("{err:#}").contains("boom"));
  }

  #[test]
  fn render_appends_overlay_only_when_active() {
    let dir = views();
    let mut quiet = engine(&dir, false);
    let body = quiet.render(String::new(), "home.tmpl", &Map::new()).unwrap();
    assert_eq!(body, "<div>Hello</div>");

    let mut loud = engine(&dir, true);
    let body = loud.render(String::new(), "home.tmpl", &Map::new()).unwrap();
    assert!(body.contains("<div id=\"renderInfo\">"));
    assert!(body.contains("TEMPLATE: "));
  }

  #[test]
  fn template_path_is_normalised() {
    let dir = views();
    let mut engine = engine(&dir, false);
    engine.set_template_path("/views//");
    assert_eq!(
      engine.template_path(),
      format!("{sep}views{sep}", sep = std::path::MAIN_SEPARATOR)
    );
  }

  #[test]
  fn begin_request_resets_tracking() {
    let dir = views();
    let mut engine = engine(&dir, true);
    engine.fetch("home.tmpl", &Map::new()).unwrap();
    assert_eq!(engine.tracker().unwrap().len(), 1);

    engine.begin_request(RequestContext::new(dir.path()).with_debug(true));
    assert!(engine.tracker().unwrap().is_empty());

    engine.begin_request(RequestContext::new(dir.path()));
    assert!(engine.tracker().is_none());
  }
}
