//! Rewriting of renderer asset attributes into cached bundle references.

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::assets::cache::{BundleArtifact, BundleCache, SCRIPT_GROUP};
use crate::assets::transform::AssetKind;
use crate::attributes::RendererAttributes;

/// Drives the bundle cache over the stylesheet and script attribute slots.
pub struct AssetBundler {
  cache: BundleCache,
  version: String,
  css_attribute: String,
  js_attribute: String,
}

impl AssetBundler {
  /// Create a bundler over `cache` using the given slot names and cache-busting version.
  pub fn new(
    cache: BundleCache,
    version: impl Into<String>,
    css_attribute: impl Into<String>,
    js_attribute: impl Into<String>,
  ) -> Self {
    Self {
      cache,
      version: version.into(),
      css_attribute: css_attribute.into(),
      js_attribute: js_attribute.into(),
    }
  }

  /// The underlying cache.
  pub fn cache(&self) -> &BundleCache {
    &self.cache
  }

  /// Attribute slot holding the stylesheet locator to group mapping.
  pub fn css_attribute(&self) -> &str {
    &self.css_attribute
  }

  /// Attribute slot holding the ordered script locators.
  pub fn js_attribute(&self) -> &str {
    &self.js_attribute
  }

  /// Every original asset reference in the slots, stylesheets first.
  ///
  /// Bundling is destructive, so anything that wants per-asset detail must read it first.
  pub fn pending_references(
    &self,
    attributes: &RendererAttributes,
  ) -> Result<Vec<(AssetKind, String)>> {
    let mut references = Vec::new();
    if attributes.is_present(&self.css_attribute) {
      for group in self.css_groups(attributes)?.into_values() {
        references.extend(group.into_iter().map(|locator| (AssetKind::Css, locator)));
      }
    }
    if attributes.is_present(&self.js_attribute) {
      references.extend(
        self
          .js_locators(attributes)?
          .into_iter()
          .map(|locator| (AssetKind::Js, locator)),
      );
    }
    Ok(references)
  }

  /// Bundle whichever slots hold references, returning the artifacts used.
  pub fn bundle(&self, attributes: &mut RendererAttributes) -> Result<Vec<BundleArtifact>> {
    let mut artifacts = Vec::new();
    if attributes.is_present(&self.css_attribute) {
      artifacts.extend(self.bundle_css(attributes)?);
    }
    if attributes.is_present(&self.js_attribute) {
      artifacts.push(self.bundle_js(attributes)?);
    }
    Ok(artifacts)
  }

  /// Replace the stylesheet slot with one `artifact url -> group` entry per group.
  pub fn bundle_css(&self, attributes: &mut RendererAttributes) -> Result<Vec<BundleArtifact>> {
    let groups = self.css_groups(attributes)?;
    let mut rewritten = Map::new();
    let mut artifacts = Vec::with_capacity(groups.len());

    for (group, locators) in groups {
      let artifact = self
        .cache
        .get_or_build(locators.as_slice(), &group, &self.version, AssetKind::Css)?;
      rewritten.insert(artifact.url.clone(), Value::String(group));
      artifacts.push(artifact);
    }

    attributes.set(self.css_attribute.clone(), Value::Object(rewritten))?;
    Ok(artifacts)
  }

  /// Replace the script slot with a single `artifact url -> artifact url` entry.
  pub fn bundle_js(&self, attributes: &mut RendererAttributes) -> Result<BundleArtifact> {
    let locators = self.js_locators(attributes)?;
    let artifact = self
      .cache
      .get_or_build(locators.as_slice(), SCRIPT_GROUP, &self.version, AssetKind::Js)?;

    let mut rewritten = Map::new();
    rewritten.insert(artifact.url.clone(), Value::String(artifact.url.clone()));
    attributes.set(self.js_attribute.clone(), Value::Object(rewritten))?;
    Ok(artifact)
  }

  fn css_groups(&self, attributes: &RendererAttributes) -> Result<IndexMap<String, Vec<String>>> {
    let entries = match attributes.get(&self.css_attribute) {
      Some(Value::Object(entries)) => entries,
      None => return Ok(IndexMap::new()),
      Some(other) => {
        return Err(anyhow!(
          "`{}` must map stylesheet locators to groups, found {other}",
          self.css_attribute
        ))
      }
    };

    let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
    for (locator, group) in entries {
      groups
        .entry(scalar_text(group))
        .or_default()
        .push(locator.clone());
    }
    Ok(groups)
  }

  fn js_locators(&self, attributes: &RendererAttributes) -> Result<Vec<String>> {
    match attributes.get(&self.js_attribute) {
      Some(Value::Array(items)) => Ok(items.iter().map(scalar_text).collect()),
      Some(Value::Object(entries)) => Ok(entries.values().map(scalar_text).collect()),
      None => Ok(Vec::new()),
      Some(other) => Err(anyhow!(
        "`{}` must list script locators, found {other}",
        self.js_attribute
      )),
    }
  }
}

fn scalar_text(value: &Value) -> String {
  match value {
    Value::String(text) => text.clone(),
    other => other.to_string(),
  }
}
