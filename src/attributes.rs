//! Renderer-scoped default data merged into every render call.

use anyhow::Result;
use serde_json::{Map, Value};

use crate::error::ViewError;

/// Key used to pass the template identifier; never allowed in render data.
pub const RESERVED_TEMPLATE_KEY: &str = "template";

/// Ordered key/value defaults owned by a renderer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RendererAttributes {
  values: Map<String, Value>,
}

impl RendererAttributes {
  /// Empty attribute set.
  pub fn new() -> Self {
    Self::default()
  }

  /// Build from an existing map, rejecting the reserved key.
  pub fn from_map(values: Map<String, Value>) -> Result<Self> {
    reject_reserved(&values)?;
    Ok(Self { values })
  }

  /// Borrow the underlying map.
  pub fn as_map(&self) -> &Map<String, Value> {
    &self.values
  }

  /// Replace every attribute at once.
  pub fn replace(&mut self, values: Map<String, Value>) -> Result<()> {
    reject_reserved(&values)?;
    self.values = values;
    Ok(())
  }

  /// Look up a single attribute.
  pub fn get(&self, key: &str) -> Option<&Value> {
    self.values.get(key)
  }

  /// Whether `key` holds something other than null, `false`, an empty string or collection.
  pub fn is_present(&self, key: &str) -> bool {
    match self.values.get(key) {
      None | Some(Value::Null) | Some(Value::Bool(false)) => false,
      Some(Value::String(text)) => !text.is_empty(),
      Some(Value::Array(items)) => !items.is_empty(),
      Some(Value::Object(entries)) => !entries.is_empty(),
      Some(_) => true,
    }
  }

  /// Overwrite the value at `key`.
  pub fn set(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
    let key = key.into();
    if key == RESERVED_TEMPLATE_KEY {
      return Err(ViewError::DuplicateKey { key }.into());
    }
    self.values.insert(key, value);
    Ok(())
  }

  /// Accumulate entries at `key` without clobbering earlier registrations.
  ///
  /// Sequences gain the values they do not already hold; mappings gain the keys they do not
  /// already hold. Both keep first-seen order. A missing or scalar slot is replaced outright.
  pub fn append_distinct(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
    let key = key.into();
    if key == RESERVED_TEMPLATE_KEY {
      return Err(ViewError::DuplicateKey { key }.into());
    }

    let value = match (self.values.get_mut(&key), value) {
      (Some(Value::Array(existing)), Value::Array(incoming)) => {
        for item in incoming {
          if !existing.contains(&item) {
            existing.push(item);
          }
        }
        return Ok(());
      }
      (Some(Value::Object(existing)), Value::Object(incoming)) => {
        for (entry_key, entry_value) in incoming {
          existing.entry(entry_key).or_insert(entry_value);
        }
        return Ok(());
      }
      (_, value) => value,
    };
    self.values.insert(key, value);
    Ok(())
  }

  /// Merge call-supplied data over the defaults; call data wins on collisions.
  pub fn merged_with(&self, data: &Map<String, Value>) -> Result<Map<String, Value>> {
    reject_reserved(data)?;
    let mut context = self.values.clone();
    for (key, value) in data {
      context.insert(key.clone(), value.clone());
    }
    Ok(context)
  }
}

fn reject_reserved(values: &Map<String, Value>) -> Result<()> {
  if values.contains_key(RESERVED_TEMPLATE_KEY) {
    return Err(
      ViewError::DuplicateKey {
        key: RESERVED_TEMPLATE_KEY.to_string(),
      }
      .into(),
    );
  }
  Ok(())
}
