/// Field dictionary adapter
///
/// Listeners bind canonical field names (`wBidPrice`, `wTradeCount`, ...) to
/// numeric identifiers through a `FieldDictionary`. A deployment whose
/// dictionary uses different names supplies a `FieldNames` override map.

use crate::message::{Fid, FieldType};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub fid: Fid,
    pub name: String,
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(fid: Fid, name: impl Into<String>, field_type: FieldType) -> Self {
        FieldDescriptor {
            fid,
            name: name.into(),
            field_type,
        }
    }
}

/// Name to identifier resolution. Until `is_ready` reports true, listeners
/// drop every message.
pub trait FieldDictionary: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Fid>;
    fn max_fid(&self) -> Fid;
    fn is_ready(&self) -> bool;
}

#[derive(Debug, Default)]
struct Loaded {
    by_name: HashMap<String, FieldDescriptor>,
    max_fid: Fid,
}

/// Dictionary that becomes ready once it has been loaded.
///
/// Loading again replaces the contents, but dispatch tables already
/// published keep the identifiers they were built with.
#[derive(Debug, Default)]
pub struct SharedDictionary {
    inner: RwLock<Option<Loaded>>,
}

impl SharedDictionary {
    pub fn new() -> Self {
        SharedDictionary {
            inner: RwLock::new(None),
        }
    }

    pub fn with_fields(fields: impl IntoIterator<Item = FieldDescriptor>) -> Self {
        let dict = Self::new();
        dict.load(fields);
        dict
    }

    pub fn load(&self, fields: impl IntoIterator<Item = FieldDescriptor>) {
        let mut loaded = Loaded::default();
        for field in fields {
            loaded.max_fid = loaded.max_fid.max(field.fid);
            loaded.by_name.insert(field.name.clone(), field);
        }
        tracing::debug!(fields = loaded.by_name.len(), max_fid = loaded.max_fid, "field dictionary loaded");
        *self.inner.write() = Some(loaded);
    }

    /// Loads a JSON array of descriptors, returning how many were read
    pub fn load_json(&self, json: &str) -> Result<usize, serde_json::Error> {
        let fields: Vec<FieldDescriptor> = serde_json::from_str(json)?;
        let count = fields.len();
        self.load(fields);
        Ok(count)
    }

    pub fn descriptor(&self, name: &str) -> Option<FieldDescriptor> {
        self.inner.read().as_ref()?.by_name.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().as_ref().map_or(0, |l| l.by_name.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FieldDictionary for SharedDictionary {
    fn resolve(&self, name: &str) -> Option<Fid> {
        self.inner.read().as_ref()?.by_name.get(name).map(|d| d.fid)
    }

    fn max_fid(&self) -> Fid {
        self.inner.read().as_ref().map_or(0, |l| l.max_fid)
    }

    fn is_ready(&self) -> bool {
        self.inner.read().is_some()
    }
}

/// Canonical name to wire name overrides; names without an entry map to
/// themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldNames {
    overrides: HashMap<String, String>,
}

impl FieldNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with(mut self, canonical: impl Into<String>, wire: impl Into<String>) -> Self {
        self.overrides.insert(canonical.into(), wire.into());
        self
    }

    pub fn wire_name<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.overrides.get(canonical).map_or(canonical, String::as_str)
    }
}
