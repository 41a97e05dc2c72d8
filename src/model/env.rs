//! Composable configuration bags.
//!
//! A [`Configuration`] maps keys (compiler flags, defines, include paths, tool
//! commands) to a tagged [`ConfigValue`]. Merging never mutates: each
//! inheritance step produces a new snapshot.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;

/// Well-known configuration keys consumed by the plan emitters.
pub mod keys {
    pub const CC: &str = "CC";
    pub const CXX: &str = "CXX";
    pub const AR: &str = "AR";
    pub const LINK: &str = "LINK";
    pub const CC_FLAGS: &str = "CCFLAGS";
    pub const CXX_FLAGS: &str = "CXXFLAGS";
    pub const DEFINES: &str = "CPPDEFINES";
    pub const INCLUDE_PATHS: &str = "CPPPATH";
    pub const LINK_FLAGS: &str = "LINKFLAGS";
    pub const LIBRARY_PATHS: &str = "LIBPATH";
    pub const LIBS: &str = "LIBS";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn is_empty(&self) -> bool {
        matches!(self, Scalar::Text(s) if s.is_empty())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ConfigValue {
    /// Tool path, command line, number or switch. Replaced only while unset.
    Scalar(Scalar),
    /// Flags, paths, defines. Ancestor items are appended.
    List(Vec<String>),
    /// Insertion-ordered set; ancestor items are unioned in.
    Set(Vec<String>),
    /// Keyed values; ancestor entries fill in missing keys.
    Mapping(BTreeMap<String, String>),
}

/// Raised when an ancestor's value has a different shape than the descendant's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

impl ConfigValue {
    pub fn text(value: impl Into<String>) -> Self {
        ConfigValue::Scalar(Scalar::Text(value.into()))
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConfigValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Vec::new();
        for item in items {
            push_unique(&mut out, item.into());
        }
        ConfigValue::Set(out)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConfigValue::Scalar(_) => "scalar",
            ConfigValue::List(_) => "list",
            ConfigValue::Set(_) => "set",
            ConfigValue::Mapping(_) => "mapping",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ConfigValue::Scalar(s) => s.is_empty(),
            ConfigValue::List(items) | ConfigValue::Set(items) => items.is_empty(),
            ConfigValue::Mapping(map) => map.is_empty(),
        }
    }

    /// Merges an ancestor's value into this (descendant) value.
    ///
    /// Scalars keep the descendant's value: a present scalar is always a local
    /// customization. Collections append or union the ancestor's items,
    /// keeping the first occurrence of each item.
    pub fn inherit(&self, ancestor: &ConfigValue) -> Result<ConfigValue, TypeMismatch> {
        if ancestor.is_empty() || self == ancestor {
            return Ok(self.clone());
        }

        match (self, ancestor) {
            (ConfigValue::Scalar(own), ConfigValue::Scalar(_)) if own.is_empty() => Ok(ancestor.clone()),
            (ConfigValue::Scalar(_), ConfigValue::Scalar(_)) => Ok(self.clone()),
            (ConfigValue::List(own), ConfigValue::List(theirs))
            | (ConfigValue::List(own), ConfigValue::Set(theirs)) => {
                let mut merged = own.clone();
                for item in theirs {
                    push_unique(&mut merged, item.clone());
                }
                Ok(ConfigValue::List(merged))
            }
            (ConfigValue::Set(own), ConfigValue::Set(theirs))
            | (ConfigValue::Set(own), ConfigValue::List(theirs)) => {
                let mut merged = own.clone();
                for item in theirs {
                    push_unique(&mut merged, item.clone());
                }
                Ok(ConfigValue::Set(merged))
            }
            (ConfigValue::Mapping(own), ConfigValue::Mapping(theirs)) => {
                let mut merged = own.clone();
                for (key, value) in theirs {
                    merged.entry(key.clone()).or_insert_with(|| value.clone());
                }
                Ok(ConfigValue::Mapping(merged))
            }
            _ => Err(TypeMismatch {
                expected: self.kind(),
                found: ancestor.kind(),
            }),
        }
    }

    /// Items of a collection, or the scalar rendered as a single item.
    pub fn items(&self) -> Vec<String> {
        match self {
            ConfigValue::Scalar(s) if s.is_empty() => Vec::new(),
            ConfigValue::Scalar(s) => vec![s.to_string()],
            ConfigValue::List(items) | ConfigValue::Set(items) => items.clone(),
            ConfigValue::Mapping(map) => map
                .iter()
                .map(|(k, v)| if v.is_empty() { k.clone() } else { format!("{}={}", k, v) })
                .collect(),
        }
    }
}

pub(crate) fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    values: BTreeMap<String, ConfigValue>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    /// Scalar value for `key`; `None` while unset.
    pub fn scalar(&self, key: &str) -> Option<&Scalar> {
        match self.values.get(key) {
            Some(ConfigValue::Scalar(s)) => Some(s),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.scalar(key).and_then(Scalar::as_text)
    }

    /// Items stored under `key`, empty when unset.
    pub fn items(&self, key: &str) -> Vec<String> {
        self.values.get(key).map(ConfigValue::items).unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Appends items to a list-valued key, creating it when absent.
    pub fn extend_list<I>(&mut self, key: &str, items: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut current = match self.values.remove(key) {
            Some(ConfigValue::List(items)) | Some(ConfigValue::Set(items)) => items,
            Some(other) => other.items(),
            None => Vec::new(),
        };
        for item in items {
            push_unique(&mut current, item);
        }
        self.values.insert(key.to_string(), ConfigValue::List(current));
    }

    /// Returns a new snapshot with `ancestor` merged in.
    ///
    /// Keys missing here are taken from the ancestor as they are. Shape
    /// mismatches are recorded as configuration errors for `module` and the
    /// local value is kept.
    pub fn inherit_from(
        &self,
        ancestor: &Configuration,
        module: &str,
        diagnostics: &mut Diagnostics,
    ) -> Configuration {
        let mut merged = self.clone();
        for (key, value) in &ancestor.values {
            if value.is_empty() {
                continue;
            }
            match self.values.get(key) {
                None => {
                    merged.values.insert(key.clone(), value.clone());
                }
                Some(own) => match own.inherit(value) {
                    Ok(next) => {
                        merged.values.insert(key.clone(), next);
                    }
                    Err(mismatch) => diagnostics.config_error(
                        module,
                        key,
                        format!(
                            "cannot merge inherited {} into {}",
                            mismatch.found, mismatch.expected
                        ),
                    ),
                },
            }
        }
        merged
    }
}
