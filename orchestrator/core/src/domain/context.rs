// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Context Values
//!
//! Task descriptions arrive with a free-form attribute map (credentials,
//! search queries, nested composite steps). `ContextValue` is the closed set of
//! shapes such a map may hold; accessors fail closed with a [`ContextError`]
//! instead of silently coercing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Ordered string-keyed attribute map carried by tasks and subtasks.
pub type ContextMap = BTreeMap<String, ContextValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ContextValue>),
    Map(ContextMap),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("missing key '{0}'")]
    Missing(String),
    #[error("key '{key}' has type {actual}, expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl ContextValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ContextValue::Bool(_) => "bool",
            ContextValue::Int(_) => "int",
            ContextValue::Float(_) => "float",
            ContextValue::String(_) => "string",
            ContextValue::List(_) => "list",
            ContextValue::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ContextValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ContextMap> {
        match self {
            ContextValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Parse a CLI-style literal: `true`/`false`, integers, floats, else a string.
    pub fn parse_literal(raw: &str) -> Self {
        if let Ok(b) = raw.parse::<bool>() {
            return ContextValue::Bool(b);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return ContextValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return ContextValue::Float(f);
        }
        ContextValue::String(raw.to_string())
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Bool(b) => write!(f, "{b}"),
            ContextValue::Int(i) => write!(f, "{i}"),
            ContextValue::Float(v) => write!(f, "{v}"),
            ContextValue::String(s) => f.write_str(s),
            ContextValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            ContextValue::Map(m) => {
                let parts: Vec<String> = m.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::String(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::String(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Int(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Float(value)
    }
}

impl From<Vec<ContextValue>> for ContextValue {
    fn from(value: Vec<ContextValue>) -> Self {
        ContextValue::List(value)
    }
}

impl From<ContextMap> for ContextValue {
    fn from(value: ContextMap) -> Self {
        ContextValue::Map(value)
    }
}

/// Typed accessors over a [`ContextMap`].
pub trait ContextExt {
    fn get_value(&self, key: &str) -> Result<&ContextValue, ContextError>;
    fn get_str(&self, key: &str) -> Result<&str, ContextError>;
    fn get_int(&self, key: &str) -> Result<i64, ContextError>;
    fn get_list(&self, key: &str) -> Result<&[ContextValue], ContextError>;
    fn get_map(&self, key: &str) -> Result<&ContextMap, ContextError>;

    /// String value for `key`, or `default` when the key is absent.
    /// A present key of the wrong type is still an error.
    fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str, ContextError>;
}

fn wrong_type(key: &str, expected: &'static str, actual: &ContextValue) -> ContextError {
    ContextError::WrongType {
        key: key.to_string(),
        expected,
        actual: actual.type_name(),
    }
}

impl ContextExt for ContextMap {
    fn get_value(&self, key: &str) -> Result<&ContextValue, ContextError> {
        self.get(key).ok_or_else(|| ContextError::Missing(key.to_string()))
    }

    fn get_str(&self, key: &str) -> Result<&str, ContextError> {
        let value = self.get_value(key)?;
        value.as_str().ok_or_else(|| wrong_type(key, "string", value))
    }

    fn get_int(&self, key: &str) -> Result<i64, ContextError> {
        let value = self.get_value(key)?;
        value.as_int().ok_or_else(|| wrong_type(key, "int", value))
    }

    fn get_list(&self, key: &str) -> Result<&[ContextValue], ContextError> {
        match self.get_value(key)? {
            ContextValue::List(items) => Ok(items),
            other => Err(wrong_type(key, "list", other)),
        }
    }

    fn get_map(&self, key: &str) -> Result<&ContextMap, ContextError> {
        let value = self.get_value(key)?;
        value.as_map().ok_or_else(|| wrong_type(key, "map", value))
    }

    fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str, ContextError> {
        match self.get_str(key) {
            Err(ContextError::Missing(_)) => Ok(default),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_fail_closed() {
        let mut ctx = ContextMap::new();
        ctx.insert("username".into(), "alice".into());
        ctx.insert("duration".into(), 1500i64.into());

        assert_eq!(ctx.get_str("username").unwrap(), "alice");
        assert_eq!(ctx.get_int("duration").unwrap(), 1500);
        assert_eq!(ctx.get_str("password"), Err(ContextError::Missing("password".into())));
        assert!(matches!(
            ctx.get_int("username"),
            Err(ContextError::WrongType { expected: "int", actual: "string", .. })
        ));
    }

    #[test]
    fn str_or_only_defaults_on_missing_keys() {
        let mut ctx = ContextMap::new();
        ctx.insert("direction".into(), 3i64.into());

        assert_eq!(ctx.str_or("target", "screen").unwrap(), "screen");
        assert!(ctx.str_or("direction", "down").is_err());
    }

    #[test]
    fn deserializes_untagged_json() {
        let ctx: ContextMap = serde_json::from_str(
            r#"{"query": "rust", "limit": 3, "ratio": 0.5, "ok": true, "steps": [{"type": "CLICK"}]}"#,
        )
        .unwrap();

        assert_eq!(ctx.get_str("query").unwrap(), "rust");
        assert_eq!(ctx.get_int("limit").unwrap(), 3);
        assert_eq!(ctx.get("ratio"), Some(&ContextValue::Float(0.5)));
        assert_eq!(ctx.get("ok"), Some(&ContextValue::Bool(true)));
        assert_eq!(ctx.get_list("steps").unwrap().len(), 1);
    }

    #[test]
    fn parse_literal_prefers_narrowest_type() {
        assert_eq!(ContextValue::parse_literal("true"), ContextValue::Bool(true));
        assert_eq!(ContextValue::parse_literal("42"), ContextValue::Int(42));
        assert_eq!(ContextValue::parse_literal("4.5"), ContextValue::Float(4.5));
        assert_eq!(ContextValue::parse_literal("u"), ContextValue::String("u".into()));
    }
}
