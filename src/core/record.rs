// src/core/record.rs

//! The validated event record and the normalizer that builds it from arbitrary JSON.

use crate::core::errors::ValidationError;
use serde::Serialize;
use serde_json::{Map, Value};

const EVENT_TYPE: &str = "event_type";
const USER_ID: &str = "user_id";
const PROPS: &str = "props";

/// A normalized event, ready to be handed to an ingest sink.
///
/// A `Record` can only be obtained through [`Record::normalize`], so every instance
/// satisfies the field rules. It is immutable apart from attaching the source address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    event_type: String,
    user_id: String,
    source_ip: Option<String>,
    props: Map<String, Value>,
}

impl Record {
    /// Validates a decoded JSON value and turns it into a `Record`.
    ///
    /// Top-level keys other than `event_type`, `user_id` and `props` are folded into
    /// `props`. When a key appears both at the top level and inside `props`, the value
    /// from `props` wins. The returned record has no source address.
    ///
    /// A non-string `user_id` is stored as its compact JSON text: `42` becomes `"42"`,
    /// `true` becomes `"true"` and `[1,"a"]` becomes `"[1,\"a\"]"`.
    pub fn normalize(value: &Value) -> Result<Self, ValidationError> {
        let Value::Object(obj) = value else {
            return Err(ValidationError::NotAnObject);
        };

        let event_type = match obj.get(EVENT_TYPE) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => return Err(ValidationError::InvalidEventType),
        };

        let user_id = match obj.get(USER_ID) {
            Some(v) if !is_falsy(v) => coerce_to_string(v),
            _ => return Err(ValidationError::InvalidUserId),
        };

        let explicit_props = match obj.get(PROPS) {
            None | Some(Value::Null) => None,
            Some(Value::Object(props)) => Some(props),
            Some(_) => return Err(ValidationError::InvalidProps),
        };

        let mut props: Map<String, Value> = obj
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), EVENT_TYPE | USER_ID | PROPS))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(explicit) = explicit_props {
            for (k, v) in explicit {
                props.insert(k.clone(), v.clone());
            }
        }

        Ok(Self {
            event_type,
            user_id,
            source_ip: None,
            props,
        })
    }

    /// Attaches the address of the peer the record was received from.
    pub fn with_source_ip(mut self, source_ip: impl Into<String>) -> Self {
        self.source_ip = Some(source_ip.into());
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn source_ip(&self) -> Option<&str> {
        self.source_ip.as_deref()
    }

    pub fn props(&self) -> &Map<String, Value> {
        &self.props
    }
}

/// Null, `false`, zero and empty strings or containers count as missing.
fn is_falsy(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Strings are taken as-is; everything else uses its compact JSON text.
fn coerce_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
