use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A JSON object of event, person or group properties.
pub type Properties = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Capture,
    Identify,
    Alias,
    GroupIdentify,
}

/// One event ready for transmission.
///
/// The `uuid` is assigned when the envelope is built and never changes, so the
/// collector can deduplicate retried deliveries and the queue can remove
/// delivered envelopes by identity rather than by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub distinct_id: String,
    #[serde(default)]
    pub properties: Properties,
    pub timestamp: String,
    pub uuid: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
}

impl EventEnvelope {
    pub fn new(
        event_type: EventType,
        event: impl Into<String>,
        distinct_id: impl Into<String>,
        properties: Properties,
    ) -> Self {
        Self {
            event: event.into(),
            distinct_id: distinct_id.into(),
            properties,
            timestamp: now_rfc3339(),
            uuid: Uuid::now_v7().to_string(),
            event_type,
        }
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The resolved value of a feature flag: either on/off or a variant name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Variant(String),
}

impl FlagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            FlagValue::Variant(_) => None,
        }
    }

    pub fn as_variant(&self) -> Option<&str> {
        match self {
            FlagValue::Variant(v) => Some(v),
            FlagValue::Bool(_) => None,
        }
    }

    /// A variant counts as enabled; only `false` is disabled.
    pub fn is_enabled(&self) -> bool {
        match self {
            FlagValue::Bool(b) => *b,
            FlagValue::Variant(_) => true,
        }
    }

    /// Interpret a legacy `featureFlags` value. Anything that is not a
    /// string is reduced to its truthiness.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => FlagValue::Variant(s.clone()),
            other => FlagValue::Bool(is_truthy(other)),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::Variant(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        FlagValue::Variant(value)
    }
}

impl From<FlagValue> for Value {
    fn from(value: FlagValue) -> Self {
        match value {
            FlagValue::Bool(b) => Value::Bool(b),
            FlagValue::Variant(v) => Value::String(v),
        }
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReason {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagMetadata {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    /// JSON-encoded payload, exactly as the server sends it.
    #[serde(default)]
    pub payload: Option<String>,
}

/// Per-flag evaluation detail in the v4 `flags` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlagDetail {
    pub key: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<EvaluationReason>,
    #[serde(default)]
    pub metadata: FlagMetadata,
}

impl FeatureFlagDetail {
    /// Variant when present, otherwise the enabled bit.
    pub fn value(&self) -> FlagValue {
        match self.variant {
            Some(ref v) => FlagValue::Variant(v.clone()),
            None => FlagValue::Bool(self.enabled),
        }
    }

    /// The decoded payload. A payload that is not valid JSON is returned as
    /// a JSON string.
    pub fn payload(&self) -> Option<Value> {
        self.metadata.payload.as_deref().map(parse_payload)
    }
}

pub(crate) fn parse_payload(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
