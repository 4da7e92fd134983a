//! Feature flag requests and response normalization.
//!
//! The flags endpoint answers in one of two shapes. The v1 shape carries
//! `featureFlags` and `featureFlagPayloads`; the v4 shape carries a `flags`
//! map of per-flag details. [`FlagsResponse`] always holds both projections
//! regardless of which one the server sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::event_bus::EventBus;
use crate::error::{ErrorCode, PostHogError, Result};
use crate::http::ApiClient;
use crate::types::{
    is_truthy, parse_payload, EvaluationReason, FeatureFlagDetail, FlagMetadata, FlagValue,
    Properties,
};

const FLAGS_PATH: &str = "/flags/?v=2";

/// Evaluation subject sent with a flags request.
#[derive(Debug, Clone, Default)]
pub struct FlagsContext {
    pub distinct_id: String,
    pub anon_distinct_id: Option<String>,
    /// Group type to group key, e.g. `{"company": "acme"}`.
    pub groups: Properties,
    pub person_properties: Properties,
    pub group_properties: Properties,
}

#[derive(Serialize)]
struct FlagsRequest<'a> {
    token: &'a str,
    distinct_id: &'a str,
    groups: &'a Properties,
    person_properties: &'a Properties,
    group_properties: &'a Properties,
    #[serde(rename = "$anon_distinct_id", skip_serializing_if = "Option::is_none")]
    anon_distinct_id: Option<&'a str>,
}

/// A flags response with both projections populated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagsResponse {
    pub flags: HashMap<String, FeatureFlagDetail>,
    pub feature_flags: HashMap<String, FlagValue>,
    pub feature_flag_payloads: HashMap<String, Value>,
    /// The server could not evaluate every flag; the map is partial.
    pub errors_while_computing_flags: bool,
    pub quota_limited: Vec<String>,
    pub request_id: Option<String>,
    /// The response body, including any remote config fields.
    pub raw: Value,
}

impl FlagsResponse {
    pub fn is_quota_limited(&self) -> bool {
        self.quota_limited.iter().any(|q| q == "feature_flags")
    }

    /// Build both projections from per-flag details.
    pub fn from_details(flags: HashMap<String, FeatureFlagDetail>) -> Self {
        let mut response = Self {
            flags,
            ..Default::default()
        };
        response.project_legacy();
        response
    }

    fn project_legacy(&mut self) {
        self.feature_flags = self
            .flags
            .iter()
            .map(|(k, d)| (k.clone(), d.value()))
            .collect();
        self.feature_flag_payloads = self
            .flags
            .iter()
            .filter_map(|(k, d)| d.payload().map(|p| (k.clone(), p)))
            .collect();
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponse {
    #[serde(default)]
    flags: Option<HashMap<String, RawDetail>>,
    #[serde(default)]
    feature_flags: Option<HashMap<String, Value>>,
    #[serde(default)]
    feature_flag_payloads: Option<HashMap<String, Value>>,
    #[serde(default)]
    errors_while_computing_flags: bool,
    #[serde(default)]
    quota_limited: Vec<String>,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Deserialize)]
struct RawDetail {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    reason: Option<EvaluationReason>,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

#[derive(Deserialize)]
struct RawMetadata {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    version: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
}

impl RawMetadata {
    fn into_metadata(self) -> FlagMetadata {
        let payload = match self.payload {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        };
        FlagMetadata {
            id: self.id,
            version: self.version,
            description: self.description,
            payload,
        }
    }
}

/// Normalize a v1 or v4 flags response body.
///
/// # Errors
///
/// Returns a `serialization_error` when the body is not a flags response.
pub fn normalize(raw: Value) -> Result<FlagsResponse> {
    let parsed: RawResponse = serde_json::from_value(raw.clone())?;

    let flags = match (parsed.flags, parsed.feature_flags) {
        (Some(flags), _) => flags
            .into_iter()
            .map(|(key, detail)| {
                let detail = FeatureFlagDetail {
                    key: detail.key.unwrap_or_else(|| key.clone()),
                    enabled: detail.enabled,
                    variant: detail.variant,
                    reason: detail.reason,
                    metadata: detail
                        .metadata
                        .map(RawMetadata::into_metadata)
                        .unwrap_or_default(),
                };
                (key, detail)
            })
            .collect(),
        (None, Some(feature_flags)) => {
            let payloads = parsed.feature_flag_payloads.unwrap_or_default();
            feature_flags
                .into_iter()
                .map(|(key, value)| {
                    let detail = detail_from_legacy(&key, &value, payloads.get(&key));
                    (key, detail)
                })
                .collect()
        }
        (None, None) => HashMap::new(),
    };

    let mut response = FlagsResponse::from_details(flags);
    response.errors_while_computing_flags = parsed.errors_while_computing_flags;
    response.quota_limited = parsed.quota_limited;
    response.request_id = parsed.request_id;
    response.raw = raw;
    Ok(response)
}

/// Synthesize a v4 detail from a legacy value and payload.
pub fn detail_from_legacy(key: &str, value: &Value, payload: Option<&Value>) -> FeatureFlagDetail {
    let payload = payload.filter(|p| is_truthy(p)).map(|p| match p {
        Value::String(s) => parse_payload(s),
        other => other.clone(),
    });

    FeatureFlagDetail {
        key: key.to_string(),
        enabled: is_truthy(value),
        variant: value.as_str().map(str::to_string),
        reason: None,
        metadata: FlagMetadata {
            id: None,
            version: None,
            description: None,
            payload: payload.map(|p| p.to_string()),
        },
    }
}

/// Outcome of a flags request. Failures never propagate as `Err`.
#[derive(Debug, Clone)]
pub enum FlagsResult {
    Success(FlagsResponse),
    Failure {
        code: ErrorCode,
        status_code: Option<u16>,
        error: PostHogError,
    },
}

impl FlagsResult {
    fn failure(error: PostHogError) -> Self {
        FlagsResult::Failure {
            code: error.code,
            status_code: error.status(),
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FlagsResult::Success(_))
    }

    pub fn response(&self) -> Option<&FlagsResponse> {
        match self {
            FlagsResult::Success(response) => Some(response),
            FlagsResult::Failure { .. } => None,
        }
    }
}

/// Issues flags and remote config requests.
pub struct FlagsResolver {
    api: ApiClient,
    bus: Arc<EventBus>,
    timeout: Duration,
}

impl FlagsResolver {
    pub fn new(api: ApiClient, bus: Arc<EventBus>, timeout: Duration) -> Self {
        Self { api, bus, timeout }
    }

    /// Ask the server to evaluate every flag for `context`.
    pub async fn resolve_flags(&self, context: &FlagsContext, with_config: bool) -> FlagsResult {
        let path = if with_config {
            format!("{FLAGS_PATH}&config=true")
        } else {
            FLAGS_PATH.to_string()
        };
        let body = FlagsRequest {
            token: self.api.api_key(),
            distinct_id: &context.distinct_id,
            groups: &context.groups,
            person_properties: &context.person_properties,
            group_properties: &context.group_properties,
            anon_distinct_id: context.anon_distinct_id.as_deref(),
        };

        match self.post_flags(&path, &body).await {
            Ok(response) => {
                tracing::debug!(
                    count = response.flags.len(),
                    partial = response.errors_while_computing_flags,
                    "Feature flags loaded"
                );
                FlagsResult::Success(response)
            }
            Err(e) => {
                tracing::warn!(status = e.status(), error = %e, "Feature flags request failed");
                self.bus.emit_error(&e);
                FlagsResult::failure(e)
            }
        }
    }

    async fn post_flags(&self, path: &str, body: &FlagsRequest<'_>) -> Result<FlagsResponse> {
        let response = self.api.post(path, body, self.timeout).await?;
        normalize(response.json::<Value>()?)
    }

    /// Fetch the project's remote configuration.
    pub async fn fetch_remote_config(&self) -> Result<Value> {
        let path = format!("/array/{}/config", self.api.api_key());
        let response = self.api.get(&path, self.timeout).await?;
        let config = response.json::<Value>()?;
        tracing::debug!("Remote config loaded");
        Ok(config)
    }
}
