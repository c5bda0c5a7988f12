//! Lenient decoders for the job API payloads.
//!
//! The backend omits, nulls, or retypes fields freely, so every field here
//! decodes to `None`, an empty list, or an opaque value instead of failing.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::content::RawContent;
use crate::job::{JobStatus, JobSummary};

const DEFAULT_STEP_TEXT: &str = "Progress update";

/// One payload of `GET /api/research/status/{job_id}`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct StatusSnapshot {
    #[serde(deserialize_with = "lenient_status")]
    pub status: JobStatus,
    #[serde(deserialize_with = "lenient_string")]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub completed_at: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub current_step: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub thread_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub run_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub error_message: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub error: Option<String>,
    #[serde(deserialize_with = "lenient_steps")]
    pub steps: Vec<RawStep>,
    /// `None` when the backend has no run yet; distinct from an empty thread.
    #[serde(deserialize_with = "lenient_messages")]
    pub messages: Option<Vec<RawMessage>>,
}

impl StatusSnapshot {
    /// Best available failure description, if the backend sent one.
    pub fn failure_text(&self) -> Option<&str> {
        self.error_message
            .as_deref()
            .filter(|text| !text.is_empty())
            .or_else(|| self.error.as_deref().filter(|text| !text.is_empty()))
    }
}

/// Payload of `GET /api/research/result/{job_id}`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ResultPayload {
    #[serde(deserialize_with = "lenient_string")]
    pub result: Option<String>,
    #[serde(deserialize_with = "lenient_steps")]
    pub steps: Vec<RawStep>,
}

/// Payload of `GET /api/research/jobs`. `jobs` stays `None` when the array is missing.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct JobListPayload {
    #[serde(deserialize_with = "lenient_jobs")]
    pub jobs: Option<Vec<JobSummary>>,
}

/// Payload of `POST /api/research/start`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct StartJobResponse {
    #[serde(deserialize_with = "lenient_string")]
    pub job_id: Option<String>,
}

/// A step row, in either the `{message|status}` or `{step_name, step_details}` shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawStep {
    pub message: Option<String>,
    pub status: Option<String>,
    pub timestamp: Option<Value>,
}

impl RawStep {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                message: string_field(map, "message").or_else(|| string_field(map, "step_details")),
                status: string_field(map, "status").or_else(|| string_field(map, "step_name")),
                timestamp: map.get("timestamp").filter(|ts| !ts.is_null()).cloned(),
            },
            Value::String(text) if !text.is_empty() => Self {
                message: Some(text.clone()),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    pub fn message_text(&self) -> &str {
        self.message
            .as_deref()
            .or(self.status.as_deref())
            .unwrap_or(DEFAULT_STEP_TEXT)
    }

    pub fn timestamp_text(&self) -> Option<String> {
        self.timestamp.as_ref().and_then(timestamp_text)
    }
}

/// Epoch seconds become ISO-8601 UTC with milliseconds; strings pass through.
pub fn timestamp_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => {
            let seconds = number.as_f64()?;
            let millis = (seconds * 1000.0).round() as i64;
            DateTime::<Utc>::from_timestamp_millis(millis)
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

/// A thread message exactly as the backend sent it, before display conversion.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "Value")]
pub struct RawMessage {
    pub id: Option<String>,
    pub role: Option<String>,
    pub content: RawContent,
    pub citations: Option<Vec<Value>>,
    pub annotations: Option<Vec<Value>>,
    pub references: Option<Vec<Value>>,
    pub urls: Option<Vec<Value>>,
    pub sources: Option<Vec<Value>>,
    pub created_at: Option<Value>,
}

impl RawMessage {
    pub fn is_user(&self) -> bool {
        self.role.as_deref() == Some("user")
    }

    /// Records the per-message citation map is built from: `citations` when it
    /// is a list, otherwise `annotations`.
    pub fn citation_records(&self) -> &[Value] {
        self.citations
            .as_deref()
            .or(self.annotations.as_deref())
            .unwrap_or(&[])
    }
}

impl From<Value> for RawMessage {
    fn from(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::default();
        };
        Self {
            id: map.get("id").and_then(scalar_text),
            role: string_field(&map, "role"),
            citations: array_field(&map, "citations"),
            annotations: array_field(&map, "annotations"),
            references: array_field(&map, "references"),
            urls: array_field(&map, "urls"),
            sources: array_field(&map, "sources"),
            created_at: map.get("created_at").filter(|ts| !ts.is_null()).cloned(),
            content: RawContent::decode(map.remove("content").unwrap_or(Value::Null)),
        }
    }
}

pub(crate) fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

fn array_field(map: &Map<String, Value>, key: &str) -> Option<Vec<Value>> {
    match map.get(key) {
        Some(Value::Array(items)) => Some(items.clone()),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_text))
}

pub(crate) fn lenient_status<'de, D>(deserializer: D) -> Result<JobStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(raw)) => JobStatus::parse(&raw),
        _ => JobStatus::default(),
    })
}

fn lenient_steps<'de, D>(deserializer: D) -> Result<Vec<RawStep>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().map(RawStep::from_value).collect(),
        _ => Vec::new(),
    })
}

fn lenient_messages<'de, D>(deserializer: D) -> Result<Option<Vec<RawMessage>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(items.into_iter().map(RawMessage::from).collect()),
        _ => None,
    })
}

fn lenient_jobs<'de, D>(deserializer: D) -> Result<Option<Vec<JobSummary>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        _ => None,
    })
}
