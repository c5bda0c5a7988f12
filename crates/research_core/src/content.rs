//! Message body and reference extraction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::patterns::find_url;
use crate::wire::RawMessage;

/// The shapes a message `content` field arrives in.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawContent {
    /// Array of strings and/or arbitrary JSON fragments.
    Fragments(Vec<Value>),
    Text(String),
    /// Object carrying a string `text` field.
    TextObject(String),
    /// Object carrying a `parts` array.
    Parts(Vec<Value>),
    /// Any other object, kept verbatim and shown as JSON.
    Opaque(Value),
    #[default]
    Empty,
}

impl RawContent {
    pub fn decode(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Fragments(items),
            Value::String(text) => Self::Text(text),
            Value::Object(mut map) => {
                if let Some(Value::String(text)) = map.get("text") {
                    return Self::TextObject(text.clone());
                }
                if matches!(map.get("parts"), Some(Value::Array(_))) {
                    if let Some(Value::Array(parts)) = map.remove("parts") {
                        return Self::Parts(parts);
                    }
                }
                Self::Opaque(Value::Object(map))
            }
            _ => Self::Empty,
        }
    }

    pub fn extract_text(&self) -> String {
        match self {
            Self::Fragments(items) => items
                .iter()
                .map(fragment_text)
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Text(text) | Self::TextObject(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .map(|part| match part.get("text") {
                    Some(Value::String(text)) => text.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Opaque(value) => value.to_string(),
            Self::Empty => String::new(),
        }
    }
}

fn fragment_text(fragment: &Value) -> String {
    match fragment {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// A link the UI lists under a message. Duplicates are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub url: String,
    pub title: String,
}

impl Reference {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }

    fn same(value: &str) -> Self {
        Self::new(value, value)
    }
}

/// References in discovery order: citations, references, urls, then sources.
pub fn extract_references(message: &RawMessage) -> Vec<Reference> {
    let mut found = Vec::new();
    for citation in message.citations.iter().flatten() {
        found.extend(citation_reference(citation));
    }
    for reference in message.references.iter().flatten() {
        found.extend(listed_reference(reference));
    }
    for value in message
        .urls
        .iter()
        .flatten()
        .chain(message.sources.iter().flatten())
    {
        found.extend(bare_reference(value));
    }
    found
}

fn citation_reference(citation: &Value) -> Option<Reference> {
    match citation {
        Value::String(text) => Some(Reference::new(find_url(text).unwrap_or_default(), text.clone())),
        Value::Object(map) => {
            if let Some(url) = non_empty_str(map.get("url")) {
                let title = non_empty_str(map.get("title")).unwrap_or(url);
                return Some(Reference::new(url, title));
            }
            let title = non_empty_str(map.get("title"))?;
            find_url(title).map(|url| Reference::new(url, title))
        }
        _ => None,
    }
}

fn listed_reference(reference: &Value) -> Option<Reference> {
    match reference {
        Value::String(text) if !text.is_empty() => Some(Reference::same(text)),
        Value::Object(map) => {
            let url = non_empty_str(map.get("url"))?;
            let title = non_empty_str(map.get("title")).unwrap_or(url);
            Some(Reference::new(url, title))
        }
        _ => None,
    }
}

fn bare_reference(value: &Value) -> Option<Reference> {
    match value {
        Value::String(text) if !text.is_empty() => Some(Reference::same(text)),
        Value::Object(_) => listed_reference(value),
        Value::Number(number) => Some(Reference::same(&number.to_string())),
        _ => None,
    }
}

pub(crate) fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    match value {
        Some(Value::String(text)) if !text.is_empty() => Some(text),
        _ => None,
    }
}
