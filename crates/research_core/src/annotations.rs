//! Normalizes the backend's citation records into one lookup keyed by
//! `"<messageOrdinal>:<annotationOrdinal>"`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::content::non_empty_str;
use crate::patterns::find_url;
use crate::wire::RawMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationKey {
    pub message: usize,
    pub annotation: usize,
}

impl AnnotationKey {
    pub fn new(message: usize, annotation: usize) -> Self {
        Self {
            message,
            annotation,
        }
    }
}

impl fmt::Display for AnnotationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.message, self.annotation)
    }
}

impl FromStr for AnnotationKey {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (message, annotation) = raw.split_once(':').ok_or(())?;
        Ok(Self::new(
            message.trim().parse().map_err(|_| ())?,
            annotation.trim().parse().map_err(|_| ())?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationTarget {
    pub url: String,
    pub title: String,
}

impl CitationTarget {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }

    /// A title-only target (bare string without a URL) cannot become a link.
    pub fn is_linkable(&self) -> bool {
        !self.url.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationEntry {
    pub key: AnnotationKey,
    pub target: CitationTarget,
}

/// Lookup rebuilt from scratch for every snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationIndex {
    entries: BTreeMap<AnnotationKey, CitationTarget>,
}

impl AnnotationIndex {
    /// Reads only each message's `annotations` list; `citations` feed the
    /// per-message map instead.
    pub fn build(messages: &[RawMessage]) -> Self {
        let mut entries = BTreeMap::new();
        for (message_ordinal, message) in messages.iter().enumerate() {
            let Some(annotations) = message.annotations.as_deref() else {
                continue;
            };
            for (annotation_ordinal, record) in annotations.iter().enumerate() {
                if let Some(target) = resolve_record(record) {
                    entries.insert(AnnotationKey::new(message_ordinal, annotation_ordinal), target);
                }
            }
        }
        Self { entries }
    }

    pub fn get(&self, key: AnnotationKey) -> Option<&CitationTarget> {
        self.entries.get(&key)
    }

    pub fn lookup(&self, key: &str) -> Option<&CitationTarget> {
        key.parse().ok().and_then(|key| self.get(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = AnnotationEntry> + '_ {
        self.entries.iter().map(|(key, target)| AnnotationEntry {
            key: *key,
            target: target.clone(),
        })
    }
}

/// Decodes one citation record. Shapes, in precedence order:
/// `{type: "url_citation", url_citation: {url, title}}`, `{url, title}`, and a
/// bare string with an embedded URL (title only when no URL is found).
pub fn resolve_record(record: &Value) -> Option<CitationTarget> {
    match record {
        Value::Object(map) => url_citation(map).or_else(|| direct_target(map)),
        Value::String(text) if !text.is_empty() => Some(CitationTarget::new(
            find_url(text).unwrap_or_default(),
            text.clone(),
        )),
        _ => None,
    }
}

fn url_citation(map: &Map<String, Value>) -> Option<CitationTarget> {
    if non_empty_str(map.get("type")) != Some("url_citation") {
        return None;
    }
    let payload = match map.get("url_citation")? {
        Value::String(encoded) => serde_json::from_str::<Value>(encoded).ok()?,
        other => other.clone(),
    };
    let Value::Object(inner) = payload else {
        return None;
    };
    direct_target(&inner)
}

fn direct_target(map: &Map<String, Value>) -> Option<CitationTarget> {
    let url = non_empty_str(map.get("url"))?;
    let title = non_empty_str(map.get("title")).unwrap_or(url);
    Some(CitationTarget::new(url, title))
}
