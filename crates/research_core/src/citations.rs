//! Inline citation marker (`【...】`) rewriting.
//!
//! Markers are resolved in three passes (composite `【m:a†label】`, positional
//! `【n†label】`, then generic `【anything】`). Each resolved marker is swapped
//! for an opaque placeholder so later passes and the markdown converter never
//! see the emitted link markup; [`RewrittenText::restore`] puts it back.

use std::collections::HashMap;

use regex::Captures;
use serde_json::Value;

use crate::annotations::{resolve_record, AnnotationIndex, AnnotationKey, CitationTarget};
use crate::markdown::{escape_attr, escape_text, RenderError};
use crate::patterns::patterns;

const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';
const SEARCH_BASE: &str = "https://www.google.com/search?q=";
const KEYWORD_STOPWORDS: &[&str] = &["です", "ます", "から", "まで", "について"];
const MAX_KEYWORDS: usize = 3;
const MAX_CONTEXT_HEADINGS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkStyle {
    /// `<a class="citation-link">` anchors and `<span>` markers.
    #[default]
    Html,
    /// `[marker](url)` links; unresolved markers stay as plain text.
    Markdown,
}

/// Per-message citation map, built from the message's own citation list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalCitationMap {
    entries: HashMap<String, CitationTarget>,
}

impl LocalCitationMap {
    /// Keys each linkable record by its list position, by `"{ordinal}:{position}"`
    /// when the message ordinal is known, and by any explicit `index`, `id`,
    /// `text` or `title` field. Explicit keys win over positional ones.
    pub fn build(records: &[Value], message_ordinal: Option<usize>) -> Self {
        let mut entries = HashMap::new();
        for (position, record) in records.iter().enumerate() {
            let Some(target) = resolve_record(record).filter(CitationTarget::is_linkable) else {
                continue;
            };
            if let Some(ordinal) = message_ordinal {
                entries.insert(format!("{ordinal}:{position}"), target.clone());
            }
            entries
                .entry(position.to_string())
                .or_insert_with(|| target.clone());
            for alias in explicit_keys(record) {
                entries.insert(alias, target.clone());
            }
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&CitationTarget> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn explicit_keys(record: &Value) -> Vec<String> {
    let Value::Object(map) = record else {
        return Vec::new();
    };
    ["index", "id", "text", "title"]
        .iter()
        .filter_map(|field| match map.get(*field) {
            Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            _ => None,
        })
        .collect()
}

/// The job a message belongs to, used to build search links for markers
/// that resolve nowhere.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobContext {
    title: String,
}

impl JobContext {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Guesses a title from the body: short headings first, else a short first line.
    pub fn infer(body: &str) -> Option<Self> {
        let headings: Vec<String> = body
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('#'))
            .map(clean_heading)
            .filter(|heading| !heading.is_empty() && heading.chars().count() < 80)
            .take(MAX_CONTEXT_HEADINGS)
            .collect();
        if !headings.is_empty() {
            return Some(Self::new(headings.join(" ")));
        }
        body.lines()
            .map(clean_heading)
            .find(|line| !line.is_empty())
            .filter(|line| line.chars().count() < 100)
            .map(Self::new)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn keywords(&self) -> Option<String> {
        let words: Vec<&str> = self
            .title
            .split(' ')
            .filter(|word| word.chars().count() > 2 && !KEYWORD_STOPWORDS.contains(word))
            .take(MAX_KEYWORDS)
            .collect();
        (!words.is_empty()).then(|| words.join(" "))
    }

    /// Search-engine URL for the keywords, paired with the keywords themselves.
    pub fn search_link(&self) -> Option<(String, String)> {
        let keywords = self.keywords()?;
        let url = format!("{SEARCH_BASE}{}", urlencoding::encode(&keywords));
        Some((url, keywords))
    }
}

fn clean_heading(line: &str) -> String {
    line.trim()
        .trim_start_matches('#')
        .replace("**", "")
        .trim()
        .to_string()
}

/// Lookups available while rewriting one message body.
#[derive(Debug, Clone, Copy, Default)]
pub struct CitationContext<'a> {
    pub annotations: Option<&'a AnnotationIndex>,
    pub local: Option<&'a LocalCitationMap>,
    pub job: Option<&'a JobContext>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Linked(CitationTarget),
    /// No citation matched; links to a search for the job's keywords.
    Search { url: String, keywords: String },
    /// Numbered marker with nothing behind it.
    Broken,
    /// Generic marker with no matching key.
    Plain,
}

impl<'a> CitationContext<'a> {
    pub fn resolve_composite(&self, message: usize, annotation: usize) -> Resolution {
        let key = AnnotationKey::new(message, annotation);
        self.annotations
            .and_then(|index| index.get(key))
            .filter(|target| target.is_linkable())
            .or_else(|| self.local_target(&key.to_string()))
            .map(|target| Resolution::Linked(target.clone()))
            .unwrap_or_else(|| self.fallback())
    }

    pub fn resolve_positional(&self, position: &str) -> Resolution {
        self.local_target(position)
            .map(|target| Resolution::Linked(target.clone()))
            .unwrap_or_else(|| self.fallback())
    }

    pub fn resolve_generic(&self, inner: &str) -> Resolution {
        self.local_target(inner)
            .map(|target| Resolution::Linked(target.clone()))
            .unwrap_or(Resolution::Plain)
    }

    fn local_target(&self, key: &str) -> Option<&'a CitationTarget> {
        self.local
            .and_then(|local| local.get(key))
            .filter(|target| target.is_linkable())
    }

    fn fallback(&self) -> Resolution {
        match self.job.and_then(JobContext::search_link) {
            Some((url, keywords)) => Resolution::Search { url, keywords },
            None => Resolution::Broken,
        }
    }
}

/// Text with every marker replaced by a placeholder, plus the rendered
/// markup each placeholder stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenText {
    text: String,
    fragments: Vec<String>,
}

impl RewrittenText {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Substitutes the rendered fragments back into `text`, which may have been
    /// transformed since rewriting as long as placeholders were left intact.
    pub fn restore(&self, text: &str) -> Result<String, RenderError> {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c != PLACEHOLDER_OPEN {
                out.push(c);
                continue;
            }
            let digits: String = chars.by_ref().take_while(|&d| d != PLACEHOLDER_CLOSE).collect();
            let fragment = digits
                .parse::<usize>()
                .ok()
                .and_then(|index| self.fragments.get(index))
                .ok_or(RenderError::Placeholder(digits))?;
            out.push_str(fragment);
        }
        Ok(out)
    }

    fn push(&mut self, fragment: String) -> String {
        let placeholder = format!("{PLACEHOLDER_OPEN}{}{PLACEHOLDER_CLOSE}", self.fragments.len());
        self.fragments.push(fragment);
        placeholder
    }
}

/// Repairs comma placement around markers before they are resolved.
pub fn normalize_marker_punctuation(text: &str) -> Result<String, RenderError> {
    let p = patterns()?;
    // `】 ,\n 【` style separators collapse to `】,【` in a single pass.
    let text = p.adjacent_markers.replace_all(text, "】,【");
    let text = p.marker_then_prose.replace_all(&text, |caps: &Captures<'_>| {
        format!("{}\n- {}{}", &caps[1], &caps[2], &caps[3])
    });
    let text = p.stray_comma_period.replace_all(&text, "。");
    let text = p.stray_comma_enum.replace_all(&text, "、");
    Ok(text.into_owned())
}

pub fn rewrite_citations(
    text: &str,
    ctx: &CitationContext<'_>,
    style: LinkStyle,
) -> Result<RewrittenText, RenderError> {
    let p = patterns()?;
    let normalized = normalize_marker_punctuation(text)?;
    let mut rewritten = RewrittenText {
        text: String::new(),
        fragments: Vec::new(),
    };

    let after_composite = p
        .composite_marker
        .replace_all(&normalized, |caps: &Captures<'_>| {
            let resolution = match (caps[1].parse::<usize>(), caps[2].parse::<usize>()) {
                (Ok(message), Ok(annotation)) => ctx.resolve_composite(message, annotation),
                _ => ctx.fallback(),
            };
            rewritten.push(render_marker(&caps[0], &resolution, style))
        })
        .into_owned();

    let after_positional = p
        .positional_marker
        .replace_all(&after_composite, |caps: &Captures<'_>| {
            let resolution = ctx.resolve_positional(&caps[1]);
            rewritten.push(render_marker(&caps[0], &resolution, style))
        })
        .into_owned();

    let after_generic = p
        .generic_marker
        .replace_all(&after_positional, |caps: &Captures<'_>| {
            let resolution = ctx.resolve_generic(&caps[1]);
            rewritten.push(render_marker(&caps[0], &resolution, style))
        })
        .into_owned();

    rewritten.text = after_generic;
    Ok(rewritten)
}

pub fn render_marker(marker: &str, resolution: &Resolution, style: LinkStyle) -> String {
    match style {
        LinkStyle::Html => match resolution {
            Resolution::Linked(target) => format!(
                r#"<a href="{}" target="_blank" class="citation-link" title="{}">{}</a>"#,
                escape_attr(&target.url),
                escape_attr(&target.title),
                escape_text(marker)
            ),
            Resolution::Search { url, keywords } => format!(
                r#"<a href="{}" target="_blank" class="citation-link fallback" title="Search: {}">{}</a>"#,
                escape_attr(url),
                escape_attr(keywords),
                escape_text(marker)
            ),
            Resolution::Broken => format!(
                r#"<span class="citation-text broken" title="Citation not found">{}</span>"#,
                escape_text(marker)
            ),
            Resolution::Plain => format!(r#"<span class="citation-text">{}</span>"#, escape_text(marker)),
        },
        LinkStyle::Markdown => match resolution {
            Resolution::Linked(CitationTarget { url, .. }) | Resolution::Search { url, .. } => {
                format!("[{marker}]({})", markdown_destination(url))
            }
            Resolution::Broken | Resolution::Plain => marker.to_string(),
        },
    }
}

fn markdown_destination(url: &str) -> String {
    if url.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') {
        format!("<{url}>")
    } else {
        url.to_string()
    }
}
