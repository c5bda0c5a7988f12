use std::sync::OnceLock;

use regex::Regex;

use crate::markdown::RenderError;

/// Every regex the rewriting pipeline needs, compiled once per process.
pub(crate) struct Patterns {
    pub url: Regex,
    pub composite_marker: Regex,
    pub positional_marker: Regex,
    pub generic_marker: Regex,
    pub adjacent_markers: Regex,
    pub marker_then_prose: Regex,
    pub stray_comma_period: Regex,
    pub stray_comma_enum: Regex,
    pub padded_bold: Regex,
    pub bold: Regex,
    pub italic: Regex,
    pub ordered_item: Regex,
    pub bullet_item: Regex,
    pub table_separator: Regex,
    pub rule_line: Regex,
    pub heading: Regex,
    pub char_reference: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, RenderError> {
        Ok(Self {
            url: build(r"https?://[^\s]+")?,
            composite_marker: build(r"【(\d+):(\d+)†([^】]+)】")?,
            positional_marker: build(r"【(\d+)†([^】]+)】")?,
            generic_marker: build(r"【([^】]+)】")?,
            adjacent_markers: build(r"】\s*,\s*【")?,
            marker_then_prose: build(r"(【[^】]+】)\s*,\s*([^\s【,:.：。][^【\n,:.：。]*)([:.：。]?)")?,
            stray_comma_period: build(r"\s*,\s*。")?,
            stray_comma_enum: build(r"\s*,\s*、")?,
            padded_bold: build(r"\*\*\s+([^*\n]+?)\s+\*\*")?,
            bold: build(r"\*\*([^*]+?)\*\*")?,
            italic: build(r"\*([^*\n]+?)\*")?,
            ordered_item: build(r"^\s*\d+\.\s+(.+)$")?,
            bullet_item: build(r"^\s*(?:[-*]\s+|,\s*|-)(\S.*)$")?,
            table_separator: build(r"^\s*\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?\s*$")?,
            rule_line: build(r"^\s*-{3,}\s*$")?,
            heading: build(r"^(#{1,3})\s+(.+)$")?,
            char_reference: build(r"&(#[0-9]+;?|#[xX][0-9a-fA-F]+;?|[A-Za-z][A-Za-z0-9]*;)")?,
        })
    }
}

fn build(pattern: &str) -> Result<Regex, RenderError> {
    Regex::new(pattern).map_err(|err| RenderError::Pattern(err.to_string()))
}

pub(crate) fn patterns() -> Result<&'static Patterns, RenderError> {
    static PATTERNS: OnceLock<Result<Patterns, RenderError>> = OnceLock::new();
    PATTERNS
        .get_or_init(Patterns::compile)
        .as_ref()
        .map_err(Clone::clone)
}

/// First `http(s)://` run in `text`, if any.
pub(crate) fn find_url(text: &str) -> Option<&str> {
    patterns()
        .ok()?
        .url
        .find(text)
        .map(|found| found.as_str())
}
