//! Markdown to HTML conversion for message bodies.
//!
//! Output is not round-trippable. Always render from the original message text,
//! never from previously rendered HTML.

use research_logging::research_warn;

use crate::citations::{rewrite_citations, CitationContext, LinkStyle};
use crate::patterns::{patterns, Patterns};

const LINE_BREAK: &str = "<br>";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("pattern failed to compile: {0}")]
    Pattern(String),
    #[error("dangling citation placeholder {0:?}")]
    Placeholder(String),
}

/// Resolves citations and converts markdown to HTML. Never fails: on any
/// rendering error the raw text is returned with only line breaks converted.
pub fn render_html(text: &str, ctx: &CitationContext<'_>) -> String {
    match try_render_html(text, ctx) {
        Ok(html) => html,
        Err(err) => {
            research_warn!("Rendering fell back to plain text: {}", err);
            plain_text_fallback(text)
        }
    }
}

pub fn try_render_html(text: &str, ctx: &CitationContext<'_>) -> Result<String, RenderError> {
    let rewritten = rewrite_citations(text, ctx, LinkStyle::Html)?;
    let html = markdown_to_html(rewritten.text())?;
    rewritten.restore(&html)
}

/// Resolves citations into markdown links and leaves the rest of the markdown
/// untouched. Falls back to the raw text on error.
pub fn render_markdown(text: &str, ctx: &CitationContext<'_>) -> String {
    let resolved = rewrite_citations(text, ctx, LinkStyle::Markdown)
        .and_then(|rewritten| rewritten.restore(rewritten.text()));
    match resolved {
        Ok(markdown) => markdown,
        Err(err) => {
            research_warn!("Citation rewrite fell back to raw text: {}", err);
            text.to_string()
        }
    }
}

pub fn plain_text_fallback(text: &str) -> String {
    escape_text(text).replace('\n', LINE_BREAK)
}

/// Line-level conversion: tables, headings h1 to h3, blockquote runs, flat
/// ordered and unordered lists, then inline bold and italic.
pub fn markdown_to_html(text: &str) -> Result<String, RenderError> {
    let p = patterns()?;
    let escaped = escape_body(p, text);
    let lines: Vec<&str> = escaped.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        if is_table_start(p, &lines, i) {
            let end = run_end(&lines, i + 2, |row| row.contains('|') && !row.trim().is_empty());
            out.push(render_table(p, lines[i], &lines[i + 2..end]));
            i = end;
            continue;
        }

        if let Some(caps) = p.heading.captures(line) {
            let level = caps[1].len();
            out.push(format!("<h{level}>{}</h{level}>", inline(p, caps[2].trim())));
            i += 1;
            continue;
        }

        if quote_content(line).is_some() {
            let end = run_end(&lines, i, |row| quote_content(row).is_some());
            let body: Vec<String> = lines[i..end]
                .iter()
                .filter_map(|row| quote_content(row))
                .map(|row| inline(p, row))
                .collect();
            out.push(format!("<blockquote>{}</blockquote>", body.join(LINE_BREAK)));
            i = end;
            continue;
        }

        if p.ordered_item.is_match(line) {
            let end = run_end(&lines, i, |row| p.ordered_item.is_match(row));
            out.push(render_list(p, "ol", &p.ordered_item, &lines[i..end]));
            i = end;
            continue;
        }

        if p.rule_line.is_match(line) {
            out.push("<hr>".to_string());
            i += 1;
            continue;
        }

        if p.bullet_item.is_match(line) {
            let end = run_end(&lines, i, |row| {
                p.bullet_item.is_match(row) && !p.rule_line.is_match(row)
            });
            out.push(render_list(p, "ul", &p.bullet_item, &lines[i..end]));
            i = end;
            continue;
        }

        out.push(inline(p, line));
        i += 1;
    }

    Ok(out.join(LINE_BREAK))
}

fn run_end(lines: &[&str], start: usize, belongs: impl Fn(&str) -> bool) -> usize {
    let mut end = start;
    while end < lines.len() && belongs(lines[end]) {
        end += 1;
    }
    end
}

fn is_table_start(p: &Patterns, lines: &[&str], i: usize) -> bool {
    lines[i].contains('|')
        && lines
            .get(i + 1)
            .is_some_and(|next| next.contains('-') && p.table_separator.is_match(next))
}

fn render_table(p: &Patterns, header: &str, rows: &[&str]) -> String {
    let mut html = String::from("<table><thead><tr>");
    for cell in table_cells(header) {
        html.push_str(&format!("<th>{}</th>", inline(p, cell)));
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in table_cells(row) {
            html.push_str(&format!("<td>{}</td>", inline(p, cell)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

fn table_cells(row: &str) -> Vec<&str> {
    let trimmed = row.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
    trimmed.split('|').map(str::trim).collect()
}

fn quote_content(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('>')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

fn render_list(p: &Patterns, tag: &str, item: &regex::Regex, rows: &[&str]) -> String {
    let items: String = rows
        .iter()
        .filter_map(|row| item.captures(row))
        .map(|caps| format!("<li>{}</li>", inline(p, caps[1].trim_end())))
        .collect();
    format!("<{tag}>{items}</{tag}>")
}

fn inline(p: &Patterns, text: &str) -> String {
    let text = p.padded_bold.replace_all(text, "**$1**");
    let text = p.bold.replace_all(&text, "<strong>$1</strong>");
    p.italic.replace_all(&text, "<em>$1</em>").into_owned()
}

/// Neutralizes raw HTML in message text. `>` is kept so blockquotes still parse,
/// and a bare `&` stays as typed; only an `&` that would start a character
/// reference is escaped.
fn escape_body(p: &Patterns, text: &str) -> String {
    p.char_reference
        .replace_all(text, "&amp;${1}")
        .replace('<', "&lt;")
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;").replace('\'', "&#39;")
}
