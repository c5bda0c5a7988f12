use std::fmt::Write;

use sha2::{Digest, Sha256};

const MAX_STEM_CHARS: usize = 80;
const FALLBACK_STEM: &str = "research-report";

/// `{sanitized title}--{first 8 hex chars of sha256(body)}.{extension}`.
/// Same title and body always give the same name.
pub fn report_filename(title: Option<&str>, body: &str, extension: &str) -> String {
    let stem = sanitize_title(title.unwrap_or(FALLBACK_STEM));
    format!("{stem}--{}.{extension}", body_hash(body))
}

fn sanitize_title(title: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    let mut last_was_separator = false;
    for c in title.chars() {
        let c = if is_unsafe(c) || c.is_whitespace() { '_' } else { c };
        if c == '_' {
            if !last_was_separator {
                stem.push('_');
            }
            last_was_separator = true;
        } else {
            stem.push(c);
            last_was_separator = false;
        }
    }

    let mut stem: String = stem
        .trim_matches(|c| c == '_' || c == '.')
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }
    if is_reserved_device_name(&stem) {
        stem.push('_');
    }
    stem
}

fn is_unsafe(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}')
}

fn is_reserved_device_name(name: &str) -> bool {
    const RESERVED: &[&str] = &["CON", "PRN", "AUX", "NUL"];
    let upper = name.to_ascii_uppercase();
    RESERVED.contains(&upper.as_str())
        || ((upper.starts_with("COM") || upper.starts_with("LPT"))
            && upper.len() == 4
            && upper[3..].chars().all(|c| ('1'..='9').contains(&c)))
}

fn body_hash(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    digest.iter().take(4).fold(String::with_capacity(8), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}
