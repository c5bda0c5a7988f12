use pretty_assertions::assert_eq;
use research_core::{
    markdown_to_html, plain_text_fallback, render_html, try_render_html, CitationContext,
};

#[test]
fn plain_text_only_gains_line_breaks() {
    let input = "Plain sentence one\nPlain sentence two\n";
    let html = markdown_to_html(input).unwrap();
    assert_eq!(html, "Plain sentence one<br>Plain sentence two<br>");
    assert_eq!(html.replace("<br>", "\n"), input);
}

#[test]
fn tables_need_a_separator_row() {
    let html = markdown_to_html("| A | B |\n|---|---|\n| 1 | 2 |").unwrap();
    assert_eq!(
        html,
        "<table><thead><tr><th>A</th><th>B</th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table>"
    );
    assert_eq!(markdown_to_html("a | b\nc | d").unwrap(), "a | b<br>c | d");
}

#[test]
fn headings_levels_one_to_three() {
    assert_eq!(
        markdown_to_html("# T\n## U\n### V\n#### W").unwrap(),
        "<h1>T</h1><br><h2>U</h2><br><h3>V</h3><br>#### W"
    );
}

#[test]
fn consecutive_quotes_merge_into_one_block() {
    assert_eq!(
        markdown_to_html("> a\n> b\nc").unwrap(),
        "<blockquote>a<br>b</blockquote><br>c"
    );
}

#[test]
fn ordered_and_unordered_lists_are_flat() {
    assert_eq!(
        markdown_to_html("1. one\n2. two\n- x\n- y").unwrap(),
        "<ol><li>one</li><li>two</li></ol><br><ul><li>x</li><li>y</li></ul>"
    );
    assert_eq!(
        markdown_to_html(", comma led").unwrap(),
        "<ul><li>comma led</li></ul>"
    );
}

#[test]
fn bold_and_italic_inline() {
    assert_eq!(
        markdown_to_html("**bold** and *it* and ** spaced **").unwrap(),
        "<strong>bold</strong> and <em>it</em> and <strong>spaced</strong>"
    );
}

#[test]
fn raw_html_is_neutralized() {
    assert_eq!(
        markdown_to_html("a <script> & b &lt;").unwrap(),
        "a &lt;script> & b &amp;lt;"
    );
}

#[test]
fn plain_prose_passes_through_the_full_pipeline_unchanged() {
    let ctx = CitationContext::default();
    for text in ["AT&T and Q&A are fine", "Revenue grew 4% in 2023 (see annex)"] {
        assert_eq!(try_render_html(text, &ctx).unwrap(), text);
        assert_eq!(render_html(text, &ctx), text);
    }
    assert_eq!(
        render_html("first line\nR&D second", &ctx),
        "first line<br>R&D second"
    );
}

#[test]
fn prose_after_marker_renders_as_list_item() {
    let html = try_render_html("Point【0†s】, extra detail.", &CitationContext::default()).unwrap();
    assert_eq!(
        html,
        r#"Point<span class="citation-text broken" title="Citation not found">【0†s】</span><br><ul><li>extra detail.</li></ul>"#
    );
}

#[test]
fn render_html_matches_fallible_renderer_on_success() {
    let text = "## Summary\n**Key** finding【3†x】";
    let ctx = CitationContext::default();
    assert_eq!(render_html(text, &ctx), try_render_html(text, &ctx).unwrap());
}

#[test]
fn fallback_escapes_and_breaks_lines() {
    assert_eq!(plain_text_fallback("a<b\nc"), "a&lt;b<br>c");
}
