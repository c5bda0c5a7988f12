use pretty_assertions::assert_eq;
use research_core::{
    normalize_marker_punctuation, render_markdown, rewrite_citations, try_render_html,
    AnnotationIndex, CitationContext, CitationTarget, JobContext, LinkStyle, LocalCitationMap,
    RawMessage, Resolution,
};
use serde_json::json;

fn global_index() -> AnnotationIndex {
    let messages: Vec<RawMessage> = serde_json::from_value(json!([
        {"id": "m0"},
        {"id": "m1"},
        {"id": "m2", "annotations": [
            {"url": "https://zero"},
            {"type": "url_citation", "url_citation": {"url": "https://g", "title": "G"}}
        ]}
    ]))
    .unwrap();
    AnnotationIndex::build(&messages)
}

#[test]
fn composite_marker_resolves_through_global_index() {
    let index = global_index();
    let ctx = CitationContext {
        annotations: Some(&index),
        ..CitationContext::default()
    };
    let html = try_render_html("Fact【2:1†Web】.", &ctx).unwrap();
    assert_eq!(
        html,
        r#"Fact<a href="https://g" target="_blank" class="citation-link" title="G">【2:1†Web】</a>."#
    );
}

#[test]
fn composite_marker_falls_back_local_then_search_then_broken() {
    let empty_index = AnnotationIndex::default();
    let local = LocalCitationMap::build(
        &[json!({"url": "https://a"}), json!({"url": "https://local", "title": "Local"})],
        Some(2),
    );
    let job = JobContext::new("renewable energy storage");

    let with_local = CitationContext {
        annotations: Some(&empty_index),
        local: Some(&local),
        job: Some(&job),
    };
    assert_eq!(
        with_local.resolve_composite(2, 1),
        Resolution::Linked(CitationTarget::new("https://local", "Local"))
    );

    let with_job = CitationContext {
        annotations: Some(&empty_index),
        local: None,
        job: Some(&job),
    };
    assert_eq!(
        with_job.resolve_composite(2, 1),
        Resolution::Search {
            url: "https://www.google.com/search?q=renewable%20energy%20storage".to_string(),
            keywords: "renewable energy storage".to_string(),
        }
    );

    assert_eq!(
        CitationContext::default().resolve_composite(2, 1),
        Resolution::Broken
    );
}

#[test]
fn fallback_markup_carries_marker_text() {
    let job = JobContext::new("renewable energy storage");
    let ctx = CitationContext {
        job: Some(&job),
        ..CitationContext::default()
    };
    let html = try_render_html("【2:1†Web】", &ctx).unwrap();
    assert_eq!(
        html,
        r#"<a href="https://www.google.com/search?q=renewable%20energy%20storage" target="_blank" class="citation-link fallback" title="Search: renewable energy storage">【2:1†Web】</a>"#
    );

    let broken = try_render_html("【2:1†Web】", &CitationContext::default()).unwrap();
    assert_eq!(
        broken,
        r#"<span class="citation-text broken" title="Citation not found">【2:1†Web】</span>"#
    );
}

#[test]
fn positional_markers_use_list_order_or_explicit_index() {
    let local = LocalCitationMap::build(
        &[
            json!({"url": "https://zero"}),
            json!({"url": "https://one", "title": "One"}),
            json!({"url": "https://explicit", "index": 5}),
        ],
        None,
    );
    let ctx = CitationContext {
        local: Some(&local),
        ..CitationContext::default()
    };
    assert_eq!(
        ctx.resolve_positional("1"),
        Resolution::Linked(CitationTarget::new("https://one", "One"))
    );
    assert_eq!(
        ctx.resolve_positional("5"),
        Resolution::Linked(CitationTarget::new("https://explicit", "https://explicit"))
    );
    assert_eq!(ctx.resolve_positional("9"), Resolution::Broken);
}

#[test]
fn generic_markers_resolve_by_literal_key_or_stay_plain() {
    let local = LocalCitationMap::build(
        &[json!({
            "type": "url_citation",
            "text": "note",
            "url_citation": {"url": "https://n", "title": "N"}
        })],
        None,
    );
    let ctx = CitationContext {
        local: Some(&local),
        ..CitationContext::default()
    };
    let html = try_render_html("A【note】 B【other】", &ctx).unwrap();
    assert_eq!(
        html,
        r#"A<a href="https://n" target="_blank" class="citation-link" title="N">【note】</a> B<span class="citation-text">【other】</span>"#
    );
}

#[test]
fn adjacent_markers_collapse_even_across_lines() {
    assert_eq!(
        normalize_marker_punctuation("A【1†a】 , 【2†b】 end").unwrap(),
        "A【1†a】,【2†b】 end"
    );
    assert_eq!(
        normalize_marker_punctuation("【1†a】 ,\n  【2†b】").unwrap(),
        "【1†a】,【2†b】"
    );
}

#[test]
fn marker_followed_by_prose_becomes_bullet() {
    assert_eq!(
        normalize_marker_punctuation("Intro【1†a】, second point.").unwrap(),
        "Intro【1†a】\n- second point."
    );
}

#[test]
fn stray_commas_before_japanese_punctuation_are_removed() {
    assert_eq!(normalize_marker_punctuation("文章 , 。次").unwrap(), "文章。次");
    assert_eq!(normalize_marker_punctuation("A , 、B").unwrap(), "A、B");
}

#[test]
fn markers_are_not_rematched_by_later_passes() {
    let rewritten =
        rewrite_citations("x【1:2†a】 y【3†b】 z【c】", &CitationContext::default(), LinkStyle::Html)
            .unwrap();
    assert_eq!(rewritten.fragment_count(), 3);
    assert!(!rewritten.text().contains('【'));
}

#[test]
fn markdown_style_emits_links_and_leaves_unresolved_markers() {
    let local = LocalCitationMap::build(&[json!({"url": "https://m"})], None);
    let ctx = CitationContext {
        local: Some(&local),
        ..CitationContext::default()
    };
    assert_eq!(
        render_markdown("See【0†s】 and【7†t】", &ctx),
        "See[【0†s】](https://m) and【7†t】"
    );
}

#[test]
fn job_context_is_inferred_from_headings() {
    let context = JobContext::infer("# Battery **market** outlook\nbody text\n## Grid storage").unwrap();
    assert_eq!(context.title(), "Battery market outlook Grid storage");
    assert_eq!(context.keywords().as_deref(), Some("Battery market outlook"));
}
