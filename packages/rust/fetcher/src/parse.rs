//! HTML → [`SourceDocument`] structural parsing.
//!
//! Pure functions, no network. The fetcher downloads the body and hands it
//! here; scripts, styles, and obvious chrome subtrees (nav, header, footer,
//! aside) are skipped, and the remaining block-level elements become ordered
//! [`StructuralBlock`]s with heading levels preserved as hints for the
//! extractor's merge step.

use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};

use quizforge_shared::{SourceDocument, StructuralBlock};

/// Block-level elements whose text becomes a structural block.
const CONTENT_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "pre", "blockquote", "td", "dd",
];

/// Subtrees that never contain article content.
const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside",
];

/// Parse an HTML body into a [`SourceDocument`].
pub fn parse_html(url: &str, body: &str) -> SourceDocument {
    let doc = Html::parse_document(body);

    let selector = Selector::parse(&CONTENT_TAGS.join(",")).expect("valid selector");
    let mut blocks: Vec<StructuralBlock> = Vec::new();

    for el in doc.select(&selector) {
        if under_excluded_subtree(&el) || under_content_ancestor(&el) {
            continue;
        }

        let text = normalize_whitespace(&el.text().collect::<String>());
        if text.is_empty() {
            continue;
        }

        blocks.push(StructuralBlock {
            heading_level: heading_level(el.value().name()),
            text,
        });
    }

    let raw_text = blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    SourceDocument {
        url: url.to_string(),
        title: extract_title(&doc),
        fetched_at: Utc::now(),
        content_hash: sha256_hex(body),
        raw_text,
        blocks,
    }
}

/// Parse a plain-text body: paragraphs split on blank lines.
pub fn parse_plain_text(url: &str, body: &str) -> SourceDocument {
    let blocks: Vec<StructuralBlock> = body
        .split("\n\n")
        .map(normalize_whitespace)
        .filter(|p| !p.is_empty())
        .map(|text| StructuralBlock {
            text,
            heading_level: None,
        })
        .collect();

    let raw_text = blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    SourceDocument {
        url: url.to_string(),
        title: None,
        fetched_at: Utc::now(),
        content_hash: sha256_hex(body),
        raw_text,
        blocks,
    }
}

/// `<title>` text, falling back to the first `<h1>`.
fn extract_title(doc: &Html) -> Option<String> {
    let title_sel = Selector::parse("title").expect("valid selector");
    let h1_sel = Selector::parse("h1").expect("valid selector");

    let from_title = doc
        .select(&title_sel)
        .next()
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    from_title.or_else(|| {
        doc.select(&h1_sel)
            .next()
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    })
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Whether the element sits inside a subtree we never extract from.
fn under_excluded_subtree(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| EXCLUDED_TAGS.contains(&a.value().name()))
}

/// Whether an ancestor is itself a content tag. Prevents double extraction
/// of nested blocks (a `<p>` inside an `<li>` would otherwise appear twice).
fn under_content_ancestor(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| CONTENT_TAGS.contains(&a.value().name()))
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn sha256_hex(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head><title>Plant Biology  Notes</title><style>p { color: red }</style></head>
          <body>
            <nav><ul><li>Home</li><li>About</li></ul></nav>
            <h1>Photosynthesis</h1>
            <p>Photosynthesis converts light into chemical energy.</p>
            <h2>Light Reaction</h2>
            <p>The light reaction   happens in the thylakoid membrane.</p>
            <ul><li>Produces ATP</li><li>Produces NADPH</li></ul>
            <script>track();</script>
            <footer><p>Copyright 2026</p></footer>
          </body>
        </html>"#;

    #[test]
    fn extracts_blocks_in_document_order() {
        let doc = parse_html("https://example.com/bio", PAGE);
        let texts: Vec<&str> = doc.blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Photosynthesis",
                "Photosynthesis converts light into chemical energy.",
                "Light Reaction",
                "The light reaction happens in the thylakoid membrane.",
                "Produces ATP",
                "Produces NADPH",
            ]
        );
    }

    #[test]
    fn skips_nav_script_style_footer() {
        let doc = parse_html("https://example.com/bio", PAGE);
        assert!(!doc.raw_text.contains("Home"));
        assert!(!doc.raw_text.contains("track()"));
        assert!(!doc.raw_text.contains("Copyright"));
        assert!(!doc.raw_text.contains("color: red"));
    }

    #[test]
    fn heading_levels_are_hints() {
        let doc = parse_html("https://example.com/bio", PAGE);
        assert_eq!(doc.blocks[0].heading_level, Some(1));
        assert_eq!(doc.blocks[1].heading_level, None);
        assert_eq!(doc.blocks[2].heading_level, Some(2));
    }

    #[test]
    fn title_prefers_title_tag_and_normalizes() {
        let doc = parse_html("https://example.com/bio", PAGE);
        assert_eq!(doc.title.as_deref(), Some("Plant Biology Notes"));
    }

    #[test]
    fn title_falls_back_to_h1() {
        let html = "<html><body><h1>Only Heading</h1><p>text</p></body></html>";
        let doc = parse_html("https://example.com", html);
        assert_eq!(doc.title.as_deref(), Some("Only Heading"));
    }

    #[test]
    fn nested_paragraph_not_extracted_twice() {
        let html = "<html><body><ul><li><p>once only</p></li></ul></body></html>";
        let doc = parse_html("https://example.com", html);
        let count = doc
            .blocks
            .iter()
            .filter(|b| b.text.contains("once only"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn plain_text_splits_paragraphs() {
        let doc = parse_plain_text("https://example.com/notes.txt", "para one\n\npara  two\n\n\n");
        let texts: Vec<&str> = doc.blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["para one", "para two"]);
        assert!(doc.blocks.iter().all(|b| b.heading_level.is_none()));
    }

    #[test]
    fn content_hash_is_stable() {
        let a = parse_html("https://example.com", PAGE);
        let b = parse_html("https://example.com", PAGE);
        assert_eq!(a.content_hash, b.content_hash);
    }
}
