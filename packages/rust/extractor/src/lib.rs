//! Content extraction stage: [`SourceDocument`] → ordered [`ContentBlock`]s.
//!
//! Deterministic, no I/O. Boilerplate segments (nav crumbs, cookie banners,
//! link farms) are dropped by a text-density heuristic, surviving segments
//! are merged under their nearest heading up to a token budget, and stable
//! sequential ids are assigned in document order. Running twice on the same
//! document yields identical output.

use tracing::debug;

use quizforge_shared::{BlockId, ContentBlock, QuizForgeError, Result, SourceDocument};

/// Tuning knobs for the boilerplate filter and merge step.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Minimum text length for a non-heading segment to survive.
    pub min_chars: usize,
    /// Minimum ratio of alphabetic chars to non-space chars. Segments below
    /// this read as menus, breadcrumbs, or symbol noise.
    pub min_letter_ratio: f64,
    /// Approximate token budget per merged block.
    pub max_block_tokens: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_chars: 30,
            min_letter_ratio: 0.45,
            max_block_tokens: 400,
        }
    }
}

/// Extract cleaned content blocks from a fetched document.
///
/// The sole error condition is a document with no extractable content.
pub fn extract(doc: &SourceDocument, opts: &ExtractOptions) -> Result<Vec<ContentBlock>> {
    let mut merger = Merger::new(opts.max_block_tokens);
    let mut heading: Option<String> = None;

    for block in &doc.blocks {
        if block.heading_level.is_some() {
            // Headings are context for what follows, never standalone blocks.
            merger.flush();
            heading = Some(block.text.clone());
            continue;
        }

        if is_boilerplate(&block.text, opts) {
            continue;
        }

        merger.push(heading.as_deref(), &block.text);
    }
    merger.flush();

    let blocks: Vec<ContentBlock> = merger
        .done
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let approx_tokens = ContentBlock::approx_tokens_of(&text);
            ContentBlock {
                id: BlockId(i as u32),
                text,
                approx_tokens,
            }
        })
        .collect();

    debug!(
        url = %doc.url,
        input_segments = doc.blocks.len(),
        output_blocks = blocks.len(),
        "extraction complete"
    );

    if blocks.is_empty() {
        return Err(QuizForgeError::extraction(
            &doc.url,
            "no content blocks survived filtering",
        ));
    }

    Ok(blocks)
}

/// Density heuristic for navigation/boilerplate segments.
fn is_boilerplate(text: &str, opts: &ExtractOptions) -> bool {
    if text.chars().count() < opts.min_chars {
        return true;
    }

    let non_space: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if non_space.is_empty() {
        return true;
    }
    let letters = non_space.iter().filter(|c| c.is_alphabetic()).count();
    (letters as f64) / (non_space.len() as f64) < opts.min_letter_ratio
}

/// Accumulates consecutive segments under one heading into merged blocks.
struct Merger {
    max_tokens: usize,
    heading: Option<String>,
    parts: Vec<String>,
    tokens: usize,
    done: Vec<String>,
}

impl Merger {
    fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            heading: None,
            parts: Vec::new(),
            tokens: 0,
            done: Vec::new(),
        }
    }

    fn push(&mut self, heading: Option<&str>, text: &str) {
        let same_heading = self.heading.as_deref() == heading;
        let incoming = ContentBlock::approx_tokens_of(text);

        if !self.parts.is_empty() && (!same_heading || self.tokens + incoming > self.max_tokens) {
            self.flush();
        }

        if self.parts.is_empty() {
            self.heading = heading.map(str::to_owned);
        }
        self.parts.push(text.to_owned());
        self.tokens += incoming;
    }

    fn flush(&mut self) {
        if self.parts.is_empty() {
            return;
        }
        let body = self.parts.join("\n");
        let text = match &self.heading {
            Some(h) => format!("{h}\n{body}"),
            None => body,
        };
        self.done.push(text);
        self.parts.clear();
        self.tokens = 0;
    }
}
