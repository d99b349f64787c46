//! Prompt construction for the synthesis and generation stages.
//!
//! Both prompts demand strict JSON so the reply can be parsed into a typed
//! structure at the boundary; anything else is rejected and retried there.

use quizforge_shared::{ContentBlock, KnowledgePoint};

/// System prompt shared by both AI stages.
pub(crate) const SYSTEM: &str = "You are a precise study-material assistant. \
Reply with strict JSON only: no prose, no Markdown fences, no commentary.";

/// Prompt asking for knowledge points over a batch of content blocks.
pub(crate) fn knowledge_prompt(blocks: &[ContentBlock]) -> String {
    let mut listing = String::new();
    for block in blocks {
        listing.push_str(&format!("[{}]\n{}\n\n", block.id, block.text));
    }

    format!(
        "Extract the distinct concepts a learner should retain from the source \
         text below. For each concept output an object with:\n\
         - \"label\": short topic name\n\
         - \"summary\": one or two sentences explaining the concept\n\
         - \"block\": the id (in square brackets) of the block it came from\n\
         Return a JSON array of these objects. Return [] if the text teaches \
         nothing.\n\n\
         Source text:\n\n{listing}"
    )
}

/// Prompt asking for one multiple-choice question for a knowledge point.
pub(crate) fn quiz_prompt(point: &KnowledgePoint, distractor_target: usize) -> String {
    format!(
        "Write one multiple-choice practice question testing this concept:\n\n\
         Topic: {label}\n\
         Explanation: {summary}\n\n\
         Output a JSON object with:\n\
         - \"prompt\": the question text (must not reveal the answer)\n\
         - \"correct_answer\": the single correct choice\n\
         - \"distractors\": exactly {distractor_target} plausible but wrong \
         choices, all different from each other and from the correct answer\n",
        label = point.label,
        summary = point.summary,
    )
}
