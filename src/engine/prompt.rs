//! Prompt assembly for a single translation pass.
//!
//! Every pass is a self-contained ChatML exchange: the flavor's system
//! prompt, one user turn carrying the translation instruction and the input
//! text, and the assistant cue the model completes from. Identical inputs
//! produce byte-identical prompts; nothing from earlier passes is carried
//! over.

use crate::flavor::Flavor;

const TURN_START: &str = "<|im_start|>";
const TURN_END: &str = "<|im_end|>";

/// Sequences that end generation when they show up in the accumulated
/// output: turn delimiters, a re-opened `User:` turn, and the commentary
/// lead-ins chat models like to append after a translation.
pub(crate) const STOP_MARKERS: &[&str] = &[
    TURN_END,
    TURN_START,
    "User:",
    "\n\nNote:",
    "\n\nAlternative:",
];

/// Builds the full prompt for one pass.
pub(crate) fn build(flavor: &Flavor, target_language: &str, input: &str) -> String {
    format!(
        "{TURN_START}system\n{system}{TURN_END}\n\
         {TURN_START}user\n{instruction}\n\n{input}{TURN_END}\n\
         {TURN_START}assistant\n",
        system = flavor.system_prompt,
        instruction = instruction(target_language),
    )
}

fn instruction(target_language: &str) -> String {
    format!("Translate to {target_language}. Preserve all meaning accurately.")
}

/// Index of the first stop marker in `text`, if any.
pub(crate) fn find_stop_marker(text: &str) -> Option<usize> {
    STOP_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
}
