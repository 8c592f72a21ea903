//! Scrubs raw model output into a clean translated string.
//!
//! Models decorated with a chat template leak artifacts into their text:
//! trailing turn markers, a parroted `Assistant:` role prefix, or the whole
//! translation wrapped in quotation marks. One cleaning pass trims, strips
//! the role prefix, truncates at the first turn marker, and unwraps a single
//! matching layer of quotes; the pass is repeated until the text stops
//! changing, so cleaning an already-clean string is a no-op.

/// Turn markers that end the useful part of the output wherever they appear.
const STOP_TOKENS: &[&str] = &["<|im_end|>", "<|im_start|>"];

/// Role prefix some models echo back at the start of their reply.
const ROLE_PREFIX: &str = "Assistant:";

/// Quote pairs eligible for unwrapping. Both ends must come from the same
/// pair; `"…”` stays untouched.
const QUOTE_PAIRS: &[(char, char)] = &[('"', '"'), ('\u{201C}', '\u{201D}')];

/// Cleans raw generation output. Never fails; empty input yields an empty
/// string, and `clean(clean(x)) == clean(x)` for any input.
pub fn clean(raw: &str) -> String {
    let mut text = clean_pass(raw);
    loop {
        // Every effective step removes characters, so this reaches a
        // fixpoint.
        let next = clean_pass(&text);
        if next == text {
            return text;
        }
        text = next;
    }
}

fn clean_pass(raw: &str) -> String {
    let mut text = raw.trim();

    while let Some(rest) = strip_prefix_ci(text, ROLE_PREFIX) {
        text = rest.trim_start();
    }

    let mut text = text.to_string();
    for token in STOP_TOKENS {
        if let Some(pos) = text.find(token) {
            text.truncate(pos);
        }
    }

    unwrap_quotes(text.trim()).trim().to_string()
}

/// ASCII case-insensitive prefix strip; returns the remainder on a match.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

/// Strips exactly one layer of quoting when the whole text is wrapped in a
/// single matching pair. Nested wrapping is left alone: unwrapping `""x""`
/// once would hand the next pass another wrapped string.
fn unwrap_quotes(text: &str) -> &str {
    match strip_matching_pair(text) {
        Some(inner) => {
            let inner = inner.trim();
            if strip_matching_pair(inner).is_some() {
                text
            } else {
                inner
            }
        }
        None => text,
    }
}

fn strip_matching_pair(text: &str) -> Option<&str> {
    for &(open, close) in QUOTE_PAIRS {
        if let Some(inner) = text.strip_prefix(open).and_then(|t| t.strip_suffix(close)) {
            return Some(inner);
        }
    }
    None
}
