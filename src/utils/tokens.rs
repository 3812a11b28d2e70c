//! Token estimation
//!
//! A heuristic character-class counter, not a real tokenizer: no vendor
//! exposes one over the wire, and the dispatcher only needs input/output
//! estimates to fall back on when a provider's response omits `usage`.
//!
//! Characters are split into two classes exactly as the system this
//! estimator distills from does: `[a-zA-Z0-9\s]` counts as "plain" text at
//! ~4 chars/token, and everything else (punctuation, accented letters, CJK,
//! emoji, ...) counts as "dense" text at ~1.5 chars/token. A flat
//! per-message overhead accounts for role/name wrapper tokens the chat
//! format adds.

use crate::core::types::chat::{ChatMessage, ChatRequest};

const CHARS_PER_TOKEN_PLAIN: f64 = 4.0;
const CHARS_PER_TOKEN_DENSE: f64 = 1.5;
const OVERHEAD_PER_MESSAGE: u32 = 40;
const MIN_INPUT_TOKENS: u32 = 10;
const MIN_COMPLETION_TOKENS: u32 = 1;

fn is_plain(c: char) -> bool {
    c.is_ascii_alphanumeric() || c.is_whitespace()
}

/// Estimate the token count of a single string.
pub fn estimate_text_tokens(text: &str) -> f64 {
    let (plain, dense) = text
        .chars()
        .fold((0u32, 0u32), |(plain, dense), c| {
            if is_plain(c) {
                (plain + 1, dense)
            } else {
                (plain, dense + 1)
            }
        });

    plain as f64 / CHARS_PER_TOKEN_PLAIN + dense as f64 / CHARS_PER_TOKEN_DENSE
}

fn estimate_message_tokens(message: &ChatMessage) -> f64 {
    OVERHEAD_PER_MESSAGE as f64 + estimate_text_tokens(&message.text_content())
}

/// Estimate the input (prompt) token count of a chat request.
///
/// Floors at [`MIN_INPUT_TOKENS`] so an empty request still books a nonzero
/// prompt cost, matching upstream billing behavior.
pub fn estimate_input_tokens(request: &ChatRequest) -> u32 {
    let total: f64 = request.messages.iter().map(estimate_message_tokens).sum();
    (total.ceil() as u32).max(MIN_INPUT_TOKENS)
}

/// Estimate the completion token count of a block of generated text.
///
/// Floors at [`MIN_COMPLETION_TOKENS`] since a zero-token completion usually
/// indicates a missed accounting edge rather than a genuinely free response.
pub fn estimate_completion_tokens(text: &str) -> u32 {
    (estimate_text_tokens(text).ceil() as u32).max(MIN_COMPLETION_TOKENS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::message::MessageRole;

    #[test]
    fn ascii_text_uses_four_chars_per_token() {
        let tokens = estimate_text_tokens("abcdefgh");
        assert!((tokens - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cjk_text_is_denser_per_token() {
        let tokens = estimate_text_tokens("你好世界你好世界"); // 8 non-ASCII chars
        assert!((tokens - 8.0 / 1.5).abs() < 1e-9);
    }

    #[test]
    fn accented_latin_text_also_counts_as_dense() {
        // "café" has 3 plain ASCII chars and one non-ASCII accented char; the
        // split is by ASCII-alphanumeric-or-whitespace, not by script.
        let tokens = estimate_text_tokens("café");
        assert!((tokens - (3.0 / 4.0 + 1.0 / 1.5)).abs() < 1e-9);
    }

    #[test]
    fn empty_request_floors_at_minimum() {
        let request = ChatRequest::new("gpt-4o");
        assert_eq!(estimate_input_tokens(&request), MIN_INPUT_TOKENS);
    }

    #[test]
    fn request_adds_per_message_overhead() {
        let request = ChatRequest::new("gpt-4o")
            .add_message(MessageRole::User, "hi")
            .add_message(MessageRole::User, "there");
        let expected = (2.0 * OVERHEAD_PER_MESSAGE as f64 + 0.5 + 1.25).ceil() as u32;
        assert_eq!(estimate_input_tokens(&request), expected.max(MIN_INPUT_TOKENS));
    }

    #[test]
    fn empty_completion_floors_at_one() {
        assert_eq!(estimate_completion_tokens(""), MIN_COMPLETION_TOKENS);
    }
}
