//! Session title generation
//!
//! Asks the model for a short title based on the learner's first message and
//! falls back to the message itself when the model is missing, slow or fails.

use crate::llm::{LlmMessage, LlmRequest, LlmResponse, LlmService};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const TITLE_PROMPT: &str = r#"Write a very short (3-6 words) title for a tutoring session that starts with the message below. Output only the title, without quotes. Examples:
- "https://doc.rust-lang.org/book/ch04-01-what-is-ownership.html" -> Rust Ownership Basics
- "I want to learn about photosynthesis from this page: https://..." -> Photosynthesis Study Session
- "hello" -> New Learning Session

Message:"#;

const TITLE_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_TITLE_CHARS: usize = 60;
const MAX_PROMPT_CHARS: usize = 500;

/// Produces display titles for new sessions
#[derive(Clone, Default)]
pub struct TitleGenerator {
    llm: Option<Arc<dyn LlmService>>,
}

impl TitleGenerator {
    pub fn new(llm: Option<Arc<dyn LlmService>>) -> Self {
        Self { llm }
    }

    /// Never fails: any model problem yields the fallback title
    pub async fn title_for(&self, initial_message: &str) -> String {
        let generated = match &self.llm {
            Some(llm) => generate_title(initial_message, Arc::clone(llm)).await,
            None => None,
        };
        generated.unwrap_or_else(|| fallback_title(initial_message))
    }
}

/// Ask the model for a title. Returns None on timeout, error or empty output.
pub async fn generate_title(
    message_text: &str,
    llm_service: Arc<dyn LlmService>,
) -> Option<String> {
    let prompt = format!("{TITLE_PROMPT}\n{}", truncate_chars(message_text, MAX_PROMPT_CHARS));

    let request = LlmRequest {
        system: None,
        messages: vec![LlmMessage::user(prompt)],
        tools: vec![],
        max_tokens: Some(30),
    };

    match timeout(TITLE_TIMEOUT, llm_service.complete(&request)).await {
        Ok(Ok(response)) => extract_title_from_response(&response)
            .map(|t| sanitize_title(&t))
            .filter(|t| !t.is_empty()),
        Ok(Err(e)) => {
            tracing::warn!(error = %e.message, "Title generation LLM error");
            None
        }
        Err(_) => {
            tracing::warn!("Title generation timed out");
            None
        }
    }
}

/// The first message, whitespace-collapsed and cut to [`MAX_TITLE_CHARS`]
pub fn fallback_title(message_text: &str) -> String {
    let collapsed = message_text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        "New session".to_string()
    } else {
        truncate_chars(&collapsed, MAX_TITLE_CHARS)
    }
}

fn extract_title_from_response(response: &LlmResponse) -> Option<String> {
    let text = response.text();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Strip wrapping quotes and stray punctuation, keep readable casing
fn sanitize_title(title: &str) -> String {
    let first_line = title.lines().next().unwrap_or_default();
    let cleaned: String = first_line
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | '_' | '\'' | ':'))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, MAX_TITLE_CHARS)
}

/// Cut at a char boundary, never inside a code point
fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
