//! Generative text gateway.
//!
//! Callers see a single infallible operation: a prompt goes in, text (or
//! nothing) comes out. Transport problems, throttling and odd response shapes
//! are logged by the implementation and surface as `None`.

pub mod gemini;

use async_trait::async_trait;

pub use self::gemini::GeminiClient;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// First generated text part, or `None` if the call produced nothing usable.
    async fn complete(&self, prompt: &str) -> Option<String>;
}

/// Span from the first `{` to the last `}` inclusive. Models like to wrap JSON
/// in prose or code fences; text without such a span comes back unchanged.
pub fn extract_json_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}
