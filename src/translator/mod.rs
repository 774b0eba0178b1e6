//! Outbound translation calls
use async_trait::async_trait;

pub mod anthropic;
pub mod prompt;

use crate::error::Result;
pub use anthropic::AnthropicTranslator;

/// A single upstream translation. Each call is one dispatch in the queue.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String>;
}
