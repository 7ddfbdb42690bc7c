// LLM abstraction layer

pub mod completion;
pub mod fallback;
pub mod google;
pub mod openai;
pub mod provider;
pub mod sse;

pub use completion::{CompletionClient, ParagraphBuffer, MAX_TOKENS_LIMIT};
pub use fallback::FallbackLLM;
pub use provider::*;
pub use crate::types::*;
