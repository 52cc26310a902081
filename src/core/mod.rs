pub mod content;
pub mod llm;

pub use content::{ContentFragment, GenerationOutput};
pub use llm::{ChatCompletionsClient, ChatMessage, RetryingClient, TextGenerationClient};
