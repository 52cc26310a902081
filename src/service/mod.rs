pub mod conversation;
pub mod text_ops;

pub use conversation::{ConversationHistory, ConversationService, ConverseReply, PendingExchange};
pub use text_ops::{TextOps, DEFAULT_LANGUAGE, DEFAULT_SOURCE_LANGUAGE, DEFAULT_TARGET_LANGUAGE};
