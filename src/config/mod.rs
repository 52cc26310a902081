mod settings;

pub use settings::{LlmConfig, LoggingConfig, Settings, StorageConfig};
