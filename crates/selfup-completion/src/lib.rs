mod client;
mod http;
mod prompt;
mod settings;

pub use client::{CompletionClient, CompletionRequest};
pub use http::{extract_message_content, HttpCompletionClient};
pub use prompt::UPGRADE_POLICY_PROMPT;
pub use settings::{
    ApiKey, CompletionSettings, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS,
};
