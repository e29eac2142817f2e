use selfup_core::Result;

use crate::prompt::UPGRADE_POLICY_PROMPT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_payload: String,
}

impl CompletionRequest {
    /// A request carrying the standard upgrade policy as its system prompt.
    pub fn upgrade(user_payload: impl Into<String>) -> Self {
        Self {
            system_prompt: UPGRADE_POLICY_PROMPT.to_string(),
            user_payload: user_payload.into(),
        }
    }
}

/// Remote text completion.
///
/// Implementations return the raw response text, or `CompletionUnavailable`
/// when no usable text came back and `Cancelled` when the call timed out.
pub trait CompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

impl<C: CompletionClient + ?Sized> CompletionClient for &C {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        (**self).complete(request)
    }
}

impl<C: CompletionClient + ?Sized> CompletionClient for Box<C> {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        (**self).complete(request)
    }
}
