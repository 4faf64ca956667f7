pub mod azure;

pub use azure::AzureOpenAiClient;

/// One chat request: a system instruction plus a user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("text service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("text service returned no completions")]
    EmptyResponse,
}

/// Remote text generation. Only the first completion is used by callers.
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;
    fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>, LlmError>;
}

/// The first completion, trimmed. A blank one counts as no answer.
pub fn first_completion(completions: Vec<String>) -> Result<String, LlmError> {
    completions
        .into_iter()
        .next()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(LlmError::EmptyResponse)
}
