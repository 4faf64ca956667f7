use serde::Deserialize;
use std::time::Duration;

use super::{CompletionRequest, LlmError, TextGenerator};
use crate::config::TextServiceConfig;
use crate::service::ServiceStatus;

/// Azure OpenAI chat completions over blocking HTTP.
pub struct AzureOpenAiClient {
    url: String,
    api_key: String,
    timeout_secs: u64,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl AzureOpenAiClient {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        api_version: &str,
        deployment: &str,
        timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to create HTTP client: {e}"))?;

        Ok(Self {
            url: chat_completions_url(endpoint, deployment, api_version),
            api_key: api_key.to_string(),
            timeout_secs,
            client,
        })
    }

    /// Missing or placeholder credentials and construction failures all
    /// resolve to `Unconfigured`.
    pub fn from_config(config: &TextServiceConfig) -> ServiceStatus<Self> {
        let Some(api_key) = config.api_key() else {
            return ServiceStatus::unconfigured("AZURE_OPENAI_API_KEY is not configured");
        };
        let Some(endpoint) = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
        else {
            return ServiceStatus::unconfigured("AZURE_OPENAI_ENDPOINT is not configured");
        };

        match Self::new(
            endpoint,
            api_key,
            &config.api_version,
            &config.deployment,
            config.timeout_seconds,
        ) {
            Ok(client) => ServiceStatus::Available(client),
            Err(err) => ServiceStatus::unconfigured(format!("{err:#}")),
        }
    }
}

impl TextGenerator for AzureOpenAiClient {
    fn name(&self) -> &str {
        "azure-openai"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>, LlmError> {
        let body = serde_json::json!({
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        tracing::debug!(url = %self.url, "sending chat completion request");

        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::Http(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| LlmError::Http(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: truncate(&text, 300),
            });
        }

        parse_completions(&text)
    }
}

pub fn chat_completions_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim().trim_end_matches('/'),
        deployment,
        api_version
    )
}

/// Extracts `choices[*].message.content` from a chat completions body.
pub fn parse_completions(body: &str) -> Result<Vec<String>, LlmError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;

    let completions: Vec<String> = response
        .choices
        .into_iter()
        .filter_map(|choice| choice.message.content)
        .collect();

    if completions.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(completions)
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_endpoint_without_double_slash() {
        let url = chat_completions_url("https://demo.openai.azure.com/", "gpt-4", "2024-02-15-preview");
        assert_eq!(
            url,
            "https://demo.openai.azure.com/openai/deployments/gpt-4/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn parses_choices_in_order() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"first"}},{"message":{"content":"second"}}]}"#;
        let completions = parse_completions(body).unwrap();
        assert_eq!(completions, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn empty_choices_is_an_error() {
        let err = parse_completions(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }

    #[test]
    fn placeholder_key_is_unconfigured() {
        let config = TextServiceConfig {
            endpoint: Some("https://demo.openai.azure.com".to_string()),
            api_key: Some("your_openai_api_key_here".to_string()),
            ..TextServiceConfig::default()
        };
        assert!(!AzureOpenAiClient::from_config(&config).is_available());
    }

    #[test]
    fn missing_endpoint_is_unconfigured() {
        let config = TextServiceConfig {
            api_key: Some("real-key".to_string()),
            ..TextServiceConfig::default()
        };
        match AzureOpenAiClient::from_config(&config) {
            ServiceStatus::Unconfigured { reason } => assert!(reason.contains("ENDPOINT")),
            ServiceStatus::Available(_) => panic!("expected unconfigured"),
        }
    }
}
