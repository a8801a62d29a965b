//! OpenRouter-compatible chat completions gateway
//!
//! Sends one system + user message pair in JSON mode and returns the first
//! choice's content. Rate limits, 5xx responses and connection failures are
//! retried with exponential backoff; the whole exchange is bounded by the
//! timeout in the generation options.

use futures::future::BoxFuture;
use riskwise_core::{AiGateway, GatewayError, GenerationOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;

pub(crate) const MAX_RETRIES: u32 = 3;
pub(crate) const INITIAL_BACKOFF_MS: u64 = 1000;
pub(crate) const BACKOFF_MULTIPLIER: u64 = 2;
const MAX_ERROR_CONTENT_LEN: usize = 200;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenRouterError {
    error: OpenRouterApiError,
}

#[derive(Deserialize)]
struct OpenRouterApiError {
    message: String,
    #[serde(default)]
    code: Option<i32>,
}

pub struct OpenRouterGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenRouterGateway {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Gateway for the configured provider, or `None` without an API key
    pub fn from_config(config: &Config) -> anyhow::Result<Option<Self>> {
        match config.get_api_key() {
            Some(key) => Ok(Some(Self::new(&config.base_url, key, &config.model)?)),
            None => Ok(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn complete(
        &self,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GatewayError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &options.system_prompt,
                },
                Message {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream: false,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };
        let text = self.send_with_retry(&body).await?;
        extract_content(&text)
    }

    async fn send_with_retry(&self, body: &ChatRequest<'_>) -> Result<String, GatewayError> {
        let mut retry_count = 0;

        loop {
            let response = match self
                .client
                .post(&self.endpoint)
                .header("Content-Type", "application/json")
                .header("HTTP-Referer", "https://riskwise.app")
                .header("X-Title", "riskwise")
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    if is_retryable_network_error(&err) && retry_count < MAX_RETRIES {
                        retry_count += 1;
                        debug!(retry_count, error = %err, "retrying after network error");
                        sleep_secs(backoff_secs(retry_count)).await;
                        continue;
                    }
                    return Err(map_network_error(err));
                }
            };

            let status = response.status();
            let text = match response.text().await {
                Ok(text) => text,
                Err(err) => {
                    if is_retryable_network_error(&err) && retry_count < MAX_RETRIES {
                        retry_count += 1;
                        sleep_secs(backoff_secs(retry_count)).await;
                        continue;
                    }
                    return Err(map_network_error(err));
                }
            };

            if status.is_success() {
                // Upstream provider failures can arrive with a 200
                if let Ok(err_resp) = serde_json::from_str::<OpenRouterError>(&text) {
                    let code = err_resp.error.code.unwrap_or(502);
                    if (code >= 500 || code == 429) && retry_count < MAX_RETRIES {
                        retry_count += 1;
                        sleep_secs(backoff_secs(retry_count)).await;
                        continue;
                    }
                    return Err(GatewayError::Provider {
                        status: u16::try_from(code).unwrap_or(502),
                        message: truncate_str(&err_resp.error.message, MAX_ERROR_CONTENT_LEN)
                            .to_string(),
                    });
                }
                return Ok(text);
            }

            if status.as_u16() == 429 && retry_count < MAX_RETRIES {
                retry_count += 1;
                let retry_after =
                    parse_retry_after(&text).unwrap_or_else(|| backoff_secs(retry_count));
                debug!(retry_count, retry_after, "rate limited, backing off");
                sleep_secs(retry_after).await;
                continue;
            }

            if status.is_server_error() && retry_count < MAX_RETRIES {
                retry_count += 1;
                sleep_secs(backoff_secs(retry_count)).await;
                continue;
            }

            warn!(status = status.as_u16(), retry_count, "provider request failed");
            return Err(GatewayError::Provider {
                status: status.as_u16(),
                message: provider_message(status.as_u16(), &text),
            });
        }
    }
}

impl AiGateway for OpenRouterGateway {
    fn invoke<'a>(
        &'a self,
        user_prompt: &'a str,
        options: &'a GenerationOptions,
    ) -> BoxFuture<'a, Result<String, GatewayError>> {
        Box::pin(async move {
            match tokio::time::timeout(options.timeout, self.complete(user_prompt, options)).await
            {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout),
            }
        })
    }
}

fn extract_content(body: &str) -> Result<String, GatewayError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| GatewayError::Provider {
            status: 200,
            message: format!("unexpected response shape: {}", e),
        })?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(GatewayError::EmptyResponse)
}

fn provider_message(status: u16, text: &str) -> String {
    match status {
        401 => "Invalid API key. Run 'riskwise setup' to update it.".to_string(),
        402 => "Provider account is out of credits.".to_string(),
        429 => "Rate limited by the provider. Try again in a few minutes.".to_string(),
        500..=599 => "The provider is temporarily unavailable.".to_string(),
        _ => sanitize_api_response(text),
    }
}

/// Trim provider error bodies and drop anything that looks like a credential
fn sanitize_api_response(content: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &["api_key", "apikey", "secret", "bearer", "sk-"];

    let truncated = truncate_str(content, MAX_ERROR_CONTENT_LEN);
    let lower = truncated.to_lowercase();
    if SECRET_PATTERNS.iter().any(|p| lower.contains(p)) {
        return "[response hidden: may contain credentials]".to_string();
    }
    truncated.to_string()
}

/// Extract a retry-after hint from a rate-limit body
fn parse_retry_after(text: &str) -> Option<u64> {
    let text_lower = text.to_lowercase();
    let pos = text_lower.find("retry")?;
    text_lower[pos..]
        .split_whitespace()
        .skip(1)
        .take(5)
        .filter_map(|word| {
            word.trim_matches(|c: char| !c.is_numeric())
                .parse::<u64>()
                .ok()
        })
        .find(|secs| *secs > 0 && *secs < 300)
}

pub(crate) fn backoff_secs(retry_count: u32) -> u64 {
    let factor = BACKOFF_MULTIPLIER.pow(retry_count.saturating_sub(1));
    let ms = INITIAL_BACKOFF_MS.saturating_mul(factor);
    (ms / 1000).max(1)
}

pub(crate) fn is_retryable_network_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn map_network_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else if err.is_connect() {
        GatewayError::Network("could not connect to the provider".to_string())
    } else {
        GatewayError::Network(err.to_string())
    }
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

/// Truncate a string for display (Unicode-safe)
fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_retry() {
        assert_eq!(backoff_secs(1), 1);
        assert_eq!(backoff_secs(2), 2);
        assert_eq!(backoff_secs(3), 4);
    }

    #[test]
    fn test_parse_retry_after_hint() {
        assert_eq!(parse_retry_after("Please retry after 12 seconds"), Some(12));
        assert_eq!(parse_retry_after("retry in 900 seconds"), None);
        assert_eq!(parse_retry_after("slow down"), None);
    }

    #[test]
    fn test_extract_content_reads_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"suggestions\":[\"a\"]}"}}]}"#;
        assert_eq!(
            extract_content(body).unwrap(),
            r#"{"suggestions":["a"]}"#
        );
    }

    #[test]
    fn test_extract_content_blank_is_empty_response() {
        let body = r#"{"choices":[{"message":{"content":"   "}}]}"#;
        assert_eq!(extract_content(body), Err(GatewayError::EmptyResponse));
        assert_eq!(
            extract_content(r#"{"choices":[]}"#),
            Err(GatewayError::EmptyResponse)
        );
    }

    #[test]
    fn test_extract_content_rejects_garbage() {
        assert!(matches!(
            extract_content("<html>bad gateway</html>"),
            Err(GatewayError::Provider { status: 200, .. })
        ));
    }

    #[test]
    fn test_provider_message_hides_credentials() {
        assert_eq!(
            provider_message(400, "invalid header: Bearer sk-or-123"),
            "[response hidden: may contain credentials]"
        );
        assert_eq!(provider_message(400, "model not found"), "model not found");
        assert!(provider_message(401, "").contains("riskwise setup"));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let gateway =
            OpenRouterGateway::new("https://openrouter.ai/api/v1/", "sk-or-test", "m").unwrap();
        assert_eq!(
            gateway.endpoint(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_unreachable_provider_maps_to_gateway_error() {
        // Port 9 on loopback refuses connections; the short timeout bounds retries
        let gateway = OpenRouterGateway::new("http://127.0.0.1:9", "sk-or-test", "m").unwrap();
        let options = GenerationOptions {
            system_prompt: "system".to_string(),
            max_tokens: 10,
            temperature: 0.0,
            timeout: Duration::from_millis(300),
        };
        let result = gateway.invoke("hello", &options).await;
        assert!(matches!(
            result,
            Err(GatewayError::Timeout) | Err(GatewayError::Network(_))
        ));
    }
}
