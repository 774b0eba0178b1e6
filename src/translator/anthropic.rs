use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{prompt, Translator};
use crate::error::{ProxyError, Result};
use crate::settings::{TranslatorSettings, ANTHROPIC_VERSION};
use crate::{config_error, operation_error};

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Translator backed by the Anthropic Messages API
#[derive(Clone)]
pub struct AnthropicTranslator {
    client: reqwest::Client,
    settings: TranslatorSettings,
}

impl std::fmt::Debug for AnthropicTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print the key
        f.debug_struct("AnthropicTranslator")
            .field("api_url", &self.settings.api_url.as_str())
            .field("model", &self.settings.model)
            .field("max_tokens", &self.settings.max_tokens)
            .finish()
    }
}

impl AnthropicTranslator {
    pub fn new(settings: TranslatorSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| config_error!("no API key configured"))?;

        let mut headers = HeaderMap::new();
        let mut key_header = HeaderValue::from_str(api_key)
            .map_err(|e| config_error!("API key is not a valid header value: {}", e))?;
        key_header.set_sensitive(true);
        headers.insert("x-api-key", key_header);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| config_error!("Failed to build HTTP client: {}", e))?;

        Ok(Self { client, settings })
    }
}

#[async_trait]
impl Translator for AnthropicTranslator {
    #[instrument(skip_all, fields(chars = text.chars().count()), level = "debug")]
    async fn translate(&self, text: &str) -> Result<String> {
        let estimated = prompt::check_input(text);
        debug!("Estimated input tokens: ~{}", estimated);

        let prompt = prompt::build_prompt(text);
        let request = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            messages: vec![Message {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .client
            .post(self.settings.api_url.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxyError::Upstream {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let raw = response.text().await?;
        let body: MessagesResponse = serde_json::from_str(&raw)?;
        let translated = body
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| operation_error!("upstream response had no text content"))?;

        prompt::check_output(text, &translated, self.settings.max_tokens);
        debug!(
            "Translation successful: {} chars (~{} tokens)",
            translated.chars().count(),
            prompt::estimate_tokens(&translated)
        );
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use url::Url;

    use super::*;
    use crate::settings::{DEFAULT_API_URL, DEFAULT_MODEL};

    fn settings(api_key: Option<&str>) -> TranslatorSettings {
        TranslatorSettings {
            api_url: Url::parse(DEFAULT_API_URL).unwrap(),
            api_key: api_key.map(str::to_string),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 8000,
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn requires_api_key() {
        assert!(AnthropicTranslator::new(settings(None)).is_err());
        assert!(AnthropicTranslator::new(settings(Some(""))).is_err());
        assert!(AnthropicTranslator::new(settings(Some("sk-test"))).is_ok());
    }

    #[test]
    fn debug_output_hides_key() {
        let translator = AnthropicTranslator::new(settings(Some("sk-secret"))).unwrap();
        let printed = format!("{:?}", translator);
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains(DEFAULT_MODEL));
    }

    #[test]
    fn request_body_shape() {
        let request = MessagesRequest {
            model: DEFAULT_MODEL,
            max_tokens: 8000,
            messages: vec![Message {
                role: "user",
                content: "hello",
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], DEFAULT_MODEL);
        assert_eq!(value["max_tokens"], 8000);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hello");
    }

    #[test]
    fn response_without_text_parses() {
        let body: MessagesResponse =
            serde_json::from_str(r#"{"content":[{"type":"tool_use"}]}"#).unwrap();
        assert!(body.content[0].text.is_none());
        let body: MessagesResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(body.content.is_empty());
    }
}
