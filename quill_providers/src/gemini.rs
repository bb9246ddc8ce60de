use futures::StreamExt;
use futures::stream;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use quill_core::{
    Content, CountTokensRequest, CountTokensResponse, EmbedRequest, EmbedResponse, Error,
    GenerateRequest, GenerateResponse, ModelProvider, Part, ResponseStream, Result,
};

use crate::retry::retry_with_backoff;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// HTTP transport to the Gemini API.
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        info!("Creating GeminiProvider");
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn endpoint(&self, model: &str, verb: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, verb)
    }

    /// Helper to send a single request and decode the response body.
    async fn try_send<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message = if message.is_empty() {
                status.to_string()
            } else {
                message
            };
            return Err(Error::provider(message, Some(status.as_u16())));
        }

        response.json::<T>().await.map_err(request_error)
    }
}

fn request_error(e: reqwest::Error) -> Error {
    Error::provider(e.to_string(), e.status().map(|s| s.as_u16()))
}

#[async_trait::async_trait]
impl ModelProvider for GeminiProvider {
    async fn generate_content(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let url = self.endpoint(&request.model, "generateContent");
        let body = serde_json::to_value(&request).map_err(|e| Error::Parse(e.to_string()))?;

        debug!("Sending generateContent request: model={}", request.model);

        // Retry with exponential backoff: 2s, 4s, 6s, 8s, then 10s x 3
        let base_delays: [u64; 4] = [2, 4, 6, 8];
        let final_retries = 3;

        retry_with_backoff(|| self.try_send(&url, &body), &base_delays, final_retries).await
    }

    async fn generate_content_stream(&self, request: GenerateRequest) -> Result<ResponseStream> {
        let url = self.endpoint(&request.model, "streamGenerateContent");
        let body = serde_json::to_value(&request).map_err(|e| Error::Parse(e.to_string()))?;

        debug!(
            "Opening streamGenerateContent request: model={}",
            request.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("alt", "sse")])
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message = if message.is_empty() {
                status.to_string()
            } else {
                message
            };
            return Err(Error::provider(message, Some(status.as_u16())));
        }

        let bytes = response.bytes_stream().boxed();

        // Buffer raw bytes and cut server-sent-event lines out of them as
        // they complete.
        let events = stream::try_unfold((bytes, Vec::new()), |(mut bytes, mut buffer)| async move {
            loop {
                if let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    if let Some(fragment) = parse_sse_line(&line)? {
                        return Ok(Some((fragment, (bytes, buffer))));
                    }
                    continue;
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => return Err(request_error(e)),
                    None => {
                        if buffer.is_empty() {
                            return Ok(None);
                        }
                        let rest = std::mem::take(&mut buffer);
                        return match parse_sse_line(&rest)? {
                            Some(fragment) => Ok(Some((fragment, (bytes, buffer)))),
                            None => Ok(None),
                        };
                    }
                }
            }
        });

        Ok(Box::pin(events))
    }

    async fn count_tokens(&self, request: CountTokensRequest) -> Result<CountTokensResponse> {
        let url = self.endpoint(&request.model, "countTokens");
        let body = json!({ "contents": request.contents });

        self.try_send(&url, &body).await
    }

    async fn embed_content(&self, request: EmbedRequest) -> Result<EmbedResponse> {
        let url = self.endpoint(&request.model, "batchEmbedContents");
        let requests: Vec<serde_json::Value> = request
            .texts
            .iter()
            .map(|text| {
                json!({
                    "model": format!("models/{}", request.model),
                    "content": Content::new(quill_core::Role::User, vec![Part::from_text(text)]),
                })
            })
            .collect();
        let body = json!({ "requests": requests });

        debug!(
            "Sending batchEmbedContents request: model={}, texts={}",
            request.model,
            request.texts.len()
        );

        self.try_send(&url, &body).await
    }
}

/// Decode one server-sent-event line. Keep-alives, comments, and blank
/// separators yield `None`.
fn parse_sse_line(line: &[u8]) -> Result<Option<GenerateResponse>> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return Ok(None);
    }
    serde_json::from_str(payload)
        .map(Some)
        .map_err(|e| Error::provider(format!("malformed stream chunk: {e}"), None))
}
