//! Google Gemini (Generative Language API) integration
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use super::ContentGenerator;
use crate::error::{InsightError, Result};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Generative Language API client
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    request_timeout: Duration,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

// ============================================
// Request types
// ============================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

// ============================================
// Response types
// ============================================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i32,
    message: String,
}

impl GeminiClient {
    /// Create a client for `model`
    ///
    /// `request_timeout` bounds the HTTP exchange itself; the refresh job
    /// applies its own generation timeout on top.
    pub fn new(
        api_key: String,
        model: impl Into<String>,
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| InsightError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// HTTP-level timeouts count as generation timeouts
    fn request_error(&self, context: &str, err: reqwest::Error) -> InsightError {
        if err.is_timeout() {
            InsightError::GenerationTimeout(self.request_timeout)
        } else {
            InsightError::generation(format!("{}: {}", context, err))
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

/// Concatenate the text parts of the first candidate
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(InsightError::generation(format!(
            "prompt blocked by provider: {}",
            reason
        )));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| InsightError::generation("response contained no candidates"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        return Err(InsightError::generation(format!(
            "candidate contained no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let start = Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error("Gemini request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&error_text)
                .map(|body| format!("{} {}", body.error.code, body.error.message))
                .unwrap_or(error_text);
            error!(status = %status, error = %message, "Gemini request failed");
            return Err(InsightError::generation(format!(
                "Gemini API error ({}): {}",
                status, message
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| self.request_error("failed to decode Gemini response", e))?;

        debug!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis(),
            "Gemini response received"
        );

        extract_text(body)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new(
            "secret-key".to_string(),
            DEFAULT_GEMINI_MODEL,
            "http://localhost:9999/",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            client().endpoint(),
            "http://localhost:9999/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", client());
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: "hello" }],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"a\":"},{"text":"1}"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(body).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_extract_text_blocked_prompt() {
        let body: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        let err = extract_text(body).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_extract_text_no_candidates() {
        let err = extract_text(GenerateContentResponse::default()).unwrap_err();
        assert_eq!(err.kind(), "generation_failure");
    }

    #[test]
    fn test_extract_text_empty_candidate() {
        let body: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#).unwrap();
        let err = extract_text(body).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_generation_failure() {
        let client = GeminiClient::new(
            "key".to_string(),
            DEFAULT_GEMINI_MODEL,
            "http://127.0.0.1:1",
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.generate("hi").await.unwrap_err();
        assert_eq!(err.kind(), "generation_failure");
    }

    #[tokio::test]
    async fn test_http_timeout_is_generation_timeout() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = GeminiClient::new(
            "key".to_string(),
            DEFAULT_GEMINI_MODEL,
            format!("http://{}", addr),
            Duration::from_millis(200),
        )
        .unwrap();
        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, InsightError::GenerationTimeout(d) if d == Duration::from_millis(200)));

        server.abort();
    }
}
