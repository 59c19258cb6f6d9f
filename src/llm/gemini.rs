use super::LanguageModel;
use crate::config::LlmConfig;
use crate::utils::pause;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

// ── Wire format ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// `candidates[0].content.parts[0].text`
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: Url,
    temperature: f32,
    max_output_tokens: u32,
    min_delay_ms: u64,
    max_delay_ms: u64,
    shutdown: CancellationToken,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig, shutdown: CancellationToken) -> Result<Self> {
        if config.api_key.is_empty() {
            warn!("No LLM API key configured; every call will be rejected upstream");
        }

        let endpoint = Url::parse_with_params(
            &format!(
                "{}/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            &[("key", config.api_key.as_str())],
        )
        .with_context(|| format!("Invalid LLM base URL {}", config.base_url))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build LLM HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms.max(config.min_delay_ms),
            shutdown,
        })
    }

    fn jitter(&self) -> Duration {
        Duration::from_millis(rand::random_range(self.min_delay_ms..=self.max_delay_ms))
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> Option<String> {
        // Throttle every call, the first one included.
        if !pause(&self.shutdown, self.jitter()).await {
            debug!("LLM call skipped, shutting down");
            return None;
        }

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let send = self.http.post(self.endpoint.clone()).json(&body).send();
        let resp = tokio::select! {
            _ = self.shutdown.cancelled() => return None,
            resp = send => resp,
        };

        // Error URLs carry the API key; keep them out of the log.
        let resp = match resp {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Gemini API error: {}", e.without_url());
                return None;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            warn!("Gemini API error: {}", status);
            return None;
        }

        match resp.json::<GenerateResponse>().await {
            Ok(parsed) => {
                let text = parsed.first_text();
                if text.is_none() {
                    warn!("Gemini response carried no text part");
                }
                text
            }
            Err(e) => {
                warn!("Gemini API error: {}", e.without_url());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Notes when the request arrived.
    struct ArrivalStamp(Arc<Mutex<Option<Instant>>>);

    impl Respond for ArrivalStamp {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            *self.0.lock().unwrap() = Some(Instant::now());
            ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
            }))
        }
    }

    fn llm_config(base_url: String) -> LlmConfig {
        LlmConfig {
            base_url,
            model: "gemini-test".to_string(),
            api_key: "secret".to_string(),
            min_delay_ms: 0,
            max_delay_ms: 0,
            timeout_secs: 5,
            ..LlmConfig::default()
        }
    }

    #[tokio::test]
    async fn posts_fixed_request_shape_and_returns_first_part() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(query_param("key", "secret"))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [{ "text": "hello" }] }],
                "generationConfig": { "maxOutputTokens": 2048 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [
                    { "content": { "parts": [{ "text": "first" }, { "text": "second" }] } },
                    { "content": { "parts": [{ "text": "other" }] } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&llm_config(server.uri()), CancellationToken::new()).unwrap();
        assert_eq!(client.complete("hello").await.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn error_status_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&llm_config(server.uri()), CancellationToken::new()).unwrap();
        assert_eq!(client.complete("hello").await, None);
    }

    #[tokio::test]
    async fn unexpected_shapes_yield_none() {
        for body in [
            json!({}),
            json!({ "candidates": [] }),
            json!({ "candidates": [{ "finishReason": "SAFETY" }] }),
            json!({ "candidates": [{ "content": { "parts": [] } }] }),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;

            let client =
                GeminiClient::new(&llm_config(server.uri()), CancellationToken::new()).unwrap();
            assert_eq!(client.complete("hello").await, None);
        }
    }

    #[tokio::test]
    async fn non_json_body_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&llm_config(server.uri()), CancellationToken::new()).unwrap();
        assert_eq!(client.complete("hello").await, None);
    }

    #[tokio::test]
    async fn cancelled_client_makes_no_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let client = GeminiClient::new(&llm_config(server.uri()), shutdown).unwrap();
        assert_eq!(client.complete("hello").await, None);
    }

    #[tokio::test]
    async fn first_call_waits_out_the_jitter_window() {
        let server = MockServer::start().await;
        let arrived = Arc::new(Mutex::new(None));
        Mock::given(method("POST"))
            .respond_with(ArrivalStamp(arrived.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let config = LlmConfig {
            min_delay_ms: 150,
            max_delay_ms: 250,
            ..llm_config(server.uri())
        };
        let client = GeminiClient::new(&config, CancellationToken::new()).unwrap();

        let started = Instant::now();
        assert_eq!(client.complete("hello").await.as_deref(), Some("ok"));

        let arrived = arrived.lock().unwrap().expect("request reached the server");
        assert!(
            arrived.duration_since(started) >= Duration::from_millis(150),
            "request sent after {:?}",
            arrived.duration_since(started)
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_none() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let client = GeminiClient::new(
            &llm_config(format!("http://127.0.0.1:{port}")),
            CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(client.complete("hello").await, None);
    }
}
