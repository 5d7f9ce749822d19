//! Google Gemini API integration
//!
//! Text streaming goes through `:streamGenerateContent?alt=sse`, one-shot
//! suggestions through `:generateContent`, and images through the Imagen
//! `:predict` endpoint.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::llm::retry_utils::{check_response, constants};
use crate::llm::{
    Backend, ChunkStream, GenerationRequest, ImageRequest, LlmError, ResponseSchema, SuggestOptions, Turn,
};

// Constants for Gemini API
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const PROVIDER: &str = "Gemini";

/// Gemini API request types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<Turn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction<'a> {
    parts: Vec<GeminiTextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiTextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a ResponseSchema>,
}

// Gemini API response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<GeminiErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

/// Error object the API embeds in a payload, e.g. mid-stream
#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

// Imagen request and response types

#[derive(Debug, Serialize)]
struct ImagenRequest<'a> {
    instances: Vec<ImagenInstance<'a>>,
    parameters: ImagenParameters,
}

#[derive(Debug, Serialize)]
struct ImagenInstance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagenParameters {
    sample_count: u8,
    aspect_ratio: String,
    output_options: ImagenOutputOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagenOutputOptions {
    mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ImagenResponse {
    #[serde(default)]
    predictions: Vec<ImagenPrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagenPrediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
}

/// Google Gemini API client implementation
pub struct GeminiBackend {
    api_key: String,
    client: reqwest::Client,
    model_name: String,
    image_model: String,
}

impl GeminiBackend {
    /// Create a new Gemini client
    pub fn new(api_key: String, model_name: String, image_model: String) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::ConfigError("Gemini API key is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            model_name,
            image_model,
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", API_BASE_URL, model, method)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, LlmError> {
        let res = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;
        check_response(res, PROVIDER).await
    }
}

fn build_text_request(request: &GenerationRequest) -> GeminiRequest<'_> {
    let system_instruction = if request.system_instruction.trim().is_empty() {
        None
    } else {
        Some(GeminiSystemInstruction {
            parts: vec![GeminiTextPart {
                text: &request.system_instruction,
            }],
        })
    };

    GeminiRequest {
        contents: request.contents(),
        system_instruction,
        generation_config: Some(GeminiGenerationConfig {
            temperature: Some(request.temperature),
            ..Default::default()
        }),
    }
}

fn build_suggest_request<'a>(
    prompt: &str,
    temperature: f32,
    options: Option<&'a SuggestOptions>,
) -> GeminiRequest<'a> {
    let json_mode = options.map(|o| o.json_mode).unwrap_or(false);
    GeminiRequest {
        contents: vec![Turn::text(crate::llm::Role::User, prompt)],
        system_instruction: None,
        generation_config: Some(GeminiGenerationConfig {
            temperature: Some(temperature),
            response_mime_type: json_mode.then_some("application/json"),
            response_schema: options.and_then(|o| o.schema.as_ref()),
        }),
    }
}

/// Convert one decoded payload into its text, or the error it carries
fn parse_payload(payload: &str) -> Result<String, LlmError> {
    let response: GeminiResponse = serde_json::from_str(payload)?;

    if let Some(error) = response.error {
        let status = error.status.unwrap_or_default();
        if error.code == Some(429) || status == "RESOURCE_EXHAUSTED" {
            return Err(LlmError::RateLimitError { retry_after: None });
        }
        return Err(LlmError::ApiError(format!(
            "{} {}: {}",
            error.code.map(|c| c.to_string()).unwrap_or_default(),
            status,
            error.message
        )));
    }

    if let Some(reason) = response.prompt_feedback.and_then(|fb| fb.block_reason) {
        return Err(LlmError::ApiError(format!(
            "Gemini API request blocked. Reason: {}",
            reason
        )));
    }

    let mut text = String::new();
    // Only the first candidate is used
    if let Some(candidate) = response.candidates.first() {
        if let Some(reason) = candidate.finish_reason.as_deref() {
            if reason == "SAFETY" || reason == "RECITATION" {
                bprintln!(warn: "Gemini stopped generation: {}", reason);
            }
        }
        if let Some(content) = &candidate.content {
            for part in &content.parts {
                if let Some(part_text) = &part.text {
                    text.push_str(part_text);
                }
            }
        }
    }
    Ok(text)
}

/// Incremental decoder for a server-sent events body
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed raw bytes, returning the data payload of every completed event
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();

        while let Some((end, separator_len)) = find_event_boundary(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..end + separator_len).take(end).collect();
            if let Some(payload) = event_data(&event) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush whatever is left once the body ends
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        event_data(&rest)
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn event_data(event: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(event);
    let data: Vec<&str> = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

struct SseState {
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

fn decode_sse(response: reqwest::Response) -> ChunkStream {
    let state = SseState {
        bytes: response.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.finished = true;
                    state.pending.clear();
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    for payload in state.decoder.push(&bytes) {
                        state.pending.push_back(parse_payload(&payload));
                    }
                }
                Some(Err(err)) => {
                    state.finished = true;
                    state.pending.push_back(Err(LlmError::Http(err)));
                }
                None => {
                    state.finished = true;
                    if let Some(payload) = state.decoder.finish() {
                        state.pending.push_back(parse_payload(&payload));
                    }
                }
            }
        }
    })
    .boxed()
}

#[async_trait]
impl Backend for GeminiBackend {
    async fn stream_content(&self, request: &GenerationRequest) -> Result<ChunkStream, LlmError> {
        let url = self.endpoint(&self.model_name, "streamGenerateContent");
        let body = build_text_request(request);
        bprintln!(dev: "Gemini stream request with {} turns", body.contents.len());

        let response = self.post(&url, &body, &[("alt", "sse")]).await?;
        Ok(decode_sse(response))
    }

    async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        options: Option<&SuggestOptions>,
    ) -> Result<String, LlmError> {
        let url = self.endpoint(&self.model_name, "generateContent");
        let body = build_suggest_request(prompt, temperature, options);

        let response = self.post(&url, &body, &[]).await?;
        let payload = response.text().await?;
        let text = parse_payload(&payload)?;
        if text.is_empty() {
            return Err(LlmError::ApiError(
                "No candidates returned from Gemini API".into(),
            ));
        }
        Ok(text)
    }

    async fn generate_images(&self, request: &ImageRequest) -> Result<Vec<String>, LlmError> {
        let url = self.endpoint(&self.image_model, "predict");
        let body = ImagenRequest {
            instances: vec![ImagenInstance {
                prompt: &request.prompt,
            }],
            parameters: ImagenParameters {
                sample_count: request.count,
                aspect_ratio: request.aspect_ratio.to_string(),
                output_options: ImagenOutputOptions {
                    mime_type: "image/jpeg",
                },
            },
        };

        let response: ImagenResponse = self.post(&url, &body, &[]).await?.json().await?;
        let images: Vec<String> = response
            .predictions
            .into_iter()
            .filter_map(|p| p.bytes_base64_encoded)
            .collect();

        if images.is_empty() {
            return Err(LlmError::ApiError(
                "Image generation returned no images".into(),
            ));
        }
        Ok(images)
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model_name
    }
}
