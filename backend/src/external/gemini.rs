//! Gemini API client
//!
//! Structured-output crop recommendations through `generateContent` and
//! streamed chat replies through `streamGenerateContent?alt=sse`.

use std::time::Duration;

use axum::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    validate_recommendation_batch, ChatMessage, ChatRole, CropRecommendation,
    RecommendationRequest, RECOMMENDATION_BATCH_SIZE,
};

use crate::error::{AppError, AppResult};
use crate::external::{ChatModel, RecommendationSource, TextChunkStream};

/// Client for the Generative Language API
#[derive(Clone)]
pub struct GeminiClient {
    http_client: Client,
    api_endpoint: String,
    api_key: String,
    model: String,
}

/// Request body shared by both endpoints
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

/// Response body, also the payload of every SSE event
#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl Content {
    fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part { text: text.into() }],
        }
    }
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default()
    }
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(
        api_endpoint: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_endpoint,
            api_key,
            model,
        })
    }

    fn model_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.api_endpoint.trim_end_matches('/'),
            self.model,
            method
        )
    }

    async fn post(&self, url: &str, body: &GenerateContentRequest) -> Result<Response, String> {
        let response = self
            .http_client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(format!("API returned {}: {}", status, body));
        }

        Ok(response)
    }

    /// Generate a full batch of crop recommendations
    pub async fn generate_recommendations(
        &self,
        request: &RecommendationRequest,
    ) -> AppResult<Vec<CropRecommendation>> {
        let body = GenerateContentRequest {
            system_instruction: None,
            contents: vec![Content::text(Some("user"), recommendation_prompt(request))],
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: recommendation_schema(),
            }),
        };

        let response = self
            .post(&self.model_url("generateContent"), &body)
            .await
            .map_err(AppError::Recommendation)?;

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Recommendation(format!("Failed to read response: {}", e)))?;

        parse_recommendations(&body)
    }

    /// Open a streamed chat reply
    pub async fn stream_chat(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> AppResult<TextChunkStream> {
        let mut contents: Vec<Content> = history
            .iter()
            .map(|m| Content::text(Some(gemini_role(m.role)), m.text.clone()))
            .collect();
        contents.push(Content::text(Some("user"), message));

        let body = GenerateContentRequest {
            system_instruction: Some(Content::text(None, system_prompt)),
            contents,
            generation_config: None,
        };

        let url = format!("{}?alt=sse", self.model_url("streamGenerateContent"));
        let response = self.post(&url, &body).await.map_err(AppError::Chat)?;

        Ok(decode_event_stream(response.bytes_stream().boxed()))
    }
}

#[async_trait]
impl RecommendationSource for GeminiClient {
    async fn recommend(&self, request: &RecommendationRequest) -> AppResult<Vec<CropRecommendation>> {
        self.generate_recommendations(request).await
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn stream_reply(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> AppResult<TextChunkStream> {
        self.stream_chat(system_prompt, history, message).await
    }
}

fn gemini_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "model",
    }
}

// ============================================================================
// Recommendations
// ============================================================================

/// Prompt embedding the conditions the batch is ranked against
pub fn recommendation_prompt(request: &RecommendationRequest) -> String {
    format!(
        r#"You are an expert agricultural consultant. Based on the following environmental data, recommend the {count} most suitable crops to plant, mixing vegetables, fruits and grains.

Environmental Data:
- Location (approximate): Latitude {lat:.2}, Longitude {lon:.2}
- Average Temperature (next 7 days): {temp:.1}°C
- Humidity: {humidity:.0}%
- Soil Moisture: {soil:.0}%
- Light Intensity: {light:.0} lux

Return an array of exactly {count} crop objects ranked from best to worst. Scores range from 0 to 100 and every comparison metric from 1 (low) to 10 (high).
Ensure the response is ONLY a valid JSON array matching the provided schema."#,
        count = RECOMMENDATION_BATCH_SIZE,
        lat = request.latitude,
        lon = request.longitude,
        temp = request.average_temperature,
        humidity = request.humidity,
        soil = request.soil_moisture,
        light = request.light_intensity,
    )
}

/// Structured-output schema for a recommendation batch
pub fn recommendation_schema() -> serde_json::Value {
    let rating = |description: &str| {
        json!({ "type": "INTEGER", "description": description, "minimum": 1, "maximum": 10 })
    };

    json!({
        "type": "ARRAY",
        "minItems": RECOMMENDATION_BATCH_SIZE,
        "maxItems": RECOMMENDATION_BATCH_SIZE,
        "items": {
            "type": "OBJECT",
            "properties": {
                "cropName": { "type": "STRING", "description": "The common name of the crop." },
                "suitabilityScore": {
                    "type": "INTEGER",
                    "description": "A score from 0 to 100 indicating suitability.",
                    "minimum": 0,
                    "maximum": 100
                },
                "rationale": { "type": "STRING", "description": "A brief, 1-2 sentence explanation." },
                "growingSeason": { "type": "STRING", "description": "Best sowing or growing season." },
                "difficulty": { "type": "STRING", "enum": ["Easy", "Moderate", "Hard"] },
                "comparisonMetrics": {
                    "type": "OBJECT",
                    "properties": {
                        "waterNeed": rating("Water need rating."),
                        "marketValue": rating("Market value rating."),
                        "pestResistance": rating("Pest resistance rating.")
                    },
                    "required": ["waterNeed", "marketValue", "pestResistance"]
                }
            },
            "required": [
                "cropName",
                "suitabilityScore",
                "rationale",
                "growingSeason",
                "difficulty",
                "comparisonMetrics"
            ]
        }
    })
}

/// Parse a `generateContent` body into a validated batch
pub fn parse_recommendations(body: &str) -> AppResult<Vec<CropRecommendation>> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Recommendation(format!("Failed to parse response: {}", e)))?;

    if let Some(error) = response.error {
        return Err(AppError::Recommendation(format!(
            "API error {}: {}",
            error.code, error.message
        )));
    }

    let text = response.text();
    if text.trim().is_empty() {
        return Err(AppError::Recommendation("Model returned no content".into()));
    }

    parse_recommendation_batch(&text)
}

/// Parse the model's JSON array text and enforce the batch invariants
pub fn parse_recommendation_batch(text: &str) -> AppResult<Vec<CropRecommendation>> {
    let batch: Vec<CropRecommendation> = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AppError::Recommendation(format!("Model output is not a crop list: {}", e)))?;

    validate_recommendation_batch(&batch).map_err(|e| AppError::Recommendation(e.to_string()))?;
    Ok(batch)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

// ============================================================================
// Server-sent events
// ============================================================================

/// Incremental decoder for `alt=sse` bodies.
///
/// Bytes are buffered until a full line arrives, so multi-byte characters
/// split across network chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed raw bytes, returning the text of every completed event
    pub fn feed(&mut self, bytes: &[u8]) -> AppResult<Vec<String>> {
        self.buffer.extend_from_slice(bytes);

        let mut chunks = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(text) = decode_line(&String::from_utf8_lossy(&line))? {
                chunks.push(text);
            }
        }
        Ok(chunks)
    }

    /// Flush a final event not terminated by a newline
    pub fn finish(&mut self) -> AppResult<Vec<String>> {
        let line = std::mem::take(&mut self.buffer);
        Ok(decode_line(&String::from_utf8_lossy(&line))?
            .into_iter()
            .collect())
    }
}

fn decode_line(line: &str) -> AppResult<Option<String>> {
    let Some(data) = line.trim_end().strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let event: GenerateContentResponse = serde_json::from_str(data)
        .map_err(|e| AppError::Chat(format!("Malformed stream event: {}", e)))?;
    if let Some(error) = event.error {
        return Err(AppError::Chat(format!(
            "API error {}: {}",
            error.code, error.message
        )));
    }

    let text = event.text();
    Ok((!text.is_empty()).then_some(text))
}

/// Turn a raw SSE byte stream into text chunks; ends after the first error
pub fn decode_event_stream<B, E>(body: BoxStream<'static, Result<B, E>>) -> TextChunkStream
where
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    stream::unfold(Some((body, SseDecoder::default())), |state| async move {
        let (mut body, mut decoder) = state?;
        match body.next().await {
            Some(Ok(bytes)) => {
                let batch = decoder.feed(bytes.as_ref());
                let next = batch.is_ok().then_some((body, decoder));
                Some((batch, next))
            }
            Some(Err(e)) => Some((
                Err(AppError::Chat(format!("Stream interrupted: {}", e))),
                None,
            )),
            None => Some((decoder.finish(), None)),
        }
    })
    .flat_map(|batch| {
        let items: Vec<AppResult<String>> = match batch {
            Ok(texts) => texts.into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        };
        stream::iter(items)
    })
    .boxed()
}
