// ============================================================================
// IMAGE TRANSFORM SERVICE - multimodal prompt-to-image requests
// ============================================================================
//
// Every generative action (generate, compose, mask edit, upscale, camera,
// relight) reduces to one request: an ordered list of text and image parts,
// answered with one image. `TransformService` is that boundary; the editor
// and the CLI only ever see the trait, so tests swap in a scripted service.
//
// `GeminiService` is the production implementation: a blocking `reqwest`
// client talking to the `generateContent` REST endpoint. It is always called
// from a worker thread (desktop) or the main thread (CLI), never from the
// UI thread.

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{EditError, Result};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const NO_IMAGE_MESSAGE: &str = "No image was generated in the response.";

/// Encoded image bytes plus their MIME type, as sent to or received from the
/// service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn png(data: Vec<u8>) -> Self {
        Self::new("image/png", data)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstructionPart {
    Text(String),
    Image(InlineImage),
}

impl InstructionPart {
    pub fn text(text: impl Into<String>) -> Self {
        InstructionPart::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            InstructionPart::Text(t) => Some(t),
            InstructionPart::Image(_) => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, InstructionPart::Image(_))
    }
}

/// One single-shot request. The response modality is always an image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransformRequest {
    pub parts: Vec<InstructionPart>,
}

impl TransformRequest {
    pub fn new(parts: Vec<InstructionPart>) -> Self {
        Self { parts }
    }

    pub fn image_count(&self) -> usize {
        self.parts.iter().filter(|p| p.is_image()).count()
    }

    /// All text parts joined with newlines, for logs and tests.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(InstructionPart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformResponse {
    pub image: InlineImage,
}

pub trait TransformService: Send + Sync {
    fn transform(&self, request: &TransformRequest) -> Result<TransformResponse>;
}

// ============================================================================
// FAILURE CLASSIFICATION
// ============================================================================

/// Raw failure as observed on the wire, before it is mapped to a user-facing
/// category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServiceError {
    /// Non-success HTTP status with the service's message.
    Status { code: u16, message: String },
    /// The request never produced a response.
    Connection(String),
    /// Success status, but no part carried image data.
    NoImage,
    /// The body could not be parsed or the image payload was not base64.
    Malformed(String),
}

impl From<ServiceError> for EditError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Status { code, message } => {
                if code == 401
                    || code == 403
                    || message.contains("API key not valid")
                    || message.contains("Requested entity was not found")
                {
                    EditError::InvalidCredential(message)
                } else if message.contains("key is required") {
                    EditError::MissingCredential
                } else {
                    EditError::TransportFailure(format!("HTTP {}: {}", code, message))
                }
            }
            ServiceError::Connection(msg) => EditError::TransportFailure(msg),
            ServiceError::NoImage => EditError::TransformFailure(NO_IMAGE_MESSAGE.to_string()),
            ServiceError::Malformed(msg) => EditError::TransformFailure(msg),
        }
    }
}

// ============================================================================
// GEMINI CLIENT
// ============================================================================

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

pub struct GeminiService {
    client: reqwest::blocking::Client,
    config: GeminiConfig,
}

impl GeminiService {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(EditError::MissingCredential);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EditError::TransportFailure(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }
}

impl TransformService for GeminiService {
    fn transform(&self, request: &TransformRequest) -> Result<TransformResponse> {
        let body = encode_request(request);
        log::info!(
            "Sending transform request to {} ({} parts, {} images)",
            self.config.model,
            request.parts.len(),
            request.image_count()
        );

        let response = self
            .client
            .post(self.config.url())
            .header("x-goog-api-key", self.config.api_key.trim())
            .json(&body)
            .send()
            .map_err(|e| ServiceError::Connection(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ServiceError::Connection(e.to_string()))?;

        if !status.is_success() {
            let message = error_message(&text);
            log::warn!("Transform request failed with HTTP {}: {}", status.as_u16(), message);
            return Err(ServiceError::Status {
                code: status.as_u16(),
                message,
            }
            .into());
        }

        let image = decode_response(&text)?;
        log::info!(
            "Transform returned {} ({} bytes)",
            image.mime_type,
            image.data.len()
        );
        Ok(TransformResponse { image })
    }
}

// -- Wire format ---------------------------------------------------------

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<WirePart>,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<&'static str>,
}

#[derive(Serialize, Deserialize, Default)]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none", default)]
    inline_data: Option<WireInlineData>,
}

#[derive(Serialize, Deserialize)]
struct WireInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

fn encode_request(request: &TransformRequest) -> GenerateRequest {
    let parts = request
        .parts
        .iter()
        .map(|part| match part {
            InstructionPart::Text(t) => WirePart {
                text: Some(t.clone()),
                inline_data: None,
            },
            InstructionPart::Image(img) => WirePart {
                text: None,
                inline_data: Some(WireInlineData {
                    mime_type: img.mime_type.clone(),
                    data: general_purpose::STANDARD.encode(&img.data),
                }),
            },
        })
        .collect();
    GenerateRequest {
        contents: vec![RequestContent { parts }],
        generation_config: GenerationConfig {
            response_modalities: vec!["IMAGE"],
        },
    }
}

/// First part of the first candidate that carries image data.
fn decode_response(body: &str) -> Result<InlineImage> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::Malformed(format!("Unreadable response: {}", e)))?;
    let inline = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.inline_data))
        .ok_or(ServiceError::NoImage)?;
    let data = general_purpose::STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| ServiceError::Malformed(format!("Invalid image payload: {}", e)))?;
    if data.is_empty() {
        return Err(ServiceError::NoImage.into());
    }
    Ok(InlineImage::new(inline.mime_type, data))
}

/// The service wraps errors as `{"error": {"message": ...}}`; fall back to
/// the raw body otherwise.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) if !env.error.message.is_empty() => env.error.message,
        _ => body.trim().to_string(),
    }
}
