//! Content model for Gemini requests and the typed responses returned by the
//! non-streaming operations.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::ClientError;

/// Role of the author of a [`Content`] turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// A single content fragment.
///
/// Parts the crate does not model (function calls, executable code, ...) are
/// kept as raw JSON in [`Part::Other`] so responses round-trip untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Other(Value),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Inline media part from an already base64-encoded payload.
    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Base64-encoded media embedded in a request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// One message unit: ordered parts, optionally tagged with a role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Untagged content with the given parts.
    pub fn new(parts: Vec<Part>) -> Self {
        Self { role: None, parts }
    }

    /// A user turn holding one text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(vec![Part::text(text)]).with_role(Role::User)
    }

    /// A model turn holding one text part.
    pub fn model(text: impl Into<String>) -> Self {
        Self::new(vec![Part::text(text)]).with_role(Role::Model)
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Concatenation of the text parts, in order.
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).join("")
    }
}

/// Image formats accepted by [`crate::request::build_image_request`].
///
/// `Unsupported` carries whatever name the caller supplied; it is rejected
/// when the request is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageMimeType {
    Jpeg,
    Jpg,
    Png,
    Heic,
    Heif,
    Webp,
    Unsupported(String),
}

impl ImageMimeType {
    /// Canonical `type/subtype` string.
    pub fn as_mime(&self) -> Result<&'static str, ClientError> {
        match self {
            ImageMimeType::Jpeg => Ok("image/jpeg"),
            ImageMimeType::Jpg => Ok("image/jpg"),
            ImageMimeType::Png => Ok("image/png"),
            ImageMimeType::Heic => Ok("image/heic"),
            ImageMimeType::Heif => Ok("image/heif"),
            ImageMimeType::Webp => Ok("image/webp"),
            ImageMimeType::Unsupported(name) => Err(ClientError::invalid_argument(
                "mime_type",
                format!("unsupported image mime type `{name}`"),
            )),
        }
    }
}

impl From<&str> for ImageMimeType {
    fn from(name: &str) -> Self {
        let lowered = name.trim().to_ascii_lowercase();
        match lowered.strip_prefix("image/").unwrap_or(&lowered) {
            "jpeg" => ImageMimeType::Jpeg,
            "jpg" => ImageMimeType::Jpg,
            "png" => ImageMimeType::Png,
            "heic" => ImageMimeType::Heic,
            "heif" => ImageMimeType::Heif,
            "webp" => ImageMimeType::Webp,
            _ => ImageMimeType::Unsupported(name.to_string()),
        }
    }
}

impl std::str::FromStr for ImageMimeType {
    type Err = std::convert::Infallible;

    /// Never fails; unknown names become [`ImageMimeType::Unsupported`].
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(name))
    }
}

/// Sampling and output settings, forwarded verbatim.
///
/// Fields without a named slot go in `extra` and are flattened into the body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<ResponseSchema>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Structured-output schema, a subset of the OpenAPI 3.0 schema object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, ResponseSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ResponseSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ResponseSchema {
    pub fn new(schema_type: impl Into<String>) -> Self {
        Self {
            schema_type: schema_type.into(),
            properties: None,
            items: None,
            description: None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, schema: ResponseSchema) -> Self {
        self.properties
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), schema);
        self
    }

    pub fn with_items(mut self, items: ResponseSchema) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

impl SafetySetting {
    pub fn new(category: impl Into<String>, threshold: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            threshold: threshold.into(),
        }
    }
}

// --- Responses ---

/// Response of `generateContent`, and the shape of each streamed value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, if it has content.
    pub fn text(&self) -> Option<String> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(Content::text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub safety_ratings: Option<Vec<SafetyRating>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SafetyRating {
    pub category: String,
    pub probability: String,
    #[serde(default)]
    pub blocked: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: Option<u32>,
    #[serde(default)]
    pub total_token_count: Option<u32>,
    #[serde(default)]
    pub cached_content_token_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountTokensResponse {
    pub total_tokens: u32,
    #[serde(default)]
    pub cached_content_token_count: Option<u32>,
}

/// Model metadata as returned by `GET models/{model}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub base_model_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_token_limit: Option<u32>,
    #[serde(default)]
    pub output_token_limit: Option<u32>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub top_k: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelList {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContentEmbedding {
    #[serde(default)]
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingResponse {
    pub embedding: ContentEmbedding,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchEmbeddingResponse {
    #[serde(default)]
    pub embeddings: Vec<ContentEmbedding>,
}
