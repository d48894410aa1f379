//! Request builder: turns caller input into wire request bodies.
//!
//! Every function here is pure and validates its input before building
//! anything, so a rejected call never reaches the transport.

use base64::prelude::*;
use nonempty::NonEmpty;
use serde::Serialize;

use crate::client::ClientError;
use crate::model::{Content, GenerationConfig, ImageMimeType, Part, SafetySetting};
use crate::options::GenerateOptions;

const MODEL_PREFIX: &str = "models/";

/// Prompt content in one of the three accepted shapes.
///
/// `Many` is a merge: the strings become the parts of a single content, not
/// separate turns. Use `Turns` for a multi-turn exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptInput {
    Single(String),
    Many(Vec<String>),
    Turns(Vec<Content>),
}

impl PromptInput {
    /// Validate and convert into the `contents` list of a generate request.
    pub fn into_contents(self) -> Result<NonEmpty<Content>, ClientError> {
        match self {
            PromptInput::Single(text) => {
                require_text("message", &text)?;
                Ok(NonEmpty::new(Content::new(vec![Part::text(text)])))
            }
            PromptInput::Many(texts) => Ok(NonEmpty::new(merged_content(texts)?)),
            PromptInput::Turns(turns) => {
                for turn in &turns {
                    require_media(turn)?;
                }
                NonEmpty::from_vec(turns)
                    .ok_or_else(|| ClientError::invalid_argument("messages", "cannot be empty"))
            }
        }
    }

    /// Validate and convert into the single `content` of an embed request.
    ///
    /// Turns are flattened: their parts are concatenated in order and roles
    /// are dropped.
    pub fn into_content(self) -> Result<Content, ClientError> {
        let contents = match self {
            PromptInput::Many(texts) => return merged_content(texts),
            other => other.into_contents()?,
        };
        Ok(Content::new(
            contents.into_iter().flat_map(|turn| turn.parts).collect(),
        ))
    }
}

impl From<&str> for PromptInput {
    fn from(text: &str) -> Self {
        PromptInput::Single(text.to_string())
    }
}

impl From<String> for PromptInput {
    fn from(text: String) -> Self {
        PromptInput::Single(text)
    }
}

impl From<Vec<String>> for PromptInput {
    fn from(texts: Vec<String>) -> Self {
        PromptInput::Many(texts)
    }
}

impl From<Vec<&str>> for PromptInput {
    fn from(texts: Vec<&str>) -> Self {
        PromptInput::Many(texts.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<Content>> for PromptInput {
    fn from(turns: Vec<Content>) -> Self {
        PromptInput::Turns(turns)
    }
}

impl From<Content> for PromptInput {
    fn from(turn: Content) -> Self {
        PromptInput::Turns(vec![turn])
    }
}

/// Image payload for an image prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Raw bytes, base64-encoded by the builder.
    Bytes(Vec<u8>),
    /// Data that is already base64-encoded.
    Base64(String),
}

impl ImageSource {
    fn into_base64(self) -> Result<String, ClientError> {
        match self {
            ImageSource::Bytes(bytes) if bytes.is_empty() => {
                Err(ClientError::invalid_argument("image", "cannot be empty"))
            }
            ImageSource::Bytes(bytes) => Ok(BASE64_STANDARD.encode(bytes)),
            ImageSource::Base64(data) => {
                require_text("image", &data)?;
                Ok(data)
            }
        }
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

impl From<&[u8]> for ImageSource {
    fn from(bytes: &[u8]) -> Self {
        ImageSource::Bytes(bytes.to_vec())
    }
}

/// Body of `generateContent`, `streamGenerateContent` and `countTokens`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: NonEmpty<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_settings: Option<Vec<SafetySetting>>,
}

/// Body of `embedContent` and `batchEmbedContent`. Note the singular `content`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedRequest {
    pub model: String,
    pub content: Content,
}

/// Check a model identifier and return it without any `models/` prefix.
pub fn model_id(model: &str) -> Result<&str, ClientError> {
    let trimmed = model.trim();
    let id = trimmed.strip_prefix(MODEL_PREFIX).unwrap_or(trimmed);
    if id.is_empty() {
        return Err(ClientError::invalid_argument("model", "cannot be empty"));
    }
    Ok(id)
}

/// Build a text or multi-turn generate request.
pub fn build_generate_request(
    input: PromptInput,
    options: &GenerateOptions,
) -> Result<GenerateRequest, ClientError> {
    Ok(GenerateRequest {
        contents: input.into_contents()?,
        generation_config: options.generation_config.clone(),
        safety_settings: options.safety_settings.clone(),
    })
}

/// Build a generate request whose single content is the message followed by
/// the image.
pub fn build_image_request(
    message: &str,
    image: ImageSource,
    mime_type: &ImageMimeType,
    options: &GenerateOptions,
) -> Result<GenerateRequest, ClientError> {
    require_text("message", message)?;
    let data = image.into_base64()?;
    let mime = mime_type.as_mime()?;

    let content = Content::new(vec![Part::text(message), Part::inline_data(mime, data)]);
    Ok(GenerateRequest {
        contents: NonEmpty::new(content),
        generation_config: options.generation_config.clone(),
        safety_settings: options.safety_settings.clone(),
    })
}

/// Build an embed request. The model is sent in its `models/{id}` form.
pub fn build_embed_request(model: &str, input: PromptInput) -> Result<EmbedRequest, ClientError> {
    let id = model_id(model)?;
    Ok(EmbedRequest {
        model: format!("{MODEL_PREFIX}{id}"),
        content: input.into_content()?,
    })
}

fn merged_content(texts: Vec<String>) -> Result<Content, ClientError> {
    if texts.is_empty() {
        return Err(ClientError::invalid_argument("messages", "cannot be empty"));
    }
    Ok(Content::new(texts.into_iter().map(Part::text).collect()))
}

fn require_text(param: &'static str, value: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        return Err(ClientError::invalid_argument(param, "cannot be empty"));
    }
    Ok(())
}

fn require_media(turn: &Content) -> Result<(), ClientError> {
    let empty_media = turn.parts.iter().any(|part| match part {
        Part::InlineData { inline_data } => inline_data.data.is_empty(),
        _ => false,
    });
    if empty_media {
        return Err(ClientError::invalid_argument(
            "messages",
            "inline data cannot be empty",
        ));
    }
    Ok(())
}
