//! Google Gemini operation client.
//!
//! Every operation follows the same path: validate and build the request body,
//! compose `{base}/{model}:{action}?key=...`, hand it to the [`Transport`] and
//! decode the answer. Invalid input is rejected before the transport is
//! touched.
//! See: <https://ai.google.dev/api/rest>

use bytes::Bytes;
use futures::StreamExt;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::client::{ClientError, DecodeError};
use crate::http::{HttpTransport, Transport};
use crate::model::{
    BatchEmbeddingResponse, CountTokensResponse, EmbeddingResponse, GenerateContentResponse,
    ImageMimeType, ModelInfo, ModelList,
};
use crate::options::{GeminiConfig, GenerateOptions, TransportOptions};
use crate::request::{
    build_embed_request, build_generate_request, build_image_request, model_id, ImageSource,
    PromptInput,
};
use crate::stream::{decode_stream, EventStream, FramingMode, StreamEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Generate,
    CountTokens,
    StreamGenerate,
    Embed,
    BatchEmbed,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::Generate => "generateContent",
            Action::CountTokens => "countTokens",
            Action::StreamGenerate => "streamGenerateContent",
            Action::Embed => "embedContent",
            Action::BatchEmbed => "batchEmbedContent",
        }
    }
}

/// Client for the Gemini generative-language API.
///
/// Holds only immutable configuration and a transport, so one instance can
/// serve concurrent calls through `&self`.
///
/// # Example
/// ```no_run
/// use gemstream::options::{GeminiConfig, GenerateOptions, TransportOptions};
/// use gemstream::providers::GeminiClient;
///
/// # async fn run() -> Result<(), gemstream::ClientError> {
/// let client = GeminiClient::from_config(GeminiConfig::from_env()?, &TransportOptions::default())?;
/// let response = client
///     .prompt("gemini-pro", "Write a haiku about rust", &GenerateOptions::default())
///     .await?;
/// println!("{}", response.text().unwrap_or_default());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GeminiClient<T: Transport = HttpTransport> {
    config: GeminiConfig,
    transport: T,
}

impl GeminiClient<HttpTransport> {
    /// Create a client backed by reqwest.
    pub fn from_config(
        config: GeminiConfig,
        transport_options: &TransportOptions,
    ) -> Result<Self, ClientError> {
        Ok(Self::new(config, HttpTransport::new(transport_options)?))
    }
}

impl<T: Transport> GeminiClient<T> {
    pub fn new(config: GeminiConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Generate a complete response for a prompt.
    pub async fn prompt(
        &self,
        model: &str,
        input: impl Into<PromptInput>,
        options: &GenerateOptions,
    ) -> Result<GenerateContentResponse, ClientError> {
        let id = model_id(model)?;
        let body = build_generate_request(input.into(), options)?;
        self.post_json(id, Action::Generate, &body).await
    }

    /// Count the tokens a prompt would use.
    pub async fn count_tokens(
        &self,
        model: &str,
        input: impl Into<PromptInput>,
        options: &GenerateOptions,
    ) -> Result<CountTokensResponse, ClientError> {
        let id = model_id(model)?;
        let body = build_generate_request(input.into(), options)?;
        self.post_json(id, Action::CountTokens, &body).await
    }

    /// Stream a response, calling `on_value` once per decoded value.
    ///
    /// Values are delivered in arrival order, each before the next chunk is
    /// read. On a mid-stream failure the values already delivered stand and
    /// the error is returned. Returns the number of values delivered.
    ///
    /// Dropping the returned future stops reading; `on_value` is not called
    /// again afterwards.
    pub async fn stream_prompt<F>(
        &self,
        model: &str,
        input: impl Into<PromptInput>,
        options: &GenerateOptions,
        framing: FramingMode,
        mut on_value: F,
    ) -> Result<usize, ClientError>
    where
        F: FnMut(StreamEvent),
    {
        let mut events = self
            .stream_prompt_events(model, input, options, framing)
            .await?;

        let mut delivered = 0;
        while let Some(event) = events.next().await {
            on_value(event?);
            delivered += 1;
        }
        debug!(model = model, delivered, "stream finished");
        Ok(delivered)
    }

    /// Stream a response as a [`Stream`](futures::Stream) of decoded values.
    ///
    /// The request is sent before this returns; the body is read as the
    /// stream is polled.
    pub async fn stream_prompt_events(
        &self,
        model: &str,
        input: impl Into<PromptInput>,
        options: &GenerateOptions,
        framing: FramingMode,
    ) -> Result<EventStream, ClientError> {
        let id = model_id(model)?;
        let body = encode(&build_generate_request(input.into(), options)?)?;

        let mut url = self.action_url(id, Action::StreamGenerate)?;
        if framing == FramingMode::Sse {
            url.query_pairs_mut().append_pair("alt", "sse");
        }

        debug!(model = id, action = Action::StreamGenerate.as_str(), framing = ?framing, "dispatching");
        let chunks = self.transport.post_stream(url.as_str(), &body).await?;
        Ok(Box::pin(decode_stream(chunks, framing)))
    }

    /// Generate a response for a text message with one attached image.
    pub async fn image_prompt(
        &self,
        model: &str,
        message: &str,
        image: impl Into<ImageSource>,
        mime_type: impl Into<ImageMimeType>,
        options: &GenerateOptions,
    ) -> Result<GenerateContentResponse, ClientError> {
        let id = model_id(model)?;
        let body = build_image_request(message, image.into(), &mime_type.into(), options)?;
        self.post_json(id, Action::Generate, &body).await
    }

    /// Fetch the description of one model.
    pub async fn get_model(&self, model: &str) -> Result<ModelInfo, ClientError> {
        let id = model_id(model)?;
        let url = self.endpoint(&format!("/{id}"))?;
        debug!(model = id, "fetching model");
        decode(&self.transport.get(url.as_str()).await?)
    }

    /// List the models available to the API key.
    pub async fn list_models(&self) -> Result<ModelList, ClientError> {
        let url = self.endpoint("")?;
        debug!("listing models");
        decode(&self.transport.get(url.as_str()).await?)
    }

    /// Embed the input as a single content.
    pub async fn embed(
        &self,
        model: &str,
        input: impl Into<PromptInput>,
    ) -> Result<EmbeddingResponse, ClientError> {
        let id = model_id(model)?;
        let body = build_embed_request(id, input.into())?;
        self.post_json(id, Action::Embed, &body).await
    }

    /// Embed the input through the batch endpoint.
    pub async fn batch_embed(
        &self,
        model: &str,
        input: impl Into<PromptInput>,
    ) -> Result<BatchEmbeddingResponse, ClientError> {
        let id = model_id(model)?;
        let body = build_embed_request(id, input.into())?;
        self.post_json(id, Action::BatchEmbed, &body).await
    }

    fn action_url(&self, id: &str, action: Action) -> Result<Url, ClientError> {
        self.endpoint(&format!("/{id}:{}", action.as_str()))
    }

    /// `{base}{path}?key=...`, with the key form-encoded.
    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let mut url = Url::parse(&format!("{}{path}", self.config.base_url()))
            .map_err(|e| ClientError::Config(format!("invalid base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("key", self.config.api_key().expose_secret());
        Ok(url)
    }

    async fn post_json<B, R>(&self, id: &str, action: Action, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let body = encode(body)?;
        debug!(model = id, action = action.as_str(), "dispatching");
        let url = self.action_url(id, action)?;
        let bytes = self.transport.post(url.as_str(), &body).await?;
        decode(&bytes)
    }
}

fn encode<B: Serialize>(body: &B) -> Result<Value, ClientError> {
    serde_json::to_value(body).map_err(ClientError::Encode)
}

fn decode<R: DeserializeOwned>(bytes: &Bytes) -> Result<R, ClientError> {
    serde_json::from_slice(bytes).map_err(|source| {
        DecodeError::Json {
            source,
            payload: String::from_utf8_lossy(bytes).into_owned(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_suffixes() {
        assert_eq!(Action::Generate.as_str(), "generateContent");
        assert_eq!(Action::CountTokens.as_str(), "countTokens");
        assert_eq!(Action::StreamGenerate.as_str(), "streamGenerateContent");
        assert_eq!(Action::Embed.as_str(), "embedContent");
        assert_eq!(Action::BatchEmbed.as_str(), "batchEmbedContent");
    }

    #[test]
    fn test_action_url_uses_config() {
        let config = GeminiConfig::new("k").with_base_url("http://localhost:9/v1beta/models/");
        let client = GeminiClient::new(config, HttpTransport::new(&TransportOptions::default()).unwrap());
        assert_eq!(
            client.action_url("gemini-pro", Action::CountTokens).unwrap().as_str(),
            "http://localhost:9/v1beta/models/gemini-pro:countTokens?key=k"
        );
    }

    #[test]
    fn test_api_key_is_encoded_in_query() {
        let config = GeminiConfig::new("a&b#c+d e").with_base_url("http://localhost:9/v1beta/models");
        let client = GeminiClient::new(config, HttpTransport::new(&TransportOptions::default()).unwrap());

        let url = client.action_url("gemini-pro", Action::Generate).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9/v1beta/models/gemini-pro:generateContent?key=a%26b%23c%2Bd+e"
        );
        let key = url.query_pairs().find(|(name, _)| name == "key").map(|(_, v)| v.into_owned());
        assert_eq!(key.as_deref(), Some("a&b#c+d e"));
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let config = GeminiConfig::new("k").with_base_url("not a url");
        let client = GeminiClient::new(config, HttpTransport::new(&TransportOptions::default()).unwrap());
        assert!(matches!(client.endpoint(""), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_decode_failure_keeps_payload() {
        let err = decode::<ModelInfo>(&Bytes::from_static(b"not json")).unwrap_err();
        match err {
            ClientError::Decode(DecodeError::Json { payload, .. }) => assert_eq!(payload, "not json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
