//! # gemstream - Gemini client with incremental stream decoding
//!
//! A small async client for Google's Gemini generative-language API.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Request builder with input validation before any network traffic
//! - Streaming in both wire formats: a progressively written JSON array
//!   (default) and Server-Sent Events (`alt=sse`)
//! - Values are decoded as soon as they are complete, independent of how the
//!   response is split into chunks
//! - Pluggable [`Transport`](http::Transport) so the client can run against a
//!   test double
//!
//! ## Modules
//!
//! - [`model`]: content, configuration and response types
//! - [`request`]: prompt inputs and request body construction
//! - [`stream`] / [`sse`]: chunked stream decoders
//! - [`http`]: transport trait and the reqwest implementation
//! - [`providers`]: the [`GeminiClient`] operation façade
//!
//! ## Example
//! ```no_run
//! use gemstream::options::{GeminiConfig, GenerateOptions, TransportOptions};
//! use gemstream::providers::GeminiClient;
//! use gemstream::stream::FramingMode;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GeminiConfig::new("your-api-key");
//!     let client = GeminiClient::from_config(config, &TransportOptions::default())?;
//!
//!     let delivered = client
//!         .stream_prompt(
//!             "gemini-pro",
//!             "Tell me a story",
//!             &GenerateOptions::default(),
//!             FramingMode::Sse,
//!             |event| println!("{}", event.raw()),
//!         )
//!         .await?;
//!     println!("{delivered} values");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod request;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{ClientError, DecodeError, TransportError};
pub use model::{Content, GenerateContentResponse, Part, Role};
pub use providers::GeminiClient;
pub use request::PromptInput;
pub use stream::{FramingMode, StreamEvent};
