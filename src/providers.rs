//! API clients.

pub mod gemini;

pub use gemini::GeminiClient;
