//! Recording transport double shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use serde_json::Value;

use gemstream::http::{ChunkStream, Transport};
use gemstream::options::GeminiConfig;
use gemstream::providers::GeminiClient;
use gemstream::TransportError;

pub const BASE_URL: &str = "https://example.test/v1beta/models";
pub const API_KEY: &str = "test-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    PostStream,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

/// Transport that replays queued answers and records every call.
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<Result<Bytes, TransportError>>>>,
    streams: Arc<Mutex<VecDeque<ChunkStream>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue_json(&self, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(Bytes::from(body.to_string())));
    }

    pub fn enqueue_error(&self, error: TransportError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Queue a streaming body delivered as the given chunks.
    pub fn enqueue_chunks(&self, chunks: &[&str]) {
        let chunks: Vec<Result<Bytes, TransportError>> = chunks
            .iter()
            .map(|chunk| Ok(Bytes::from(chunk.to_string())))
            .collect();
        self.enqueue_stream(Box::pin(stream::iter(chunks)));
    }

    pub fn enqueue_stream(&self, chunks: ChunkStream) {
        self.streams.lock().unwrap().push_back(chunks);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> RecordedCall {
        self.calls
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no transport call was recorded")
    }

    fn record(&self, method: Method, url: &str, body: Option<&Value>) {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            url: url.to_string(),
            body: body.cloned(),
        });
    }

    fn next_response(&self) -> Result<Bytes, TransportError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no response queued")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<Bytes, TransportError> {
        self.record(Method::Get, url, None);
        self.next_response()
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Bytes, TransportError> {
        self.record(Method::Post, url, Some(body));
        self.next_response()
    }

    async fn post_stream(&self, url: &str, body: &Value) -> Result<ChunkStream, TransportError> {
        self.record(Method::PostStream, url, Some(body));
        let chunks = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .expect("no stream queued");
        Ok(chunks)
    }
}

pub fn client() -> (GeminiClient<MockTransport>, MockTransport) {
    let transport = MockTransport::new();
    let config = GeminiConfig::new(API_KEY).with_base_url(BASE_URL);
    (GeminiClient::new(config, transport.clone()), transport)
}

/// One streamed `generateContent` value carrying `text`.
pub fn text_chunk(text: &str) -> Value {
    serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]}
        }]
    })
}
