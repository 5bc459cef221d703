//! In-memory transport fake for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::inference::{InferenceTransport, TransportError, TransportResult};

/// One recorded `generate` invocation.
#[derive(Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub image_count: usize,
}

/// Scripted transport: pops pre-loaded responses in order and records every
/// call. Running out of scripted responses yields a connection error.
pub struct FakeTransport {
    responses: Mutex<VecDeque<TransportResult<String>>>,
    calls: Mutex<Vec<RecordedCall>>,
    available: bool,
}

impl FakeTransport {
    pub fn new() -> Self {
        FakeTransport {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            available: true,
        }
    }

    pub fn with_responses(responses: Vec<TransportResult<String>>) -> Self {
        FakeTransport {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            available: true,
        }
    }

    /// A transport whose availability check reports the model as missing.
    pub fn unavailable() -> Self {
        FakeTransport {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            available: false,
        }
    }

    pub fn push_response(&self, response: TransportResult<String>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceTransport for FakeTransport {
    async fn generate(&self, prompt: &str, images: &[String]) -> TransportResult<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            prompt: prompt.to_string(),
            image_count: images.len(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("no scripted response".to_string())))
    }

    async fn check_available(&self) -> TransportResult<bool> {
        Ok(self.available)
    }
}
