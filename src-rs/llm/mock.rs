use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::types::{ChunkStream, CompletionRequest, LlmProvider, ProviderError, StreamChunk, ToolCall};

/// Provider that replays scripted rounds in order and records every request.
pub struct MockProvider {
    rounds: Mutex<VecDeque<Vec<StreamChunk>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    chunk_delay: Option<Duration>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            rounds: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            chunk_delay: None,
        }
    }

    /// Pauses before each chunk, so callers can cancel mid-stream.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn push_round(&self, chunks: Vec<StreamChunk>) {
        locked(&self.rounds).push_back(chunks);
    }

    pub fn push_text(&self, text: &str) {
        self.push_round(vec![
            StreamChunk::Text {
                content: text.to_string(),
            },
            StreamChunk::Done,
        ]);
    }

    pub fn push_tool_calls(&self, calls: Vec<ToolCall>) {
        self.push_round(vec![StreamChunk::ToolCalls { calls }, StreamChunk::Done]);
    }

    pub fn push_error(&self, message: &str) {
        self.push_round(vec![StreamChunk::Error {
            content: message.to_string(),
        }]);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        locked(&self.requests).clone()
    }

    pub fn remaining_rounds(&self) -> usize {
        locked(&self.rounds).len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream_with_tools(&self, request: CompletionRequest) -> Result<ChunkStream, ProviderError> {
        locked(&self.requests).push(request);
        let chunks = locked(&self.rounds)
            .pop_front()
            .ok_or_else(|| ProviderError::new("mock_exhausted", "no scripted rounds left", false))?;

        match self.chunk_delay {
            Some(delay) => Ok(stream::iter(chunks)
                .then(move |chunk| async move {
                    tokio::time::sleep(delay).await;
                    chunk
                })
                .boxed()),
            None => Ok(stream::iter(chunks).boxed()),
        }
    }
}
