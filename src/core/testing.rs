//! A scripted [`LanguageModel`] for exercising sessions without a network.
//!
//! Each call to [`LanguageModel::stream`] consumes the next queued script.
//! When the queue is empty the model answers with an empty, well-terminated
//! stream.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;

use crate::core::language_model::{ChunkStream, LanguageModel, LanguageModelRequest, StreamEvent};
use crate::error::GenerationError;

/// One step of a scripted stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedEvent {
    /// Yields a text chunk.
    Chunk(String),
    /// Yields the end-of-stream signal.
    End,
    /// Yields a transport error.
    Fail(String),
    /// Never yields again.
    Stall,
}

impl ScriptedEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        ScriptedEvent::Chunk(text.into())
    }
}

#[derive(Debug)]
enum Script {
    Events(Vec<ScriptedEvent>),
    OpenFailure(String),
    OpenStall,
}

/// A deterministic model that replays queued scripts and records requests.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<LanguageModelRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response streaming `chunks` followed by the end-of-stream
    /// signal.
    pub fn with_chunks<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut events: Vec<ScriptedEvent> = chunks.into_iter().map(ScriptedEvent::chunk).collect();
        events.push(ScriptedEvent::End);
        self.with_events(events)
    }

    /// Queues a response replaying `events` verbatim.
    pub fn with_events(self, events: Vec<ScriptedEvent>) -> Self {
        self.push(Script::Events(events));
        self
    }

    /// Queues a call that fails before any chunk is produced.
    pub fn with_open_failure(self, message: impl Into<String>) -> Self {
        self.push(Script::OpenFailure(message.into()));
        self
    }

    /// Queues a call that never finishes opening its stream.
    pub fn with_open_stall(self) -> Self {
        self.push(Script::OpenStall);
        self
    }

    /// The requests received so far, in call order.
    pub fn requests(&self) -> Vec<LanguageModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, script: Script) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(script);
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: LanguageModelRequest) -> Result<ChunkStream, GenerationError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Script::Events(vec![ScriptedEvent::End]));

        let events = match script {
            Script::OpenFailure(message) => return Err(GenerationError::transport(message)),
            Script::OpenStall => return futures::future::pending().await,
            Script::Events(events) => events,
        };

        let stream = futures::stream::iter(events).then(|event| async move {
            match event {
                ScriptedEvent::Chunk(text) => Ok(StreamEvent::Delta(text)),
                ScriptedEvent::End => Ok(StreamEvent::End {
                    finish_reason: Some("STOP".to_string()),
                }),
                ScriptedEvent::Fail(message) => Err(GenerationError::transport(message)),
                ScriptedEvent::Stall => futures::future::pending().await,
            }
        });

        Ok(Box::pin(stream))
    }
}
