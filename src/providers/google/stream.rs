//! Turns Gemini's SSE byte stream into a [`ChunkStream`].

use std::fmt::Display;

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt, stream};

use crate::core::language_model::{ChunkStream, StreamEvent};
use crate::error::GenerationError;
use crate::providers::google::GoogleStreamResponse;

pub(crate) fn chunk_stream<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let events = bytes.eventsource().flat_map(|event| {
        let events: Vec<Result<StreamEvent, GenerationError>> = match event {
            Ok(event) => decode(&event.data),
            Err(err) => vec![Err(GenerationError::transport(format!(
                "event stream error: {err}"
            )))],
        };
        stream::iter(events)
    });

    Box::pin(events)
}

fn decode(data: &str) -> Vec<Result<StreamEvent, GenerationError>> {
    if data.trim().is_empty() {
        return Vec::new();
    }
    log::trace!("sse data: {data}");

    match serde_json::from_str::<GoogleStreamResponse>(data) {
        Ok(payload) => match payload.into_events() {
            Ok(events) => events.into_iter().map(Ok).collect(),
            Err(err) => vec![Err(err)],
        },
        Err(err) => vec![Err(GenerationError::transport(format!(
            "undecodable stream payload: {err}"
        )))],
    }
}
