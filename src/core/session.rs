//! Drives one streaming generation exchange at a time against a language model.
//!
//! A [`StreamingSession`] owns a model and the [`GenerationConfiguration`] it
//! was configured with. Each `generate*` call appends the prompt to the
//! caller's [`ConversationHistory`], streams the answer, concatenates its
//! chunks in arrival order and, only if the stream ends cleanly, appends the
//! answer as an assistant turn. A failed call leaves the history exactly as it
//! found it.
//!
//! The `generate_and_clean*` variants clean the answer against the schema of
//! the configuration that generated it. The session cannot be reconfigured
//! while such a call is in flight.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::{Instant, error::Elapsed, timeout_at};

use crate::core::cleaner::{CleanedResult, clean};
use crate::core::configuration::GenerationConfiguration;
use crate::core::history::{ConversationHistory, Turn};
use crate::core::language_model::{LanguageModel, LanguageModelRequest, StreamEvent};
use crate::error::GenerationError;

/// A conversational generation session bound to one model.
#[derive(Debug)]
pub struct StreamingSession<M: LanguageModel> {
    model: M,
    configuration: GenerationConfiguration,
}

impl<M: LanguageModel> StreamingSession<M> {
    pub fn new(model: M, configuration: GenerationConfiguration) -> Self {
        Self {
            model,
            configuration,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn configuration(&self) -> &GenerationConfiguration {
        &self.configuration
    }

    /// Replaces the active configuration. Later calls use the new one.
    pub fn reconfigure(&mut self, configuration: GenerationConfiguration) {
        self.configuration = configuration;
    }

    /// Generates an answer to `prompt` in the context of `history`.
    ///
    /// On success `history` has grown by exactly two turns: the prompt and the
    /// accumulated answer (which may be empty).
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] of kind `Transport` if the stream cannot
    /// be opened, fails mid-way, closes without an end-of-stream signal or
    /// yields anything after it. `history` is left unchanged.
    pub async fn generate(
        &self,
        history: &mut ConversationHistory,
        prompt: impl Into<String>,
    ) -> Result<String, GenerationError> {
        self.run(history, prompt.into(), None, |_| {}).await
    }

    /// Like [`generate`](Self::generate), handing every chunk to `on_chunk` as
    /// it arrives.
    pub async fn generate_with_callback<F>(
        &self,
        history: &mut ConversationHistory,
        prompt: impl Into<String>,
        on_chunk: F,
    ) -> Result<String, GenerationError>
    where
        F: FnMut(&str) + Send,
    {
        self.run(history, prompt.into(), None, on_chunk).await
    }

    /// Like [`generate`](Self::generate), bounded by `deadline` over the whole
    /// exchange.
    ///
    /// # Errors
    ///
    /// Besides the errors of `generate`, returns a [`GenerationError`] of kind
    /// `Timeout` carrying the partial text when the deadline elapses.
    pub async fn generate_with_deadline(
        &self,
        history: &mut ConversationHistory,
        prompt: impl Into<String>,
        deadline: Duration,
    ) -> Result<String, GenerationError> {
        // A deadline too far out to represent is no deadline.
        let deadline = Instant::now().checked_add(deadline);
        self.run(history, prompt.into(), deadline, |_| {}).await
    }

    /// Generates an answer and cleans it against the schema of the
    /// configuration it was generated with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`](crate::Error::Generation) as
    /// [`generate`](Self::generate) does, with `history` unchanged, and
    /// [`Error::Clean`](crate::Error::Clean) if the answer does not satisfy the
    /// schema. In the latter case the answer stays in `history`.
    pub async fn generate_and_clean(
        &self,
        history: &mut ConversationHistory,
        prompt: impl Into<String>,
    ) -> crate::Result<CleanedResult> {
        self.generate_and_clean_with_callback(history, prompt, |_| {})
            .await
    }

    /// Like [`generate_and_clean`](Self::generate_and_clean), handing every
    /// chunk to `on_chunk` as it arrives.
    pub async fn generate_and_clean_with_callback<F>(
        &self,
        history: &mut ConversationHistory,
        prompt: impl Into<String>,
        on_chunk: F,
    ) -> crate::Result<CleanedResult>
    where
        F: FnMut(&str) + Send,
    {
        let text = self.run(history, prompt.into(), None, on_chunk).await?;
        Ok(clean(&text, self.configuration.schema())?)
    }

    async fn run<F>(
        &self,
        history: &mut ConversationHistory,
        prompt: String,
        deadline: Option<Instant>,
        mut on_chunk: F,
    ) -> Result<String, GenerationError>
    where
        F: FnMut(&str) + Send,
    {
        let checkpoint = history.len();
        history.append(Turn::user(prompt));
        let request = LanguageModelRequest::new(&self.configuration, history.as_context());

        match self.exchange(request, deadline, &mut on_chunk).await {
            Ok(text) => {
                history.append(Turn::assistant(text.clone()));
                Ok(text)
            }
            Err(err) => {
                log::warn!(
                    "generation with {} aborted after {} bytes: {}",
                    self.configuration.model(),
                    err.partial_text.len(),
                    err
                );
                history.rollback(checkpoint);
                Err(err)
            }
        }
    }

    async fn exchange<F>(
        &self,
        request: LanguageModelRequest,
        deadline: Option<Instant>,
        on_chunk: &mut F,
    ) -> Result<String, GenerationError>
    where
        F: FnMut(&str) + Send,
    {
        log::debug!(
            "opening stream: provider={}, model={}, turns={}, structured={}",
            self.model.provider_name(),
            request.model,
            request.contents.len(),
            request.output_constraint.is_some()
        );

        let mut stream = within(deadline, self.model.stream(request))
            .await
            .map_err(|_| GenerationError::timeout("deadline elapsed before the stream opened"))??;

        let mut accumulated = String::new();
        let mut chunks = 0usize;
        let mut finish_reason: Option<Option<String>> = None;

        loop {
            let next = match within(deadline, stream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    return Err(GenerationError::timeout("deadline elapsed mid-stream")
                        .with_partial_text(accumulated));
                }
            };

            match next {
                Some(Ok(StreamEvent::Delta(text))) => {
                    if finish_reason.is_some() {
                        return Err(GenerationError::transport(
                            "received a chunk after the end-of-stream signal",
                        )
                        .with_partial_text(accumulated));
                    }
                    log::trace!("chunk {}: {} bytes", chunks, text.len());
                    on_chunk(&text);
                    accumulated.push_str(&text);
                    chunks += 1;
                }
                Some(Ok(StreamEvent::End { finish_reason: reason })) => {
                    if finish_reason.is_some() {
                        return Err(GenerationError::transport(
                            "received a second end-of-stream signal",
                        )
                        .with_partial_text(accumulated));
                    }
                    finish_reason = Some(reason);
                }
                Some(Err(err)) => return Err(err.with_partial_text(accumulated)),
                None => break,
            }
        }

        let Some(finish_reason) = finish_reason else {
            return Err(GenerationError::transport(
                "stream closed before the end-of-stream signal",
            )
            .with_partial_text(accumulated));
        };

        log::debug!(
            "stream finished: chunks={}, bytes={}, finish_reason={:?}",
            chunks,
            accumulated.len(),
            finish_reason
        );
        Ok(accumulated)
    }
}

async fn within<F: Future>(deadline: Option<Instant>, future: F) -> Result<F::Output, Elapsed> {
    match deadline {
        Some(deadline) => timeout_at(deadline, future).await,
        None => Ok(future.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::configuration::configure;
    use crate::core::schema::SchemaDescriptor;
    use crate::core::testing::{ScriptedEvent, ScriptedModel};
    use crate::error::{CleanError, GenerationErrorKind};

    #[tokio::test]
    async fn test_generate_concatenates_chunks_in_order() {
        let model = ScriptedModel::new().with_chunks(["Hel", "lo, ", "world"]);
        let session = StreamingSession::new(model, configure(None, None).unwrap());
        let mut history = ConversationHistory::new();

        let text = session.generate(&mut history, "greet me").await.unwrap();

        assert_eq!(text, "Hello, world");
        assert_eq!(
            history.as_context(),
            vec![Turn::user("greet me"), Turn::assistant("Hello, world")]
        );
    }

    #[tokio::test]
    async fn test_request_carries_configuration_and_context() {
        let model = ScriptedModel::new().with_chunks(["ok"]);
        let configuration = GenerationConfiguration::builder()
            .model("gemini-1.5-pro")
            .system_instruction("Be brief.")
            .build()
            .unwrap();
        let session = StreamingSession::new(model, configuration);
        let mut history = ConversationHistory::builder()
            .user("earlier")
            .assistant("answer")
            .build();

        session.generate(&mut history, "now").await.unwrap();

        let requests = session.model().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gemini-1.5-pro");
        assert_eq!(requests[0].system_instruction.as_deref(), Some("Be brief."));
        assert_eq!(
            requests[0].contents,
            vec![
                Turn::user("earlier"),
                Turn::assistant("answer"),
                Turn::user("now")
            ]
        );
    }

    #[tokio::test]
    async fn test_callback_sees_every_chunk() {
        let model = ScriptedModel::new().with_chunks(["a", "b", "c"]);
        let session = StreamingSession::new(model, GenerationConfiguration::default());
        let mut history = ConversationHistory::new();
        let mut seen = Vec::new();

        session
            .generate_with_callback(&mut history, "letters", |chunk| seen.push(chunk.to_string()))
            .await
            .unwrap();

        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_stall_past_deadline_is_a_timeout() {
        let model = ScriptedModel::new().with_events(vec![
            ScriptedEvent::chunk("partial"),
            ScriptedEvent::Stall,
        ]);
        let session = StreamingSession::new(model, GenerationConfiguration::default());
        let mut history = ConversationHistory::new();

        let err = session
            .generate_with_deadline(&mut history, "slow", Duration::from_millis(50))
            .await
            .unwrap_err();

        assert_eq!(err.kind, GenerationErrorKind::Timeout);
        assert_eq!(err.partial_text, "partial");
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_generation_time_configuration_decides_the_shape() {
        let model = ScriptedModel::new()
            .with_chunks(["plain prose answer"])
            .with_chunks(["plain prose answer"]);
        let mut session = StreamingSession::new(model, GenerationConfiguration::default());
        let mut history = ConversationHistory::new();

        let result = session
            .generate_and_clean(&mut history, "first")
            .await
            .unwrap();
        session.reconfigure(configure(None, Some(SchemaDescriptor::object([]))).unwrap());

        assert_eq!(
            result,
            CleanedResult::RawText("plain prose answer".to_string())
        );

        let err = session
            .generate_and_clean(&mut history, "second")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Clean(CleanError::MalformedOutput { .. })
        ));
        assert_eq!(history.len(), 4);
        assert!(session.model().requests()[1].output_constraint.is_some());
    }

    #[tokio::test]
    async fn test_unrepresentable_deadline_means_no_deadline() {
        let model = ScriptedModel::new().with_chunks(["in ", "time"]);
        let session = StreamingSession::new(model, GenerationConfiguration::default());
        let mut history = ConversationHistory::new();

        let text = session
            .generate_with_deadline(&mut history, "no rush", Duration::MAX)
            .await
            .unwrap();

        assert_eq!(text, "in time");
        assert_eq!(history.len(), 2);
    }
}
