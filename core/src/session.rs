use tracing::debug;
use tracing::warn;

use crate::citations::Citation;
use crate::reconstruct::StreamReconstructor;
use crate::render::IncrementalRenderer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Streaming,
    Completed,
    Failed(String),
}

/// One query/response exchange: raw fragments in, display-ready text out.
///
/// The session is fed by the transport (`on_fragment`, then exactly one of
/// `on_complete` or `on_error`) and returns the text to write to the terminal
/// from each call. After the terminal event the cleaned answer is available
/// through [`StreamSession::finalized_plain_text`], including after a failure.
pub struct StreamSession {
    reconstructor: StreamReconstructor,
    renderer: IncrementalRenderer,
    state: SessionState,
    citations: Vec<Citation>,
}

impl StreamSession {
    pub fn new(renderer: IncrementalRenderer) -> Self {
        Self {
            reconstructor: StreamReconstructor::new(),
            renderer,
            state: SessionState::Streaming,
            citations: Vec::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn on_fragment(&mut self, fragment: &str) -> String {
        if self.state != SessionState::Streaming {
            warn!("fragment received after the stream ended; ignoring");
            return String::new();
        }
        let delta = self.reconstructor.append(fragment);
        if delta.is_empty() {
            return String::new();
        }
        self.renderer.consume(&delta)
    }

    /// Terminal success. Returns any output that was still held back.
    pub fn on_complete(&mut self, citations: Vec<Citation>) -> String {
        if self.state != SessionState::Streaming {
            warn!("completion received after the stream ended; ignoring");
            return String::new();
        }
        debug!(citations = citations.len(), "stream completed");
        self.citations = citations;
        self.state = SessionState::Completed;
        self.flush()
    }

    /// Terminal failure. Whatever arrived before the failure stays available.
    pub fn on_error(&mut self, cause: impl Into<String>) -> String {
        if self.state != SessionState::Streaming {
            return String::new();
        }
        let cause = cause.into();
        debug!(%cause, "stream failed");
        self.state = SessionState::Failed(cause);
        self.flush()
    }

    /// The cleaned answer; `None` until the stream has ended.
    pub fn finalized_plain_text(&self) -> Option<String> {
        match self.state {
            SessionState::Streaming => None,
            SessionState::Completed | SessionState::Failed(_) => {
                Some(self.reconstructor.finalize())
            }
        }
    }

    /// Citations delivered with the completion event; `None` unless the
    /// stream completed successfully.
    pub fn citations(&self) -> Option<&[Citation]> {
        match self.state {
            SessionState::Completed => Some(&self.citations),
            SessionState::Streaming | SessionState::Failed(_) => None,
        }
    }

    /// Prepare for a new exchange on the same instance.
    pub fn reset(&mut self) {
        self.reconstructor.reset();
        self.renderer.reset();
        self.state = SessionState::Streaming;
        self.citations.clear();
    }

    fn flush(&mut self) -> String {
        let rest = self.reconstructor.drain();
        let mut out = self.renderer.consume(&rest);
        out.push_str(&self.renderer.flush());
        out
    }
}
