use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::Stream;
use futures::StreamExt;
use futures::TryStreamExt;
use reqwest::header::ACCEPT;
use reqwest::header::RETRY_AFTER;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;
use tracing::trace;

use crate::citations::Citation;
use crate::citations::LatestCitations;
use crate::error::PpErr;
use crate::error::Result;
use crate::error::TransportOutcome;
use crate::flags::PP_API_BASE;
use crate::flags::PP_REQUEST_TIMEOUT_MS;
use crate::flags::PP_STREAM_IDLE_TIMEOUT_MS;
use crate::session::StreamSession;
use crate::think::strip_think_tags;
use crate::wire::ChatRequest;
use crate::wire::Message;
use crate::wire::StreamChunk;
use crate::wire::parse_completion_body;
use crate::wire::parse_event_data;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    Fragment(String),
    Completed { citations: Vec<Citation> },
}

/// Events of one streamed response, fed by a background task.
pub struct ResponseStream {
    rx_event: mpsc::Receiver<Result<ResponseEvent>>,
}

impl Stream for ResponseStream {
    type Item = Result<ResponseEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx_event.poll_recv(cx)
    }
}

impl ResponseStream {
    /// Drive `session` with every event of this stream, handing each piece of
    /// display output to `emit`. On failure the session still ends up in its
    /// terminal state, so the partial answer can be recovered from it.
    pub async fn pump_into<F>(mut self, session: &mut StreamSession, mut emit: F) -> Result<()>
    where
        F: FnMut(&str) -> std::io::Result<()>,
    {
        let mut write = |text: String| -> Result<()> {
            if !text.is_empty() {
                emit(&text)?;
            }
            Ok(())
        };

        while let Some(event) = self.next().await {
            match event {
                Ok(ResponseEvent::Fragment(text)) => write(session.on_fragment(&text))?,
                Ok(ResponseEvent::Completed { citations }) => {
                    return write(session.on_complete(citations));
                }
                Err(err) => {
                    write(session.on_error(err.to_string()))?;
                    return Err(err);
                }
            }
        }

        let cause = "stream closed before completion";
        write(session.on_error(cause))?;
        Err(PpErr::Stream(cause.to_string()))
    }
}

/// Result of a non-streaming query. `content` is the raw answer, reasoning
/// regions included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub content: String,
    pub citations: Vec<Citation>,
}

impl QueryResult {
    /// The answer with reasoning regions removed.
    pub fn answer(&self) -> String {
        strip_think_tags(&self.content).trim().to_string()
    }
}

/// Client for the Perplexity chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct PerplexityClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    idle_timeout: Duration,
}

impl PerplexityClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(*PP_API_BASE, api_key, model)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            idle_timeout: *PP_STREAM_IDLE_TIMEOUT_MS,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Start a streamed completion for `messages`. Failures before the first
    /// byte are returned here; later ones arrive through the stream.
    pub async fn stream_chat(&self, messages: &[Message]) -> Result<ResponseStream> {
        let url = self.endpoint();
        let payload = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };
        debug!(%url, model = %self.model, "POST (chat, streaming)");
        trace!("request payload: {}", serde_json::to_string(&payload)?);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "text/event-stream")
            .json(&payload)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let (tx_event, rx_event) = mpsc::channel::<Result<ResponseEvent>>(16);
        let stream = resp.bytes_stream().map_err(PpErr::Reqwest);
        tokio::spawn(process_chat_sse(stream, tx_event, self.idle_timeout));
        Ok(ResponseStream { rx_event })
    }

    /// Single-shot completion of one user prompt.
    pub async fn query(&self, prompt: &str) -> Result<QueryResult> {
        self.query_messages(&[Message::user(prompt)]).await
    }

    pub async fn query_messages(&self, messages: &[Message]) -> Result<QueryResult> {
        let url = self.endpoint();
        let payload = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };
        debug!(%url, model = %self.model, "POST (chat)");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(*PP_REQUEST_TIMEOUT_MS)
            .json(&payload)
            .send()
            .await?;
        let body = check_status(resp).await?.text().await?;
        let parsed = parse_completion_body(&body)?;
        Ok(QueryResult {
            content: parsed.content,
            citations: parsed.citations,
        })
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let retry_after_seconds = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok());
    let outcome = TransportOutcome::classify(status, retry_after_seconds);
    let body = resp.text().await.unwrap_or_default();
    debug!(%status, ?outcome, "request rejected");
    Err(PpErr::Transport {
        outcome,
        status,
        body,
    })
}

/// Decode the chat-completions event stream and forward content fragments.
/// Citations ride along on the events; the last non-empty list is delivered
/// with the completion.
async fn process_chat_sse<S>(
    stream: S,
    tx_event: mpsc::Sender<Result<ResponseEvent>>,
    idle_timeout: Duration,
) where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let mut stream = stream.eventsource();
    let mut citations = LatestCitations::default();

    loop {
        let sse = match timeout(idle_timeout, stream.next()).await {
            Ok(Some(Ok(ev))) => ev,
            Ok(Some(Err(e))) => {
                let _ = tx_event.send(Err(PpErr::Stream(e.to_string()))).await;
                return;
            }
            Ok(None) => {
                // Closed without the sentinel; treat it as a normal end.
                let _ = tx_event
                    .send(Ok(ResponseEvent::Completed {
                        citations: citations.into_inner(),
                    }))
                    .await;
                return;
            }
            Err(_) => {
                let _ = tx_event
                    .send(Err(PpErr::Stream("idle timeout waiting for SSE".into())))
                    .await;
                return;
            }
        };

        match parse_event_data(&sse.data) {
            Some(StreamChunk::Done) => {
                let _ = tx_event
                    .send(Ok(ResponseEvent::Completed {
                        citations: citations.into_inner(),
                    }))
                    .await;
                return;
            }
            Some(StreamChunk::Delta {
                content,
                citations: payload,
            }) => {
                citations.observe(payload);
                if let Some(content) = content.filter(|c| !c.is_empty())
                    && tx_event
                        .send(Ok(ResponseEvent::Fragment(content)))
                        .await
                        .is_err()
                {
                    // Receiver dropped: the caller cancelled.
                    return;
                }
            }
            None => {
                debug!("skipping malformed event: {}", sse.data);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::render::IncrementalRenderer;
    use futures::stream;
    use pretty_assertions::assert_eq;

    fn sse_body(lines: &[&str]) -> Vec<Result<Bytes>> {
        lines
            .iter()
            .map(|l| Ok(Bytes::from(l.to_string())))
            .collect()
    }

    async fn collect(chunks: Vec<Result<Bytes>>) -> Vec<Result<ResponseEvent>> {
        let (tx, mut rx) = mpsc::channel(16);
        process_chat_sse(stream::iter(chunks), tx, Duration::from_secs(5)).await;
        let mut out = Vec::new();
        while let Some(ev) = rx.recv().await {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn frames_split_mid_line_are_reassembled() {
        let events = collect(sse_body(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel",
            "lo\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
            "data: [DONE]\n\n",
        ]))
        .await;
        let events: Vec<ResponseEvent> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                ResponseEvent::Fragment("Hello".to_string()),
                ResponseEvent::Fragment(" there".to_string()),
                ResponseEvent::Completed {
                    citations: Vec::new()
                },
            ]
        );
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let events = collect(sse_body(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: {this is not json\n\n",
            "garbage without a field separator\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        ]))
        .await;
        let events: Vec<ResponseEvent> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(
            events,
            vec![
                ResponseEvent::Fragment("a".to_string()),
                ResponseEvent::Fragment("b".to_string()),
                ResponseEvent::Completed {
                    citations: Vec::new()
                },
            ]
        );
    }

    #[tokio::test]
    async fn last_citation_payload_is_delivered() {
        let events = collect(sse_body(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}],\"citations\":[\"https://early\"]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"y\"}}],\"citations\":[\"https://one\",\"https://two\"]}\n\n",
            "data: {\"choices\":[{\"delta\":{}}]}\n\n",
            "data: [DONE]\n\n",
        ]))
        .await;
        let last = events.into_iter().last().unwrap().unwrap();
        assert_eq!(
            last,
            ResponseEvent::Completed {
                citations: vec![
                    Citation::new("https://one", "https://one"),
                    Citation::new("https://two", "https://two"),
                ]
            }
        );
    }

    #[tokio::test]
    async fn transport_error_mid_stream_surfaces_after_partial_content() {
        let mut chunks = sse_body(&["data: {\"choices\":[{\"delta\":{\"content\":\"part\"}}]}\n\n"]);
        chunks.push(Err(PpErr::Stream("connection reset".to_string())));
        let (tx, rx) = mpsc::channel(16);
        process_chat_sse(stream::iter(chunks), tx, Duration::from_secs(5)).await;

        let mut session = StreamSession::new(IncrementalRenderer::plain());
        let mut shown = String::new();
        let result = ResponseStream { rx_event: rx }
            .pump_into(&mut session, |s| {
                shown.push_str(s);
                Ok(())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(shown, "part");
        assert_eq!(session.finalized_plain_text().as_deref(), Some("part"));
    }

    #[tokio::test]
    async fn idle_timeout_ends_the_stream_with_an_error() {
        let (tx, mut rx) = mpsc::channel(16);
        process_chat_sse(stream::pending::<Result<Bytes>>(), tx, Duration::from_millis(20)).await;
        let ev = rx.recv().await.unwrap();
        assert!(matches!(ev, Err(PpErr::Stream(msg)) if msg.contains("idle timeout")));
    }
}
