//! JSON payloads of the chat-completions API, both the streamed `data:`
//! chunks and the non-streaming response body.

use serde::Deserialize;
use serde::Serialize;

use crate::citations::Citation;

/// Payload that terminates an event stream.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
}

/// One decoded `data:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Delta {
        content: Option<String>,
        citations: Vec<Citation>,
    },
    Done,
}

/// Decode the data of a single event. Returns `None` for payloads that are
/// not valid JSON chunks; callers skip those.
pub fn parse_event_data(data: &str) -> Option<StreamChunk> {
    let data = data.trim();
    if data == DONE_SENTINEL {
        return Some(StreamChunk::Done);
    }
    let chunk: ChatPayload = serde_json::from_str(data).ok()?;
    let citations = chunk.citations();
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content);
    Some(StreamChunk::Delta { content, citations })
}

/// Body of a non-streaming completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionBody {
    pub content: String,
    pub citations: Vec<Citation>,
}

pub(crate) fn parse_completion_body(body: &str) -> serde_json::Result<CompletionBody> {
    let payload: ChatPayload = serde_json::from_str(body)?;
    let citations = payload.citations();
    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default();
    Ok(CompletionBody { content, citations })
}

#[derive(Debug, Deserialize)]
struct ChatPayload {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    citations: Vec<RawCitation>,
    #[serde(default)]
    search_results: Vec<SearchResult>,
}

impl ChatPayload {
    /// `search_results` carries titles, so it is preferred over the bare
    /// `citations` list when both are present.
    fn citations(&self) -> Vec<Citation> {
        if !self.search_results.is_empty() {
            return self
                .search_results
                .iter()
                .map(|r| Citation::new(r.title.clone().unwrap_or_else(|| r.url.clone()), &r.url))
                .collect();
        }
        self.citations
            .iter()
            .map(|c| match c {
                RawCitation::Url(url) => Citation::new(url, url),
                RawCitation::Full { title, url } => {
                    Citation::new(title.clone().unwrap_or_else(|| url.clone()), url)
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Content>,
    #[serde(default)]
    message: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCitation {
    Url(String),
    Full { title: Option<String>, url: String },
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: Option<String>,
    url: String,
}
