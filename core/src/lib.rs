//! Root of the `pp-core` library.

// Library code never writes to the terminal itself; display text is handed
// back to the caller.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod citations;
pub mod client;
pub mod config;
pub mod error;
pub mod flags;
pub mod format;
pub mod highlight;
pub mod notes;
pub mod reconstruct;
pub mod render;
pub mod session;
pub mod slug;
mod think;
pub mod wire;

pub use citations::Citation;
pub use client::PerplexityClient;
pub use client::QueryResult;
pub use client::ResponseEvent;
pub use client::ResponseStream;
pub use error::PpErr;
pub use error::TransportOutcome;
pub use reconstruct::StreamReconstructor;
pub use render::IncrementalRenderer;
pub use session::SessionState;
pub use session::StreamSession;
pub use think::extract_thinking;
pub use think::strip_think_tags;
