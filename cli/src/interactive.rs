//! The default conversational mode: stream each answer, then keep asking for
//! follow-ups until the user leaves.

use std::io::Write;

use owo_colors::OwoColorize;
use pp_core::Citation;
use pp_core::PerplexityClient;
use pp_core::PpErr;
use pp_core::StreamSession;
use pp_core::flags::PP_RESEARCH_MODEL;
use pp_core::format::format_citations;
use pp_core::notes::ConversationEntry;
use pp_core::notes::NoteWriter;
use pp_core::notes::ObsidianNote;
use pp_core::slug::DEFAULT_SLUG_LEN;
use pp_core::slug::slugify;
use pp_core::slug::topic_slug;
use pp_core::wire::Message;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio::io::Stdin;
use tracing::debug;

use crate::Display;
use crate::progress::Spinner;
use crate::prompt::parse_yes_no;

type InputLines = Lines<BufReader<Stdin>>;

/// Transcript of one interactive run.
#[derive(Debug, Default)]
pub struct Conversation {
    /// Messages sent with every request so follow-ups keep their context.
    pub history: Vec<Message>,
    pub entries: Vec<ConversationEntry>,
    pub citations: Vec<Citation>,
}

impl Conversation {
    /// Record a finished exchange.
    fn record(&mut self, answer: String, citations: &[Citation]) {
        if let Some(question) = self.history.last().map(|m| m.content.clone()) {
            self.entries.push(ConversationEntry {
                question,
                answer: answer.clone(),
            });
        }
        self.history.push(Message::assistant(answer));
        self.citations.extend_from_slice(citations);
    }
}

fn write_stdout(s: &str) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(s.as_bytes())?;
    out.flush()
}

/// Answer `initial_query`, then loop on follow-ups until `exit`, `quit`,
/// Ctrl-C at the prompt or end of input. Returns the transcript together
/// with the input reader so the caller can keep prompting.
pub async fn run_interactive(
    client: &PerplexityClient,
    initial_query: &str,
    display: Display,
) -> anyhow::Result<(Conversation, InputLines)> {
    let mut conversation = Conversation::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    handle_query(client, initial_query, &mut conversation, display).await?;

    loop {
        if display.styled {
            print!("{} ", ">".dimmed());
        } else {
            print!("> ");
        }
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        let input = line.trim();
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }
        if input.is_empty() {
            continue;
        }
        handle_query(client, input, &mut conversation, display).await?;
    }

    Ok((conversation, lines))
}

/// Stream one answer to the terminal. Transport failures are reported and
/// the conversation continues; whatever arrived before the failure is kept.
async fn handle_query(
    client: &PerplexityClient,
    query: &str,
    conversation: &mut Conversation,
    display: Display,
) -> anyhow::Result<()> {
    conversation.history.push(Message::user(query));
    let mut session = StreamSession::new(display.stream_renderer());
    println!();

    let label = if client.model() == *PP_RESEARCH_MODEL {
        "Thinking deeply..."
    } else {
        "Searching..."
    };
    let mut spinner = Spinner::start(label, display.progress);
    let outcome = match client.stream_chat(&conversation.history).await {
        Ok(stream) => {
            let pump = stream.pump_into(&mut session, |text| {
                spinner.stop();
                write_stdout(text)
            });
            tokio::select! {
                res = pump => res,
                _ = tokio::signal::ctrl_c() => Err(PpErr::Stream("interrupted".to_string())),
            }
        }
        Err(err) => Err(err),
    };
    spinner.stop();

    if let Err(err) = &outcome {
        // A no-op when the stream already ended itself.
        write_stdout(&session.on_error(err.to_string()))?;
    }
    println!();

    let answer = session.finalized_plain_text().unwrap_or_default();
    match outcome {
        Ok(()) => {
            let citations = session.citations().unwrap_or_default().to_vec();
            let sources = format_citations(&citations, display.styled);
            if !sources.is_empty() {
                println!("{sources}");
            }
            conversation.record(answer, &citations);
        }
        Err(err) => {
            debug!(%err, "exchange failed");
            if display.styled {
                eprintln!("{} {err}", "Error:".red());
            } else {
                eprintln!("Error: {err}");
            }
            if answer.trim().is_empty() {
                conversation.history.pop();
            } else {
                conversation.record(answer, &[]);
            }
        }
    }
    println!();
    Ok(())
}

/// Offer to write the conversation to the vault. The note is titled by a
/// short model-generated topic, which also provides the file slug.
pub async fn prompt_to_save(
    conversation: Conversation,
    lines: &mut InputLines,
    client: &PerplexityClient,
    writer: &NoteWriter,
    original_query: &str,
) -> anyhow::Result<Option<String>> {
    if conversation.entries.is_empty() {
        return Ok(None);
    }

    print!("Save to vault? [Y/n] ");
    std::io::stdout().flush()?;
    let answer = lines.next_line().await?;
    if !parse_yes_no(answer.as_deref().map(str::trim), true) {
        return Ok(None);
    }

    let prompt = format!("Summarize this conversation topic in 3-5 words: \"{original_query}\"");
    let title = match client.query(&prompt).await {
        Ok(result) => result.answer(),
        Err(err) => {
            debug!(%err, "topic generation failed; using the query");
            String::new()
        }
    };
    let (title, slug) = note_title_and_slug(&title, original_query);

    let note = ObsidianNote {
        title,
        query: original_query.to_string(),
        conversation: conversation.entries,
        citations: conversation.citations,
    };
    Ok(Some(writer.write_note(&note, &slug)?))
}

fn note_title_and_slug(topic: &str, original_query: &str) -> (String, String) {
    let topic = topic.trim();
    let slug = topic_slug(topic);
    if slug.is_empty() {
        (
            original_query.to_string(),
            slugify(original_query, DEFAULT_SLUG_LEN),
        )
    } else {
        (topic.to_string(), slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_pairs_question_and_answer() {
        let mut c = Conversation::default();
        c.history.push(Message::user("q1"));
        c.record("a1".to_string(), &[Citation::new("T", "https://t")]);
        assert_eq!(
            c.history,
            vec![Message::user("q1"), Message::assistant("a1")]
        );
        assert_eq!(
            c.entries,
            vec![ConversationEntry {
                question: "q1".to_string(),
                answer: "a1".to_string(),
            }]
        );
        assert_eq!(c.citations.len(), 1);
    }

    #[test]
    fn topic_becomes_title_and_slug() {
        assert_eq!(
            note_title_and_slug(" Rust Ownership Basics \n", "how does ownership work"),
            (
                "Rust Ownership Basics".to_string(),
                "rust-ownership-basics".to_string()
            )
        );
    }

    #[test]
    fn empty_topic_falls_back_to_query() {
        assert_eq!(
            note_title_and_slug("", "How does ownership work?"),
            (
                "How does ownership work?".to_string(),
                "how-does-ownership-work".to_string()
            )
        );
    }
}
