//! Writing answers into an Obsidian vault as markdown notes.

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::citations::Citation;
use crate::citations::dedup_by_url;
use crate::error::Result;
use crate::think::extract_thinking;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObsidianNote {
    pub title: String,
    pub query: String,
    pub conversation: Vec<ConversationEntry>,
    pub citations: Vec<Citation>,
}

impl ObsidianNote {
    /// A one-question note.
    pub fn single(query: &str, answer: &str, citations: Vec<Citation>) -> Self {
        Self {
            title: query.to_string(),
            query: query.to_string(),
            conversation: vec![ConversationEntry {
                question: query.to_string(),
                answer: answer.to_string(),
            }],
            citations,
        }
    }
}

/// Render a note with YAML frontmatter, one `## Q:` section per exchange and
/// a deduplicated source list.
pub fn format_as_markdown(note: &ObsidianNote, created: DateTime<Utc>) -> String {
    let mut parts: Vec<String> = vec![
        "---".to_string(),
        format!(
            "created: {}",
            created.to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        format!("query: \"{}\"", note.query),
        "tags: [perplexity, search]".to_string(),
        "---".to_string(),
        String::new(),
        format!("# {}", note.title),
        String::new(),
    ];

    for (index, entry) in note.conversation.iter().enumerate() {
        if index > 0 {
            parts.extend([String::new(), "---".to_string(), String::new()]);
        }
        parts.push(format!("## Q: {}", entry.question));
        parts.push(String::new());
        parts.push(entry.answer.clone());
        parts.push(String::new());
    }

    if !note.citations.is_empty() {
        parts.extend([
            String::new(),
            "---".to_string(),
            String::new(),
            "## Sources".to_string(),
            String::new(),
        ]);
        for (i, c) in dedup_by_url(&note.citations).iter().enumerate() {
            parts.push(format!("{}. [{}]({})", i + 1, c.title, c.url));
        }
        parts.push(String::new());
    }

    parts.join("\n")
}

/// The section appended to an existing note for one query. Reasoning, when
/// the answer carried any, goes underneath the answer.
pub fn format_appended_section(query: &str, raw_answer: &str) -> String {
    let (content, thinking) = extract_thinking(raw_answer);
    let mut section = format!("\n\n---\n\n# {query}\n\n{content}\n");
    if let Some(thinking) = thinking {
        section.push_str(&format!(
            "\n## Reasoning\n\n*Internal reasoning:*\n\n{thinking}\n"
        ));
    }
    section
}

pub struct NoteWriter {
    vault_path: PathBuf,
}

impl NoteWriter {
    pub fn new(vault_path: impl Into<PathBuf>) -> Self {
        Self {
            vault_path: vault_path.into(),
        }
    }

    pub fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    /// Write `note` to `YYYY-MM-DD-<slug>.md` in the vault and return the file
    /// name. An existing file is never overwritten; `-2`, `-3`, ... is
    /// appended to the name instead.
    pub fn write_note(&self, note: &ObsidianNote, slug: &str) -> Result<String> {
        self.write_note_at(note, slug, Utc::now())
    }

    pub fn write_note_at(
        &self,
        note: &ObsidianNote,
        slug: &str,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let date = now.format("%Y-%m-%d");
        let mut filename = format!("{date}-{slug}.md");
        let mut counter = 2;
        while self.vault_path.join(&filename).exists() {
            filename = format!("{date}-{slug}-{counter}.md");
            counter += 1;
        }

        std::fs::create_dir_all(&self.vault_path)?;
        let path = self.vault_path.join(&filename);
        std::fs::write(&path, format_as_markdown(note, now))?;
        debug!(path = %path.display(), "wrote note");
        Ok(filename)
    }

    /// Append one query and its answer to a note, relative to the vault. The
    /// note is created when it does not exist yet.
    pub fn append_to_note(
        &self,
        relative: &Path,
        query: &str,
        raw_answer: &str,
    ) -> Result<PathBuf> {
        let path = self.vault_path.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        file.write_all(format_appended_section(query, raw_answer).as_bytes())?;
        debug!(path = %path.display(), "appended to note");
        Ok(path)
    }

    /// Save a one-question note under a caller-chosen path relative to the
    /// vault; the file stem becomes the slug.
    pub fn save_to(&self, relative: &Path, note: &ObsidianNote) -> Result<String> {
        let slug = relative
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let writer = match relative.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                NoteWriter::new(self.vault_path.join(parent))
            }
            _ => NoteWriter::new(self.vault_path.clone()),
        };
        writer.write_note(note, &slug)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).unwrap()
    }

    fn two_question_note() -> ObsidianNote {
        ObsidianNote {
            title: "Rust async".to_string(),
            query: "what is tokio".to_string(),
            conversation: vec![
                ConversationEntry {
                    question: "what is tokio".to_string(),
                    answer: "A runtime.".to_string(),
                },
                ConversationEntry {
                    question: "and async-std?".to_string(),
                    answer: "Another runtime.".to_string(),
                },
            ],
            citations: vec![
                Citation::new("Tokio", "https://tokio.rs"),
                Citation::new("Tokio again", "https://tokio.rs"),
                Citation::new("async-std", "https://async.rs"),
            ],
        }
    }

    #[test]
    fn markdown_layout() {
        let expected = "\
---
created: 2024-03-09T14:30:00.000Z
query: \"what is tokio\"
tags: [perplexity, search]
---

# Rust async

## Q: what is tokio

A runtime.


---

## Q: and async-std?

Another runtime.


---

## Sources

1. [Tokio](https://tokio.rs)
2. [async-std](https://async.rs)
";
        assert_eq!(format_as_markdown(&two_question_note(), fixed_now()), expected);
    }

    #[test]
    fn no_sources_section_without_citations() {
        let note = ObsidianNote::single("q", "a", Vec::new());
        let md = format_as_markdown(&note, fixed_now());
        assert!(!md.contains("## Sources"));
        assert!(md.ends_with("## Q: q\n\na\n"));
    }

    #[test]
    fn write_note_avoids_collisions() {
        let dir = TempDir::new().unwrap();
        let writer = NoteWriter::new(dir.path().join("vault"));
        let note = ObsidianNote::single("q", "a", Vec::new());

        let names: Vec<String> = (0..3)
            .map(|_| writer.write_note_at(&note, "topic", fixed_now()).unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "2024-03-09-topic.md".to_string(),
                "2024-03-09-topic-2.md".to_string(),
                "2024-03-09-topic-3.md".to_string(),
            ]
        );
        let written =
            std::fs::read_to_string(dir.path().join("vault/2024-03-09-topic.md")).unwrap();
        assert_eq!(written, format_as_markdown(&note, fixed_now()));
    }

    #[test]
    fn appended_section_puts_reasoning_last() {
        let section = format_appended_section("why?", "<think>consider it</think>Because.");
        assert_eq!(
            section,
            "\n\n---\n\n# why?\n\nBecause.\n\n## Reasoning\n\n*Internal reasoning:*\n\nconsider it\n"
        );
        assert_eq!(
            format_appended_section("q", "plain"),
            "\n\n---\n\n# q\n\nplain\n"
        );
    }

    #[test]
    fn append_to_note_extends_existing_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("log.md"), "# Log").unwrap();
        let writer = NoteWriter::new(dir.path());
        writer
            .append_to_note(Path::new("log.md"), "q", "answer")
            .unwrap();
        let contents = std::fs::read_to_string(dir.path().join("log.md")).unwrap();
        assert_eq!(contents, "# Log\n\n---\n\n# q\n\nanswer\n");
    }

    #[test]
    fn save_to_uses_file_stem_as_slug() {
        let dir = TempDir::new().unwrap();
        let writer = NoteWriter::new(dir.path());
        let note = ObsidianNote::single("q", "a", Vec::new());
        let name = writer.save_to(Path::new("inbox/rust.md"), &note).unwrap();
        assert!(name.ends_with("-rust.md"), "{name}");
        assert!(dir.path().join("inbox").join(&name).exists());
    }
}
