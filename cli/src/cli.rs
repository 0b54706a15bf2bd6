use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

/// Conversational Perplexity search from the terminal.
#[derive(Parser, Debug, Clone)]
#[command(name = "pp", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Deep research mode, using the reasoning model.
    #[arg(long, short = 'r', default_value_t = false)]
    pub research: bool,

    /// Answer a single query and exit, without follow-up prompts. Meant for
    /// scripting.
    #[arg(long = "no-interactive", default_value_t = false)]
    pub no_interactive: bool,

    /// Output format in non-interactive mode.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Save the answer as a new note in this path's folder, relative to the
    /// vault. The file is named YYYY-MM-DD-<file stem>.md.
    #[arg(long = "save-to", value_name = "PATH")]
    pub save_to: Option<PathBuf>,

    /// Append the answer to an existing note, relative to the vault.
    #[arg(long = "append-to", value_name = "PATH", conflicts_with = "save_to")]
    pub append_to: Option<PathBuf>,

    /// Model to use instead of the configured default.
    #[arg(long, short = 'm')]
    pub model: Option<String>,

    /// Specifies color settings for use in the output.
    #[arg(long = "color", value_enum, default_value_t = Color::Auto)]
    pub color: Color,

    /// Search query. Words are joined with spaces.
    #[arg(value_name = "QUERY")]
    pub query: Vec<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Set up or update the API key, vault path and default model.
    Config,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Color {
    Always,
    Never,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Rendered for the terminal.
    #[default]
    Text,
    /// A single JSON object with the query, answer, citations and model.
    Json,
    /// Raw markdown followed by a source list.
    Markdown,
}

impl Cli {
    pub fn query_text(&self) -> String {
        self.query.join(" ").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn query_words_are_joined() {
        let cli = Cli::try_parse_from(["pp", "--no-interactive", "what", "is", "rust"]).unwrap();
        assert!(cli.no_interactive);
        assert!(cli.command.is_none());
        assert_eq!(cli.query_text(), "what is rust");
        assert_eq!(cli.output, OutputFormat::Text);
        assert_eq!(cli.color, Color::Auto);
    }

    #[test]
    fn config_subcommand() {
        let cli = Cli::try_parse_from(["pp", "config"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Config)));
    }

    #[test]
    fn flags() {
        let cli = Cli::try_parse_from([
            "pp",
            "-r",
            "--output",
            "json",
            "--save-to",
            "inbox/q.md",
            "-m",
            "sonar",
            "--color",
            "never",
            "q",
        ])
        .unwrap();
        assert!(cli.research);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.save_to, Some(PathBuf::from("inbox/q.md")));
        assert_eq!(cli.model.as_deref(), Some("sonar"));
        assert_eq!(cli.color, Color::Never);
    }

    #[test]
    fn save_and_append_conflict() {
        let err = Cli::try_parse_from(["pp", "--save-to", "a.md", "--append-to", "b.md", "q"]);
        assert!(err.is_err());
    }
}
