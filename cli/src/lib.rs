mod cli;
mod interactive;
mod output;
mod progress;
mod prompt;

use std::io::IsTerminal;
use std::io::Write;

use anyhow::bail;
use owo_colors::OwoColorize;
use pp_core::IncrementalRenderer;
use pp_core::PerplexityClient;
use pp_core::PpErr;
use pp_core::config::Config;
use pp_core::config::ConfigManager;
use pp_core::flags::PP_RESEARCH_MODEL;
use pp_core::format::MarkdownRenderer;
use pp_core::highlight::CodeHighlighter;
use pp_core::highlight::FenceStyle;
use pp_core::highlight::PlainHighlighter;
use pp_core::highlight::SyntectHighlighter;
use pp_core::notes::NoteWriter;
use pp_core::notes::ObsidianNote;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub use cli::Cli;
pub use cli::Color;
pub use cli::Command;
pub use cli::OutputFormat;

/// How answers are drawn on stdout.
#[derive(Debug, Clone, Copy)]
pub struct Display {
    /// ANSI styling at all.
    pub styled: bool,
    /// Syntax highlighting of code blocks, which needs a true-color terminal.
    pub highlight: bool,
    /// Progress spinner on stderr while waiting for an answer.
    pub progress: bool,
}

impl Display {
    fn detect(color: Color) -> Self {
        let styled = match color {
            Color::Always => true,
            Color::Never => false,
            Color::Auto => std::io::stdout().is_terminal(),
        };
        let highlight = styled
            && (color == Color::Always
                || supports_color::on_cached(supports_color::Stream::Stdout)
                    .map(|level| level.has_16m)
                    .unwrap_or(false));
        let progress = styled && std::io::stderr().is_terminal();
        Self {
            styled,
            highlight,
            progress,
        }
    }

    fn highlighter(self) -> Box<dyn CodeHighlighter> {
        if self.highlight {
            Box::new(SyntectHighlighter::default())
        } else {
            Box::new(PlainHighlighter)
        }
    }

    pub fn stream_renderer(self) -> IncrementalRenderer {
        if !self.styled {
            return IncrementalRenderer::plain();
        }
        IncrementalRenderer::new(self.highlighter(), FenceStyle::Styled)
    }

    pub fn markdown_renderer(self) -> MarkdownRenderer {
        MarkdownRenderer::new(self.highlighter(), self.styled)
    }

    fn success(self, message: &str) -> String {
        if self.styled {
            message.green().to_string()
        } else {
            message.to_string()
        }
    }
}

pub async fn run_main(cli: Cli) -> anyhow::Result<()> {
    let stderr_with_ansi = match cli.color {
        Color::Always => true,
        Color::Never => false,
        Color::Auto => std::io::stderr().is_terminal(),
    };

    let default_level = "error";
    let _ = tracing_subscriber::fmt()
        // Fallback to the `default_level` log filter if the environment
        // variable is not set _or_ contains an invalid value
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_ansi(stderr_with_ansi)
        .with_writer(std::io::stderr)
        .try_init();

    let display = Display::detect(cli.color);
    let manager = ConfigManager::new(None)?;

    if let Some(Command::Config) = cli.command {
        return run_config(&manager, display);
    }

    let config = load_or_setup_config(&manager, display)?;

    let mut query = cli.query_text();
    if query.is_empty() && !cli.no_interactive && std::io::stdin().is_terminal() {
        let mut stdout = std::io::stdout();
        query = prompt::ask(
            &mut std::io::stdin().lock(),
            &mut stdout,
            "Enter your query (paste anything, then press Enter):\n>",
        )?
        .unwrap_or_default();
    }
    if query.is_empty() {
        println!("No query provided. Use: pp \"your query here\"");
        return Ok(());
    }

    let model = resolve_model(&cli, &config);
    debug!(%model, interactive = !cli.no_interactive, "starting");
    let client = PerplexityClient::new(config.effective_api_key(), model.clone());
    let writer = NoteWriter::new(config.vault_path.clone());

    if cli.no_interactive {
        return run_once(&cli, &query, &model, &client, &writer, display).await;
    }

    if !std::io::stdin().is_terminal() {
        bail!("Interactive mode requires a TTY. Run from a terminal, or pass --no-interactive.");
    }
    let (conversation, mut lines) =
        interactive::run_interactive(&client, &query, display).await?;
    if let Some(filename) =
        interactive::prompt_to_save(conversation, &mut lines, &client, &writer, &query).await?
    {
        println!("{}", display.success(&format!("\n✓ Saved to: {filename}")));
    }
    Ok(())
}

/// `--model` wins, then `--research`, then the configured default.
fn resolve_model(cli: &Cli, config: &Config) -> String {
    match &cli.model {
        Some(model) => model.clone(),
        None if cli.research => PP_RESEARCH_MODEL.to_string(),
        None => config.default_model.clone(),
    }
}

fn load_or_setup_config(manager: &ConfigManager, display: Display) -> anyhow::Result<Config> {
    if let Some(config) = manager.read_config()? {
        config.validate()?;
        return Ok(config);
    }
    if !std::io::stdin().is_terminal() {
        return Err(PpErr::MissingConfig(manager.config_path()).into());
    }
    println!("No configuration found. Let's set up pp.\n");
    let config = setup(manager, None)?;
    println!("{}", display.success("✓ Configuration saved\n"));
    Ok(config)
}

fn setup(manager: &ConfigManager, current: Option<&Config>) -> anyhow::Result<Config> {
    let mut stdout = std::io::stdout();
    let config = prompt::prompt_for_config(&mut std::io::stdin().lock(), &mut stdout, current)?;
    stdout.flush()?;
    manager.write_config(&config)?;
    Ok(config)
}

fn run_config(manager: &ConfigManager, display: Display) -> anyhow::Result<()> {
    let current = match manager.read_config() {
        Ok(current) => current,
        Err(err) => {
            debug!(%err, "ignoring unreadable config");
            None
        }
    };
    let config = setup(manager, current.as_ref())?;
    println!("{}", display.success("✓ Configuration saved"));
    println!("API Key: {}", prompt::mask_api_key(&config.api_key));
    println!("Vault Path: {}", config.vault_path.display());
    println!("Model: {}", config.default_model);
    Ok(())
}

/// `--no-interactive`: one non-streamed query, printed per `--output`.
async fn run_once(
    cli: &Cli,
    query: &str,
    model: &str,
    client: &PerplexityClient,
    writer: &NoteWriter,
    display: Display,
) -> anyhow::Result<()> {
    let label = if cli.research {
        "Researching..."
    } else {
        "Searching..."
    };
    let mut spinner = progress::Spinner::start(label, display.progress);
    let result = client.query(query).await;
    spinner.stop();
    let result = result?;
    let rendered = output::render_answer(
        cli.output,
        query,
        model,
        &result,
        &display.markdown_renderer(),
        display.styled,
    )?;
    println!("{rendered}");

    let announce = cli.output == OutputFormat::Text;
    if let Some(target) = &cli.append_to {
        writer.append_to_note(target, query, &result.content)?;
        if announce {
            let message = format!("\n✓ Appended to: {}", target.display());
            println!("{}", display.success(&message));
        }
    } else if let Some(target) = &cli.save_to {
        let note = ObsidianNote::single(query, &result.answer(), result.citations.clone());
        writer.save_to(target, &note)?;
        if announce {
            let message = format!("\n✓ Saved to: {}", target.display());
            println!("{}", display.success(&message));
        }
    }
    Ok(())
}
