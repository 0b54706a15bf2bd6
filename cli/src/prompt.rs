//! Line-based prompts on stdin/stdout used by `pp config` and the first-run
//! setup.

use std::io::BufRead;
use std::io::Write;
use std::path::PathBuf;

use anyhow::bail;
use pp_core::config::Config;
use pp_core::config::default_model;

/// Print `question` and read one trimmed line. `None` means end of input.
pub fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> std::io::Result<Option<String>> {
    write!(output, "{question} ")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Reading of a yes/no answer; an empty answer or end of input picks
/// `default`.
pub(crate) fn parse_yes_no(answer: Option<&str>, default: bool) -> bool {
    match answer.map(str::to_ascii_lowercase).as_deref() {
        Some("y" | "yes") => true,
        Some("n" | "no") => false,
        _ => default,
    }
}

/// Ask until a non-empty answer is given.
fn ask_required<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    missing: &str,
) -> anyhow::Result<String> {
    loop {
        match ask(input, output, question)? {
            None => bail!("setup aborted: {missing}"),
            Some(answer) if answer.is_empty() => writeln!(output, "{missing}")?,
            Some(answer) => return Ok(answer),
        }
    }
}

/// Interactive configuration: API key, vault path and default model.
/// `current` pre-fills the model default when updating an existing setup.
pub fn prompt_for_config<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    current: Option<&Config>,
) -> anyhow::Result<Config> {
    let api_key = ask_required(input, output, "Perplexity API Key:", "API key is required")?;
    let vault_path = ask_required(input, output, "Obsidian Vault Path:", "Vault path is required")?;

    let model_default = current
        .map(|c| c.default_model.clone())
        .unwrap_or_else(default_model);
    let model = ask(
        input,
        output,
        &format!("Default Perplexity Model: ({model_default})"),
    )?
    .filter(|m| !m.is_empty())
    .unwrap_or(model_default);

    Ok(Config {
        api_key,
        vault_path: expand_home(&vault_path),
        default_model: model,
    })
}

/// `~/notes` → `$HOME/notes`.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(path)
}

/// First characters of the key, for confirmation output.
pub fn mask_api_key(key: &str) -> String {
    let visible: String = key.chars().take(10).collect();
    format!("{visible}...")
}
