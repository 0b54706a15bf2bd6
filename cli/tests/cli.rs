#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;

use anyhow::Result;
use predicates::str::contains;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_partial_json;
use wiremock::matchers::method;
use wiremock::matchers::path;

fn pp_command(home: &Path) -> Result<assert_cmd::Command> {
    let mut cmd = assert_cmd::Command::cargo_bin("pp")?;
    cmd.env("HOME", home)
        .env_remove("PP_API_KEY")
        .env_remove("RUST_LOG");
    Ok(cmd)
}

fn write_config(home: &Path, vault: &Path) -> Result<()> {
    let dir = home.join(".config").join("pp");
    std::fs::create_dir_all(&dir)?;
    let config = serde_json::json!({
        "apiKey": "test-key",
        "vaultPath": vault,
        "defaultModel": "sonar-pro"
    });
    std::fs::write(dir.join("config.json"), serde_json::to_string_pretty(&config)?)?;
    Ok(())
}

async fn mount_answer(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "model": "sonar-pro",
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }],
            "search_results": [{ "title": "The Book", "url": "https://doc.rust-lang.org/book" }]
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[test]
fn help_lists_options() -> Result<()> {
    let home = TempDir::new()?;
    pp_command(home.path())?
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--no-interactive"))
        .stdout(contains("--append-to"))
        .stdout(contains("config"));
    Ok(())
}

#[test]
fn missing_config_without_tty_is_an_error() -> Result<()> {
    let home = TempDir::new()?;
    pp_command(home.path())?
        .args(["--no-interactive", "what is rust"])
        .assert()
        .failure()
        .stderr(contains("no configuration found"))
        .stderr(contains("pp config"));
    Ok(())
}

#[test]
fn config_subcommand_writes_file() -> Result<()> {
    let home = TempDir::new()?;
    pp_command(home.path())?
        .arg("config")
        .write_stdin("pplx-1234567890\n/tmp/vault\n\n")
        .assert()
        .success()
        .stdout(contains("Configuration saved"))
        .stdout(contains("API Key: pplx-12345..."));

    let raw = std::fs::read_to_string(home.path().join(".config/pp/config.json"))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    assert_eq!(
        value,
        serde_json::json!({
            "apiKey": "pplx-1234567890",
            "vaultPath": "/tmp/vault",
            "defaultModel": "sonar-pro"
        })
    );
    Ok(())
}

#[test]
fn interactive_mode_requires_a_tty() -> Result<()> {
    let home = TempDir::new()?;
    let vault = TempDir::new()?;
    write_config(home.path(), vault.path())?;
    pp_command(home.path())?
        .arg("hello")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(contains("requires a TTY"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn json_output_against_mock_server() -> Result<()> {
    let server = MockServer::start().await;
    mount_answer(&server, "<think>recall</think>Rust is a systems language.").await;

    let home = TempDir::new()?;
    let vault = TempDir::new()?;
    write_config(home.path(), vault.path())?;

    let output = pp_command(home.path())?
        .env("PP_API_BASE", server.uri())
        .args(["--no-interactive", "--output", "json", "what", "is", "rust"])
        .output()?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(
        value,
        serde_json::json!({
            "query": "what is rust",
            "answer": "Rust is a systems language.",
            "citations": [{ "title": "The Book", "url": "https://doc.rust-lang.org/book" }],
            "model": "sonar-pro"
        })
    );
    server.verify().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn append_to_note_keeps_reasoning_at_the_bottom() -> Result<()> {
    let server = MockServer::start().await;
    mount_answer(&server, "<think>recall</think>Rust is a systems language.").await;

    let home = TempDir::new()?;
    let vault = TempDir::new()?;
    write_config(home.path(), vault.path())?;
    std::fs::write(vault.path().join("rust.md"), "# Rust")?;

    pp_command(home.path())?
        .env("PP_API_BASE", server.uri())
        .args([
            "--no-interactive",
            "--output",
            "markdown",
            "--append-to",
            "rust.md",
            "what is rust",
        ])
        .assert()
        .success()
        .stdout(contains("## Sources"))
        .stdout(contains("1. [The Book](https://doc.rust-lang.org/book)"));

    let note = std::fs::read_to_string(vault.path().join("rust.md"))?;
    assert_eq!(
        note,
        "# Rust\n\n---\n\n# what is rust\n\nRust is a systems language.\n\n## Reasoning\n\n*Internal reasoning:*\n\nrecall\n"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn save_to_writes_a_date_prefixed_note_in_the_target_folder() -> Result<()> {
    let server = MockServer::start().await;
    mount_answer(&server, "Rust is a systems language.").await;

    let home = TempDir::new()?;
    let vault = TempDir::new()?;
    write_config(home.path(), vault.path())?;

    pp_command(home.path())?
        .env("PP_API_BASE", server.uri())
        .args([
            "--no-interactive",
            "--output",
            "json",
            "--save-to",
            "inbox/q.md",
            "what is rust",
        ])
        .assert()
        .success();

    let names: Vec<String> = std::fs::read_dir(vault.path().join("inbox"))?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    assert_eq!(names.len(), 1, "{names:?}");
    let name = &names[0];
    assert!(name.ends_with("-q.md"), "{name}");
    let date = &name[..name.len() - "-q.md".len()];
    assert_eq!(date.len(), "YYYY-MM-DD".len(), "{name}");
    assert!(
        date.chars().all(|c| c.is_ascii_digit() || c == '-'),
        "{name}"
    );

    let note = std::fs::read_to_string(vault.path().join("inbox").join(name))?;
    assert!(note.contains("# what is rust"), "{note}");
    assert!(note.contains("Rust is a systems language."), "{note}");
    Ok(())
}

#[test]
fn save_to_help_names_the_date_prefix() -> Result<()> {
    let home = TempDir::new()?;
    pp_command(home.path())?
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("YYYY-MM-DD-<file stem>.md"));
    Ok(())
}
