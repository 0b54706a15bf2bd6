//! Printing a single non-streamed answer in one of the `--output` formats.

use pp_core::Citation;
use pp_core::QueryResult;
use pp_core::citations::dedup_by_url;
use pp_core::format::MarkdownRenderer;
use pp_core::format::format_citations;
use serde::Serialize;

use crate::cli::OutputFormat;

#[derive(Debug, Serialize)]
struct JsonOutput<'a> {
    query: &'a str,
    answer: String,
    citations: &'a [Citation],
    model: &'a str,
}

/// Everything to print for `result`, without a trailing newline.
pub fn render_answer(
    format: OutputFormat,
    query: &str,
    model: &str,
    result: &QueryResult,
    markdown: &MarkdownRenderer,
    styled: bool,
) -> anyhow::Result<String> {
    let out = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&JsonOutput {
            query,
            answer: result.answer(),
            citations: &result.citations,
            model,
        })?,
        OutputFormat::Markdown => {
            let mut out = result.answer();
            let sources = dedup_by_url(&result.citations);
            if !sources.is_empty() {
                out.push_str("\n\n## Sources\n");
                for (i, c) in sources.iter().enumerate() {
                    out.push_str(&format!("\n{}. [{}]({})", i + 1, c.title, c.url));
                }
            }
            out
        }
        OutputFormat::Text => {
            let mut out = markdown.render(&result.content);
            let sources = format_citations(&result.citations, styled);
            if !sources.is_empty() {
                out.push('\n');
                out.push_str(sources.trim_end());
            }
            out
        }
    };
    Ok(out)
}
