//! Terminal formatting for complete answers: markdown rendering and the
//! source list printed underneath.

use owo_colors::OwoColorize;
use owo_colors::Style;
use pulldown_cmark::CodeBlockKind;
use pulldown_cmark::CowStr;
use pulldown_cmark::Event;
use pulldown_cmark::HeadingLevel;
use pulldown_cmark::Options;
use pulldown_cmark::Parser;
use pulldown_cmark::Tag;
use pulldown_cmark::TagEnd;
use tracing::debug;

use crate::citations::Citation;
use crate::citations::dedup_by_url;
use crate::highlight::CodeHighlighter;
use crate::highlight::FenceStyle;
use crate::highlight::PlainHighlighter;

pub use crate::think::extract_thinking;
pub use crate::think::strip_think_tags;

/// Numbered source list, one entry per distinct URL. Empty input renders as
/// an empty string.
pub fn format_citations(citations: &[Citation], styled: bool) -> String {
    let unique = dedup_by_url(citations);
    if unique.is_empty() {
        return String::new();
    }

    let mut out = String::from("\n");
    if styled {
        out.push_str(&format!("{}\n", "Sources".bold()));
    } else {
        out.push_str("Sources\n");
    }
    for (i, c) in unique.iter().enumerate() {
        let n = format!("[{}]", i + 1);
        if styled {
            out.push_str(&format!(
                "  {} {}\n      {}\n",
                n.dimmed(),
                c.title,
                c.url.blue().underline()
            ));
        } else {
            out.push_str(&format!("  {n} {}\n      {}\n", c.title, c.url));
        }
    }
    out
}

/// Renders a whole markdown document for the terminal.
///
/// Used for answers that arrive in one piece; streamed answers go through
/// [`crate::render::IncrementalRenderer`] instead.
pub struct MarkdownRenderer {
    styled: bool,
    highlighter: Box<dyn CodeHighlighter>,
}

impl MarkdownRenderer {
    pub fn new(highlighter: Box<dyn CodeHighlighter>, styled: bool) -> Self {
        Self {
            styled,
            highlighter,
        }
    }

    pub fn plain() -> Self {
        Self::new(Box::new(PlainHighlighter), false)
    }

    /// Render `input`, with reasoning regions removed first. The result has
    /// no trailing newline.
    pub fn render(&self, input: &str) -> String {
        let cleaned = strip_think_tags(input);
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        let parser = Parser::new_ext(cleaned.trim(), options);
        let mut w = Writer::new(self);
        for event in parser {
            w.handle_event(event);
        }
        w.out.trim_end().to_string()
    }
}

#[derive(Clone, Copy)]
enum InlineStyle {
    Emphasis,
    Strong,
    Strikethrough,
    Heading(HeadingLevel),
    Link,
}

struct CodeBlock {
    language: String,
    content: String,
}

struct Writer<'r> {
    renderer: &'r MarkdownRenderer,
    out: String,
    inline_styles: Vec<InlineStyle>,
    /// Continuation prefixes for block quotes and list items.
    prefixes: Vec<String>,
    list_indices: Vec<Option<u64>>,
    link: Option<String>,
    link_text: String,
    code_block: Option<CodeBlock>,
    at_line_start: bool,
    /// Set right after a list marker so the item's first paragraph stays on
    /// the marker line.
    after_marker: bool,
}

impl<'r> Writer<'r> {
    fn new(renderer: &'r MarkdownRenderer) -> Self {
        Self {
            renderer,
            out: String::new(),
            inline_styles: Vec::new(),
            prefixes: Vec::new(),
            list_indices: Vec::new(),
            link: None,
            link_text: String::new(),
            code_block: None,
            at_line_start: true,
            after_marker: false,
        }
    }

    fn handle_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(text),
            Event::Code(code) => self.code(code),
            Event::SoftBreak | Event::HardBreak => self.newline(),
            Event::Rule => {
                self.start_block();
                self.write_raw("———");
                self.newline();
            }
            Event::Html(html) | Event::InlineHtml(html) => self.write_lines(&html, false),
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if !self.after_marker {
                    self.start_block();
                }
            }
            Tag::Heading { level, .. } => {
                self.start_block();
                self.inline_styles.push(InlineStyle::Heading(level));
            }
            Tag::BlockQuote => {
                self.start_block();
                self.prefixes.push("> ".to_string());
            }
            Tag::CodeBlock(kind) => {
                self.start_block();
                let language = match kind {
                    CodeBlockKind::Fenced(lang) => lang.trim().to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code_block = Some(CodeBlock {
                    language,
                    content: String::new(),
                });
            }
            Tag::List(start) => {
                if self.list_indices.is_empty() {
                    self.start_block();
                } else {
                    self.ensure_line_start();
                }
                self.list_indices.push(start);
            }
            Tag::Item => self.start_item(),
            Tag::Emphasis => self.inline_styles.push(InlineStyle::Emphasis),
            Tag::Strong => self.inline_styles.push(InlineStyle::Strong),
            Tag::Strikethrough => self.inline_styles.push(InlineStyle::Strikethrough),
            Tag::Link { dest_url, .. } => {
                self.link = Some(dest_url.to_string());
                self.link_text.clear();
                self.inline_styles.push(InlineStyle::Link);
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.ensure_line_start(),
            TagEnd::Heading(_) => {
                self.inline_styles.pop();
                self.ensure_line_start();
            }
            TagEnd::BlockQuote => {
                self.prefixes.pop();
                self.ensure_line_start();
            }
            TagEnd::CodeBlock => self.end_code_block(),
            TagEnd::List(_) => {
                self.list_indices.pop();
                self.ensure_line_start();
            }
            TagEnd::Item => {
                self.prefixes.pop();
                self.after_marker = false;
                self.ensure_line_start();
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.inline_styles.pop();
            }
            TagEnd::Link => {
                self.inline_styles.pop();
                if let Some(url) = self.link.take()
                    && url != self.link_text
                {
                    let suffix = format!(" ({url})");
                    if self.renderer.styled {
                        self.write_raw(&suffix.blue().underline().to_string());
                    } else {
                        self.write_raw(&suffix);
                    }
                }
            }
            _ => {}
        }
    }

    fn start_item(&mut self) {
        self.ensure_line_start();
        let marker = match self.list_indices.last_mut() {
            Some(Some(n)) => {
                let marker = format!("{n}. ");
                *n += 1;
                marker
            }
            _ => "- ".to_string(),
        };
        let styled_marker = if self.renderer.styled {
            marker.dimmed().to_string()
        } else {
            marker.clone()
        };
        self.write_raw(&styled_marker);
        self.prefixes.push(" ".repeat(marker.len()));
        self.after_marker = true;
    }

    fn end_code_block(&mut self) {
        let Some(CodeBlock { language, content }) = self.code_block.take() else {
            return;
        };
        let (fences, body) = if self.renderer.styled {
            let body = match self.renderer.highlighter.highlight(&content, &language) {
                Ok(highlighted) => highlighted,
                Err(err) => {
                    debug!(%err, "code block left unhighlighted");
                    content
                }
            };
            (FenceStyle::Styled, body)
        } else {
            (FenceStyle::Plain, content)
        };

        self.write_raw(fences.opening(&language).trim_end_matches('\n'));
        self.newline();
        for line in body.lines() {
            self.write_raw(line);
            self.newline();
        }
        self.write_raw(&fences.closing());
        self.newline();
    }

    fn text(&mut self, text: CowStr<'_>) {
        if let Some(block) = self.code_block.as_mut() {
            block.content.push_str(&text);
            return;
        }
        if self.link.is_some() {
            self.link_text.push_str(&text);
        }
        self.write_lines(&text, true);
    }

    fn write_lines(&mut self, text: &str, apply_styles: bool) {
        let mut lines = text.split('\n').peekable();
        while let Some(line) = lines.next() {
            if !line.is_empty() {
                if apply_styles {
                    let styled = self.apply_inline_styles(line);
                    self.write_raw(&styled);
                } else {
                    self.write_raw(line);
                }
            }
            if lines.peek().is_some() {
                self.newline();
            }
        }
    }

    fn code(&mut self, code: CowStr<'_>) {
        if self.renderer.styled {
            self.write_raw(&code.yellow().to_string());
        } else {
            self.write_raw(&format!("`{code}`"));
        }
    }

    fn apply_inline_styles(&self, text: &str) -> String {
        if !self.renderer.styled || self.inline_styles.is_empty() {
            return text.to_string();
        }
        let style = self
            .inline_styles
            .iter()
            .fold(Style::new(), |style, inline| match inline {
                InlineStyle::Emphasis => style.italic(),
                InlineStyle::Strong => style.bold(),
                InlineStyle::Strikethrough => style.strikethrough(),
                InlineStyle::Heading(HeadingLevel::H1) => style.bold().underline(),
                InlineStyle::Heading(_) => style.bold(),
                InlineStyle::Link => style.cyan(),
            });
        text.style(style).to_string()
    }

    /// Begin a top-level block: blocks are separated by one blank line.
    fn start_block(&mut self) {
        self.after_marker = false;
        if self.out.is_empty() {
            return;
        }
        self.ensure_line_start();
        if !self.out.ends_with("\n\n") {
            self.newline();
        }
    }

    fn ensure_line_start(&mut self) {
        if !self.at_line_start {
            self.newline();
        }
    }

    fn newline(&mut self) {
        self.out.push('\n');
        self.at_line_start = true;
        self.after_marker = false;
    }

    fn write_raw(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if self.at_line_start {
            let prefix = self.prefixes.concat();
            if self.renderer.styled && !prefix.trim().is_empty() {
                self.out.push_str(&prefix.dimmed().to_string());
            } else {
                self.out.push_str(&prefix);
            }
            self.at_line_start = false;
        }
        self.out.push_str(s);
    }
}
