use tracing::debug;

use crate::highlight::CodeHighlighter;
use crate::highlight::FenceStyle;
use crate::highlight::PlainHighlighter;

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeBlockState {
    Outside,
    InsideFence { language: String, content: String },
}

/// Converts deltas of cleaned text into display-ready output.
///
/// Plain text passes through as soon as it arrives. A fenced code block is
/// held back until its closing fence and then emitted as one highlighted
/// unit. Fences may be split across any number of `consume` calls; the
/// undecided bytes live in `pending` until the next character settles them.
pub struct IncrementalRenderer {
    state: CodeBlockState,
    /// Backticks (and, once there are three outside a block, the language
    /// label) that may still turn out to be a fence.
    pending: String,
    at_line_start: bool,
    highlighter: Box<dyn CodeHighlighter>,
    fences: FenceStyle,
}

impl IncrementalRenderer {
    pub fn new(highlighter: Box<dyn CodeHighlighter>, fences: FenceStyle) -> Self {
        Self {
            state: CodeBlockState::Outside,
            pending: String::new(),
            at_line_start: true,
            highlighter,
            fences,
        }
    }

    /// A renderer that adds no terminal markup at all.
    pub fn plain() -> Self {
        Self::new(Box::new(PlainHighlighter), FenceStyle::Plain)
    }

    pub fn state(&self) -> &CodeBlockState {
        &self.state
    }

    pub fn consume(&mut self, delta: &str) -> String {
        let mut out = String::with_capacity(delta.len());
        for c in delta.chars() {
            self.step(c, &mut out);
        }
        out
    }

    /// Release everything still held back, unhighlighted. Meant for the end of
    /// a stream, when no further input can complete a fence.
    pub fn flush(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        let state = std::mem::replace(&mut self.state, CodeBlockState::Outside);
        self.at_line_start = true;
        match state {
            CodeBlockState::Outside => pending,
            CodeBlockState::InsideFence { language, content } => {
                format!("{}{content}{pending}", self.fences.opening(&language))
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = CodeBlockState::Outside;
        self.pending.clear();
        self.at_line_start = true;
    }

    fn step(&mut self, c: char, out: &mut String) {
        if matches!(self.state, CodeBlockState::Outside) {
            self.step_outside(c, out);
        } else {
            self.step_inside(c, out);
        }
    }

    fn step_outside(&mut self, c: char, out: &mut String) {
        if self.pending.is_empty() {
            if self.at_line_start && c == '`' {
                self.pending.push(c);
            } else {
                out.push(c);
                self.at_line_start = c == '\n';
            }
            return;
        }

        if self.pending.len() < FENCE.len() {
            if c == '`' {
                self.pending.push(c);
                return;
            }
        } else if c == '\n' {
            let language = self.pending[FENCE.len()..].to_string();
            self.pending.clear();
            debug!(%language, "code block opened");
            self.state = CodeBlockState::InsideFence {
                language,
                content: String::new(),
            };
            self.at_line_start = true;
            return;
        } else if is_lang_char(c) {
            self.pending.push(c);
            return;
        }

        // Not a fence after all: release what was held as plain text.
        out.push_str(&self.pending);
        self.pending.clear();
        self.at_line_start = false;
        self.step_outside(c, out);
    }

    fn step_inside(&mut self, c: char, out: &mut String) {
        let CodeBlockState::InsideFence { content, .. } = &mut self.state else {
            return;
        };

        if self.pending.is_empty() {
            if self.at_line_start && c == '`' {
                self.pending.push(c);
            } else {
                content.push(c);
                self.at_line_start = c == '\n';
            }
            return;
        }

        if c == '`' {
            self.pending.push(c);
            if self.pending.len() == FENCE.len() {
                self.pending.clear();
                self.at_line_start = false;
                self.close_block(out);
            }
            return;
        }

        content.push_str(&self.pending);
        self.pending.clear();
        self.at_line_start = false;
        self.step_inside(c, out);
    }

    fn close_block(&mut self, out: &mut String) {
        let state = std::mem::replace(&mut self.state, CodeBlockState::Outside);
        let CodeBlockState::InsideFence { language, content } = state else {
            return;
        };
        out.push_str(&self.fences.opening(&language));
        match self.highlighter.highlight(&content, &language) {
            Ok(highlighted) => out.push_str(&highlighted),
            Err(err) => {
                debug!("rendering code block without highlighting: {err}");
                out.push_str(&content);
            }
        }
        out.push_str(&self.fences.closing());
    }
}

fn is_lang_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '#' | '.')
}
