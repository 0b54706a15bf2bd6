use std::borrow::Cow;

use once_cell::sync::OnceCell;
use owo_colors::OwoColorize;
use syntect::easy::HighlightLines;
use syntect::highlighting::Theme;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxReference;
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use syntect::util::as_24_bit_terminal_escaped;

use crate::flags::PP_CODE_THEME;

const RESET: &str = "\x1b[0m";
const FALLBACK_THEME: &str = "base16-ocean.dark";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HighlightError {
    #[error("code block has no language tag")]
    MissingLanguage,
    #[error("unknown language `{0}`")]
    UnknownLanguage(String),
    #[error("theme `{0}` is not available")]
    UnknownTheme(String),
    #[error("highlighting failed: {0}")]
    Syntax(String),
}

/// Turns the content of a fenced code block into display-ready text.
///
/// Implementations must preserve the exact characters of `code`; only
/// terminal markup may be added.
pub trait CodeHighlighter {
    fn highlight(&self, code: &str, lang: &str) -> Result<String, HighlightError>;
}

/// Leaves code untouched. Used when color output is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainHighlighter;

impl CodeHighlighter for PlainHighlighter {
    fn highlight(&self, code: &str, _lang: &str) -> Result<String, HighlightError> {
        Ok(code.to_string())
    }
}

static SYNTAXES: OnceCell<SyntaxSet> = OnceCell::new();
static THEMES: OnceCell<ThemeSet> = OnceCell::new();

fn syntax_set() -> &'static SyntaxSet {
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn themes() -> &'static ThemeSet {
    THEMES.get_or_init(ThemeSet::load_defaults)
}

/// 24-bit ANSI highlighting backed by syntect's bundled grammars.
#[derive(Debug, Clone)]
pub struct SyntectHighlighter {
    theme_name: String,
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::with_theme(*PP_CODE_THEME)
    }
}

impl SyntectHighlighter {
    pub fn with_theme(theme_name: impl Into<String>) -> Self {
        Self {
            theme_name: theme_name.into(),
        }
    }

    fn theme(&self) -> Result<&'static Theme, HighlightError> {
        let ts = themes();
        ts.themes
            .get(&self.theme_name)
            .or_else(|| ts.themes.get(FALLBACK_THEME))
            .ok_or_else(|| HighlightError::UnknownTheme(self.theme_name.clone()))
    }
}

impl CodeHighlighter for SyntectHighlighter {
    fn highlight(&self, code: &str, lang: &str) -> Result<String, HighlightError> {
        let lang = lang.trim();
        if lang.is_empty() {
            return Err(HighlightError::MissingLanguage);
        }
        let ps = syntax_set();
        let syntax = syntax_for_lang(ps, lang)
            .ok_or_else(|| HighlightError::UnknownLanguage(lang.to_string()))?;
        let mut highlighter = HighlightLines::new(syntax, self.theme()?);

        let mut out = String::with_capacity(code.len() * 2);
        for line in LinesWithEndings::from(code) {
            let ranges = highlighter
                .highlight_line(line, ps)
                .map_err(|e| HighlightError::Syntax(e.to_string()))?;
            out.push_str(&as_24_bit_terminal_escaped(&ranges, false));
        }
        out.push_str(RESET);
        Ok(out)
    }
}

fn syntax_for_lang<'a>(ps: &'a SyntaxSet, lang: &str) -> Option<&'a SyntaxReference> {
    let lang = normalize_lang(lang);
    ps.find_syntax_by_token(&lang)
        .or_else(|| ps.find_syntax_by_extension(&lang))
        .or_else(|| ps.find_syntax_by_name(&lang))
}

/// Map the labels models commonly put on fences onto tokens syntect knows.
fn normalize_lang(lang: &str) -> Cow<'static, str> {
    let l = lang.trim().trim_start_matches('.').to_ascii_lowercase();
    let token = match l.as_str() {
        "sh" | "bash" | "zsh" | "shell" | "console" | "shellsession" => "bash",
        "js" | "javascript" | "mjs" | "cjs" | "jsx" | "node" => "js",
        // No TypeScript grammar ships with syntect; JavaScript is close enough.
        "ts" | "typescript" | "tsx" => "js",
        "py" | "python" | "py3" => "py",
        "rs" | "rust" => "rs",
        "rb" | "ruby" => "rb",
        "go" | "golang" => "go",
        "c" | "h" => "c",
        "cpp" | "c++" | "cxx" | "cc" | "hpp" | "hh" => "cpp",
        "cs" | "csharp" | "c#" => "cs",
        "objc" | "objective-c" | "m" | "mm" => "m",
        "yml" | "yaml" => "yaml",
        "htm" | "html" | "xhtml" => "html",
        "md" | "markdown" => "md",
        "hs" | "haskell" => "hs",
        "make" | "makefile" | "mk" => "makefile",
        "kt" | "kts" | "kotlin" => "java",
        _ => return Cow::Owned(l),
    };
    Cow::Borrowed(token)
}

/// How fence delimiter lines around a rendered block look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FenceStyle {
    /// Dim backticks and a cyan language label.
    Styled,
    #[default]
    Plain,
}

impl FenceStyle {
    pub fn opening(self, lang: &str) -> String {
        match self {
            FenceStyle::Styled => format!("{}{}\n", "```".dimmed(), lang.cyan()),
            FenceStyle::Plain => format!("```{lang}\n"),
        }
    }

    pub fn closing(self) -> String {
        match self {
            FenceStyle::Styled => "```".dimmed().to_string(),
            FenceStyle::Plain => "```".to_string(),
        }
    }
}

/// Remove ANSI SGR sequences. Handy for comparing rendered output with the
/// text it was produced from.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}
