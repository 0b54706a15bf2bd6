//! Helpers for the `<think>...</think>` reasoning regions emitted by
//! reasoning models.
//!
//! Tags are matched case-sensitively. A region is only considered complete
//! once its closing tag has arrived; an opening tag is paired with the nearest
//! closing tag that follows it.

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

/// Returns `true` when more reasoning regions have been opened than closed.
pub fn inside_think_region(text: &str) -> bool {
    text.matches(THINK_OPEN).count() > text.matches(THINK_CLOSE).count()
}

/// Remove every complete reasoning region. Unterminated regions are kept
/// verbatim.
pub fn strip_think_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for_each_segment(text, |segment| match segment {
        Segment::Visible(s) => out.push_str(s),
        Segment::Thinking(_) => {}
    });
    out
}

/// Split `content` into the visible answer and the concatenated reasoning,
/// both trimmed. Returns `None` for the reasoning when no complete region was
/// present or all regions were blank.
pub fn extract_thinking(content: &str) -> (String, Option<String>) {
    let mut visible = String::with_capacity(content.len());
    let mut thinking: Vec<&str> = Vec::new();
    for_each_segment(content, |segment| match segment {
        Segment::Visible(s) => visible.push_str(s),
        Segment::Thinking(s) => {
            let s = s.trim();
            if !s.is_empty() {
                thinking.push(s);
            }
        }
    });

    let thinking = if thinking.is_empty() {
        None
    } else {
        Some(thinking.join("\n\n"))
    };
    (visible.trim().to_string(), thinking)
}

/// Length in bytes of the longest suffix of `text` that is a proper prefix of
/// the opening tag, e.g. `3` for `"Hello <th"`.
pub(crate) fn partial_open_tag_len(text: &str) -> usize {
    (1..THINK_OPEN.len())
        .rev()
        .find(|&n| text.ends_with(&THINK_OPEN[..n]))
        .unwrap_or(0)
}

enum Segment<'a> {
    Visible(&'a str),
    Thinking(&'a str),
}

fn for_each_segment<'a>(text: &'a str, mut f: impl FnMut(Segment<'a>)) {
    let mut rest = text;
    loop {
        let Some(open) = rest.find(THINK_OPEN) else {
            f(Segment::Visible(rest));
            return;
        };
        let inner_start = open + THINK_OPEN.len();
        let Some(close) = rest[inner_start..].find(THINK_CLOSE) else {
            f(Segment::Visible(rest));
            return;
        };
        let inner_end = inner_start + close;
        f(Segment::Visible(&rest[..open]));
        f(Segment::Thinking(&rest[inner_start..inner_end]));
        rest = &rest[inner_end + THINK_CLOSE.len()..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_complete_regions_only() {
        assert_eq!(strip_think_tags("a<think>x</think>b"), "ab");
        assert_eq!(
            strip_think_tags("a<think>x</think>b<think>y</think>c"),
            "abc"
        );
        assert_eq!(strip_think_tags("a<think>never closed"), "a<think>never closed");
    }

    #[test]
    fn pairs_open_with_nearest_close() {
        assert_eq!(
            strip_think_tags("<think>a<think>b</think>c</think>"),
            "c</think>"
        );
    }

    #[test]
    fn stray_close_tag_is_visible() {
        assert_eq!(strip_think_tags("x</think>y"), "x</think>y");
        assert!(!inside_think_region("</think><think>"));
    }

    #[test]
    fn region_state_counts_tags() {
        assert!(!inside_think_region("plain"));
        assert!(inside_think_region("a <think> b"));
        assert!(!inside_think_region("a <think> b </think>"));
        assert!(inside_think_region("<think></think><think>"));
    }

    #[test]
    fn extracts_reasoning_and_answer() {
        let (content, thinking) =
            extract_thinking("<think>\nweigh options\n</think>\n\nThe answer is 4.");
        assert_eq!(content, "The answer is 4.");
        assert_eq!(thinking.as_deref(), Some("weigh options"));

        let (content, thinking) = extract_thinking("  no reasoning here ");
        assert_eq!(content, "no reasoning here");
        assert_eq!(thinking, None);
    }

    #[test]
    fn partial_open_tag_suffix() {
        assert_eq!(partial_open_tag_len("Hello <thi"), 4);
        assert_eq!(partial_open_tag_len("Hello <"), 1);
        assert_eq!(partial_open_tag_len("Hello <think>"), 0);
        assert_eq!(partial_open_tag_len("Hello"), 0);
        assert_eq!(partial_open_tag_len(""), 0);
    }
}
