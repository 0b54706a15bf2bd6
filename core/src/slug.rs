/// Default upper bound for [`slugify`].
pub const DEFAULT_SLUG_LEN: usize = 50;

/// Turn free text into a filename-safe slug.
///
/// Whitespace runs become `-`, everything outside `[a-z0-9-]` is dropped and
/// repeated dashes collapse. Slugs longer than `max_len` are cut back to the
/// last dash when that keeps more than 60% of the budget.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len());
    for word in text.to_lowercase().split_whitespace() {
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.extend(
            word.chars()
                .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'),
        );
    }
    let mut slug = collapse_dashes(&slug);

    if slug.len() > max_len {
        // Only ASCII survives the filter above, so byte offsets are safe.
        slug.truncate(max_len);
        match slug.rfind('-') {
            Some(last_dash) if last_dash as f64 > max_len as f64 * 0.6 => {
                slug.truncate(last_dash);
            }
            _ => {}
        }
    }

    if slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Slug for a model-generated topic line: every run of non-alphanumerics
/// becomes one dash, with no dashes at either end.
pub fn topic_slug(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();
    collapse_dashes(&lowered).trim_matches('-').to_string()
}

fn collapse_dashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out
}
