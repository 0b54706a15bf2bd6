use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
}

impl Citation {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Holds the citation payload of an in-flight response. A newer non-empty
/// payload replaces the previous one wholesale; payloads are never merged.
#[derive(Debug, Default, Clone)]
pub struct LatestCitations {
    latest: Vec<Citation>,
}

impl LatestCitations {
    pub fn observe(&mut self, payload: Vec<Citation>) {
        if !payload.is_empty() {
            self.latest = payload;
        }
    }

    pub fn into_inner(self) -> Vec<Citation> {
        self.latest
    }
}

/// Keep the first citation for each URL, preserving order.
pub fn dedup_by_url(citations: &[Citation]) -> Vec<Citation> {
    let mut seen = std::collections::HashSet::new();
    citations
        .iter()
        .filter(|c| seen.insert(c.url.as_str()))
        .cloned()
        .collect()
}
