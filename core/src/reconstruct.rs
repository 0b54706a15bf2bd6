use crate::think::inside_think_region;
use crate::think::partial_open_tag_len;
use crate::think::strip_think_tags;

/// Accumulates raw stream fragments and hands out only the newly settled,
/// reasoning-free portion of the content.
///
/// Raw text is settled once it sits outside any open reasoning region. The
/// cleaned form of settled text is frozen: a closing tag that arrives later
/// never pairs with an opening tag that was already handed out as text, so
/// the emitted output is always a prefix of [`StreamReconstructor::finalize`].
#[derive(Debug, Default)]
pub struct StreamReconstructor {
    raw: String,
    /// Byte offset into `raw` up to which text has been settled.
    settled_raw: usize,
    /// Cleaned form of `raw[..settled_raw]`, all of it already emitted.
    emitted: String,
}

impl StreamReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return the newly safe-to-emit text, which may be
    /// empty.
    ///
    /// Nothing is returned while a reasoning region is open. A trailing
    /// partial opening tag (`"<thi"`) is held back until a later fragment
    /// shows whether it really starts a region.
    pub fn append(&mut self, fragment: &str) -> String {
        self.raw.push_str(fragment);
        let pending = &self.raw[self.settled_raw..];
        if inside_think_region(pending) {
            return String::new();
        }

        // The held suffix is ASCII, so the cut lands on a char boundary.
        let settle_len = pending.len() - partial_open_tag_len(pending);
        if settle_len == 0 {
            return String::new();
        }
        let delta = strip_think_tags(&pending[..settle_len]);
        self.settled_raw += settle_len;
        self.emitted.push_str(&delta);
        delta
    }

    /// The full cleaned content: the emitted prefix followed by the cleaned
    /// unsettled tail, including a held partial tag or an unterminated
    /// reasoning region.
    pub fn finalize(&self) -> String {
        let mut out = self.emitted.clone();
        out.push_str(&strip_think_tags(&self.raw[self.settled_raw..]));
        out
    }

    /// Hand out whatever `finalize` holds beyond the emitted prefix. Only
    /// meaningful once the stream has ended.
    pub fn drain(&mut self) -> String {
        let rest = strip_think_tags(&self.raw[self.settled_raw..]);
        self.settled_raw = self.raw.len();
        self.emitted.push_str(&rest);
        rest
    }

    /// Whether the unsettled tail currently sits inside an unterminated
    /// reasoning region.
    pub fn in_think_region(&self) -> bool {
        inside_think_region(&self.raw[self.settled_raw..])
    }

    /// Length in bytes of the cleaned text handed out so far.
    pub fn emitted_len(&self) -> usize {
        self.emitted.len()
    }

    pub fn reset(&mut self) {
        self.raw.clear();
        self.settled_raw = 0;
        self.emitted.clear();
    }
}
