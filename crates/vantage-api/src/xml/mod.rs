// ── XML plumbing for the config channel ──
//
// Framing is byte-level only; request/response bodies are parsed by the
// config client with quick-xml once a whole frame is in hand.

mod dom;
mod framing;

pub use dom::Element;
pub use framing::{FrameReader, FrameScanner, DEFAULT_MAX_FRAME};

/// Escape the five XML entities (`< > & " '`).
pub fn escape(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}

/// Decode XML entities in `text`.
pub fn unescape(text: &str) -> Result<String, crate::Error> {
    quick_xml::escape::unescape(text)
        .map(|s| s.into_owned())
        .map_err(|e| crate::Error::decode(format!("invalid XML entity: {e}")))
}
