use encoding_rs::UTF_8;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Separates start and end timestamps in a cue timing line
const TIMING_ARROW: &str = "-->";

/// Lines starting with any of these carry file metadata, not cue text
const METADATA_PREFIXES: [&str; 3] = ["WEBVTT", "Kind:", "Language:"];

/// Turns a WebVTT caption file into a deduplicated plain-text transcript
pub struct TranscriptNormalizer {
    /// Inline markup such as `<c>`, `</c>` and `<00:00:01.500>`
    tag_regex: Regex,
}

impl Default for TranscriptNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptNormalizer {
    pub fn new() -> Self {
        let tag_regex = Regex::new(r"<[^>]+>").expect("Valid tag regex");
        Self { tag_regex }
    }

    /// Decode raw caption bytes and normalize them
    pub fn normalize_bytes(&self, raw: &[u8]) -> String {
        let (decoded, _, had_errors) = UTF_8.decode(raw);
        if had_errors {
            warn!("Caption file is not valid UTF-8, replacing malformed sequences");
        }
        self.normalize(&decoded)
    }

    /// Normalize caption text.
    ///
    /// Timing and metadata lines are dropped, markup is stripped, `&amp;`,
    /// `&lt;` and `&gt;` are unescaped, and each cleaned line is kept only the
    /// first time it appears anywhere in the file. Returns an empty string when
    /// nothing survives.
    pub fn normalize(&self, raw: &str) -> String {
        let mut lines = Vec::new();
        let mut seen = HashSet::new();

        for line in raw.lines().map(str::trim) {
            if Self::is_skipped(line) {
                continue;
            }

            let clean = self.clean_line(line);
            if clean.is_empty() || seen.contains(&clean) {
                continue;
            }

            seen.insert(clean.clone());
            lines.push(clean);
        }

        debug!("Normalized transcript to {} unique lines", lines.len());
        lines.join("\n")
    }

    fn is_skipped(line: &str) -> bool {
        line.is_empty()
            || METADATA_PREFIXES
                .iter()
                .any(|prefix| line.starts_with(prefix))
            || line.contains(TIMING_ARROW)
    }

    fn clean_line(&self, line: &str) -> String {
        let stripped = self.tag_regex.replace_all(line, "");
        unescape_entities(&stripped)
    }
}

// Order matters: `&amp;lt;` must become `&lt;`, then `<`.
fn unescape_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}
