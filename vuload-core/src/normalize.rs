use regex::Regex;

pub const MAX_NORMALIZED_LEN: usize = 180;
pub const UNKNOWN_ERROR: &str = "unknown_error";

const ELLIPSIS: &str = "...";

/// Collapses free-text error bodies into a bounded vocabulary so that messages differing only
/// in ids or counters aggregate under one key.
#[derive(Debug, Clone)]
pub struct ErrorNormalizer {
    guid: Regex,
    number: Regex,
}

impl ErrorNormalizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            guid: Regex::new(
                r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b",
            )?,
            number: Regex::new(r"\b\d{2,}\b")?,
        })
    }

    pub fn normalize(&self, raw: &str) -> String {
        let mut out = self.pass(raw);
        // A cut at the length limit can leave a fresh word-bounded number behind.
        for _ in 0..4 {
            let next = self.pass(&out);
            if next == out {
                break;
            }
            out = next;
        }
        out
    }

    fn pass(&self, raw: &str) -> String {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            return UNKNOWN_ERROR.to_string();
        }

        let replaced = self.guid.replace_all(&collapsed, "{guid}");
        let replaced = self.number.replace_all(&replaced, "{n}");

        truncate_text(&replaced, MAX_NORMALIZED_LEN)
    }
}

/// Returns `text` unchanged when it has at most `max_chars` characters, otherwise its first
/// `max_chars - 3` characters followed by `...`.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}
