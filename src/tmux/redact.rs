//! Masking of credentials that show up in process command lines.

use regex::Regex;
use std::sync::LazyLock;

const MASK: &str = "[REDACTED]";

// (pattern, keeps separator). Applied in order.
static PATTERNS: LazyLock<Vec<(Regex, bool)>> = LazyLock::new(|| {
    [
        (r"(?i)(authorization\s*:\s*bearer)\s+(\S+)", false),
        (r"(?i)(password|passwd|pwd)\s*([=:])\s*(\S+)", true),
        (r"(?i)(token|secret|api[_-]?key)\s*([=:])\s*(\S+)", true),
        (r"(?i)(bearer)\s+(\S+)", false),
    ]
    .into_iter()
    .filter_map(|(pattern, keyed)| Regex::new(pattern).ok().map(|regex| (regex, keyed)))
    .collect()
});

/// Replace secret-looking values in `text` with `[REDACTED]`.
#[must_use]
pub fn mask_sensitive_text(text: &str) -> String {
    PATTERNS
        .iter()
        .fold(text.to_string(), |masked, (regex, keyed)| {
            let replacement = if *keyed {
                format!("${{1}}${{2}}{MASK}")
            } else {
                format!("${{1}} {MASK}")
            };
            regex.replace_all(&masked, replacement.as_str()).into_owned()
        })
}
