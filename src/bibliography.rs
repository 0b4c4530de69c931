use regex::Regex;
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::OnceLock;

/// Citation-like substrings: "Agrippa 1533" or "Paracelsus 16C"
pub const BIBLIO_PATTERN: &str =
    r"([A-Z][A-Za-z\s]+?\s\d{4}|[A-Z][A-Za-z\s]+?\s\d{1,2}C)";

fn biblio_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(BIBLIO_PATTERN).expect("bibliography pattern is valid"))
}

/// Collect every non-overlapping citation in `text`, trimmed, deduplicated and
/// sorted lexicographically.
pub fn extract_references(text: &str) -> Vec<String> {
    let found: BTreeSet<String> = biblio_re()
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    found.into_iter().collect()
}

/// Byte ranges of each citation in `text`, in order
pub fn reference_spans(text: &str) -> Vec<Range<usize>> {
    biblio_re().find_iter(text).map(|m| m.range()).collect()
}
