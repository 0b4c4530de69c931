//! Heading-driven entry segmentation.
//!
//! A page's lines are fed in order. A line that starts with an upper-case
//! heading followed by a short capitalized tag ending in a period opens a new
//! entry; everything after it is description until the next heading or the end
//! of the page.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::bibliography::extract_references;
use crate::model::{Entry, SigilMetadata};

/// Group 1 is the heading, group 2 the classification tag
pub const HEADING_PATTERN: &str = r"^([A-Z0-9][A-Z0-9\s\-,'’]+?)\s+([A-Z][a-z]{1,3}\.)";

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(HEADING_PATTERN).expect("heading pattern is valid"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMatch<'a> {
    pub heading: &'a str,
    pub classification: &'a str,
    /// Text on the same line after the matched prefix, trimmed
    pub remainder: &'a str,
}

pub fn match_heading(line: &str) -> Option<HeadingMatch<'_>> {
    let caps = heading_re().captures(line)?;
    let whole = caps.get(0)?;
    let heading = caps.get(1)?.as_str().trim();
    let classification = caps.get(2)?.as_str().trim();
    Some(HeadingMatch {
        heading,
        classification,
        remainder: line[whole.end()..].trim(),
    })
}

/// What a fed line turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRole {
    Heading,
    Description,
    /// Outside any entry, dropped
    Orphan,
}

#[derive(Debug, Clone)]
struct OpenEntry {
    heading: String,
    classification: String,
    page_number: u32,
    fragments: Vec<String>,
    sigils: Vec<SigilMetadata>,
}

impl OpenEntry {
    fn finalize(self) -> Entry {
        let description = self.fragments.join(" ").trim().to_string();
        let references = extract_references(&description);
        Entry {
            heading: self.heading,
            classification: self.classification,
            description,
            references,
            sigils: self.sigils,
            page_number: self.page_number,
        }
    }
}

#[derive(Debug, Clone)]
enum SegmenterState {
    NoEntry,
    InEntry(OpenEntry),
}

/// Per-page segmentation state machine
#[derive(Debug)]
pub struct EntrySegmenter {
    page_number: u32,
    state: SegmenterState,
    emitted: Vec<Entry>,
}

impl EntrySegmenter {
    pub fn new(page_number: u32) -> Self {
        Self {
            page_number,
            state: SegmenterState::NoEntry,
            emitted: Vec::new(),
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn feed_line(&mut self, line: &str) -> LineRole {
        let line = line.trim();
        if line.is_empty() {
            return LineRole::Orphan;
        }

        if let Some(m) = match_heading(line) {
            self.close_open_entry();
            let mut fragments = Vec::new();
            if !m.remainder.is_empty() {
                fragments.push(m.remainder.to_string());
            }
            debug!(page = self.page_number, heading = m.heading, class = m.classification, "Entry opened");
            self.state = SegmenterState::InEntry(OpenEntry {
                heading: m.heading.to_string(),
                classification: m.classification.to_string(),
                page_number: self.page_number,
                fragments,
                sigils: Vec::new(),
            });
            return LineRole::Heading;
        }

        match &mut self.state {
            SegmenterState::InEntry(open) => {
                open.fragments.push(line.to_string());
                LineRole::Description
            }
            SegmenterState::NoEntry => LineRole::Orphan,
        }
    }

    /// Heading of the entry currently being built, if any
    pub fn open_heading(&self) -> Option<&str> {
        match &self.state {
            SegmenterState::InEntry(open) => Some(open.heading.as_str()),
            SegmenterState::NoEntry => None,
        }
    }

    /// Attach a sigil to the open entry. Returns `false` (and drops the
    /// sigil) when no entry is open at this point of the page.
    pub fn attach_sigil(&mut self, sigil: SigilMetadata) -> bool {
        match &mut self.state {
            SegmenterState::InEntry(open) if open.page_number == sigil.page_number => {
                open.sigils.push(sigil);
                true
            }
            _ => false,
        }
    }

    /// End of page: finalize the open entry and hand back everything
    pub fn finish(mut self) -> Vec<Entry> {
        self.close_open_entry();
        self.emitted
    }

    fn close_open_entry(&mut self) {
        if let SegmenterState::InEntry(open) = std::mem::replace(&mut self.state, SegmenterState::NoEntry) {
            self.emitted.push(open.finalize());
        }
    }
}
