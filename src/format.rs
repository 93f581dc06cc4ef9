//! Message text formatting.
//!
//! Backend text is escaped before anything else touches it: terminal control
//! characters (other than newline and tab) are dropped so a reply can't move
//! the cursor or recolour the screen. URL linking then runs on the escaped
//! text only.

use regex::Regex;
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("Invalid URL regex"));

/// A run of message text, either plain or a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Link(&'a str),
}

/// Remove control characters that a terminal would interpret.
pub fn escape(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Split one line of already escaped text into plain and link segments.
pub fn segments(line: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut last = 0;

    for m in URL_PATTERN.find_iter(line) {
        if m.start() > last {
            out.push(Segment::Text(&line[last..m.start()]));
        }
        out.push(Segment::Link(m.as_str()));
        last = m.end();
    }

    if last < line.len() {
        out.push(Segment::Text(&line[last..]));
    }

    out
}

/// All links in a piece of text, in order of appearance.
pub fn links(text: &str) -> impl Iterator<Item = &str> {
    URL_PATTERN.find_iter(text).map(|m| m.as_str())
}
