//! Pattern list parsing and matching
//!
//! Pattern lists are edited as free text: one entry per line, and for lists
//! that allow it, also comma-separated. Entries keep the spelling they were
//! entered with; all comparisons go through [`normalize`].

use std::collections::HashSet;

/// Trim and lowercase a value for comparison.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Counters collected while parsing a pattern list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: usize,
    pub entries: usize,
    pub duplicates: usize,
}

/// Ordered, duplicate-free list of patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    entries: Vec<String>,
    /// Normalized form of every entry, for dedupe and lookup
    keys: HashSet<String>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pattern. Blank values and normalized duplicates are ignored.
    pub fn insert(&mut self, value: &str) -> bool {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return false;
        }
        if !self.keys.insert(normalize(trimmed)) {
            return false;
        }
        self.entries.push(trimmed.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.keys.clear();
    }

    /// Case-insensitive, whitespace-trimmed equality against any entry.
    pub fn contains_exact(&self, value: &str) -> bool {
        let key = normalize(value);
        !key.is_empty() && self.keys.contains(&key)
    }

    /// First entry the value starts with, compared case-insensitively.
    pub fn matches_prefix(&self, value: &str) -> Option<&str> {
        let subject = normalize(value);
        if subject.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| subject.starts_with(&normalize(entry)))
            .map(String::as_str)
    }

    /// Serialize back to free text, one entry per line.
    pub fn to_text(&self) -> String {
        self.entries.join("\n")
    }

    /// Order-independent comparison on normalized entries.
    pub fn equivalent(&self, other: &PatternSet) -> bool {
        self.keys == other.keys
    }
}

impl<'a> FromIterator<&'a str> for PatternSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = PatternSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

/// Where a free-text pattern list is split into entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separators {
    /// One entry per line; commas belong to the entry
    Lines,
    /// Line breaks and commas both separate entries
    LinesAndCommas,
}

impl Separators {
    /// Whether `value` cannot survive being written out and parsed back as
    /// a single entry.
    pub fn splits(self, value: &str) -> bool {
        value.contains(&['\n', '\r'][..]) || (self == Self::LinesAndCommas && value.contains(','))
    }
}

/// Parse a free-text pattern list, splitting on line breaks and commas.
pub fn parse_pattern_list(text: &str) -> PatternSet {
    parse_pattern_list_with_stats(text, Separators::LinesAndCommas).0
}

/// Parse a free-text pattern list, also returning parse counters.
pub fn parse_pattern_list_with_stats(text: &str, separators: Separators) -> (PatternSet, ParseStats) {
    let mut set = PatternSet::new();
    let mut stats = ParseStats::default();

    let split_commas = separators == Separators::LinesAndCommas;

    // `lines()` also strips a trailing '\r'
    for line in text.lines() {
        stats.lines += 1;
        for raw in line.split(|c: char| split_commas && c == ',') {
            let entry = raw.trim();
            if entry.is_empty() {
                continue;
            }
            stats.entries += 1;
            if !set.insert(entry) {
                stats.duplicates += 1;
            }
        }
    }

    (set, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines_and_commas() {
        let set = parse_pattern_list("ZDF, ARD\r\n\n  arte  \n,,");
        let entries: Vec<_> = set.iter().collect();
        assert_eq!(entries, vec!["ZDF", "ARD", "arte"]);
    }

    #[test]
    fn test_parse_dedupes_on_normalized_form() {
        let (set, stats) = parse_pattern_list_with_stats("Tatort\ntatort \nTATORT,Polizeiruf", Separators::LinesAndCommas);
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().next(), Some("Tatort"));
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.entries, 4);
        assert_eq!(stats.duplicates, 2);
    }

    #[test]
    fn test_blank_entries_never_stored() {
        let mut set = PatternSet::new();
        assert!(!set.insert("   "));
        assert!(!set.insert(""));
        assert!(set.is_empty());
        assert!(parse_pattern_list(" \n , \n").is_empty());
    }

    #[test]
    fn test_contains_exact() {
        let set = parse_pattern_list("zdf");
        assert!(set.contains_exact("ZDF"));
        assert!(set.contains_exact("  Zdf "));
        assert!(!set.contains_exact("ZDFneo"));
        assert!(!set.contains_exact(""));
    }

    #[test]
    fn test_matches_prefix() {
        let set = parse_pattern_list("Spielfilm:\nDer junge Inspektor Morse:");
        assert_eq!(set.matches_prefix("spielfilm: Die Brücke"), Some("Spielfilm:"));
        assert_eq!(set.matches_prefix("Der Junge Inspektor Morse: Folge 3"), Some("Der junge Inspektor Morse:"));
        assert_eq!(set.matches_prefix("Ein Spielfilm: X"), None);
        assert_eq!(set.matches_prefix(""), None);
    }

    #[test]
    fn test_prefix_has_no_wildcards() {
        let set = parse_pattern_list("Die *");
        assert_eq!(set.matches_prefix("Die Brücke"), None);
        assert_eq!(set.matches_prefix("Die * Sterne"), Some("Die *"));
    }

    #[test]
    fn test_text_roundtrip_is_equivalent() {
        let set = parse_pattern_list("b, a\nc");
        let again = parse_pattern_list(&set.to_text());
        assert_eq!(set, again);
        assert!(again.equivalent(&parse_pattern_list("C\nA\nb")));
    }

    #[test]
    fn test_line_separated_lists_keep_commas() {
        let (set, stats) = parse_pattern_list_with_stats("Hello, World\nTatort,\n hello, world ", Separators::Lines);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["Hello, World", "Tatort,"]);
        assert_eq!(stats.duplicates, 1);

        let again = parse_pattern_list_with_stats(&set.to_text(), Separators::Lines).0;
        assert!(again.equivalent(&set));
    }

    #[test]
    fn test_separators_splits() {
        assert!(Separators::LinesAndCommas.splits("a, b"));
        assert!(!Separators::Lines.splits("a, b"));
        assert!(Separators::Lines.splits("a\nb"));
        assert!(Separators::Lines.splits("a\r"));
        assert!(!Separators::LinesAndCommas.splits("Spielfilm:"));
    }
}
