//! Removal of layout artifacts left by PDF export: running headers and
//! footers, export-tool stamps, date stamps and isolated page numbers.

use crate::error::IngestError;
use regex::{Regex, RegexBuilder};
use tracing::trace;

/// Full-text patterns, applied in order.
pub const DEFAULT_FULL_TEXT_RULES: [&str; 8] = [
    r"BOLT 3rd Edition Layouts Correx\.indd \d+\s*BOLT 3rd Edition Layouts Correx\.indd \d+",
    r"\d{2}/\d{2}/\d{4} \d{2}:\d{2}( \d{2}/\d{2}/\d{4} \d{2}:\d{2})?",
    r"\n\s*Bolt Action V3\s*\n",
    r"\n\s*\d{1,3}\s*Bolt Action V3\s*\n",
    r"\n\s*44mm if 2 lines\s*\n",
    r"^\s*\d{1,3}\s*$",
    r"\n\s*\d{1,3}\s*$",
    r"^BOLT 3rd Edition Layouts Correx\.indd.*$",
];

/// Source identifiers dropped outright before the newline rules run.
pub const DEFAULT_DELETE_RULES: [&str; 1] = [r"\+\]"];

/// Whole-line patterns checked against each trimmed line during reassembly.
pub const DEFAULT_LINE_RULES: [&str; 4] = [
    r"^Bolt Action V3$",
    r"^(RULES SUMMARY|BOLT ACTION)\s+\d+.*$",
    r"^\d+\s+(RULES SUMMARY|BOLT ACTION).*$",
    r"^[\u{F0B7}\u{F0A7}].*$",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseReplacement {
    /// Keeps neighbouring lines apart.
    Newline,
    Delete,
}

impl NoiseReplacement {
    fn as_str(self) -> &'static str {
        match self {
            NoiseReplacement::Newline => "\n",
            NoiseReplacement::Delete => "",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoiseRule {
    pattern: Regex,
    replacement: NoiseReplacement,
}

impl NoiseRule {
    pub fn new(pattern: &str, replacement: NoiseReplacement) -> Result<Self, IngestError> {
        let compiled = RegexBuilder::new(pattern)
            .multi_line(true)
            .case_insensitive(true)
            .build()?;

        if compiled.is_match("") {
            return Err(IngestError::InvalidNoiseRule(pattern.to_string()));
        }

        Ok(Self {
            pattern: compiled,
            replacement,
        })
    }

    fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, self.replacement.as_str())
            .into_owned()
    }
}

/// Ordered full-text noise removal.
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    rules: Vec<NoiseRule>,
}

impl NoiseFilter {
    pub fn new(rules: Vec<NoiseRule>) -> Self {
        Self { rules }
    }

    /// Builds a filter from newline-replacement patterns, preceded by the
    /// default delete rules.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, IngestError> {
        let mut rules = DEFAULT_DELETE_RULES
            .iter()
            .map(|pattern| NoiseRule::new(pattern, NoiseReplacement::Delete))
            .collect::<Result<Vec<_>, _>>()?;

        for pattern in patterns {
            rules.push(NoiseRule::new(pattern.as_ref(), NoiseReplacement::Newline)?);
        }

        Ok(Self::new(rules))
    }

    pub fn with_default_rules() -> Result<Self, IngestError> {
        Self::from_patterns(&DEFAULT_FULL_TEXT_RULES)
    }

    /// Applies every rule in order, repeating the whole pass until a fixed
    /// point so that `clean(clean(x)) == clean(x)`.
    ///
    /// Every rule match is non-empty and is replaced by at most one newline,
    /// so a pass that changes the text strictly lowers `weight`.
    pub fn clean(&self, raw_text: &str) -> String {
        let mut current = raw_text.to_string();
        let mut passes = 0usize;

        loop {
            let next = self
                .rules
                .iter()
                .fold(current.clone(), |text, rule| rule.apply(&text));
            passes += 1;

            if next == current {
                break;
            }
            let shrank = weight(&next) < weight(&current);
            current = next;
            if !shrank {
                break;
            }
        }

        trace!(passes, bytes_in = raw_text.len(), bytes_out = current.len(), "noise filter");
        current
    }
}

fn weight(text: &str) -> (usize, usize) {
    let newlines = text.bytes().filter(|byte| *byte == b'\n').count();
    (text.len() - newlines, text.len())
}

/// Page-local line noise not caught by the full-text pass.
#[derive(Debug, Clone)]
pub struct LineNoiseFilter {
    patterns: Vec<Regex>,
}

impl LineNoiseFilter {
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, IngestError> {
        let patterns = patterns
            .iter()
            .map(|pattern| Regex::new(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn with_default_rules() -> Result<Self, IngestError> {
        Self::from_patterns(&DEFAULT_LINE_RULES)
    }

    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    pub fn is_noise(&self, trimmed_line: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.is_match(trimmed_line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> NoiseFilter {
        NoiseFilter::with_default_rules().expect("default rules compile")
    }

    #[test]
    fn export_stamp_and_dates_are_removed() {
        let raw = "Intro text\nBOLT 3rd Edition Layouts Correx.indd 12 BOLT 3rd Edition Layouts Correx.indd 13\n12/03/2023 10:15 12/03/2023 10:16\nMore text\n";
        let cleaned = filter().clean(raw);

        assert!(!cleaned.contains("Correx"));
        assert!(!cleaned.contains("12/03/2023"));
        assert!(cleaned.contains("Intro text"));
        assert!(cleaned.contains("More text"));
    }

    #[test]
    fn footer_with_page_number_is_removed_without_merging_lines() {
        let raw = "end of a rule.\n 42 Bolt Action V3\nNext rule starts";
        let cleaned = filter().clean(raw);

        assert!(!cleaned.to_lowercase().contains("bolt action v3"));
        assert!(cleaned.contains("end of a rule.\n"));
        assert!(cleaned.contains("Next rule starts"));
    }

    #[test]
    fn isolated_page_numbers_are_removed() {
        let raw = "First paragraph\n43\nSecond paragraph\n  7  ";
        let cleaned = filter().clean(raw);

        assert!(!cleaned.contains("43"));
        assert!(!cleaned.contains('7'));
        assert!(cleaned.contains("First paragraph"));
        assert!(cleaned.contains("Second paragraph"));
    }

    #[test]
    fn numbers_inside_sentences_survive() {
        let raw = "Roll 2 dice and add 1000 points.\n";
        assert_eq!(filter().clean(raw), raw);
    }

    #[test]
    fn clean_is_idempotent() {
        let samples = [
            "1\n2\n3\nText\n",
            "Text\n5",
            "Bolt Action V3\n\n 12 Bolt Action V3\n\nBody\n99",
            "A +]note\n12/03/2023 10:15\n\n\n5\n",
            "",
            "no noise at all",
        ];

        let filter = filter();
        for sample in samples {
            let once = filter.clean(sample);
            let twice = filter.clean(&once);
            assert_eq!(once, twice, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn empty_matching_rule_is_rejected() {
        let result = NoiseRule::new(r"\s*", NoiseReplacement::Newline);
        assert!(matches!(result, Err(IngestError::InvalidNoiseRule(_))));
    }

    #[test]
    fn line_noise_matches_running_headers() {
        let lines = LineNoiseFilter::with_default_rules().expect("default rules compile");

        assert!(lines.is_noise("RULES SUMMARY 311"));
        assert!(lines.is_noise("312 RULES SUMMARY"));
        assert!(lines.is_noise("Bolt Action V3"));
        assert!(!lines.is_noise("RULES SUMMARY"));
        assert!(!lines.is_noise("Units move in the movement phase."));
    }
}
