//! Structural heading detection.
//!
//! A [`HeadingClassifier`] is an ordered chain of [`HeadingRule`]s; the first
//! rule that accepts a line decides its level and rendered text. Rules only
//! see the trimmed line.

use crate::models::{Heading, HeadingLevel};

pub const DEFAULT_MAJOR_TITLES: [&str; 24] = [
    "INTRODUCTION",
    "CONTENTS",
    "WARGAMES AND HISTORY",
    "BASIC SUPPLIES",
    "CONVENTIONS OF WAR",
    "UNITS",
    "THE TURN",
    "ORDERS",
    "MOVEMENT",
    "SHOOTING",
    "WEAPONS",
    "CLOSE QUARTERS",
    "HEADQUARTERS",
    "ARTILLERY",
    "VEHICLES",
    "BUILDINGS",
    "ARRANGING A GAME OF BOLT ACTION",
    "FORCE SELECTION",
    "ARMY LISTS",
    "OPTIONAL RULES",
    "COMMON TRANSPORT VEHICLES",
    "RULES SUMMARY",
    "CREDITS",
    "INDEX",
];

pub const DEFAULT_FACTION_TITLES: [&str; 5] = [
    "GERMANY",
    "UNITED STATES",
    "GREAT BRITAIN",
    "SOVIET UNION",
    "IMPERIAL JAPAN",
];

pub const DEFAULT_FACTION_PREFIX: &str = "ARMIES OF ";
pub const DEFAULT_UPPERCASE_MAX_CHARS: usize = 70;
pub const DEFAULT_UPPERCASE_MIN_WORDS: usize = 3;
pub const DEFAULT_SHORT_HEADING_MAX_WORDS: usize = 7;

pub trait HeadingRule: Send + Sync {
    fn classify(&self, stripped: &str) -> Option<Heading>;
}

/// Exact, case-sensitive membership in the known title vocabularies.
#[derive(Debug, Clone)]
pub struct VocabularyRule {
    pub major_titles: Vec<String>,
    pub faction_titles: Vec<String>,
    pub faction_prefix: String,
}

impl Default for VocabularyRule {
    fn default() -> Self {
        Self {
            major_titles: DEFAULT_MAJOR_TITLES.iter().map(|t| t.to_string()).collect(),
            faction_titles: DEFAULT_FACTION_TITLES
                .iter()
                .map(|t| t.to_string())
                .collect(),
            faction_prefix: DEFAULT_FACTION_PREFIX.to_string(),
        }
    }
}

impl HeadingRule for VocabularyRule {
    fn classify(&self, stripped: &str) -> Option<Heading> {
        if self.major_titles.iter().any(|title| title == stripped) {
            return Some(Heading::new(HeadingLevel::Section, stripped));
        }

        if self.faction_titles.iter().any(|title| title == stripped) {
            return Some(Heading::new(
                HeadingLevel::Section,
                format!("{}{}", self.faction_prefix, stripped),
            ));
        }

        None
    }
}

/// Longer all-caps lines such as campaign titles become subsections. Lines
/// with `min_words` words or fewer are left alone: they are mostly acronyms
/// and unit codes.
#[derive(Debug, Clone, Copy)]
pub struct UppercaseRule {
    pub max_chars: usize,
    pub min_words: usize,
}

impl Default for UppercaseRule {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_UPPERCASE_MAX_CHARS,
            min_words: DEFAULT_UPPERCASE_MIN_WORDS,
        }
    }
}

impl HeadingRule for UppercaseRule {
    fn classify(&self, stripped: &str) -> Option<Heading> {
        let accepted = is_upper(stripped)
            && stripped.chars().count() < self.max_chars
            && !is_numeric(stripped)
            && word_count(stripped) > self.min_words;

        accepted.then(|| Heading::new(HeadingLevel::Subsection, stripped))
    }
}

/// Short all-caps lines without digits, rendered in title case.
#[derive(Debug, Clone, Copy)]
pub struct ShortHeadingRule {
    pub max_words: usize,
}

impl Default for ShortHeadingRule {
    fn default() -> Self {
        Self {
            max_words: DEFAULT_SHORT_HEADING_MAX_WORDS,
        }
    }
}

impl HeadingRule for ShortHeadingRule {
    fn classify(&self, stripped: &str) -> Option<Heading> {
        let accepted = is_upper(stripped)
            && word_count(stripped) < self.max_words
            && !stripped.chars().any(|c| c.is_ascii_digit());

        accepted.then(|| Heading::new(HeadingLevel::Section, title_case(stripped)))
    }
}

pub struct HeadingClassifier {
    rules: Vec<Box<dyn HeadingRule>>,
}

impl HeadingClassifier {
    pub fn new(rules: Vec<Box<dyn HeadingRule>>) -> Self {
        Self { rules }
    }

    /// Chain used while rebuilding paragraphs: vocabulary, then the strict
    /// short all-caps test. Longer or digit-bearing all-caps lines stay body
    /// text so that they can merge.
    pub fn for_reassembly(vocabulary: VocabularyRule, short: ShortHeadingRule) -> Self {
        Self::new(vec![Box::new(vocabulary), Box::new(short)])
    }

    pub fn classify(&self, line: &str) -> Option<Heading> {
        let stripped = line.trim();
        if stripped.is_empty() {
            return None;
        }

        self.rules.iter().find_map(|rule| rule.classify(stripped))
    }
}

impl Default for HeadingClassifier {
    fn default() -> Self {
        Self::for_reassembly(VocabularyRule::default(), ShortHeadingRule::default())
    }
}

/// Level of `line` under the default vocabularies and an upper-case rule
/// requiring more than `word_count_threshold` words.
pub fn classify(line: &str, word_count_threshold: usize) -> Option<HeadingLevel> {
    let classifier = HeadingClassifier::new(vec![
        Box::new(VocabularyRule::default()),
        Box::new(UppercaseRule {
            max_chars: DEFAULT_UPPERCASE_MAX_CHARS,
            min_words: word_count_threshold,
        }),
    ]);
    classifier.classify(line).map(|heading| heading.level)
}

/// At least one cased character and no lower-case ones.
pub fn is_upper(text: &str) -> bool {
    let mut has_cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_numeric())
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the
/// rest.
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous_is_letter = false;

    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            result.push(c);
            previous_is_letter = false;
        }
    }

    result
}
