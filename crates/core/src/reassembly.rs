//! Repair of line fragmentation introduced by PDF layout.
//!
//! PDFs hard-wrap prose at the column width and split words with hyphens.
//! [`join_hyphenated`] glues split words back together, then
//! [`ParagraphReassembler`] walks the lines once, merging a line into the
//! previous one when the [`ContinuationRule`] says it resumes mid-sentence.
//!
//! Known limitation: with [`LowercaseContinuation`], a genuine new sentence
//! that starts with a lower-case word is merged into the previous line.

use crate::headings::HeadingClassifier;
use crate::models::LogicalLine;
use crate::noise::LineNoiseFilter;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

pub const DEFAULT_TERMINATORS: [char; 7] = ['.', '!', '?', ':', ')', ']', '"'];

static HYPHEN_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\p{L})-[ \t]*\n[ \t]*").expect("hyphen break pattern is valid")
});

/// Joins words split by a hyphen at the end of a line.
pub fn join_hyphenated(text: &str) -> String {
    HYPHEN_BREAK.replace_all(text, "$1").into_owned()
}

pub trait ContinuationRule: Send + Sync {
    /// Whether `current` resumes the sentence left open by `previous`.
    /// Both are trimmed.
    fn continues(&self, previous: &str, current: &str) -> bool;
}

/// A line continues the previous one when the previous line lacks terminal
/// punctuation and the current line starts lower-case.
#[derive(Debug, Clone)]
pub struct LowercaseContinuation {
    pub terminators: Vec<char>,
}

impl Default for LowercaseContinuation {
    fn default() -> Self {
        Self {
            terminators: DEFAULT_TERMINATORS.to_vec(),
        }
    }
}

impl ContinuationRule for LowercaseContinuation {
    fn continues(&self, previous: &str, current: &str) -> bool {
        let open = previous
            .chars()
            .last()
            .is_some_and(|last| !self.terminators.contains(&last));
        let resumes = current.chars().next().is_some_and(char::is_lowercase);
        open && resumes
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReassemblyStats {
    pub lines_in: usize,
    pub noise_dropped: usize,
    pub headings: usize,
    pub merges: usize,
}

pub struct ParagraphReassembler {
    headings: HeadingClassifier,
    continuation: Box<dyn ContinuationRule>,
    line_noise: LineNoiseFilter,
}

impl ParagraphReassembler {
    pub fn new(
        headings: HeadingClassifier,
        continuation: Box<dyn ContinuationRule>,
        line_noise: LineNoiseFilter,
    ) -> Self {
        Self {
            headings,
            continuation,
            line_noise,
        }
    }

    pub fn reassemble<'a, I>(&self, lines: I) -> Vec<LogicalLine>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.reassemble_with_stats(lines).0
    }

    pub fn reassemble_with_stats<'a, I>(&self, lines: I) -> (Vec<LogicalLine>, ReassemblyStats)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut output: Vec<LogicalLine> = Vec::new();
        let mut stats = ReassemblyStats::default();

        for raw in lines {
            stats.lines_in += 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if self.line_noise.is_noise(line) {
                stats.noise_dropped += 1;
                continue;
            }

            if let Some(heading) = self.headings.classify(line) {
                stats.headings += 1;
                output.push(LogicalLine::Heading(heading));
                continue;
            }

            if let Some(LogicalLine::Body(previous)) = output.last_mut() {
                if self.continuation.continues(previous.trim_end(), line) {
                    previous.push(' ');
                    previous.push_str(line);
                    stats.merges += 1;
                    continue;
                }
            }

            output.push(LogicalLine::Body(line.to_string()));
        }

        debug!(
            lines_in = stats.lines_in,
            lines_out = output.len(),
            noise_dropped = stats.noise_dropped,
            headings = stats.headings,
            merges = stats.merges,
            "reassembled paragraphs"
        );

        (output, stats)
    }
}

impl Default for ParagraphReassembler {
    fn default() -> Self {
        Self::new(
            HeadingClassifier::default(),
            Box::new(LowercaseContinuation::default()),
            LineNoiseFilter::empty(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Heading, HeadingLevel};

    fn body(text: &str) -> LogicalLine {
        LogicalLine::Body(text.to_string())
    }

    #[test]
    fn hyphenated_lines_are_joined_then_merged() {
        let joined = join_hyphenated("This is a sen-\ntence that con-\ntinues here.");
        let lines = ParagraphReassembler::default().reassemble(joined.lines());

        assert_eq!(lines, vec![body("This is a sentence that continues here.")]);
    }

    #[test]
    fn open_line_merges_with_lowercase_continuation() {
        let lines =
            ParagraphReassembler::default().reassemble(["The rule states", "that units must move."]);

        assert_eq!(lines, vec![body("The rule states that units must move.")]);
    }

    #[test]
    fn terminal_punctuation_or_capital_start_begins_new_line() {
        let lines = ParagraphReassembler::default().reassemble([
            "Units must move.",
            "then they shoot",
            "Next sentence starts here",
        ]);

        assert_eq!(
            lines,
            vec![
                body("Units must move."),
                body("then they shoot"),
                body("Next sentence starts here"),
            ]
        );
    }

    #[test]
    fn headings_are_never_merge_targets() {
        let lines =
            ParagraphReassembler::default().reassemble(["", "  MOVEMENT  ", "units advance", "   "]);

        assert_eq!(
            lines,
            vec![
                LogicalLine::Heading(Heading::new(HeadingLevel::Section, "MOVEMENT")),
                body("units advance"),
            ]
        );
    }

    #[test]
    fn long_or_numbered_caps_lines_stay_body_text() {
        let lines = ParagraphReassembler::default().reassemble([
            "FALL WEISS – THE INVASION OF POLAND, SEPTEMBER 1939",
            "A UNIT THAT IS PINNED MUST TAKE A TEST",
            "FIRE AND MANOEUVRE RULES",
            "units may advance.",
        ]);

        assert_eq!(
            lines,
            vec![
                body("FALL WEISS – THE INVASION OF POLAND, SEPTEMBER 1939"),
                body("A UNIT THAT IS PINNED MUST TAKE A TEST"),
                LogicalLine::Heading(Heading::new(
                    HeadingLevel::Section,
                    "Fire And Manoeuvre Rules"
                )),
                body("units may advance."),
            ]
        );
    }

    #[test]
    fn caps_sentence_without_terminator_takes_continuation() {
        let lines = ParagraphReassembler::default()
            .reassemble(["ALL UNITS IN THE OPEN AT LONG RANGE", "suffer a further penalty."]);

        assert_eq!(
            lines,
            vec![body(
                "ALL UNITS IN THE OPEN AT LONG RANGE suffer a further penalty."
            )]
        );
    }

    #[test]
    fn line_noise_is_dropped_before_merging() {
        let reassembler = ParagraphReassembler::new(
            HeadingClassifier::default(),
            Box::new(LowercaseContinuation::default()),
            LineNoiseFilter::with_default_rules().expect("default rules compile"),
        );

        let (lines, stats) = reassembler.reassemble_with_stats([
            "A unit that is",
            "RULES SUMMARY 311",
            "pinned must test.",
        ]);

        assert_eq!(lines, vec![body("A unit that is pinned must test.")]);
        assert_eq!(stats.noise_dropped, 1);
        assert_eq!(stats.merges, 1);
    }

    #[test]
    fn known_limitation_lowercase_sentence_is_merged() {
        let lines = ParagraphReassembler::default().reassemble(["See the table below", "iPhones are banned."]);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn hyphen_join_leaves_dash_lists_alone() {
        assert_eq!(join_hyphenated("Options:\n- rifle\n- smg"), "Options:\n- rifle\n- smg");
        assert_eq!(join_hyphenated("Pin-\n  ned"), "Pinned");
    }
}
