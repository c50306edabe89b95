use crate::config::AppConfig;
use crate::error::IngestError;
use crate::extractor::join_pages;
use crate::formatter::MarkdownFormatter;
use crate::headings::{HeadingClassifier, ShortHeadingRule};
use crate::models::{Document, RawPage};
use crate::noise::{LineNoiseFilter, NoiseFilter};
use crate::reassembly::{join_hyphenated, LowercaseContinuation, ParagraphReassembler};
use tracing::debug;

/// Raw page text to normalized [`Document`]: noise removal, hyphenation
/// repair, paragraph reassembly with inline heading detection, Markdown
/// formatting.
pub struct TextPipeline {
    noise: NoiseFilter,
    reassembler: ParagraphReassembler,
    formatter: MarkdownFormatter,
}

impl TextPipeline {
    pub fn new(
        noise: NoiseFilter,
        reassembler: ParagraphReassembler,
        formatter: MarkdownFormatter,
    ) -> Self {
        Self {
            noise,
            reassembler,
            formatter,
        }
    }

    pub fn with_default_rules() -> Result<Self, IngestError> {
        Ok(Self::new(
            NoiseFilter::with_default_rules()?,
            ParagraphReassembler::new(
                HeadingClassifier::default(),
                Box::new(LowercaseContinuation::default()),
                LineNoiseFilter::with_default_rules()?,
            ),
            MarkdownFormatter,
        ))
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, IngestError> {
        let headings = &config.headings;
        let classifier = HeadingClassifier::for_reassembly(
            headings.vocabulary(),
            ShortHeadingRule {
                max_words: headings.short_heading_max_words,
            },
        );

        Ok(Self::new(
            NoiseFilter::from_patterns(&config.noise.full_text)?,
            ParagraphReassembler::new(
                classifier,
                Box::new(LowercaseContinuation::default()),
                LineNoiseFilter::from_patterns(&config.noise.lines)?,
            ),
            MarkdownFormatter,
        ))
    }

    pub fn process_text(&self, raw_text: &str) -> Document {
        let cleaned = self.noise.clean(raw_text);
        let joined = join_hyphenated(&cleaned);
        let lines = self.reassembler.reassemble(joined.lines());
        let document = self.formatter.format(&lines);

        debug!(
            raw_chars = raw_text.len(),
            cleaned_chars = cleaned.len(),
            logical_lines = lines.len(),
            headings = document.heading_count,
            document_chars = document.text.len(),
            "normalized document"
        );

        document
    }

    pub fn process_pages(&self, pages: &[RawPage]) -> Document {
        self.process_text(&join_pages(pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(index: u32, text: &str) -> RawPage {
        RawPage {
            index,
            text: text.to_string(),
        }
    }

    #[test]
    fn three_page_extraction_is_cleaned_end_to_end() {
        let pages = vec![
            page(
                0,
                "RULES SUMMARY\nThe turn is split into\nseveral phases.\nRULES SUMMARY 42\n",
            ),
            page(1, "43\nEach unit re-\nceives one order.\n12/03/2023 10:15\n"),
            page(2, "GERMANY\nGerman units use\nspecial rules.\n 44 Bolt Action V3\n"),
        ];

        let pipeline = TextPipeline::with_default_rules().expect("default rules compile");
        let document = pipeline.process_pages(&pages);

        assert!(!document.text.contains("RULES SUMMARY 42"));
        assert!(!document.text.contains("43"));
        assert!(!document.text.contains("Bolt Action V3"));
        assert_eq!(
            document.text,
            "## RULES SUMMARY\n\nThe turn is split into several phases.\nEach unit receives one order.\n\n## ARMIES OF GERMANY\n\nGerman units use special rules."
        );
        assert_eq!(document.heading_count, 2);
    }

    #[test]
    fn document_invariants_hold() {
        let raw = "\n\n\nINTRODUCTION\n\n\n\nSome   text\twith spacing\n\n\n\nFALL WEISS – THE INVASION OF POLAND, SEPTEMBER 1939\nmore text follows.\n\n\n";
        let pipeline = TextPipeline::with_default_rules().expect("default rules compile");
        let document = pipeline.process_text(raw);

        assert!(!document.text.contains("\n\n\n"));
        assert!(!document.text.starts_with('\n'));
        assert!(!document.text.ends_with('\n'));
        assert!(!document.text.contains("  "));
        assert!(document.text.starts_with("## INTRODUCTION\n\n"));
        assert!(!document.text.contains("###"));
        assert!(document
            .text
            .ends_with("FALL WEISS – THE INVASION OF POLAND, SEPTEMBER 1939 more text follows."));
    }

    #[test]
    fn short_caps_line_becomes_title_cased_section() {
        let pipeline = TextPipeline::with_default_rules().expect("default rules compile");
        let document = pipeline.process_text(
            "FIRE AND MANOEUVRE RULES\nA UNIT THAT IS PINNED MUST TAKE A TEST\nbefore it acts.\n",
        );

        assert_eq!(
            document.text,
            "## Fire And Manoeuvre Rules\n\nA UNIT THAT IS PINNED MUST TAKE A TEST before it acts."
        );
        assert_eq!(document.heading_count, 1);
    }

    #[test]
    fn configured_vocabulary_replaces_defaults() {
        let mut config = AppConfig::default();
        config.headings.major_titles = vec!["RÈGLES".to_string()];
        config.headings.faction_titles = vec!["FRANCE".to_string()];
        config.headings.faction_prefix = "ARMÉES DE ".to_string();

        let pipeline = TextPipeline::from_config(&config).expect("config rules compile");
        let document = pipeline.process_text("RÈGLES\ntexte\nFRANCE\n");

        assert_eq!(document.text, "## RÈGLES\n\ntexte\n\n## ARMÉES DE FRANCE");
    }
}
