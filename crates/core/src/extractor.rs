use crate::error::IngestError;
use crate::models::RawPage;
use lopdf::Document;
use std::path::Path;
use tracing::{debug, warn};

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<RawPage>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<RawPage>, IngestError> {
        if !path.exists() {
            return Err(IngestError::MissingInput(path.to_path_buf()));
        }

        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        let total = page_numbers.len();
        let mut pages = Vec::with_capacity(total);

        for page_no in page_numbers {
            match document.extract_text(&[page_no]) {
                Ok(text) => pages.push(RawPage {
                    index: page_no.saturating_sub(1),
                    text,
                }),
                Err(error) => {
                    warn!(page = page_no, %error, "skipping page without extractable text");
                }
            }
        }

        if pages.iter().all(|page| page.text.trim().is_empty()) {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), pages = pages.len(), total, "extracted pdf text");
        Ok(pages)
    }
}

pub fn extract_pages(path: &Path) -> Result<Vec<RawPage>, IngestError> {
    LopdfExtractor.extract_pages(path)
}

/// Concatenates page texts in page order, one newline after each page.
pub fn join_pages(pages: &[RawPage]) -> String {
    let mut ordered: Vec<&RawPage> = pages.iter().collect();
    ordered.sort_by_key(|page| page.index);

    let mut text = String::new();
    for page in ordered {
        if page.text.is_empty() {
            continue;
        }
        text.push_str(&page.text);
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_pdf_is_reported_with_its_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("absent.pdf");

        match extract_pages(&path) {
            Err(IngestError::MissingInput(reported)) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unreadable_pdf_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        assert!(matches!(extract_pages(&path), Err(IngestError::PdfParse(_))));
        Ok(())
    }

    #[test]
    fn pages_are_joined_in_index_order_skipping_empty_ones() {
        let pages = vec![
            RawPage {
                index: 2,
                text: "third".to_string(),
            },
            RawPage {
                index: 0,
                text: "first".to_string(),
            },
            RawPage {
                index: 1,
                text: String::new(),
            },
        ];

        assert_eq!(join_pages(&pages), "first\nthird\n");
    }
}
