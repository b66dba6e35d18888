//! PDF text extraction.

use lopdf::Document;

/// Text pulled out of a PDF
#[derive(Debug, Clone, PartialEq)]
pub struct PdfText {
    pub text: String,
    pub page_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("Failed to parse PDF: {0}")]
    Parse(#[from] lopdf::Error),

    #[error("PDF contains no pages")]
    NoPages,
}

/// Extract the text of every page, each page terminated by a newline,
/// with surrounding whitespace trimmed from the result
///
/// Pages whose text cannot be decoded contribute an empty line rather than
/// failing the whole document.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<PdfText, PdfError> {
    let document = Document::load_mem(bytes)?;
    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(PdfError::NoPages);
    }

    let mut text = String::new();
    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(e) => tracing::debug!(page = page_number, error = %e, "Skipping undecodable page"),
        }
        text.push('\n');
    }

    Ok(PdfText {
        text: text.trim().to_string(),
        page_count: pages.len(),
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::pdf_with_pages;
    use super::*;

    #[test]
    fn test_extracts_text_from_each_page() {
        let bytes = pdf_with_pages(&["Discharge summary", "Follow up in two weeks"]);
        let extracted = extract_pdf_text(&bytes).unwrap();

        assert_eq!(extracted.page_count, 2);
        assert!(extracted.text.contains("Discharge summary"));
        assert!(extracted.text.contains("Follow up in two weeks"));
        assert!(!extracted.text.ends_with('\n'));
    }

    #[test]
    fn test_rejects_non_pdf_bytes() {
        let result = extract_pdf_text(b"definitely not a pdf");
        assert!(matches!(result, Err(PdfError::Parse(_))));
    }
}
