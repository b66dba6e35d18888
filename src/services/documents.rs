//! Retrieval of documents referenced by FHIR `DocumentReference` resources.

use crate::services::fhir_client::FhirClient;
use crate::services::formatting::outcome_text;
use crate::services::pdf::extract_pdf_text;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{info, warn};

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Looks up a `DocumentReference`, downloads its first attachment and
/// optionally extracts PDF text
pub struct DocumentService {
    fhir: Arc<FhirClient>,
}

/// Attachment fields the tool reports on
struct Attachment {
    url: Option<String>,
    inline_data: Option<String>,
    content_type: String,
    title: String,
}

impl Attachment {
    fn from_reference(doc_ref: &Value) -> Result<Self, Value> {
        let first_content = doc_ref
            .get("content")
            .and_then(Value::as_array)
            .and_then(|content| content.first())
            .ok_or_else(|| json!({"error": "No content found in DocumentReference"}))?;

        let attachment = first_content.get("attachment").unwrap_or(&Value::Null);
        let string_field = |name: &str| {
            attachment
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            url: string_field("url"),
            inline_data: string_field("data"),
            content_type: string_field("contentType").unwrap_or_default(),
            title: string_field("title").unwrap_or_else(|| "Unknown".to_string()),
        })
    }
}

impl DocumentService {
    pub fn new(fhir: Arc<FhirClient>) -> Self {
        Self { fhir }
    }

    /// Resolve `DocumentReference/<id>` to its content
    ///
    /// Failures are reported as `{"error": ...}` objects rather than Rust
    /// errors; the result is handed to the model verbatim.
    pub async fn get_document_content(&self, document_reference_id: &str, extract_text: bool) -> Value {
        let doc_ref = self
            .fhir
            .read("DocumentReference", document_reference_id)
            .await;

        if let Some(details) = outcome_text(&doc_ref) {
            return json!({
                "error": "DocumentReference not found",
                "details": details,
            });
        }

        let attachment = match Attachment::from_reference(&doc_ref) {
            Ok(attachment) => attachment,
            Err(error) => return error,
        };

        let (bytes, url) = match (&attachment.url, &attachment.inline_data) {
            (Some(url), _) => match self.fhir.fetch_binary(url).await {
                Ok(content) => (content.bytes, Value::String(url.clone())),
                Err(e) => {
                    warn!(
                        document_reference_id,
                        error = %e,
                        "Document download failed"
                    );
                    return json!({
                        "error": "Failed to download PDF",
                        "details": e.to_string(),
                        "url": url,
                    });
                }
            },
            (None, Some(data)) => match BASE64.decode(data.trim()) {
                Ok(bytes) => (bytes, Value::Null),
                Err(e) => {
                    return json!({
                        "error": "Invalid inline attachment data",
                        "details": e.to_string(),
                    });
                }
            },
            (None, None) => return json!({"error": "No URL found in document attachment"}),
        };

        info!(
            document_reference_id,
            size_bytes = bytes.len(),
            content_type = %attachment.content_type,
            "Document retrieved"
        );

        let mut result = Map::new();
        result.insert("document_reference_id".into(), json!(document_reference_id));
        result.insert("title".into(), json!(attachment.title));
        result.insert("content_type".into(), json!(attachment.content_type));
        result.insert("url".into(), url);
        result.insert("size_bytes".into(), json!(bytes.len()));

        if extract_text && attachment.content_type.eq_ignore_ascii_case(PDF_CONTENT_TYPE) {
            // Parsing is CPU-bound and runs on untrusted bytes; keep it off the worker
            let extraction = tokio::task::spawn_blocking(move || extract_pdf_text(&bytes)).await;
            match extraction {
                Ok(Ok(pdf)) => {
                    result.insert("extracted_text".into(), json!(pdf.text));
                    result.insert("page_count".into(), json!(pdf.page_count));
                }
                Ok(Err(e)) => {
                    result.insert("text_extraction_error".into(), json!(e.to_string()));
                }
                Err(e) => {
                    warn!(document_reference_id, error = %e, "PDF extraction task failed");
                    result.insert(
                        "text_extraction_error".into(),
                        json!(format!("PDF extraction aborted: {e}")),
                    );
                }
            }
        }

        Value::Object(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_requires_content() {
        let err = Attachment::from_reference(&json!({"resourceType": "DocumentReference"}))
            .err()
            .unwrap();
        assert_eq!(err["error"], "No content found in DocumentReference");

        let err = Attachment::from_reference(&json!({"content": []})).err().unwrap();
        assert_eq!(err["error"], "No content found in DocumentReference");
    }

    #[test]
    fn test_attachment_defaults() {
        let attachment =
            Attachment::from_reference(&json!({"content": [{"attachment": {}}]})).unwrap();
        assert!(attachment.url.is_none());
        assert!(attachment.inline_data.is_none());
        assert_eq!(attachment.content_type, "");
        assert_eq!(attachment.title, "Unknown");
    }

    #[test]
    fn test_attachment_fields() {
        let attachment = Attachment::from_reference(&json!({
            "content": [{"attachment": {
                "url": "Binary/1",
                "contentType": "application/pdf",
                "title": "Discharge letter"
            }}]
        }))
        .unwrap();
        assert_eq!(attachment.url.as_deref(), Some("Binary/1"));
        assert_eq!(attachment.content_type, "application/pdf");
        assert_eq!(attachment.title, "Discharge letter");
    }
}
