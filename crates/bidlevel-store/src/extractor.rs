//! HTTP client for an external document-extraction service.
//!
//! The service takes raw bytes and answers with the same page/sheet shape the
//! local extractor produces.

use serde::Deserialize;
use tracing::info;

use crate::extract::{ExtractedDocument, ExtractedPage, SheetText};
use crate::StoreError;

pub struct RemoteExtractor {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExtractResponse {
    pages: Vec<ExtractedPage>,
    sheets: Vec<SheetText>,
    /// Single-sheet services may answer with bare CSV text.
    csv: Option<String>,
}

impl ExtractResponse {
    fn into_document(self, filename: &str) -> ExtractedDocument {
        let mut doc = ExtractedDocument::new(filename);
        doc.pages = self.pages;
        doc.sheets = self.sheets;
        if let Some(csv) = self.csv.filter(|c| !c.trim().is_empty()) {
            doc.sheets.push(SheetText {
                name: "csv".to_string(),
                csv,
            });
        }
        doc
    }
}

impl RemoteExtractor {
    /// `base_url` should be like `http://localhost:8080` (trailing slash optional).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn extract(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<ExtractedDocument, StoreError> {
        let url = format!("{}/extract", self.base_url);
        info!(url = %url, filename, bytes = bytes.len(), "sending document to extractor");
        let resp = self
            .client
            .post(&url)
            .query(&[("filename", filename)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Extractor {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: ExtractResponse = resp.json().await?;
        Ok(parsed.into_document(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_slash() {
        let client = RemoteExtractor::new("http://localhost:8080/".into());
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn page_response_shape() {
        let json = r#"{"pages": [{"number": 1, "text_blocks": ["Scope:", "Ductwork"], "tables": [[["Boiler", "$84,000"]]]}]}"#;
        let parsed: ExtractResponse = serde_json::from_str(json).unwrap();
        let doc = parsed.into_document("bid.pdf");
        assert_eq!(doc.pages[0].tables[0][0], vec!["Boiler", "$84,000"]);
        let fragments = doc.fragments();
        assert_eq!(fragments[0].source_name, "bid.pdf p.1");
        assert_eq!(fragments[0].raw_text, "Boiler,\"$84,000\"\nScope:\nDuctwork");
    }

    #[test]
    fn csv_response_shape() {
        let parsed: ExtractResponse = serde_json::from_str(r#"{"csv": "Item,Price\nDuctwork,10"}"#).unwrap();
        let doc = parsed.into_document("pricing.xlsx");
        assert_eq!(doc.sheets.len(), 1);
        assert!(doc.pages.is_empty());
    }

    #[tokio::test]
    async fn unreachable_service_is_http_error() {
        let client = RemoteExtractor::new("http://127.0.0.1:9".into());
        let result = client.extract(b"%PDF", "bid.pdf").await;
        assert!(matches!(result, Err(StoreError::Http(_))));
    }
}
