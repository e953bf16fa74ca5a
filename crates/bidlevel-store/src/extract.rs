//! Turn raw document bytes into pages, tables and sheets, then into evidence
//! fragments the pipeline can read.

use std::io::Cursor;
use std::sync::LazyLock;

use bidlevel_core::text::join_csv_row;
use bidlevel_core::EvidenceFragment;
use calamine::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::StoreError;

/// Column gap inside a PDF text line: a tab or three-plus spaces.
static COLUMN_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t+|\s{3,}").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Spreadsheet,
    Csv,
    Text,
}

impl DocumentKind {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(Self::Spreadsheet),
            "csv" | "tsv" => Some(Self::Csv),
            "txt" | "text" | "md" => Some(Self::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedPage {
    pub number: u32,
    pub text_blocks: Vec<String>,
    /// table → row → cell
    pub tables: Vec<Vec<Vec<String>>>,
}

impl ExtractedPage {
    /// Page text with tables rendered as CSV rows ahead of the prose, so they
    /// never inherit a section header from the text that follows them.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for table in &self.tables {
            for row in table {
                lines.push(join_csv_row(row));
            }
        }
        lines.extend(self.text_blocks.iter().cloned());
        lines.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetText {
    pub name: String,
    pub csv: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub filename: String,
    #[serde(default)]
    pub pages: Vec<ExtractedPage>,
    #[serde(default)]
    pub sheets: Vec<SheetText>,
}

impl ExtractedDocument {
    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            pages: Vec::new(),
            sheets: Vec::new(),
        }
    }

    /// One fragment per non-blank page and sheet.
    pub fn fragments(&self) -> Vec<EvidenceFragment> {
        let pages = self.pages.iter().map(|page| {
            EvidenceFragment::new(format!("{} p.{}", self.filename, page.number), page.render())
        });
        let sheets = self.sheets.iter().map(|sheet| {
            EvidenceFragment::new(format!("{} [{}]", self.filename, sheet.name), sheet.csv.clone())
        });
        pages.chain(sheets).filter(|f| !f.is_blank()).collect()
    }
}

/// Extract a document by its filename's extension.
pub fn extract_document(bytes: &[u8], filename: &str) -> Result<ExtractedDocument, StoreError> {
    let kind = DocumentKind::from_filename(filename)
        .ok_or_else(|| StoreError::Unsupported(filename.to_string()))?;
    let mut doc = ExtractedDocument::new(filename);
    match kind {
        DocumentKind::Pdf => {
            let pages = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| {
                StoreError::Extraction {
                    filename: filename.to_string(),
                    reason: e.to_string(),
                }
            })?;
            doc.pages = pages
                .iter()
                .enumerate()
                .map(|(i, text)| split_page(i as u32 + 1, text))
                .collect();
        }
        DocumentKind::Spreadsheet => doc.sheets = read_workbook(bytes, filename)?,
        DocumentKind::Csv => doc.sheets.push(SheetText {
            name: "csv".to_string(),
            csv: String::from_utf8_lossy(bytes).into_owned(),
        }),
        DocumentKind::Text => doc.pages.push(split_page(1, &String::from_utf8_lossy(bytes))),
    }
    debug!(
        filename,
        pages = doc.pages.len(),
        sheets = doc.sheets.len(),
        "extracted document"
    );
    Ok(doc)
}

/// Split page text into prose blocks and column-aligned tables.
pub fn split_page(number: u32, text: &str) -> ExtractedPage {
    let mut page = ExtractedPage {
        number,
        ..Default::default()
    };
    let mut block: Vec<&str> = Vec::new();
    let mut table: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        let cells: Vec<String> = COLUMN_GAP
            .split(trimmed)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if cells.len() >= 2 {
            flush_block(&mut block, &mut page.text_blocks);
            table.push(cells);
            continue;
        }
        if !table.is_empty() {
            page.tables.push(std::mem::take(&mut table));
        }
        if trimmed.is_empty() {
            flush_block(&mut block, &mut page.text_blocks);
        } else {
            block.push(trimmed);
        }
    }
    flush_block(&mut block, &mut page.text_blocks);
    if !table.is_empty() {
        page.tables.push(table);
    }
    page
}

fn flush_block(block: &mut Vec<&str>, blocks: &mut Vec<String>) {
    if !block.is_empty() {
        blocks.push(block.join("\n"));
        block.clear();
    }
}

fn read_workbook(bytes: &[u8], filename: &str) -> Result<Vec<SheetText>, StoreError> {
    let extraction = |reason: String| StoreError::Extraction {
        filename: filename.to_string(),
        reason,
    };
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| extraction(e.to_string()))?;

    let sheet_names: Vec<String> = workbook.sheet_names().iter().map(|s| s.to_string()).collect();
    let mut sheets = Vec::new();
    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| extraction(format!("sheet {name}: {e}")))?;
        let rows: Vec<String> = range
            .rows()
            .filter_map(|row| {
                let mut cells: Vec<String> = row.iter().map(|c| c.to_string().trim().to_string()).collect();
                while cells.last().is_some_and(|c| c.is_empty()) {
                    cells.pop();
                }
                (!cells.is_empty()).then(|| join_csv_row(&cells))
            })
            .collect();
        if !rows.is_empty() {
            sheets.push(SheetText {
                name,
                csv: rows.join("\n"),
            });
        }
    }
    Ok(sheets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_by_extension() {
        assert_eq!(DocumentKind::from_filename("Bid.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_filename("pricing.xlsx"), Some(DocumentKind::Spreadsheet));
        assert_eq!(DocumentKind::from_filename("items.csv"), Some(DocumentKind::Csv));
        assert_eq!(DocumentKind::from_filename("notes.txt"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_filename("photo.jpg"), None);
        assert_eq!(DocumentKind::from_filename("README"), None);
    }

    #[test]
    fn page_splits_prose_and_tables() {
        let text = "Scope of Work:\nInstall ductwork throughout\n\nItem    Qty    Price\nBoiler    2    $84,000\nExclusions:\nAsbestos";
        let page = split_page(3, text);
        assert_eq!(page.number, 3);
        assert_eq!(
            page.text_blocks,
            vec!["Scope of Work:\nInstall ductwork throughout", "Exclusions:\nAsbestos"]
        );
        assert_eq!(page.tables.len(), 1);
        assert_eq!(page.tables[0][1], vec!["Boiler", "2", "$84,000"]);
        assert_eq!(
            page.render(),
            "Item,Qty,Price\nBoiler,2,\"$84,000\"\nScope of Work:\nInstall ductwork throughout\nExclusions:\nAsbestos"
        );
    }

    #[test]
    fn text_and_csv_documents() {
        let doc = extract_document(b"Install ductwork throughout", "a.txt").unwrap();
        let fragments = doc.fragments();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].source_name, "a.txt p.1");
        assert_eq!(fragments[0].raw_text, "Install ductwork throughout");

        let doc = extract_document(b"Item,Price\nDuctwork,\"$1,000\"", "b.csv").unwrap();
        let fragments = doc.fragments();
        assert_eq!(fragments[0].source_name, "b.csv [csv]");
        assert!(fragments[0].raw_text.contains("Ductwork"));
    }

    /// A one-page PDF drawing each line in Helvetica.
    fn pdf(lines: &[&str]) -> Vec<u8> {
        let mut content = String::from("BT /F1 12 Tf 72 720 Td");
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                content.push_str(" 0 -16 Td");
            }
            let escaped = line.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)");
            content.push_str(&format!(" ({escaped}) Tj"));
        }
        content.push_str(" ET");

        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
             /Resources << /Font << /F1 5 0 R >> >> >>"
                .to_string(),
            format!("<< /Length {} >>\nstream\n{content}\nendstream", content.len()),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
        }
        let xref_at = out.len();
        let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            tail.push_str(&format!("{offset:010} 00000 n \n"));
        }
        tail.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
            objects.len() + 1
        ));
        out.extend_from_slice(tail.as_bytes());
        out
    }

    #[test]
    fn pdf_pages_become_fragments() {
        let bytes = pdf(&["Scope of Work:", "Install ductwork (galvanized) throughout"]);
        let doc = extract_document(&bytes, "acme.pdf").unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].number, 1);

        let fragments = doc.fragments();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].source_name, "acme.pdf p.1");
        assert!(fragments[0].raw_text.contains("Scope of Work:"));
        assert!(fragments[0].raw_text.contains("Install ductwork (galvanized) throughout"));
    }

    #[test]
    fn blank_documents_have_no_fragments() {
        let doc = extract_document(b"   \n\n  ", "empty.txt").unwrap();
        assert!(doc.fragments().is_empty());
    }

    #[test]
    fn unsupported_and_corrupt_inputs() {
        assert!(matches!(
            extract_document(b"\x89PNG", "site.png"),
            Err(StoreError::Unsupported(_))
        ));
        assert!(matches!(
            extract_document(b"not a pdf", "bid.pdf"),
            Err(StoreError::Extraction { .. })
        ));
        assert!(matches!(
            extract_document(b"not a workbook", "bid.xlsx"),
            Err(StoreError::Extraction { .. })
        ));
    }
}
