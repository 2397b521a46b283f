//! PDF text extraction — extracts full and per-page text using `pdftotext`
//! (poppler-utils).
//!
//! Page count comes from `pdfinfo`; each page is then extracted separately
//! so downstream NER can attribute entities to pages. Every external
//! invocation is guarded by a per-command timeout.

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use lexgraph_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use lexgraph_core::{DocumentText, Error, PageText, Result, TextExtractor};

/// Text extraction collaborator backed by `pdftotext`.
///
/// Failure modes are distinct by contract: a missing file is
/// `Error::NotFound`, a document that yields no text at all is
/// `Error::Extraction`.
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Read the page count from `pdfinfo` output. Returns 0 when the count
    /// cannot be determined; extraction then falls back to a whole-document
    /// pass.
    async fn page_count(&self, path: &str) -> usize {
        let output = run_cmd_with_timeout(
            Command::new("pdfinfo").arg(path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await;

        match output {
            Ok(text) => parse_page_count(&text),
            Err(e) => {
                warn!(
                    subsystem = "extract",
                    component = "pdf",
                    path,
                    error = %e,
                    "pdfinfo failed, falling back to whole-document extraction"
                );
                0
            }
        }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the `Pages:` line of `pdfinfo` output.
fn parse_page_count(output: &str) -> usize {
    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim() == "Pages" {
                if let Ok(pages) = value.trim().parse::<usize>() {
                    return pages;
                }
            }
        }
    }
    0
}

/// Run a command with a timeout, returning stdout as a string.
async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::Extraction(format!("External command timed out after {}s", timeout_secs))
        })?
        .map_err(|e| Error::Extraction(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extraction(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, file_path: &str) -> Result<DocumentText> {
        let path = std::path::Path::new(file_path);
        if !path.is_file() {
            return Err(Error::NotFound(format!(
                "Document file not found: {}",
                file_path
            )));
        }

        // Validate PDF magic bytes (%PDF) before shelling out.
        let mut header = [0u8; 4];
        let mut file = tokio::fs::File::open(path).await?;
        let read = file.read(&mut header).await?;
        if read < 4 || &header != b"%PDF" {
            return Err(Error::InvalidInput(format!(
                "File '{}' is not a valid PDF (missing %PDF header)",
                file_path
            )));
        }

        let page_count = self.page_count(file_path).await;
        debug!(
            subsystem = "extract",
            component = "pdf",
            op = "extract",
            path = file_path,
            page_count,
            "Extracting text"
        );

        let mut pages: Vec<PageText> = Vec::new();
        if page_count == 0 {
            // Unknown page count: single whole-document pass.
            let text = run_cmd_with_timeout(
                Command::new("pdftotext").arg(file_path).arg("-"),
                EXTRACTION_CMD_TIMEOUT_SECS,
            )
            .await?;
            pages.push(PageText {
                page_number: 1,
                text,
            });
        } else {
            for page in 1..=page_count {
                let text = run_cmd_with_timeout(
                    Command::new("pdftotext")
                        .arg("-f")
                        .arg(page.to_string())
                        .arg("-l")
                        .arg(page.to_string())
                        .arg(file_path)
                        .arg("-"),
                    EXTRACTION_CMD_TIMEOUT_SECS,
                )
                .await?;
                pages.push(PageText {
                    page_number: page as i32,
                    text,
                });
            }
        }

        let full_text = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        if full_text.trim().is_empty() {
            return Err(Error::Extraction(
                "Extraction produced no text".to_string(),
            ));
        }

        Ok(DocumentText { full_text, pages })
    }

    async fn health_check(&self) -> Result<bool> {
        match Command::new("pdftotext").arg("-v").output().await {
            Ok(output) => {
                // pdftotext -v prints version to stderr and exits with 0 or
                // 99 depending on the version. Both indicate the binary
                // exists.
                Ok(output.status.success() || output.status.code() == Some(99))
            }
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "pdf_text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_page_count() {
        let output = "\
Title:          Test Document
Author:         John Doe
Pages:          42
Page size:      612 x 792 pts (letter)
";
        assert_eq!(parse_page_count(output), 42);
    }

    #[test]
    fn test_parse_page_count_missing() {
        assert_eq!(parse_page_count(""), 0);
        assert_eq!(parse_page_count("Pages: not a number"), 0);
    }

    #[test]
    fn test_pdf_extractor_name() {
        assert_eq!(PdfExtractor::new().name(), "pdf_text");
    }

    #[tokio::test]
    async fn test_extract_missing_file_is_not_found() {
        let extractor = PdfExtractor::new();
        let result = extractor.extract("/nonexistent/path/doc.pdf").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_extract_invalid_pdf_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a pdf at all").unwrap();

        let extractor = PdfExtractor::new();
        let result = extractor
            .extract(&file.path().to_string_lossy())
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_health_check_does_not_error() {
        let extractor = PdfExtractor::new();
        // Passes whether or not pdftotext is installed.
        assert!(extractor.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_extract_minimal_pdf() {
        // Minimal valid PDF containing the text "Hello World".
        let pdf_bytes: &[u8] = b"%PDF-1.0
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj

2 0 obj
<< /Type /Pages /Kids [3 0 R] /Count 1 >>
endobj

3 0 obj
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792]
   /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>
endobj

4 0 obj
<< /Length 44 >>
stream
BT /F1 12 Tf 100 700 Td (Hello World) Tj ET
endstream
endobj

5 0 obj
<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>
endobj

xref
0 6
0000000000 65535 f
0000000009 00000 n
0000000058 00000 n
0000000115 00000 n
0000000266 00000 n
0000000360 00000 n

trailer
<< /Size 6 /Root 1 0 R >>
startxref
434
%%EOF";

        let extractor = PdfExtractor::new();
        if !extractor.health_check().await.unwrap_or(false) {
            eprintln!("Skipping test_extract_minimal_pdf: pdftotext not installed");
            return;
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(pdf_bytes).unwrap();

        let result = extractor
            .extract(&file.path().to_string_lossy())
            .await
            .expect("extraction succeeds");
        assert!(result.full_text.contains("Hello World"));
        assert!(!result.pages.is_empty());
        assert_eq!(result.pages[0].page_number, 1);
    }
}
