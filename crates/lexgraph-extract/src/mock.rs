//! Mock collaborators for deterministic testing.
//!
//! Both mocks record their calls and can be scripted to fail, so worker and
//! pipeline tests run without poppler or an NER sidecar.
//!
//! ## Usage
//!
//! ```ignore
//! use lexgraph_extract::mock::MockTextExtractor;
//! use lexgraph_core::TextExtractor;
//!
//! let extractor = MockTextExtractor::with_pages(vec![
//!     (1, "WHEREAS the petitioner Ramesh Kumar...".to_string()),
//! ]);
//! let text = extractor.extract("/data/doc.pdf").await?;
//! assert_eq!(text.pages.len(), 1);
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use lexgraph_core::{DocumentText, Error, ExtractedEntity, PageText, Result, TextExtractor};

use crate::ner::EntityRecognizer;

/// Scripted text extraction collaborator.
#[derive(Clone, Default)]
pub struct MockTextExtractor {
    pages: Vec<PageText>,
    failure: Option<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockTextExtractor {
    /// Mock that returns the given `(page_number, text)` pages.
    pub fn with_pages(pages: Vec<(i32, String)>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|(page_number, text)| PageText { page_number, text })
                .collect(),
            failure: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Mock that fails every extraction with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            pages: Vec::new(),
            failure: Some(message.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// File paths this mock was asked to extract.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock call log poisoned").clone()
    }
}

#[async_trait]
impl TextExtractor for MockTextExtractor {
    async fn extract(&self, file_path: &str) -> Result<DocumentText> {
        self.calls
            .lock()
            .expect("mock call log poisoned")
            .push(file_path.to_string());

        if let Some(message) = &self.failure {
            return Err(Error::Extraction(message.clone()));
        }

        let full_text = self
            .pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(DocumentText {
            full_text,
            pages: self.pages.clone(),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Scripted entity recognition collaborator.
#[derive(Clone, Default)]
pub struct MockEntityRecognizer {
    entities: Vec<ExtractedEntity>,
    failure: Option<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockEntityRecognizer {
    /// Mock that returns the given mentions for every call.
    pub fn with_entities(entities: Vec<ExtractedEntity>) -> Self {
        Self {
            entities,
            failure: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Mock that fails every recognition with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            entities: Vec::new(),
            failure: Some(message.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Texts this mock was asked to analyze.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("mock call log poisoned").clone()
    }
}

#[async_trait]
impl EntityRecognizer for MockEntityRecognizer {
    async fn extract(&self, text: &str, _page_number: i32) -> Result<Vec<ExtractedEntity>> {
        self.calls
            .lock()
            .expect("mock call log poisoned")
            .push(text.to_string());

        if let Some(message) = &self.failure {
            return Err(Error::Ner(message.clone()));
        }
        Ok(self.entities.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexgraph_core::EntityType;

    #[tokio::test]
    async fn test_mock_extractor_returns_pages_and_logs_calls() {
        let extractor = MockTextExtractor::with_pages(vec![
            (1, "page one".to_string()),
            (2, "page two".to_string()),
        ]);

        let text = extractor.extract("/data/a.pdf").await.unwrap();
        assert_eq!(text.full_text, "page one\n\npage two");
        assert_eq!(text.pages.len(), 2);
        assert_eq!(extractor.calls(), vec!["/data/a.pdf"]);
    }

    #[tokio::test]
    async fn test_mock_extractor_failure() {
        let extractor = MockTextExtractor::failing("scanner on fire");
        let result = extractor.extract("/data/a.pdf").await;
        assert!(matches!(result, Err(Error::Extraction(_))));
    }

    #[tokio::test]
    async fn test_mock_recognizer_returns_scripted_entities() {
        let recognizer = MockEntityRecognizer::with_entities(vec![ExtractedEntity {
            name: "Delhi High Court".to_string(),
            entity_type: EntityType::Court,
            confidence: 0.9,
            page_number: 1,
        }]);

        let entities = recognizer.extract("some text", 1).await.unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(recognizer.calls(), vec!["some text"]);
    }

    #[tokio::test]
    async fn test_mock_recognizer_failure() {
        let recognizer = MockEntityRecognizer::failing("sidecar down");
        let result = recognizer.extract("text", 1).await;
        assert!(matches!(result, Err(Error::Ner(_))));
    }
}
