//! Named entity recognition collaborator.
//!
//! `HttpNerBackend` is a client for an NER sidecar service exposing
//! `/extract` and `/health`. Labels outside the closed entity vocabulary
//! are discarded here, at the boundary, so the pipeline only ever sees
//! valid `EntityType`s.
//!
//! # Configuration
//!
//! - `NER_BASE_URL`: base URL of the sidecar. Empty string disables NER.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use lexgraph_core::defaults::{
    ENV_NER_BASE_URL, NER_MAX_NAME_LEN, NER_MAX_TEXT_CHARS, NER_MIN_NAME_LEN, NER_TIMEOUT_SECS,
};
use lexgraph_core::{EntityType, Error, ExtractedEntity, Result};

/// Recognition collaborator: text in, entity mentions out.
#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    /// Extract entity mentions from text, attributing them to
    /// `page_number`.
    async fn extract(&self, text: &str, page_number: i32) -> Result<Vec<ExtractedEntity>>;

    /// Check whether the recognition backend is available.
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// NER sidecar client.
pub struct HttpNerBackend {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
    threshold: Option<f32>,
}

impl HttpNerBackend {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            model: String::new(), // Populated on first health check
            client: reqwest::Client::new(),
            timeout_secs: NER_TIMEOUT_SECS,
            threshold: None,
        }
    }

    /// Create from environment variables.
    /// Returns None if `NER_BASE_URL` is unset or empty.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var(ENV_NER_BASE_URL).unwrap_or_else(|_| String::new());
        if base_url.is_empty() {
            return None;
        }
        Some(Self::new(base_url))
    }

    /// Set the score threshold forwarded to the sidecar.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Request payload for the sidecar `/extract` endpoint.
#[derive(Serialize)]
struct ExtractRequest<'a> {
    text: &'a str,
    entity_types: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    threshold: Option<f32>,
}

/// One mention in the sidecar response.
#[derive(Deserialize)]
struct WireEntity {
    text: String,
    label: String,
    score: f32,
}

/// Response body of the sidecar `/extract` endpoint.
#[derive(Deserialize)]
struct ExtractResponse {
    entities: Vec<WireEntity>,
}

/// Health check response from the sidecar.
#[derive(Deserialize)]
struct HealthResponse {
    status: String,
    #[allow(dead_code)]
    model: String,
}

/// Clamp text to `max` bytes on a char boundary.
fn clamp_text(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[async_trait]
impl EntityRecognizer for HttpNerBackend {
    async fn extract(&self, text: &str, page_number: i32) -> Result<Vec<ExtractedEntity>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let clamped = clamp_text(text, NER_MAX_TEXT_CHARS);
        let url = format!("{}/extract", self.base_url);

        let request = ExtractRequest {
            text: clamped,
            entity_types: EntityType::ALL.iter().map(|t| t.as_str()).collect(),
            threshold: self.threshold,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| Error::Ner(format!("NER request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Ner(format!(
                "NER sidecar returned {}: {}",
                status, body
            )));
        }

        let result: ExtractResponse = response
            .json()
            .await
            .map_err(|e| Error::Ner(format!("Failed to parse NER response: {}", e)))?;

        let mut entities = Vec::new();
        for mention in result.entities {
            let name = mention.text.trim();
            if name.len() < NER_MIN_NAME_LEN || name.len() > NER_MAX_NAME_LEN {
                continue;
            }
            // Labels outside the vocabulary are discarded.
            let Some(entity_type) = EntityType::parse(&mention.label) else {
                warn!(
                    subsystem = "extract",
                    component = "ner",
                    label = %mention.label,
                    "Discarding entity with label outside the vocabulary"
                );
                continue;
            };
            entities.push(ExtractedEntity {
                name: name.to_string(),
                entity_type,
                confidence: mention.score as f64,
                page_number,
            });
        }

        debug!(
            subsystem = "extract",
            component = "ner",
            op = "extract",
            page_number,
            entity_count = entities.len(),
            "Extracted entities"
        );
        Ok(entities)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => {
                if resp.status().is_success() {
                    if let Ok(health) = resp.json::<HealthResponse>().await {
                        if health.status == "healthy" {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }

    fn model_name(&self) -> &str {
        if self.model.is_empty() {
            "ner-sidecar"
        } else {
            &self.model
        }
    }
}

/// Deduplicate mentions by `(lowercased name, type)`, keeping the
/// highest-confidence instance per key. Idempotent: applying it to its own
/// output changes nothing. Output preserves first-encounter order of keys.
pub fn dedupe_entities(entities: Vec<ExtractedEntity>) -> Vec<ExtractedEntity> {
    let mut order: Vec<(String, EntityType)> = Vec::new();
    let mut best: HashMap<(String, EntityType), ExtractedEntity> = HashMap::new();

    for entity in entities {
        let key = (entity.name.to_lowercase(), entity.entity_type);
        match best.get(&key) {
            Some(existing) if existing.confidence >= entity.confidence => {}
            Some(_) => {
                best.insert(key, entity);
            }
            None => {
                order.push(key.clone());
                best.insert(key, entity);
            }
        }
    }

    order
        .into_iter()
        .map(|key| best.remove(&key).expect("key recorded on insert"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(name: &str, entity_type: EntityType, confidence: f64) -> ExtractedEntity {
        ExtractedEntity {
            name: name.to_string(),
            entity_type,
            confidence,
            page_number: 1,
        }
    }

    #[test]
    fn test_clamp_text_short_input_untouched() {
        assert_eq!(clamp_text("hello", 100), "hello");
    }

    #[test]
    fn test_clamp_text_respects_char_boundary() {
        // Multibyte character straddling the cut point.
        let text = "aaé";
        let clamped = clamp_text(text, 3);
        assert_eq!(clamped, "aa");
    }

    #[test]
    fn test_dedupe_keeps_highest_confidence() {
        let input = vec![
            mention("Ramesh Kumar", EntityType::Person, 0.7),
            mention("ramesh kumar", EntityType::Person, 0.95),
            mention("Ramesh Kumar", EntityType::Person, 0.8),
        ];
        let deduped = dedupe_entities(input);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].confidence, 0.95);
        assert_eq!(deduped[0].name, "ramesh kumar");
    }

    #[test]
    fn test_dedupe_distinguishes_types() {
        let input = vec![
            mention("Delhi", EntityType::Location, 0.9),
            mention("Delhi", EntityType::Org, 0.9),
        ];
        assert_eq!(dedupe_entities(input).len(), 2);
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let input = vec![
            mention("A", EntityType::Person, 0.5),
            mention("a", EntityType::Person, 0.9),
            mention("B", EntityType::Org, 0.8),
            mention("B", EntityType::Org, 0.6),
        ];
        let once = dedupe_entities(input);
        let twice = dedupe_entities(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_dedupe_preserves_first_encounter_order() {
        let input = vec![
            mention("Zed", EntityType::Person, 0.9),
            mention("Alpha", EntityType::Person, 0.9),
        ];
        let deduped = dedupe_entities(input);
        assert_eq!(deduped[0].name, "Zed");
        assert_eq!(deduped[1].name, "Alpha");
    }

    #[test]
    fn test_ner_backend_new() {
        let backend = HttpNerBackend::new("http://localhost:8090".to_string());
        assert_eq!(backend.base_url, "http://localhost:8090");
        assert_eq!(backend.timeout_secs, NER_TIMEOUT_SECS);
        assert_eq!(backend.model_name(), "ner-sidecar");
    }

    #[test]
    fn test_extract_request_serialization() {
        let req = ExtractRequest {
            text: "Supreme Court of India heard the petition",
            entity_types: EntityType::ALL.iter().map(|t| t.as_str()).collect(),
            threshold: Some(0.3),
        };

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["text"], "Supreme Court of India heard the petition");
        assert_eq!(json["entity_types"].as_array().unwrap().len(), 5);
        assert!((json["threshold"].as_f64().unwrap() - 0.3).abs() < 0.001);
    }

    #[test]
    fn test_extract_request_no_threshold() {
        let req = ExtractRequest {
            text: "text",
            entity_types: vec!["PERSON"],
            threshold: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("threshold").is_none());
    }

    #[tokio::test]
    async fn test_extract_empty_text_short_circuits() {
        let backend = HttpNerBackend::new("http://localhost:1".to_string());
        // Never touches the network for empty input.
        let result = backend.extract("   ", 1).await.unwrap();
        assert!(result.is_empty());
    }
}
