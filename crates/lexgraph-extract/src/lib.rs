//! # lexgraph-extract
//!
//! The pipeline's two external collaborators, behind traits:
//!
//! - Text extraction: [`PdfExtractor`] shells out to `pdftotext`
//!   (poppler-utils) and returns full plus per-page text.
//! - Entity recognition: [`HttpNerBackend`] talks to an NER sidecar over
//!   HTTP and filters its labels down to the closed entity vocabulary.
//!
//! Deterministic mock implementations live in [`mock`] for worker and
//! pipeline tests.

pub mod mock;
pub mod ner;
pub mod pdf;

pub use mock::{MockEntityRecognizer, MockTextExtractor};
pub use ner::{dedupe_entities, EntityRecognizer, HttpNerBackend};
pub use pdf::PdfExtractor;
