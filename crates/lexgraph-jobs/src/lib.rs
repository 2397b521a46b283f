//! # lexgraph-jobs
//!
//! Task queue worker and document processing pipeline for lexgraph.
//!
//! This crate provides:
//! - The blocking claim → execute → acknowledge worker loop
//! - Stage handlers for text extraction and entity extraction
//! - Progress tracking and notifications via broadcast channels
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use lexgraph_db::Database;
//! use lexgraph_extract::{HttpNerBackend, PdfExtractor};
//! use lexgraph_jobs::{
//!     EntityExtractionHandler, TextExtractionHandler, WorkerBuilder, WorkerConfig,
//! };
//!
//! let db = Database::connect("postgres://...").await?;
//!
//! let worker = WorkerBuilder::new(db.clone())
//!     .with_config(WorkerConfig::from_env())
//!     .with_handler(TextExtractionHandler::new(db.clone(), Arc::new(PdfExtractor::new())))
//!     .build()
//!     .await;
//!
//! // Start worker and get handle
//! let handle = worker.start();
//!
//! // Listen for events
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! // Graceful shutdown
//! handle.shutdown().await?;
//! ```

pub mod entity_extraction;
pub mod handler;
pub mod text_extraction;
pub mod worker;

// Re-export core types
pub use lexgraph_core::*;

// Re-export worker and handler types
pub use entity_extraction::EntityExtractionHandler;
pub use handler::{NoOpHandler, TaskContext, TaskHandler, TaskOutcome};
pub use text_extraction::TextExtractionHandler;
pub use worker::{TaskWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};
