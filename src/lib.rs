//! bioterms: ingestion, storage, auto-complete, and similarity for
//! biomedical terminology vocabularies (HPO, ORDO, SNOMED CT, NCIT, OMIM,
//! HGNC, Ensembl, Reactome, CTV3).
//!
//! # Layout
//!
//! - [`model`] — shared data types: concepts, relationships, annotations,
//!   similarity edges, status records.
//! - [`config`] — environment-driven configuration, loaded once at startup.
//! - [`error`] — the crate-wide error type and retry helper.
//! - [`cancel`] — cooperative cancellation token for long-running ingests.
//! - [`orchestrator`] — per-prefix/per-annotation/per-similarity ingest
//!   workflow, serialized so no two ingests for the same prefix overlap.
//! - [`similarity`] — Relevance and co-annotation-vector similarity over
//!   an ontology DAG.
//! - [`query`] — auto-complete, expansion, similarity, and translation
//!   query surface consumed by an (out-of-scope) transport layer.

pub mod autocomplete;
pub mod cancel;
pub mod config;
pub mod download;
pub mod error;
pub mod loader;
pub mod model;
pub mod orchestrator;
pub mod query;
pub mod similarity;
pub mod store;

pub use cancel::CancellationToken;
pub use config::Config;
pub use error::{BtsError, BtsResult, StatusCategory};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
