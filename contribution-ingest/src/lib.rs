//! Contribution Ingestion Engine
//!
//! Turns raw contribution claims into accept/reject decisions:
//!
//! - **Validate** against the claim's registered schema
//! - **Canonicalize** into deterministic bytes
//! - **Fingerprint** the bytes together with the claimant's identity
//! - **Deduplicate** against a shared index
//!
//! # Key Components
//!
//! - [`IngestionPipeline`]: Runs records through the stages above
//! - [`DedupIndex`]: Trait for the external fingerprint index
//! - [`FingerprintEngine`]: Computes and checks content fingerprints
//! - [`IngestConfig`]: YAML-backed engine configuration
//!
//! # Example
//!
//! ```ignore
//! use contribution_ingest::{IngestConfig, IngestionPipeline, InMemoryDedupIndex};
//!
//! let config = IngestConfig::from_file("ingest.yaml")?;
//! let pipeline = IngestionPipeline::from_config(&config, Arc::new(InMemoryDedupIndex::new()))?;
//!
//! match pipeline.ingest(&raw).await? {
//!     IngestOutcome::Accepted(accepted) => ledger.anchor(accepted.attestation()),
//!     IngestOutcome::Duplicate(dup) => println!("already seen: {}", dup.fingerprint),
//!     IngestOutcome::Rejected(rejected) => report(rejected.errors),
//! }
//! ```

pub mod canonical;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod outcome;
pub mod pipeline;

// Re-export main types
pub use canonical::{canonicalize, canonicalize_payload};
pub use config::IngestConfig;
pub use error::{ConfigError, IndexError, IngestError};
pub use fingerprint::{compute_fingerprint, Fingerprint, FingerprintEngine, FINGERPRINT_DOMAIN};
pub use index::{DedupIndex, InMemoryDedupIndex};
pub use outcome::*;
pub use pipeline::{IngestionPipeline, PipelineState, PipelineStats, SubmissionEnvelope};

pub use contribution_schema as schema;
