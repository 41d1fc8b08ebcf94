//! Ingestion pipeline.
//!
//! Each submitted record runs through
//! `Received → Validating → {Rejected | Validated} → Canonicalized →
//! Fingerprinted → {Duplicate | Accepted}`. Validation, canonicalization
//! and hashing are synchronous; only the dedup index is awaited.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use contribution_schema::{
    envelope, ClaimExcerpt, ClaimRejection, FieldError, FieldPath, SchemaValidator,
    TypeRegistry, ValidatedClaim, WalletAddress, WarningKind,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::canonical::canonicalize;
use crate::config::IngestConfig;
use crate::error::{ConfigError, IndexError, IngestError, Result};
use crate::fingerprint::{Fingerprint, FingerprintEngine};
use crate::index::DedupIndex;
use crate::outcome::{
    AcceptedContribution, DuplicateContribution, IngestOutcome, RejectedContribution,
};

/// Stage of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineState {
    Received,
    Validating,
    Rejected,
    Validated,
    Canonicalized,
    Fingerprinted,
    Duplicate,
    Accepted,
}

impl PipelineState {
    /// Whether the run ends here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Duplicate | Self::Accepted)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_advance_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Received, Validating)
                | (Validating, Rejected)
                | (Validating, Validated)
                | (Validated, Canonicalized)
                | (Canonicalized, Fingerprinted)
                | (Fingerprinted, Duplicate)
                | (Fingerprinted, Accepted)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Snapshot of pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub accepted: u64,
    pub rejected: u64,
    pub duplicate: u64,
    /// Runs that ended in `IndexUnavailable`
    pub index_failures: u64,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    duplicate: AtomicU64,
    index_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            duplicate: self.duplicate.load(Ordering::Relaxed),
            index_failures: self.index_failures.load(Ordering::Relaxed),
        }
    }
}

/// A submission as received: one record, or a batch for one wallet.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionEnvelope {
    /// A lone contribution record
    Single(Value),
    /// `{walletAddress, claimDate, contributions: [...]}`
    Batch {
        wallet_address: WalletAddress,
        /// Batch-level date, informational only
        claim_date: Option<String>,
        contributions: Vec<Value>,
    },
}

impl SubmissionEnvelope {
    /// Recognise a batch envelope or a single record.
    pub fn from_value(raw: Value) -> Result<Self> {
        let Value::Object(mut members) = raw else {
            return Err(IngestError::MalformedSubmission(
                "submission is not a JSON object".to_string(),
            ));
        };

        let Some(contributions) = members.remove("contributions") else {
            return Ok(Self::Single(Value::Object(members)));
        };

        let Value::Array(contributions) = contributions else {
            return Err(IngestError::MalformedSubmission(
                "`contributions` is not an array".to_string(),
            ));
        };

        let wallet_address = members
            .get(envelope::WALLET_ADDRESS)
            .and_then(Value::as_str)
            .and_then(WalletAddress::parse)
            .ok_or_else(|| {
                IngestError::MalformedSubmission(
                    "batch `walletAddress` is missing or malformed".to_string(),
                )
            })?;

        let claim_date = members
            .get("claimDate")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self::Batch {
            wallet_address,
            claim_date,
            contributions,
        })
    }

    /// Number of contribution records.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch { contributions, .. } => contributions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One record's trip through the state machine.
struct Run {
    submission_id: Uuid,
    state: PipelineState,
}

impl Run {
    fn new() -> Self {
        Self {
            submission_id: Uuid::new_v4(),
            state: PipelineState::Received,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(
            submission_id = %self.submission_id,
            from = %self.state,
            to = %next,
            "Pipeline transition"
        );
        self.state = next;
    }
}

/// Orchestrates validation, canonicalization, fingerprinting and dedup.
///
/// Cheap to clone; clones share the registry, index and counters.
#[derive(Clone)]
pub struct IngestionPipeline {
    validator: Arc<SchemaValidator>,
    fingerprints: FingerprintEngine,
    counters: Arc<Counters>,
    max_concurrent: usize,
}

impl IngestionPipeline {
    /// Create a pipeline with default tolerances.
    pub fn new(registry: Arc<TypeRegistry>, index: Arc<dyn DedupIndex>) -> Self {
        Self::from_parts(
            SchemaValidator::new(registry),
            FingerprintEngine::new(index),
            IngestConfig::default().pipeline.max_concurrent,
        )
    }

    /// Create a pipeline from a validated config.
    pub fn from_config(
        config: &IngestConfig,
        index: Arc<dyn DedupIndex>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let validator = SchemaValidator::new(config.build_registry())
            .with_options(config.validation_options());
        let fingerprints =
            FingerprintEngine::new(index).with_domain(config.fingerprint.domain.clone());
        Ok(Self::from_parts(
            validator,
            fingerprints,
            config.pipeline.max_concurrent,
        ))
    }

    fn from_parts(
        validator: SchemaValidator,
        fingerprints: FingerprintEngine,
        max_concurrent: usize,
    ) -> Self {
        Self {
            validator: Arc::new(validator),
            fingerprints,
            counters: Arc::new(Counters::default()),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        self.validator.registry()
    }

    pub fn fingerprints(&self) -> &FingerprintEngine {
        &self.fingerprints
    }

    /// Counter snapshot.
    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Run one raw record through the pipeline.
    ///
    /// `Err` means no decision could be made (see [`IngestError::is_retryable`]);
    /// invalid content is an `Ok(Rejected)`.
    pub async fn ingest(&self, raw: &Value) -> Result<IngestOutcome> {
        self.ingest_at(raw, Utc::now()).await
    }

    /// Like [`ingest`](Self::ingest) with an explicit ingestion time.
    pub async fn ingest_at(&self, raw: &Value, now: DateTime<Utc>) -> Result<IngestOutcome> {
        self.run(raw, now, None).await
    }

    /// Parse a submission and ingest every record in it.
    pub async fn ingest_batch(&self, raw: Value) -> Result<Vec<Result<IngestOutcome>>> {
        self.ingest_batch_at(raw, Utc::now()).await
    }

    /// Like [`ingest_batch`](Self::ingest_batch) with an explicit ingestion
    /// time shared by every record.
    pub async fn ingest_batch_at(
        &self,
        raw: Value,
        now: DateTime<Utc>,
    ) -> Result<Vec<Result<IngestOutcome>>> {
        let submission = SubmissionEnvelope::from_value(raw)?;
        self.ingest_submission(submission, now).await
    }

    /// Ingest every record of a submission, in parallel up to the configured
    /// limit. Outcomes come back in input order.
    ///
    /// Records are spawned only once a slot is free, so dropping the returned
    /// future stops unstarted records while started ones run to completion.
    pub async fn ingest_submission(
        &self,
        submission: SubmissionEnvelope,
        now: DateTime<Utc>,
    ) -> Result<Vec<Result<IngestOutcome>>> {
        let (expected_wallet, contributions) = match submission {
            SubmissionEnvelope::Single(raw) => (None, vec![raw]),
            SubmissionEnvelope::Batch {
                wallet_address,
                claim_date,
                contributions,
            } => {
                info!(
                    wallet_address = %wallet_address,
                    claim_date = ?claim_date,
                    count = contributions.len(),
                    "Ingesting batch"
                );
                (Some(wallet_address), contributions)
            }
        };

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(contributions.len());

        for raw in contributions {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| IngestError::TaskFailed(e.to_string()))?;
            let pipeline = self.clone();
            let expected_wallet = expected_wallet.clone();

            handles.push(tokio::spawn(async move {
                let outcome = pipeline
                    .run(&raw, now, expected_wallet.as_ref())
                    .await;
                drop(permit);
                outcome
            }));
        }

        let outcomes = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap_or_else(|e| Err(IngestError::TaskFailed(e.to_string()))))
            .collect();

        Ok(outcomes)
    }

    async fn run(
        &self,
        raw: &Value,
        now: DateTime<Utc>,
        expected_wallet: Option<&WalletAddress>,
    ) -> Result<IngestOutcome> {
        let mut run = Run::new();
        run.advance(PipelineState::Validating);

        let mismatch = expected_wallet.and_then(|expected| wallet_mismatch(raw, expected));
        let claim = match (self.validator.validate_claim(raw, now), mismatch) {
            (Ok(claim), None) => claim,
            (Ok(claim), Some(error)) => {
                let rejection = ClaimRejection {
                    excerpt: ClaimExcerpt::from_value(raw),
                    schema_error: None,
                    errors: vec![error],
                    warnings: claim.warnings,
                };
                return Ok(self.reject(run, rejection));
            }
            (Err(mut rejection), mismatch) => {
                rejection.errors.extend(mismatch);
                return Ok(self.reject(run, rejection));
            }
        };

        log_warnings(&run, &claim);
        run.advance(PipelineState::Validated);

        let canonical = canonicalize(&claim);
        run.advance(PipelineState::Canonicalized);

        let fingerprint = self.fingerprints.fingerprint_claim(&claim, &canonical);
        run.advance(PipelineState::Fingerprinted);

        let accepted = AcceptedContribution::new(claim, fingerprint, run.submission_id, now);

        match self.fingerprints.is_duplicate(&fingerprint).await {
            Ok(false) => {}
            Ok(true) | Err(IndexError::Conflict(_)) => return Ok(self.duplicate(run, &accepted)),
            Err(IndexError::Unavailable(reason)) => {
                return Err(self.index_unavailable(&run, &fingerprint, reason))
            }
        }

        // A concurrent run may have indexed the same content since the check
        match self
            .fingerprints
            .index()
            .insert(fingerprint, accepted.clone())
            .await
        {
            Ok(()) => Ok(self.accept(run, accepted)),
            Err(IndexError::Conflict(_)) => Ok(self.duplicate(run, &accepted)),
            Err(IndexError::Unavailable(reason)) => {
                Err(self.index_unavailable(&run, &fingerprint, reason))
            }
        }
    }

    fn reject(&self, mut run: Run, rejection: ClaimRejection) -> IngestOutcome {
        run.advance(PipelineState::Rejected);
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);

        warn!(
            submission_id = %run.submission_id,
            contribution_type = ?rejection.excerpt.contribution_type,
            errors = rejection.errors.len(),
            schema_error = ?rejection.schema_error,
            "Contribution rejected"
        );

        IngestOutcome::Rejected(RejectedContribution::new(rejection, run.submission_id))
    }

    fn duplicate(&self, mut run: Run, accepted: &AcceptedContribution) -> IngestOutcome {
        run.advance(PipelineState::Duplicate);
        self.counters.duplicate.fetch_add(1, Ordering::Relaxed);

        info!(
            submission_id = %run.submission_id,
            fingerprint = %accepted.fingerprint,
            contribution_type = %accepted.contribution_type,
            "Duplicate contribution"
        );

        IngestOutcome::Duplicate(DuplicateContribution::from(accepted))
    }

    fn accept(&self, mut run: Run, accepted: AcceptedContribution) -> IngestOutcome {
        run.advance(PipelineState::Accepted);
        self.counters.accepted.fetch_add(1, Ordering::Relaxed);

        info!(
            submission_id = %run.submission_id,
            fingerprint = %accepted.fingerprint,
            contribution_type = %accepted.contribution_type,
            wallet_address = %accepted.wallet_address,
            "Contribution accepted"
        );

        IngestOutcome::Accepted(accepted)
    }

    fn index_unavailable(
        &self,
        run: &Run,
        fingerprint: &Fingerprint,
        reason: String,
    ) -> IngestError {
        self.counters.index_failures.fetch_add(1, Ordering::Relaxed);
        error!(
            submission_id = %run.submission_id,
            fingerprint = %fingerprint,
            reason = %reason,
            "Dedup index unavailable"
        );
        IngestError::IndexUnavailable(reason)
    }
}

/// A constraint error when a batch record names a different wallet.
///
/// Malformed addresses are left to the validator.
fn wallet_mismatch(raw: &Value, expected: &WalletAddress) -> Option<FieldError> {
    let address = raw
        .get(envelope::WALLET_ADDRESS)
        .and_then(Value::as_str)
        .and_then(WalletAddress::parse)?;
    (address != *expected).then(|| {
        FieldError::constraint(
            &FieldPath::root().key(envelope::WALLET_ADDRESS),
            format!("{} does not match batch wallet {}", address, expected),
        )
    })
}

fn log_warnings(run: &Run, claim: &ValidatedClaim) {
    for warning in &claim.warnings {
        match warning.kind {
            WarningKind::UnknownField => warn!(
                submission_id = %run.submission_id,
                contribution_type = %claim.contribution_type,
                path = %warning.path,
                "Unknown field passed through"
            ),
            WarningKind::DuplicateElement => debug!(
                submission_id = %run.submission_id,
                path = %warning.path,
                "{}", warning.message
            ),
        }
    }
}
