//! End-to-end ingestion tests over the sample contributions
//!
//! Covers:
//! - Acceptance of the four sample types
//! - Canonical determinism under re-serialization
//! - Fingerprint binding to content and identity
//! - Rejection reporting, duplicate detection and index failures
//! - Batch submissions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contribution_ingest::schema::{
    parse_timestamp, tags, FieldErrorKind, SchemaValidator, TypeRegistry,
};
use contribution_ingest::{
    canonicalize, AcceptedContribution, DedupIndex, Fingerprint, InMemoryDedupIndex,
    IndexError, IngestConfig, IngestError, IngestOutcome, IngestionPipeline, PipelineState,
};
use serde_json::{json, Value};

const SAMPLES: &str = include_str!("fixtures/sample_contributions.json");

fn samples() -> Vec<Value> {
    serde_json::from_str(SAMPLES).unwrap()
}

fn sample(contribution_type: &str) -> Value {
    samples()
        .into_iter()
        .find(|s| s["type"] == contribution_type)
        .unwrap()
}

fn now() -> DateTime<Utc> {
    parse_timestamp("2025-09-01T00:00:00Z").unwrap()
}

fn pipeline() -> IngestionPipeline {
    IngestionPipeline::new(
        Arc::new(TypeRegistry::with_builtins()),
        Arc::new(InMemoryDedupIndex::new()),
    )
}

fn expect_rejected(outcome: IngestOutcome) -> contribution_ingest::RejectedContribution {
    match outcome {
        IngestOutcome::Rejected(rejected) => rejected,
        other => panic!("expected rejection, got {:?}", other.state()),
    }
}

/// Re-serialize JSON with every object's keys reversed and loose whitespace.
fn respell(value: &Value) -> String {
    match value {
        Value::Object(members) => {
            let inner: Vec<String> = members
                .iter()
                .rev()
                .map(|(k, v)| format!("\n  {} :  {}", Value::String(k.clone()), respell(v)))
                .collect();
            format!("{{{}\n}}", inner.join(","))
        }
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(respell).collect();
            format!("[ {} ]", inner.join(" , "))
        }
        other => other.to_string(),
    }
}

// =============================================================================
// Sample Acceptance
// =============================================================================

#[tokio::test]
async fn test_all_samples_accepted() {
    let pipeline = pipeline();

    for raw in samples() {
        let outcome = pipeline.ingest_at(&raw, now()).await.unwrap();
        assert_eq!(
            outcome.state(),
            PipelineState::Accepted,
            "{} was not accepted",
            raw["type"]
        );
    }

    assert_eq!(pipeline.stats().accepted, 4);
}

#[tokio::test]
async fn test_accepted_output_shape() {
    let pipeline = pipeline();
    let outcome = pipeline.ingest_at(&sample(tags::ZOMATO), now()).await.unwrap();
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["status"], "accepted");
    assert_eq!(json["type"], "ZOMATO");
    assert_eq!(json["walletAddress"], "0xefgh3456ijkl7890mnop1234qrst5678abcd9012");
    assert_eq!(json["claimedDate"], "2025-08-05T09:20:00.000Z");
    assert_eq!(json["accountUsername"], "foodie_sam");
    assert_eq!(json["fingerprint"].as_str().unwrap().len(), 64);

    let cost = &json["normalizedPayload"]["orders"][0]["totalCost"];
    assert_eq!(cost["value"], "45.30");
    assert_eq!(cost["currency"], "USD");
}

// =============================================================================
// Canonical Determinism
// =============================================================================

#[test]
fn test_canonical_bytes_are_deterministic() {
    let validator = SchemaValidator::new(Arc::new(TypeRegistry::with_builtins()));

    for raw in samples() {
        let claim = validator.validate_claim(&raw, now()).unwrap();
        assert_eq!(canonicalize(&claim), canonicalize(&claim));

        let respelled: Value = serde_json::from_str(&respell(&raw)).unwrap();
        let reparsed = validator.validate_claim(&respelled, now()).unwrap();
        assert_eq!(
            canonicalize(&claim),
            canonicalize(&reparsed),
            "{} changed under re-serialization",
            raw["type"]
        );
    }
}

#[tokio::test]
async fn test_respelled_claim_is_duplicate() {
    let pipeline = pipeline();
    let raw = sample(tags::AMAZON_PRIME);
    let respelled: Value = serde_json::from_str(&respell(&raw)).unwrap();

    let first = pipeline.ingest_at(&raw, now()).await.unwrap();
    let second = pipeline.ingest_at(&respelled, now()).await.unwrap();

    assert!(first.is_accepted());
    assert!(second.is_duplicate());
    assert_eq!(first.fingerprint(), second.fingerprint());
}

// =============================================================================
// Fingerprints
// =============================================================================

#[tokio::test]
async fn test_sample_fingerprints_are_distinct() {
    let pipeline = pipeline();
    let mut seen = std::collections::HashSet::new();

    for raw in samples() {
        let outcome = pipeline.ingest_at(&raw, now()).await.unwrap();
        let fingerprint = *outcome.fingerprint().unwrap();
        assert!(seen.insert(fingerprint));
    }
}

#[tokio::test]
async fn test_replay_under_other_wallet_is_new_content() {
    let pipeline = pipeline();
    let original = sample(tags::STEAM);
    let mut replay = original.clone();
    replay["walletAddress"] = json!("0x0000aaaa1111bbbb2222cccc3333dddd4444eeee");

    let first = pipeline.ingest_at(&original, now()).await.unwrap();
    let second = pipeline.ingest_at(&replay, now()).await.unwrap();

    assert!(first.is_accepted());
    assert!(second.is_accepted());
    assert_ne!(first.fingerprint(), second.fingerprint());
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_missing_nested_fields_all_reported() {
    let pipeline = pipeline();
    let mut raw = sample(tags::ZOMATO);
    let details = raw["securedSharedData"]["orders"][1]["deliveryDetails"]
        .as_object_mut()
        .unwrap();
    details.remove("deliveryAddress");
    details.remove("deliveryStatus");

    let rejected = expect_rejected(pipeline.ingest_at(&raw, now()).await.unwrap());
    let paths: Vec<String> = rejected.errors.iter().map(|e| e.path.to_string()).collect();

    assert_eq!(
        paths,
        vec![
            "securedSharedData.orders[1].deliveryDetails.deliveryAddress",
            "securedSharedData.orders[1].deliveryDetails.deliveryStatus",
        ]
    );
    assert!(rejected
        .errors
        .iter()
        .all(|e| e.kind == FieldErrorKind::MissingRequired));
}

#[tokio::test]
async fn test_trip_ending_before_it_begins() {
    let pipeline = pipeline();
    let mut raw = sample(tags::UBER);
    raw["securedSharedData"]["trips"][0]["beginTripTime"] = json!("2025-07-15T09:00:00Z");

    let rejected = expect_rejected(pipeline.ingest_at(&raw, now()).await.unwrap());

    assert_eq!(rejected.errors.len(), 1);
    assert_eq!(
        rejected.errors[0].path.to_string(),
        "securedSharedData.trips[0].dropoffTime"
    );
    assert_eq!(rejected.errors[0].kind, FieldErrorKind::ConstraintViolation);
    assert_eq!(rejected.excerpt.contribution_type.as_deref(), Some("UBER"));
}

#[tokio::test]
async fn test_amount_without_currency() {
    let pipeline = pipeline();
    let mut raw = sample(tags::ZOMATO);
    raw["securedSharedData"]["orders"][0]["totalCost"] = json!("45.30");

    let rejected = expect_rejected(pipeline.ingest_at(&raw, now()).await.unwrap());

    assert_eq!(rejected.errors.len(), 1);
    assert_eq!(
        rejected.errors[0].path.to_string(),
        "securedSharedData.orders[0].totalCost"
    );
    assert_eq!(rejected.errors[0].kind, FieldErrorKind::MalformedValue);
}

#[tokio::test]
async fn test_unknown_type_is_schema_error() {
    let pipeline = pipeline();
    let mut raw = sample(tags::STEAM);
    raw["type"] = json!("NETFLIX");

    let outcome = pipeline.ingest_at(&raw, now()).await.unwrap();
    assert!(outcome.fingerprint().is_none());

    let rejected = expect_rejected(outcome);
    let json = serde_json::to_value(&rejected).unwrap();
    assert_eq!(json["schemaError"]["kind"], "unknownType");
    assert_eq!(json["type"], "NETFLIX");
    assert!(rejected.errors.is_empty());
}

#[tokio::test]
async fn test_extended_catalog_knows_netflix() {
    let mut config = IngestConfig::default();
    config.registry.extended_catalog = true;
    let pipeline =
        IngestionPipeline::from_config(&config, Arc::new(InMemoryDedupIndex::new())).unwrap();

    let mut raw = sample(tags::STEAM);
    raw["type"] = json!("NETFLIX");
    raw["securedSharedData"] = json!({
        "profileName": "Jane",
        "userId": "nf_42",
        "favorites": ["Dark", "Mindhunter"]
    });

    let outcome = pipeline.ingest_at(&raw, now()).await.unwrap();
    assert!(outcome.is_accepted());
}

// =============================================================================
// Deduplication
// =============================================================================

#[tokio::test]
async fn test_identical_zomato_submissions() {
    let index = Arc::new(InMemoryDedupIndex::new());
    let pipeline = IngestionPipeline::new(Arc::new(TypeRegistry::with_builtins()), index.clone());
    let raw = sample(tags::ZOMATO);

    let first = pipeline.ingest_at(&raw, now()).await.unwrap();
    let second = pipeline.ingest_at(&raw, now()).await.unwrap();

    let IngestOutcome::Accepted(accepted) = &first else {
        panic!("first submission should be accepted");
    };
    let IngestOutcome::Duplicate(duplicate) = &second else {
        panic!("second submission should be a duplicate");
    };
    assert_eq!(accepted.fingerprint, duplicate.fingerprint);
    assert_eq!(index.len(), 1);
    assert_eq!(
        index.get(&accepted.fingerprint).map(|c| c.submission_id),
        Some(accepted.submission_id)
    );
}

/// Index that can be switched off to simulate an outage.
#[derive(Default)]
struct FlakyIndex {
    down: AtomicBool,
    inner: InMemoryDedupIndex,
}

#[async_trait]
impl DedupIndex for FlakyIndex {
    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool, IndexError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("index timed out".to_string()));
        }
        self.inner.exists(fingerprint).await
    }

    async fn insert(
        &self,
        fingerprint: Fingerprint,
        contribution: AcceptedContribution,
    ) -> Result<(), IndexError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("index timed out".to_string()));
        }
        self.inner.insert(fingerprint, contribution).await
    }
}

#[tokio::test]
async fn test_index_outage_then_retry() {
    let index = Arc::new(FlakyIndex::default());
    index.down.store(true, Ordering::SeqCst);
    let pipeline = IngestionPipeline::new(Arc::new(TypeRegistry::with_builtins()), index.clone());
    let raw = sample(tags::UBER);

    let err = pipeline.ingest_at(&raw, now()).await.unwrap_err();
    assert!(matches!(err, IngestError::IndexUnavailable(_)));
    assert!(err.is_retryable());

    index.down.store(false, Ordering::SeqCst);
    let outcome = pipeline.ingest_at(&raw, now()).await.unwrap();
    assert!(outcome.is_accepted());

    let stats = pipeline.stats();
    assert_eq!(stats.index_failures, 1);
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.rejected, 0);
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_batch_outcomes_keep_input_order() {
    let pipeline = pipeline();
    let uber = sample(tags::UBER);
    let wallet = uber["walletAddress"].clone();

    let mut second_trip_set = uber.clone();
    second_trip_set["claimedDate"] = json!("2025-08-19T10:30:00Z");

    let batch = json!({
        "walletAddress": wallet,
        "claimDate": "2025-08-18T10:30:00Z",
        "contributions": [uber, sample(tags::STEAM), second_trip_set, uber]
    });

    let outcomes = pipeline.ingest_batch(batch).await.unwrap();
    let states: Vec<PipelineState> = outcomes
        .iter()
        .map(|o| o.as_ref().unwrap().state())
        .collect();

    // The two copies of the same record race; exactly one is accepted
    assert_eq!(states[1], PipelineState::Rejected);
    assert_eq!(states[2], PipelineState::Accepted);
    let copies = [states[0], states[3]];
    assert!(copies.contains(&PipelineState::Accepted));
    assert!(copies.contains(&PipelineState::Duplicate));
}

#[tokio::test]
async fn test_legacy_single_record_submission() {
    let pipeline = pipeline();
    let outcomes = pipeline.ingest_batch(sample(tags::STEAM)).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].as_ref().unwrap().is_accepted());
}

#[tokio::test]
async fn test_malformed_batch_envelope() {
    let pipeline = pipeline();
    let err = pipeline
        .ingest_batch(json!({ "walletAddress": "nope", "contributions": [] }))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::MalformedSubmission(_)));
    assert!(!err.is_retryable());
}
