//! Terminal outcomes of a pipeline run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use contribution_schema::{
    ClaimExcerpt, ClaimRejection, ContributionType, FieldError, PayloadObject, SchemaError,
    ValidatedClaim, ValidationWarning, WalletAddress,
};
use serde::Serialize;
use uuid::Uuid;

use crate::fingerprint::Fingerprint;
use crate::pipeline::PipelineState;

mod timestamp {
    use chrono::{DateTime, Utc};
    use contribution_schema::format_timestamp;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(ts))
    }
}

/// A claim that passed every stage and was indexed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedContribution {
    pub fingerprint: Fingerprint,
    #[serde(rename = "type")]
    pub contribution_type: ContributionType,
    pub wallet_address: WalletAddress,
    #[serde(with = "timestamp")]
    pub claimed_date: DateTime<Utc>,
    pub account_username: String,
    pub witnesses: String,
    pub schema_version: u32,
    pub normalized_payload: PayloadObject,
    /// Unknown envelope members carried through
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, serde_json::Value>,
    pub warnings: Vec<ValidationWarning>,
    #[serde(with = "timestamp")]
    pub accepted_at: DateTime<Utc>,
    pub submission_id: Uuid,
}

impl AcceptedContribution {
    pub fn new(
        claim: ValidatedClaim,
        fingerprint: Fingerprint,
        submission_id: Uuid,
        accepted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            fingerprint,
            contribution_type: claim.contribution_type,
            wallet_address: claim.wallet_address,
            claimed_date: claim.claimed_date,
            account_username: claim.account_username,
            witnesses: claim.witnesses,
            schema_version: claim.schema_version,
            normalized_payload: claim.payload,
            extras: claim.extras,
            warnings: claim.warnings,
            accepted_at,
            submission_id,
        }
    }

    /// Minimal record handed to the ledger for anchoring.
    pub fn attestation(&self) -> AttestationRecord {
        AttestationRecord {
            fingerprint: self.fingerprint,
            contribution_type: self.contribution_type.clone(),
            wallet_address: self.wallet_address.clone(),
            claimed_date: self.claimed_date,
        }
    }
}

/// Fingerprint plus identity fields, for the attestation ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationRecord {
    pub fingerprint: Fingerprint,
    #[serde(rename = "type")]
    pub contribution_type: ContributionType,
    pub wallet_address: WalletAddress,
    #[serde(with = "timestamp")]
    pub claimed_date: DateTime<Utc>,
}

/// A claim that failed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedContribution {
    /// `type`, `walletAddress` and `claimedDate` as submitted
    #[serde(flatten)]
    pub excerpt: ClaimExcerpt,
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ValidationWarning>,
    /// Present when the type tag has no schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_error: Option<SchemaError>,
    pub submission_id: Uuid,
}

impl RejectedContribution {
    pub fn new(rejection: ClaimRejection, submission_id: Uuid) -> Self {
        Self {
            excerpt: rejection.excerpt,
            errors: rejection.errors,
            warnings: rejection.warnings,
            schema_error: rejection.schema_error,
            submission_id,
        }
    }
}

/// A valid claim whose fingerprint was already indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateContribution {
    pub fingerprint: Fingerprint,
    #[serde(rename = "type")]
    pub contribution_type: ContributionType,
    pub wallet_address: WalletAddress,
    #[serde(with = "timestamp")]
    pub claimed_date: DateTime<Utc>,
    pub submission_id: Uuid,
}

impl From<&AcceptedContribution> for DuplicateContribution {
    fn from(accepted: &AcceptedContribution) -> Self {
        Self {
            fingerprint: accepted.fingerprint,
            contribution_type: accepted.contribution_type.clone(),
            wallet_address: accepted.wallet_address.clone(),
            claimed_date: accepted.claimed_date,
            submission_id: accepted.submission_id,
        }
    }
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum IngestOutcome {
    Accepted(AcceptedContribution),
    Rejected(RejectedContribution),
    Duplicate(DuplicateContribution),
}

impl IngestOutcome {
    /// Terminal state the run ended in.
    pub fn state(&self) -> PipelineState {
        match self {
            Self::Accepted(_) => PipelineState::Accepted,
            Self::Rejected(_) => PipelineState::Rejected,
            Self::Duplicate(_) => PipelineState::Duplicate,
        }
    }

    /// Fingerprint, if one was computed.
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            Self::Accepted(accepted) => Some(&accepted.fingerprint),
            Self::Duplicate(duplicate) => Some(&duplicate.fingerprint),
            Self::Rejected(_) => None,
        }
    }

    pub fn submission_id(&self) -> Uuid {
        match self {
            Self::Accepted(accepted) => accepted.submission_id,
            Self::Rejected(rejected) => rejected.submission_id,
            Self::Duplicate(duplicate) => duplicate.submission_id,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}
