//! Content fingerprints for deduplication.
//!
//! A fingerprint binds a claim's canonical bytes to its identity triple
//! (type, wallet, claimed date), so the same payload replayed under another
//! wallet gets a different identifier.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use contribution_schema::{format_timestamp_exact, ContributionType, ValidatedClaim, WalletAddress};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::IndexError;
use crate::index::DedupIndex;

/// Domain separation tag mixed into every fingerprint by default.
pub const FINGERPRINT_DOMAIN: &str = "CONTRIB:FP:V1";

/// Fixed-length content identifier (SHA-256).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Length in bytes.
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lower-case hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the hex form.
    pub fn from_hex(text: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// Feed a length-prefixed field into the hasher.
///
/// The prefix keeps `("ab", "c")` and `("a", "bc")` apart.
fn update_framed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Compute a fingerprint under an explicit domain tag.
pub fn compute_fingerprint(
    domain: &str,
    canonical: &[u8],
    wallet_address: &WalletAddress,
    contribution_type: &ContributionType,
    claimed_date: &DateTime<Utc>,
) -> Fingerprint {
    let mut hasher = Sha256::new();
    update_framed(&mut hasher, domain.as_bytes());
    update_framed(&mut hasher, contribution_type.as_str().as_bytes());
    update_framed(&mut hasher, wallet_address.as_str().as_bytes());
    update_framed(&mut hasher, format_timestamp_exact(claimed_date).as_bytes());
    update_framed(&mut hasher, canonical);
    Fingerprint(hasher.finalize().into())
}

/// Computes fingerprints and checks them against a dedup index.
///
/// The engine never stores anything itself; persistence belongs to the
/// [`DedupIndex`] collaborator.
#[derive(Clone)]
pub struct FingerprintEngine {
    domain: String,
    index: Arc<dyn DedupIndex>,
}

impl FingerprintEngine {
    pub fn new(index: Arc<dyn DedupIndex>) -> Self {
        Self {
            domain: FINGERPRINT_DOMAIN.to_string(),
            index,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn index(&self) -> &Arc<dyn DedupIndex> {
        &self.index
    }

    /// Fingerprint canonical bytes under an identity triple.
    pub fn fingerprint(
        &self,
        canonical: &[u8],
        wallet_address: &WalletAddress,
        contribution_type: &ContributionType,
        claimed_date: &DateTime<Utc>,
    ) -> Fingerprint {
        compute_fingerprint(
            &self.domain,
            canonical,
            wallet_address,
            contribution_type,
            claimed_date,
        )
    }

    /// Fingerprint a validated claim whose canonical bytes are already known.
    pub fn fingerprint_claim(&self, claim: &ValidatedClaim, canonical: &[u8]) -> Fingerprint {
        self.fingerprint(
            canonical,
            &claim.wallet_address,
            &claim.contribution_type,
            &claim.claimed_date,
        )
    }

    /// Whether the index already holds this fingerprint.
    pub async fn is_duplicate(&self, fingerprint: &Fingerprint) -> Result<bool, IndexError> {
        self.index.exists(fingerprint).await
    }
}
