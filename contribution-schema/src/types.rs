//! Core types for contribution claims and their validation results.
//!
//! A claim arrives as loosely typed JSON. The validator turns it into a
//! [`ValidatedClaim`] or explains, through [`FieldError`]s, everything that
//! was wrong with it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::value::PayloadObject;

/// Member names of the claim envelope.
pub mod envelope {
    pub const TYPE: &str = "type";
    pub const CLAIMED_DATE: &str = "claimedDate";
    pub const WITNESSES: &str = "witnesses";
    pub const WALLET_ADDRESS: &str = "walletAddress";
    pub const ACCOUNT_USERNAME: &str = "AccountUsername";
    pub const SECURED_SHARED_DATA: &str = "securedSharedData";

    /// Every member the envelope declares.
    pub const ALL: &[&str] = &[
        TYPE,
        CLAIMED_DATE,
        WITNESSES,
        WALLET_ADDRESS,
        ACCOUNT_USERNAME,
        SECURED_SHARED_DATA,
    ];
}

/// Service identifier selecting the schema for `securedSharedData`.
///
/// Tags are matched exactly: `UBER` and `uber` are different tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContributionType(String);

impl ContributionType {
    /// Create a tag from any string.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Get the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContributionType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for ContributionType {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

/// Wallet identity a claim is contributed to.
///
/// The format is `0x` followed by 40 ASCII alphanumerics. Only the format is
/// checked, never ownership. The stored form is lower-case so that two
/// spellings of the same address compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Number of characters after the `0x` prefix.
    pub const BODY_LEN: usize = 40;

    /// Parse and normalize an address, returning `None` if the format is wrong.
    pub fn parse(raw: &str) -> Option<Self> {
        let body = raw.strip_prefix("0x")?;
        if body.len() != Self::BODY_LEN || !body.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    /// Get the normalized address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object member
    Key(String),
    /// List element
    Index(usize),
}

/// Location of a value inside a claim, rendered in dot/bracket notation
/// (`securedSharedData.trips[1].fare`).
///
/// Keys that are not plain identifiers are rendered quoted in brackets, so a
/// date key reads `watchHistory["2025-07-01"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// The empty path, pointing at the value being validated.
    pub fn root() -> Self {
        Self::default()
    }

    /// Path to a member of the object at this path.
    pub fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self(segments)
    }

    /// Path to an element of the list at this path.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if is_identifier(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Key(key) => write!(f, "[{:?}]", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Category of a field validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldErrorKind {
    /// A required field is absent or null
    MissingRequired,
    /// The JSON type does not match the schema (e.g. number for string)
    WrongType,
    /// The type is right but the content cannot be parsed
    MalformedValue,
    /// The value parsed but breaks a rule (ordering, uniqueness, closed set)
    ConstraintViolation,
}

/// A single validation failure at a specific path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Where the failure is
    pub path: FieldPath,
    /// What kind of failure it is
    pub kind: FieldErrorKind,
    /// Human-readable explanation
    pub message: String,
}

impl FieldError {
    pub fn new(path: FieldPath, kind: FieldErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    pub fn missing(path: &FieldPath) -> Self {
        Self::new(
            path.clone(),
            FieldErrorKind::MissingRequired,
            format!("required field `{}` is missing", path),
        )
    }

    pub fn wrong_type(path: &FieldPath, expected: &str, found: &serde_json::Value) -> Self {
        Self::new(
            path.clone(),
            FieldErrorKind::WrongType,
            format!("expected {}, found {}", expected, json_type_name(found)),
        )
    }

    pub fn malformed(path: &FieldPath, message: impl Into<String>) -> Self {
        Self::new(path.clone(), FieldErrorKind::MalformedValue, message)
    }

    pub fn constraint(path: &FieldPath, message: impl Into<String>) -> Self {
        Self::new(path.clone(), FieldErrorKind::ConstraintViolation, message)
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}): {}", self.path, self.kind, self.message)
    }
}

/// JSON type name used in `WrongType` messages.
pub fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) if n.is_f64() => "number",
        serde_json::Value::Number(_) => "integer",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Category of a non-fatal validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// A field the schema does not know; kept in the extras bag
    UnknownField,
    /// A repeated element in a list where repeats are tolerated
    DuplicateElement,
}

/// A finding that does not reject the claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    pub path: FieldPath,
    pub kind: WarningKind,
    pub message: String,
}

impl ValidationWarning {
    pub fn unknown_field(path: &FieldPath) -> Self {
        Self {
            path: path.clone(),
            kind: WarningKind::UnknownField,
            message: format!("unknown field `{}` passed through", path),
        }
    }

    pub fn duplicate(path: &FieldPath, first_index: usize) -> Self {
        Self {
            path: path.clone(),
            kind: WarningKind::DuplicateElement,
            message: format!("duplicate of element {}", first_index),
        }
    }}

/// A `securedSharedData` payload that satisfied its schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedPayload {
    /// Type whose schema was applied
    #[serde(rename = "type")]
    pub contribution_type: ContributionType,
    /// Version of the schema that was applied
    pub schema_version: u32,
    /// Normalized payload, unknown fields preserved
    pub payload: PayloadObject,
    /// Non-fatal findings
    pub warnings: Vec<ValidationWarning>,
}

/// A complete claim that passed envelope and payload validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedClaim {
    pub contribution_type: ContributionType,
    pub schema_version: u32,
    /// Claimed activity date, normalized to UTC
    pub claimed_date: DateTime<Utc>,
    /// Witness URI, verbatim
    pub witnesses: String,
    pub wallet_address: WalletAddress,
    pub account_username: String,
    /// Normalized `securedSharedData`
    pub payload: PayloadObject,
    /// Unknown envelope fields, verbatim
    pub extras: BTreeMap<String, serde_json::Value>,
    pub warnings: Vec<ValidationWarning>,
}

/// Identity fields copied verbatim from a raw record, for reporting.
///
/// Any field may be absent or unusable in a record that is being rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimExcerpt {
    #[serde(rename = "type")]
    pub contribution_type: Option<String>,
    pub wallet_address: Option<String>,
    pub claimed_date: Option<String>,
}

impl ClaimExcerpt {
    /// Extract whatever identity strings a raw record carries.
    pub fn from_value(raw: &serde_json::Value) -> Self {
        let text = |key: &str| raw.get(key).and_then(|v| v.as_str()).map(str::to_string);
        Self {
            contribution_type: text(envelope::TYPE),
            wallet_address: text(envelope::WALLET_ADDRESS),
            claimed_date: text(envelope::CLAIMED_DATE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_address_format() {
        let sample = WalletAddress::parse("0x1234abcd5678efgh9012ijkl3456mnop7890qrst");
        assert!(sample.is_some());

        let upper = WalletAddress::parse("0x1234ABCD5678EFGH9012IJKL3456MNOP7890QRST").unwrap();
        assert_eq!(upper.as_str(), "0x1234abcd5678efgh9012ijkl3456mnop7890qrst");

        assert!(WalletAddress::parse("1234abcd5678efgh9012ijkl3456mnop7890qrst").is_none());
        assert!(WalletAddress::parse("0x1234").is_none());
        assert!(WalletAddress::parse("0x1234abcd5678efgh9012ijkl3456mnop7890qrs!").is_none());
    }

    #[test]
    fn test_field_path_rendering() {
        let path = FieldPath::root()
            .key("securedSharedData")
            .key("trips")
            .index(1)
            .key("fare");
        assert_eq!(path.to_string(), "securedSharedData.trips[1].fare");

        let dated = FieldPath::root().key("watchHistory").key("2025-07-01").index(0);
        assert_eq!(dated.to_string(), "watchHistory[\"2025-07-01\"][0]");

        assert_eq!(FieldPath::root().to_string(), "$");
    }

    #[test]
    fn test_excerpt_from_partial_record() {
        let raw = serde_json::json!({ "type": "UBER", "claimedDate": 12 });
        let excerpt = ClaimExcerpt::from_value(&raw);
        assert_eq!(excerpt.contribution_type.as_deref(), Some("UBER"));
        assert!(excerpt.claimed_date.is_none());
        assert!(excerpt.wallet_address.is_none());
    }
}
