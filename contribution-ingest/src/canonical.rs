//! Canonical byte encoding of validated claims.
//!
//! The canonical form is compact JSON text with a few fixed rules:
//!
//! - object keys are sorted lexicographically (by byte)
//! - list order is kept exactly as submitted
//! - amounts render as `"<magnitude with 8 decimals> <CODE>"`
//! - timestamps render as UTC ISO 8601 with nanosecond precision
//! - pass-through numbers render as integers when integral, otherwise
//!   with 8 fractional digits
//! - strings are JSON-escaped and otherwise untouched
//!
//! Two claims that differ only in key order or whitespace therefore encode
//! to the same bytes.

use contribution_schema::{
    envelope, format_date, format_timestamp_exact, ObjectEntry, PayloadObject, PayloadValue,
    ValidatedClaim,
};
use serde_json::{Number, Value};

/// Fractional digits used for non-integral pass-through numbers.
pub const NUMBER_PRECISION: usize = 8;

/// Encode a whole validated claim, envelope and payload.
pub fn canonicalize(claim: &ValidatedClaim) -> Vec<u8> {
    let mut writer = CanonicalWriter::default();
    writer.claim(claim);
    writer.finish()
}

/// Encode only a normalized `securedSharedData` payload.
pub fn canonicalize_payload(payload: &PayloadObject) -> Vec<u8> {
    let mut writer = CanonicalWriter::default();
    writer.object(payload);
    writer.finish()
}

/// A member of the canonical claim document.
enum Member<'a> {
    Text(&'a str),
    Payload(&'a PayloadObject),
    Json(&'a Value),
}

#[derive(Default)]
struct CanonicalWriter {
    out: String,
}

impl CanonicalWriter {
    fn finish(self) -> Vec<u8> {
        self.out.into_bytes()
    }

    fn claim(&mut self, claim: &ValidatedClaim) {
        let claimed_date = format_timestamp_exact(&claim.claimed_date);

        let mut members: Vec<(&str, Member<'_>)> = vec![
            (envelope::ACCOUNT_USERNAME, Member::Text(&claim.account_username)),
            (envelope::CLAIMED_DATE, Member::Text(&claimed_date)),
            (envelope::SECURED_SHARED_DATA, Member::Payload(&claim.payload)),
            (envelope::TYPE, Member::Text(claim.contribution_type.as_str())),
            (envelope::WALLET_ADDRESS, Member::Text(claim.wallet_address.as_str())),
            (envelope::WITNESSES, Member::Text(&claim.witnesses)),
        ];
        members.extend(
            claim
                .extras
                .iter()
                .map(|(key, value)| (key.as_str(), Member::Json(value))),
        );
        members.sort_by(|a, b| a.0.cmp(b.0));

        self.out.push('{');
        for (i, (key, member)) in members.into_iter().enumerate() {
            if i > 0 {
                self.out.push(',');
            }
            self.string(key);
            self.out.push(':');
            match member {
                Member::Text(text) => self.string(text),
                Member::Payload(payload) => self.object(payload),
                Member::Json(value) => self.json(value),
            }
        }
        self.out.push('}');
    }

    fn object(&mut self, object: &PayloadObject) {
        self.out.push('{');
        for (i, (key, entry)) in object.entries().into_iter().enumerate() {
            if i > 0 {
                self.out.push(',');
            }
            self.string(key);
            self.out.push(':');
            match entry {
                ObjectEntry::Typed(value) => self.value(value),
                ObjectEntry::Extra(value) => self.json(value),
            }
        }
        self.out.push('}');
    }

    fn value(&mut self, value: &PayloadValue) {
        match value {
            PayloadValue::Text(text) | PayloadValue::Uri(text) => self.string(text),
            PayloadValue::Integer(n) => self.out.push_str(&n.to_string()),
            PayloadValue::Timestamp(ts) => self.string(&format_timestamp_exact(ts)),
            PayloadValue::Date(date) => self.string(&format_date(date)),
            PayloadValue::Amount(amount) => {
                self.string(&format!("{} {}", amount.fixed_magnitude(), amount.currency()))
            }
            PayloadValue::List(items) => {
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.value(item);
                }
                self.out.push(']');
            }
            PayloadValue::Map(map) => {
                // BTreeMap iteration is already in key order
                self.out.push('{');
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.string(key);
                    self.out.push(':');
                    self.value(item);
                }
                self.out.push('}');
            }
            PayloadValue::Object(object) => self.object(object),
            PayloadValue::Opaque(raw) => self.json(raw),
        }
    }

    fn json(&mut self, value: &Value) {
        match value {
            Value::Null => self.out.push_str("null"),
            Value::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) => self.out.push_str(&canonical_number(n)),
            Value::String(s) => self.string(s),
            Value::Array(items) => {
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.json(item);
                }
                self.out.push(']');
            }
            Value::Object(members) => {
                let mut keys: Vec<&String> = members.keys().collect();
                keys.sort();
                self.out.push('{');
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.string(key);
                    self.out.push(':');
                    if let Some(item) = members.get(key) {
                        self.json(item);
                    }
                }
                self.out.push('}');
            }
        }
    }

    fn string(&mut self, text: &str) {
        // Display on a JSON string value is its escaped, quoted form
        self.out.push_str(&Value::String(text.to_string()).to_string());
    }
}

/// Render a JSON number in canonical form.
///
/// `3`, `3.0` and `3e0` all render as `3`; `0.1` renders as `0.10000000`.
pub fn canonical_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
            format!("{}", f as i64)
        }
        Some(f) => format!("{:.*}", NUMBER_PRECISION, f),
        None => n.to_string(),
    }
}
