//! Normalized payload values.
//!
//! The validator turns raw JSON into [`PayloadValue`]s: amounts become
//! fixed-point [`Amount`]s, timestamps become UTC instants, and objects keep
//! their unknown members in an extras bag next to the typed fields.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

/// Fractional digits kept by [`Amount`].
pub const AMOUNT_SCALE: u32 = 8;

const AMOUNT_FACTOR: u128 = 10u128.pow(AMOUNT_SCALE);

/// Calendar date format used for date-keyed maps.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn magnitude_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([0-9]+)(?:\.([0-9]+))?$").expect("magnitude pattern is valid"))
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("date pattern is valid"))
}

fn currency_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z]{3}$").expect("currency pattern is valid"))
}

/// Reasons an amount string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("amount `{0}` has no currency code")]
    MissingCurrency(String),

    #[error("`{0}` is not a decimal magnitude")]
    InvalidMagnitude(String),

    #[error("`{0}` is not an ISO 4217 currency code")]
    InvalidCurrency(String),

    #[error("`{0}` has more than 8 fractional digits")]
    TooPrecise(String),

    #[error("`{0}` is too large")]
    Overflow(String),
}

/// A monetary amount such as `"23.75 USD"`.
///
/// The magnitude is held as an integer scaled by 10^8, so `45.3` and `45.30`
/// are the same amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Amount {
    scaled: u128,
    currency: String,
}

impl Amount {
    /// Parse `<digits>[.<digits>] <CODE>`.
    pub fn parse(raw: &str) -> Result<Self, AmountError> {
        let mut parts = raw.split_whitespace();
        let magnitude = parts.next().ok_or(AmountError::Empty)?;
        let currency = parts
            .next()
            .ok_or_else(|| AmountError::MissingCurrency(raw.to_string()))?;
        if let Some(extra) = parts.next() {
            return Err(AmountError::InvalidCurrency(format!("{} {}", currency, extra)));
        }

        let captures = magnitude_pattern()
            .captures(magnitude)
            .ok_or_else(|| AmountError::InvalidMagnitude(magnitude.to_string()))?;
        if !currency_pattern().is_match(currency) {
            return Err(AmountError::InvalidCurrency(currency.to_string()));
        }

        let whole = &captures[1];
        let fraction = captures.get(2).map(|m| m.as_str()).unwrap_or("");
        if fraction.len() > AMOUNT_SCALE as usize {
            return Err(AmountError::TooPrecise(magnitude.to_string()));
        }

        let overflow = || AmountError::Overflow(magnitude.to_string());
        let whole: u128 = whole.parse().map_err(|_| overflow())?;
        let fraction_value: u128 = if fraction.is_empty() {
            0
        } else {
            let digits: u128 = fraction.parse().map_err(|_| overflow())?;
            digits * 10u128.pow(AMOUNT_SCALE - fraction.len() as u32)
        };
        let scaled = whole
            .checked_mul(AMOUNT_FACTOR)
            .and_then(|w| w.checked_add(fraction_value))
            .ok_or_else(overflow)?;

        Ok(Self {
            scaled,
            currency: currency.to_string(),
        })
    }

    /// Magnitude scaled by 10^[`AMOUNT_SCALE`].
    pub fn scaled(&self) -> u128 {
        self.scaled
    }

    /// ISO 4217 currency code.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Magnitude with all [`AMOUNT_SCALE`] fractional digits (`45.30000000`).
    pub fn fixed_magnitude(&self) -> String {
        format!(
            "{}.{:0width$}",
            self.scaled / AMOUNT_FACTOR,
            self.scaled % AMOUNT_FACTOR,
            width = AMOUNT_SCALE as usize
        )
    }

    /// Magnitude trimmed to at least two fractional digits (`45.30`).
    pub fn magnitude(&self) -> String {
        let fixed = self.fixed_magnitude();
        let (whole, fraction) = fixed.split_at(fixed.len() - AMOUNT_SCALE as usize);
        let trimmed = fraction.trim_end_matches('0');
        let kept = if trimmed.len() < 2 { &fraction[..2] } else { trimmed };
        format!("{}{}", whole, kept)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude(), self.currency)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Amount", 2)?;
        state.serialize_field("value", &self.magnitude())?;
        state.serialize_field("currency", &self.currency)?;
        state.end()
    }
}

/// Parse an RFC 3339 timestamp, reading a zone-less one as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Render a timestamp as ISO 8601 UTC with millisecond precision.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render a timestamp as ISO 8601 UTC with nanosecond precision.
///
/// Lossless for every instant [`parse_timestamp`] can produce, so distinct
/// instants never render alike.
pub fn format_timestamp_exact(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a zero-padded `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if !date_pattern().is_match(raw) {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

/// Render a calendar date as `YYYY-MM-DD`.
pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// A validated value inside a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Amount(Amount),
    /// Well-formed URI, verbatim
    Uri(String),
    List(Vec<PayloadValue>),
    /// Map with normalized keys (dates rendered `YYYY-MM-DD`)
    Map(BTreeMap<String, PayloadValue>),
    Object(PayloadObject),
    /// Value the schema leaves uninterpreted
    Opaque(serde_json::Value),
}

impl PayloadValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Uri(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    pub fn as_amount(&self) -> Option<&Amount> {
        match self {
            Self::Amount(amount) => Some(amount),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PayloadValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, PayloadValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&PayloadObject> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl Serialize for PayloadValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) | Self::Uri(s) => serializer.serialize_str(s),
            Self::Integer(n) => serializer.serialize_i64(*n),
            Self::Timestamp(ts) => serializer.serialize_str(&format_timestamp(ts)),
            Self::Date(date) => serializer.serialize_str(&format_date(date)),
            Self::Amount(amount) => amount.serialize(serializer),
            Self::List(items) => serializer.collect_seq(items),
            Self::Map(map) => serializer.collect_map(map),
            Self::Object(obj) => obj.serialize(serializer),
            Self::Opaque(value) => value.serialize(serializer),
        }
    }
}

/// A member of a [`PayloadObject`], typed or passed through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectEntry<'a> {
    Typed(&'a PayloadValue),
    Extra(&'a serde_json::Value),
}

/// An object whose schema-declared members are typed and whose unknown
/// members are carried verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadObject {
    /// Members declared by the schema
    pub fields: BTreeMap<String, PayloadValue>,
    /// Members the schema does not know
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl PayloadObject {
    pub fn get(&self, name: &str) -> Option<&PayloadValue> {
        self.fields.get(name)
    }

    pub fn extra(&self, name: &str) -> Option<&serde_json::Value> {
        self.extras.get(name)
    }

    /// All members in lexicographic key order.
    ///
    /// Typed fields and extras never share a key, so the result is a plain
    /// merge of the two sorted maps.
    pub fn entries(&self) -> Vec<(&str, ObjectEntry<'_>)> {
        let mut entries: Vec<(&str, ObjectEntry<'_>)> = self
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), ObjectEntry::Typed(v)))
            .chain(
                self.extras
                    .iter()
                    .map(|(k, v)| (k.as_str(), ObjectEntry::Extra(v))),
            )
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.fields.len() + self.extras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.extras.is_empty()
    }
}

impl Serialize for PayloadObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, entry) in self.entries() {
            match entry {
                ObjectEntry::Typed(value) => map.serialize_entry(key, value)?,
                ObjectEntry::Extra(value) => map.serialize_entry(key, value)?,
            }
        }
        map.end()
    }
}
