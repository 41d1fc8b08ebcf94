//! Schema validator for contribution claims.
//!
//! Validation is exhaustive: every violation in a record is collected in one
//! pass so a caller can report everything wrong at once. Values that pass
//! are normalized on the way (amounts, timestamps, date keys), and members a
//! schema does not declare are kept verbatim with a warning.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::descriptor::{FieldKind, ListSpec, MapSpec, ObjectRule, ObjectSchema, Uniqueness};
use crate::error::{ClaimRejection, SchemaError, ValidationError};
use crate::registry::TypeRegistry;
use crate::types::{
    envelope, ClaimExcerpt, FieldError, FieldPath, ValidatedClaim, ValidatedPayload,
    ValidationWarning, WalletAddress,
};
use crate::value::{
    format_date, format_timestamp, parse_date, parse_timestamp, Amount, PayloadObject,
    PayloadValue,
};

/// Tunables for validation.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// How far past "now" a `claimedDate` may be before it counts as future
    pub max_future_skew: Duration,
    /// Deepest nesting accepted for opaque and pass-through values
    pub max_opaque_depth: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            max_future_skew: Duration::seconds(300),
            max_opaque_depth: 32,
        }
    }
}

/// Validates claims against the schemas in a [`TypeRegistry`].
pub struct SchemaValidator {
    registry: Arc<TypeRegistry>,
    options: ValidationOptions,
}

impl SchemaValidator {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            options: ValidationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Validate a `securedSharedData` payload against the schema for a type.
    ///
    /// Paths in the returned errors are relative to the payload.
    pub fn validate(
        &self,
        contribution_type: &str,
        payload: &Value,
    ) -> Result<ValidatedPayload, ValidationError> {
        let descriptor = self.registry.resolve(contribution_type)?;

        let mut walker = Walker::new(&self.options);
        let normalized = walker.object(&descriptor.payload, payload, &FieldPath::root());

        match normalized {
            Some(payload) if walker.errors.is_empty() => Ok(ValidatedPayload {
                contribution_type: descriptor.contribution_type.clone(),
                schema_version: descriptor.version,
                payload,
                warnings: walker.warnings,
            }),
            _ => {
                debug!(
                    contribution_type = %contribution_type,
                    errors = walker.errors.len(),
                    "Payload failed validation"
                );
                Err(ValidationError::Fields(walker.errors))
            }
        }
    }

    /// Validate a complete raw claim: envelope fields and payload together.
    ///
    /// `now` is the ingestion time used to reject future claim dates.
    pub fn validate_claim(
        &self,
        raw: &Value,
        now: DateTime<Utc>,
    ) -> Result<ValidatedClaim, ClaimRejection> {
        let excerpt = ClaimExcerpt::from_value(raw);
        let root = FieldPath::root();

        let Some(members) = raw.as_object() else {
            return Err(ClaimRejection {
                excerpt,
                schema_error: None,
                errors: vec![FieldError::wrong_type(&root, "object", raw)],
                warnings: Vec::new(),
            });
        };

        let mut walker = Walker::new(&self.options);

        let contribution_type = walker.required_text(members, envelope::TYPE, &root);

        let claimed_date = walker
            .required_text(members, envelope::CLAIMED_DATE, &root)
            .and_then(|text| walker.claimed_date(text, &root.key(envelope::CLAIMED_DATE), now));

        let witnesses = walker
            .required_text(members, envelope::WITNESSES, &root)
            .and_then(|text| walker.witness(text, &root.key(envelope::WITNESSES)));

        let wallet_address = walker
            .required_text(members, envelope::WALLET_ADDRESS, &root)
            .and_then(|text| {
                let address = WalletAddress::parse(text);
                if address.is_none() {
                    walker.error(FieldError::malformed(
                        &root.key(envelope::WALLET_ADDRESS),
                        format!(
                            "`{}` is not `0x` followed by {} alphanumeric characters",
                            text,
                            WalletAddress::BODY_LEN
                        ),
                    ));
                }
                address
            });

        let account_username = walker
            .required_text(members, envelope::ACCOUNT_USERNAME, &root)
            .and_then(|text| {
                if text.trim().is_empty() {
                    walker.error(FieldError::constraint(
                        &root.key(envelope::ACCOUNT_USERNAME),
                        "must not be empty",
                    ));
                    None
                } else {
                    Some(text.to_string())
                }
            });

        let mut schema_error: Option<SchemaError> = None;
        let descriptor = contribution_type.and_then(|tag| match self.registry.resolve(tag) {
            Ok(descriptor) => Some(descriptor),
            Err(err) => {
                schema_error = Some(err);
                None
            }
        });

        let payload_path = root.key(envelope::SECURED_SHARED_DATA);
        let payload = match members.get(envelope::SECURED_SHARED_DATA) {
            None | Some(Value::Null) => {
                walker.error(FieldError::missing(&payload_path));
                None
            }
            Some(raw_payload) => match &descriptor {
                Some(descriptor) => walker.object(&descriptor.payload, raw_payload, &payload_path),
                None => {
                    if !raw_payload.is_object() {
                        walker.error(FieldError::wrong_type(&payload_path, "object", raw_payload));
                    }
                    None
                }
            },
        };

        let mut extras = BTreeMap::new();
        for (key, value) in members {
            if envelope::ALL.contains(&key.as_str()) {
                continue;
            }
            let path = root.key(key);
            walker.warn(ValidationWarning::unknown_field(&path));
            if let Some(value) = walker.opaque(value, &path) {
                extras.insert(key.clone(), value);
            }
        }

        let Walker {
            errors, warnings, ..
        } = walker;

        match (
            descriptor,
            claimed_date,
            witnesses,
            wallet_address,
            account_username,
            payload,
        ) {
            (
                Some(descriptor),
                Some(claimed_date),
                Some(witnesses),
                Some(wallet_address),
                Some(account_username),
                Some(payload),
            ) if errors.is_empty() => Ok(ValidatedClaim {
                contribution_type: descriptor.contribution_type.clone(),
                schema_version: descriptor.version,
                claimed_date,
                witnesses,
                wallet_address,
                account_username,
                payload,
                extras,
                warnings,
            }),
            _ => {
                debug!(
                    contribution_type = ?excerpt.contribution_type,
                    errors = errors.len(),
                    unknown_type = schema_error.is_some(),
                    "Claim failed validation"
                );
                Err(ClaimRejection {
                    excerpt,
                    schema_error,
                    errors,
                    warnings,
                })
            }
        }
    }
}

/// Walks a raw value against a schema, accumulating findings.
///
/// Every check returns `None` after recording at least one error, so callers
/// only need to track whether anything below them failed.
struct Walker<'a> {
    options: &'a ValidationOptions,
    errors: Vec<FieldError>,
    warnings: Vec<ValidationWarning>,
}

impl<'a> Walker<'a> {
    fn new(options: &'a ValidationOptions) -> Self {
        Self {
            options,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    fn warn(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    fn required_text<'v>(
        &mut self,
        members: &'v Map<String, Value>,
        key: &str,
        parent: &FieldPath,
    ) -> Option<&'v str> {
        let path = parent.key(key);
        match members.get(key) {
            None | Some(Value::Null) => {
                self.error(FieldError::missing(&path));
                None
            }
            Some(Value::String(text)) => Some(text.as_str()),
            Some(other) => {
                self.error(FieldError::wrong_type(&path, "string", other));
                None
            }
        }
    }

    fn claimed_date(
        &mut self,
        text: &str,
        path: &FieldPath,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let Some(claimed) = parse_timestamp(text) else {
            self.error(FieldError::malformed(
                path,
                format!("`{}` is not an RFC 3339 timestamp", text),
            ));
            return None;
        };
        if claimed > now + self.options.max_future_skew {
            self.error(FieldError::constraint(
                path,
                format!(
                    "claimed date {} is after ingestion time {}",
                    format_timestamp(&claimed),
                    format_timestamp(&now)
                ),
            ));
            return None;
        }
        Some(claimed)
    }

    fn witness(&mut self, text: &str, path: &FieldPath) -> Option<String> {
        match Url::parse(text) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
                Some(text.to_string())
            }
            Ok(url) => {
                self.error(FieldError::malformed(
                    path,
                    format!("witness scheme `{}` is not http or https", url.scheme()),
                ));
                None
            }
            Err(err) => {
                self.error(FieldError::malformed(
                    path,
                    format!("`{}` is not a URI: {}", text, err),
                ));
                None
            }
        }
    }

    fn object(
        &mut self,
        schema: &ObjectSchema,
        raw: &Value,
        path: &FieldPath,
    ) -> Option<PayloadObject> {
        let Some(members) = raw.as_object() else {
            self.error(FieldError::wrong_type(path, "object", raw));
            return None;
        };

        let mut complete = true;
        let mut fields = BTreeMap::new();
        for (name, spec) in schema.fields() {
            let field_path = path.key(name);
            match members.get(name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        self.error(FieldError::missing(&field_path));
                        complete = false;
                    }
                }
                Some(value) => match self.value(&spec.kind, value, &field_path) {
                    Some(parsed) => {
                        fields.insert(name.to_string(), parsed);
                    }
                    None => complete = false,
                },
            }
        }

        let mut extras = BTreeMap::new();
        for (key, value) in members {
            if schema.spec(key).is_some() {
                continue;
            }
            let extra_path = path.key(key);
            self.warn(ValidationWarning::unknown_field(&extra_path));
            match self.opaque(value, &extra_path) {
                Some(value) => {
                    extras.insert(key.clone(), value);
                }
                None => complete = false,
            }
        }

        for rule in schema.rules() {
            if !self.rule(rule, &fields, path) {
                complete = false;
            }
        }

        complete.then_some(PayloadObject { fields, extras })
    }

    fn rule(
        &mut self,
        rule: &ObjectRule,
        fields: &BTreeMap<String, PayloadValue>,
        path: &FieldPath,
    ) -> bool {
        match rule {
            ObjectRule::Chronological { earlier, later } => {
                let start = fields.get(earlier).and_then(PayloadValue::as_timestamp);
                let end = fields.get(later).and_then(PayloadValue::as_timestamp);
                match (start, end) {
                    (Some(start), Some(end)) if end < start => {
                        self.error(FieldError::constraint(
                            &path.key(later),
                            format!(
                                "`{}` ({}) precedes `{}` ({})",
                                later,
                                format_timestamp(end),
                                earlier,
                                format_timestamp(start)
                            ),
                        ));
                        false
                    }
                    _ => true,
                }
            }
        }
    }

    fn string<'v>(&mut self, kind: &FieldKind, raw: &'v Value, path: &FieldPath) -> Option<&'v str> {
        match raw.as_str() {
            Some(text) => Some(text),
            None => {
                self.error(FieldError::wrong_type(path, kind.expected_json(), raw));
                None
            }
        }
    }

    fn value(&mut self, kind: &FieldKind, raw: &Value, path: &FieldPath) -> Option<PayloadValue> {
        match kind {
            FieldKind::Text { allow_empty } => {
                let text = self.string(kind, raw, path)?;
                if !allow_empty && text.trim().is_empty() {
                    self.error(FieldError::constraint(path, "must not be empty"));
                    return None;
                }
                Some(PayloadValue::Text(text.to_string()))
            }
            FieldKind::Integer { min } => {
                let Some(number) = raw.as_i64() else {
                    if raw.is_u64() {
                        self.error(FieldError::malformed(path, "integer is out of range"));
                    } else {
                        self.error(FieldError::wrong_type(path, "integer", raw));
                    }
                    return None;
                };
                if let Some(min) = min {
                    if number < *min {
                        self.error(FieldError::constraint(
                            path,
                            format!("{} is below the minimum of {}", number, min),
                        ));
                        return None;
                    }
                }
                Some(PayloadValue::Integer(number))
            }
            FieldKind::Timestamp => {
                let text = self.string(kind, raw, path)?;
                match parse_timestamp(text) {
                    Some(ts) => Some(PayloadValue::Timestamp(ts)),
                    None => {
                        self.error(FieldError::constraint(
                            path,
                            format!("`{}` is not an RFC 3339 timestamp", text),
                        ));
                        None
                    }
                }
            }
            FieldKind::Date => {
                let text = self.string(kind, raw, path)?;
                match parse_date(text) {
                    Some(date) => Some(PayloadValue::Date(date)),
                    None => {
                        self.error(FieldError::malformed(
                            path,
                            format!("`{}` is not a YYYY-MM-DD calendar date", text),
                        ));
                        None
                    }
                }
            }
            FieldKind::Amount => {
                let text = self.string(kind, raw, path)?;
                match Amount::parse(text) {
                    Ok(amount) => Some(PayloadValue::Amount(amount)),
                    Err(err) => {
                        self.error(FieldError::malformed(path, err.to_string()));
                        None
                    }
                }
            }
            FieldKind::Uri => {
                let text = self.string(kind, raw, path)?;
                match Url::parse(text) {
                    Ok(url) if url.has_host() => Some(PayloadValue::Uri(text.to_string())),
                    _ => {
                        self.error(FieldError::malformed(
                            path,
                            format!("`{}` is not an absolute URI", text),
                        ));
                        None
                    }
                }
            }
            FieldKind::OneOf(allowed) => {
                let text = self.string(kind, raw, path)?;
                if allowed.iter().any(|candidate| candidate == text) {
                    Some(PayloadValue::Text(text.to_string()))
                } else {
                    self.error(FieldError::constraint(
                        path,
                        format!("`{}` is not one of: {}", text, allowed.join(", ")),
                    ));
                    None
                }
            }
            FieldKind::List(spec) => self.list(spec, raw, path),
            FieldKind::Map(spec) => self.map(spec, raw, path),
            FieldKind::Object(schema) => self.object(schema, raw, path).map(PayloadValue::Object),
            FieldKind::Opaque => self.opaque(raw, path).map(PayloadValue::Opaque),
        }
    }

    fn list(&mut self, spec: &ListSpec, raw: &Value, path: &FieldPath) -> Option<PayloadValue> {
        let Some(items) = raw.as_array() else {
            self.error(FieldError::wrong_type(path, "array", raw));
            return None;
        };

        let mut complete = true;
        let mut parsed = Vec::with_capacity(items.len());
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (index, item) in items.iter().enumerate() {
            let item_path = path.index(index);
            match self.value(&spec.element, item, &item_path) {
                Some(value) => parsed.push(value),
                None => complete = false,
            }

            match &spec.uniqueness {
                Uniqueness::Unconstrained => {}
                Uniqueness::WarnOnDuplicates => {
                    let key = item.to_string();
                    match seen.get(&key) {
                        Some(&first) => self.warn(ValidationWarning::duplicate(&item_path, first)),
                        None => {
                            seen.insert(key, index);
                        }
                    }
                }
                Uniqueness::UniqueField(field) => {
                    let Some(id) = item.get(field).and_then(Value::as_str) else {
                        continue;
                    };
                    match seen.get(id) {
                        Some(&first) => {
                            self.error(FieldError::constraint(
                                &item_path.key(field),
                                format!(
                                    "duplicate `{}` value `{}`, first used by element {}",
                                    field, id, first
                                ),
                            ));
                            complete = false;
                        }
                        None => {
                            seen.insert(id.to_string(), index);
                        }
                    }
                }
            }
        }

        complete.then_some(PayloadValue::List(parsed))
    }

    fn map(&mut self, spec: &MapSpec, raw: &Value, path: &FieldPath) -> Option<PayloadValue> {
        let Some(members) = raw.as_object() else {
            self.error(FieldError::wrong_type(path, "object", raw));
            return None;
        };

        let mut complete = true;
        let mut parsed = BTreeMap::new();

        for (key, value) in members {
            let entry_path = path.key(key);
            let normalized = match parse_date(key) {
                Some(date) => Some(format_date(&date)),
                None => {
                    self.error(FieldError::malformed(
                        &entry_path,
                        format!("key `{}` is not a YYYY-MM-DD calendar date", key),
                    ));
                    None
                }
            };
            let value = self.value(&spec.value, value, &entry_path);

            match (normalized, value) {
                (Some(normalized), Some(value)) => {
                    parsed.insert(normalized, value);
                }
                _ => complete = false,
            }
        }

        complete.then_some(PayloadValue::Map(parsed))
    }

    fn opaque(&mut self, raw: &Value, path: &FieldPath) -> Option<Value> {
        if json_depth(raw) > self.options.max_opaque_depth {
            self.error(FieldError::constraint(
                path,
                format!(
                    "value is nested deeper than {} levels",
                    self.options.max_opaque_depth
                ),
            ));
            return None;
        }
        Some(raw.clone())
    }
}

fn json_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(json_depth).max().unwrap_or(0),
        Value::Object(members) => 1 + members.values().map(json_depth).max().unwrap_or(0),
        _ => 0,
    }
}
