//! Schema descriptors for `securedSharedData` payloads.
//!
//! A descriptor is plain data: field name to [`FieldSpec`], with composite
//! kinds nesting their element schemas. Adding a contribution type means
//! building a new descriptor, never touching the validator.

use crate::types::ContributionType;

/// Schema governing one contribution type's payload.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    /// Tag this descriptor is registered under
    pub contribution_type: ContributionType,
    /// Schema revision, bumped when a tag is re-registered with a new shape
    pub version: u32,
    /// Shape of `securedSharedData`
    pub payload: ObjectSchema,
}

impl SchemaDescriptor {
    /// Create a version-1 descriptor.
    pub fn new(contribution_type: impl Into<ContributionType>, payload: ObjectSchema) -> Self {
        Self {
            contribution_type: contribution_type.into(),
            version: 1,
            payload,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
}

/// Whether a field must be present, and what it must look like.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub required: bool,
    pub kind: FieldKind,
}

/// Shape of a JSON object: declared members plus cross-field rules.
///
/// Members are kept in declaration order so errors come out in a stable
/// order.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    fields: Vec<(String, FieldSpec)>,
    rules: Vec<ObjectRule>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required member.
    pub fn required(self, name: &str, kind: FieldKind) -> Self {
        self.field(name, true, kind)
    }

    /// Declare an optional member.
    pub fn optional(self, name: &str, kind: FieldKind) -> Self {
        self.field(name, false, kind)
    }

    fn field(mut self, name: &str, required: bool, kind: FieldKind) -> Self {
        self.fields.retain(|(existing, _)| existing != name);
        self.fields.push((name.to_string(), FieldSpec { required, kind }));
        self
    }

    /// Attach a cross-field rule.
    pub fn rule(mut self, rule: ObjectRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, spec)| spec)
    }

    pub fn rules(&self) -> &[ObjectRule] {
        &self.rules
    }
}

/// What a single value must look like.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// String, optionally allowed to be blank
    Text { allow_empty: bool },
    /// JSON integer with an optional lower bound
    Integer { min: Option<i64> },
    /// RFC 3339 timestamp
    Timestamp,
    /// `YYYY-MM-DD` calendar date
    Date,
    /// `"<magnitude> <CODE>"` amount
    Amount,
    /// Absolute URI
    Uri,
    /// String drawn from a closed set
    OneOf(Vec<String>),
    List(Box<ListSpec>),
    /// Object keyed by `YYYY-MM-DD` dates
    Map(Box<MapSpec>),
    Object(ObjectSchema),
    /// Any JSON value, carried verbatim
    Opaque,
}

impl FieldKind {
    /// Non-blank string.
    pub fn text() -> Self {
        Self::Text { allow_empty: false }
    }

    /// String that may be blank.
    pub fn any_text() -> Self {
        Self::Text { allow_empty: true }
    }

    /// Integer that cannot be negative.
    pub fn count() -> Self {
        Self::Integer { min: Some(0) }
    }

    pub fn one_of(values: &[&str]) -> Self {
        Self::OneOf(values.iter().map(|v| v.to_string()).collect())
    }

    /// List with no uniqueness constraint.
    pub fn list_of(element: FieldKind) -> Self {
        Self::list(ListSpec {
            element,
            uniqueness: Uniqueness::Unconstrained,
        })
    }

    pub fn list(spec: ListSpec) -> Self {
        Self::List(Box::new(spec))
    }

    /// Map keyed by calendar date.
    pub fn date_map(value: FieldKind) -> Self {
        Self::Map(Box::new(MapSpec { value }))
    }

    pub fn object(schema: ObjectSchema) -> Self {
        Self::Object(schema)
    }

    /// JSON type a value of this kind must have, for `WrongType` messages.
    pub fn expected_json(&self) -> &'static str {
        match self {
            Self::Text { .. }
            | Self::Timestamp
            | Self::Date
            | Self::Amount
            | Self::Uri
            | Self::OneOf(_) => "string",
            Self::Integer { .. } => "integer",
            Self::List(_) => "array",
            Self::Map(_) | Self::Object(_) => "object",
            Self::Opaque => "any value",
        }
    }
}

/// Element schema and uniqueness policy of a list.
#[derive(Debug, Clone)]
pub struct ListSpec {
    pub element: FieldKind,
    pub uniqueness: Uniqueness,
}

/// How repeated list elements are treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Uniqueness {
    /// Repeats are fine
    Unconstrained,
    /// Repeats are reported as warnings
    WarnOnDuplicates,
    /// The named member of each object element must be unique (error)
    UniqueField(String),
}

/// Value schema of a date-keyed map. Keys are normalized to `YYYY-MM-DD`.
#[derive(Debug, Clone)]
pub struct MapSpec {
    pub value: FieldKind,
}

/// A rule relating two or more members of the same object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectRule {
    /// Timestamp `later` must not precede timestamp `earlier`
    Chronological { earlier: String, later: String },
}

impl ObjectRule {
    pub fn chronological(earlier: &str, later: &str) -> Self {
        Self::Chronological {
            earlier: earlier.to_string(),
            later: later.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_schema_builder() {
        let schema = ObjectSchema::new()
            .required("userid", FieldKind::text())
            .optional("note", FieldKind::any_text())
            .required("userid", FieldKind::count());

        let names: Vec<&str> = schema.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["note", "userid"]);
        assert!(matches!(
            schema.spec("userid").map(|s| &s.kind),
            Some(FieldKind::Integer { min: Some(0) })
        ));
        assert!(!schema.spec("note").unwrap().required);
    }

    #[test]
    fn test_expected_json_names() {
        assert_eq!(FieldKind::Amount.expected_json(), "string");
        assert_eq!(FieldKind::list_of(FieldKind::text()).expected_json(), "array");
        assert_eq!(FieldKind::date_map(FieldKind::text()).expected_json(), "object");
    }
}
