//! Canonical in-memory shapes for remote configuration templates.
//!
//! These structures are the contract shared with the transport layer: the
//! serde encoding derived here (camelCase field names, version numbers as
//! decimal strings, RFC3339 timestamps) is the canonical wire mapping, so a
//! JSON boundary can round-trip templates field-for-field without a separate
//! translation layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// MIME type of the canonical template encoding.
pub const TEMPLATE_MIME_TYPE: &str = "application/json";

/// Display color attached to a condition in management UIs.
///
/// Modeled as a closed enumeration with an explicit unspecified member; an
/// unknown wire value is rejected when the template is decoded rather than
/// carried around as an opaque string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagColor {
    /// No color selected. Encoded as the empty string.
    #[default]
    #[serde(rename = "")]
    Unspecified,
    #[serde(rename = "BLUE")]
    Blue,
    #[serde(rename = "BROWN")]
    Brown,
    #[serde(rename = "CYAN")]
    Cyan,
    #[serde(rename = "DEEPORANGE")]
    DeepOrange,
    #[serde(rename = "GREEN")]
    Green,
    #[serde(rename = "INDIGO")]
    Indigo,
    #[serde(rename = "LIME")]
    Lime,
    #[serde(rename = "ORANGE")]
    Orange,
    #[serde(rename = "PINK")]
    Pink,
    #[serde(rename = "PURPLE")]
    Purple,
    #[serde(rename = "TEAL")]
    Teal,
}

impl TagColor {
    /// Returns `true` for the unspecified member (used to elide the field).
    pub fn is_unspecified(&self) -> bool {
        matches!(self, TagColor::Unspecified)
    }
}

/// A named boolean predicate over client context, used to select conditional
/// parameter values.
///
/// The declaration order of conditions inside a [`Template`] is significant:
/// it is the precedence order applied during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Unique name within the template.
    pub name: String,
    /// Boolean expression over context attributes (see the `expr` module).
    pub expression: String,
    /// Display color; purely cosmetic.
    #[serde(default, skip_serializing_if = "TagColor::is_unspecified")]
    pub tag_color: TagColor,
}

impl Condition {
    /// Creates a condition with the unspecified display color.
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            tag_color: TagColor::Unspecified,
        }
    }

    /// Sets the display color.
    pub fn with_color(mut self, color: TagColor) -> Self {
        self.tag_color = color;
        self
    }
}

/// A parameter value: either an explicit string or an instruction to fall
/// back to the client's compiled-in default.
///
/// The two cases are a tagged variant rather than a string plus a boolean
/// flag, so a value that is simultaneously explicit and in-app-default is
/// unrepresentable. The untagged serde encoding keeps the wire shape of the
/// admin API: `{"value": "..."}` or `{"useInAppDefault": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// A concrete string served to clients.
    Explicit {
        value: String,
    },
    /// Clients should use their compiled-in default for this parameter.
    #[serde(rename_all = "camelCase")]
    UseInAppDefault {
        use_in_app_default: bool,
    },
}

impl ParameterValue {
    /// Creates an explicit value.
    pub fn explicit(value: impl Into<String>) -> Self {
        ParameterValue::Explicit {
            value: value.into(),
        }
    }

    /// Creates an in-app-default marker.
    pub fn in_app_default() -> Self {
        ParameterValue::UseInAppDefault {
            use_in_app_default: true,
        }
    }

    /// Resolves the value: the explicit string, or `None` signaling "use the
    /// client-compiled default".
    ///
    /// The variant alone decides the outcome; a `UseInAppDefault` carrying
    /// `false` (representable on the wire) still resolves to `None`.
    pub fn resolve(&self) -> Option<&str> {
        match self {
            ParameterValue::Explicit { value } => Some(value),
            ParameterValue::UseInAppDefault { .. } => None,
        }
    }
}

/// A named configuration key with a default value and optional per-condition
/// overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    /// Value served when no condition matches. Absent means "defer to the
    /// client default" even without a matching condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ParameterValue>,
    /// Per-condition overrides keyed by condition name. The map order is a
    /// storage detail; resolution precedence follows the template's condition
    /// declaration order, never this map's iteration order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditional_values: BTreeMap<String, ParameterValue>,
    /// Free-form description shown in management UIs.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Parameter {
    /// Creates a parameter with only a default value.
    pub fn with_default(value: ParameterValue) -> Self {
        Self {
            default_value: Some(value),
            ..Self::default()
        }
    }

    /// Adds a conditional override.
    pub fn with_conditional_value(mut self, condition: impl Into<String>, value: ParameterValue) -> Self {
        self.conditional_values.insert(condition.into(), value);
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A management-only grouping of parameters.
///
/// Grouping does not affect resolution: grouped parameters are served to
/// clients exactly like top-level ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterGroup {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,
}

/// The full set of conditions, parameters, and groups describing configurable
/// behavior.
///
/// `version` is output-only metadata stamped by the version store when the
/// template is published; candidates submitted for publishing carry `None`
/// and any supplied value is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    /// Conditions in declaration order. This order is the resolution
    /// precedence order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameter_groups: BTreeMap<String, ParameterGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

impl Template {
    /// Iterates every parameter, top-level first, then grouped parameters in
    /// group order. Grouped parameters resolve exactly like top-level ones.
    pub fn iter_parameters(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.parameters
            .iter()
            .map(|(name, parameter)| (name.as_str(), parameter))
            .chain(self.parameter_groups.values().flat_map(|group| {
                group
                    .parameters
                    .iter()
                    .map(|(name, parameter)| (name.as_str(), parameter))
            }))
    }

    /// Looks up a declared condition by name.
    pub fn condition(&self, name: &str) -> Option<&Condition> {
        self.conditions.iter().find(|condition| condition.name == name)
    }
}

/// A published template paired with its concurrency token.
///
/// This is what `GetTemplate` hands to callers; the `etag` must be
/// round-tripped unmodified through subsequent publish calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSnapshot {
    #[serde(flatten)]
    pub template: Template,
    pub etag: String,
}

impl TemplateSnapshot {
    /// Encodes the snapshot using the canonical JSON mapping.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Version metadata stamped at publish time.
    ///
    /// Present on every snapshot produced by the store; only hand-built
    /// snapshots can lack it.
    pub fn version(&self) -> Option<&Version> {
        self.template.version.as_ref()
    }
}

/// Where a template update originated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateOrigin {
    #[default]
    Unspecified,
    Console,
    RestApi,
    AdminSdk,
}

/// What kind of update produced a version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateType {
    #[default]
    Unspecified,
    IncrementalUpdate,
    ForcedUpdate,
    Rollback,
}

/// Audit metadata identifying who published a version. Set once at publish
/// time and immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_url: String,
}

impl User {
    /// Creates a user identified by email only.
    pub fn from_email(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }
}

/// Metadata about a published template version.
///
/// All fields are set at publish time; only the description is caller
/// supplied. `versionNumber` is encoded as a decimal string so decoders
/// without safe 64-bit integers can round-trip it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    #[serde(with = "version_number_string")]
    pub version_number: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub update_time: OffsetDateTime,
    #[serde(default)]
    pub update_origin: UpdateOrigin,
    #[serde(default)]
    pub update_type: UpdateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_user: Option<User>,
    #[serde(default)]
    pub is_legacy: bool,
    /// Version number this one was rolled back from; only set when
    /// `update_type` is [`UpdateType::Rollback`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_source: Option<i64>,
}

/// Serde adapter encoding an `i64` version number as a decimal string.
mod version_number_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<i64>().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    fn sample_version() -> Version {
        Version {
            version_number: 42,
            description: "enable dark mode".to_string(),
            update_time: datetime!(2026-03-01 12:30:00 UTC),
            update_origin: UpdateOrigin::RestApi,
            update_type: UpdateType::IncrementalUpdate,
            update_user: Some(User::from_email("admin@example.com")),
            is_legacy: false,
            rollback_source: None,
        }
    }

    /// The explicit variant resolves to its string.
    #[test]
    fn explicit_value_resolves_to_string() {
        let value = ParameterValue::explicit("aloha");
        assert_eq!(value.resolve(), Some("aloha"));
    }

    /// The in-app-default variant resolves to `None`, whatever the flag says.
    #[test]
    fn in_app_default_resolves_to_none() {
        assert_eq!(ParameterValue::in_app_default().resolve(), None);
        let wire_false = ParameterValue::UseInAppDefault {
            use_in_app_default: false,
        };
        assert_eq!(wire_false.resolve(), None);
    }

    /// The untagged encoding keeps the admin-API wire shapes for both variants.
    #[test]
    fn parameter_value_wire_shapes() {
        let explicit = serde_json::to_value(ParameterValue::explicit("x")).unwrap();
        assert_eq!(explicit, serde_json::json!({"value": "x"}));

        let fallback = serde_json::to_value(ParameterValue::in_app_default()).unwrap();
        assert_eq!(fallback, serde_json::json!({"useInAppDefault": true}));

        let decoded: ParameterValue =
            serde_json::from_value(serde_json::json!({"value": "y"})).unwrap();
        assert_eq!(decoded, ParameterValue::explicit("y"));
    }

    /// Version numbers travel as decimal strings and update times as RFC3339.
    #[test]
    fn version_number_encodes_as_string() {
        let encoded = serde_json::to_value(sample_version()).unwrap();
        assert_eq!(encoded["versionNumber"], serde_json::json!("42"));
        assert_eq!(encoded["updateTime"], serde_json::json!("2026-03-01T12:30:00Z"));
        assert_eq!(encoded["updateOrigin"], serde_json::json!("REST_API"));
        assert_eq!(encoded["updateType"], serde_json::json!("INCREMENTAL_UPDATE"));

        let decoded: Version = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, sample_version());
    }

    /// A non-numeric version number string is a decode error, not a silent zero.
    #[test]
    fn version_number_rejects_garbage() {
        let mut raw = serde_json::to_value(sample_version()).unwrap();
        raw["versionNumber"] = serde_json::json!("not-a-number");
        assert!(serde_json::from_value::<Version>(raw).is_err());
    }

    /// Unknown tag colors are rejected at decode time; the empty string maps
    /// to the unspecified member.
    #[test]
    fn tag_color_is_a_closed_enum() {
        let decoded: TagColor = serde_json::from_value(serde_json::json!("TEAL")).unwrap();
        assert_eq!(decoded, TagColor::Teal);
        let unspecified: TagColor = serde_json::from_value(serde_json::json!("")).unwrap();
        assert_eq!(unspecified, TagColor::Unspecified);
        assert!(serde_json::from_value::<TagColor>(serde_json::json!("MAGENTA")).is_err());
    }

    /// Snapshot encoding flattens the template beside its etag, matching the
    /// read-response wire shape.
    #[test]
    fn snapshot_flattens_template_fields() {
        let snapshot = TemplateSnapshot {
            template: Template {
                conditions: vec![Condition::new("is_ios", "device.platform == 'ios'")
                    .with_color(TagColor::Blue)],
                ..Template::default()
            },
            etag: "etag-1-abc".to_string(),
        };
        let encoded = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(encoded["etag"], serde_json::json!("etag-1-abc"));
        assert_eq!(
            encoded["conditions"][0]["expression"],
            serde_json::json!("device.platform == 'ios'")
        );
        assert_eq!(encoded["conditions"][0]["tagColor"], serde_json::json!("BLUE"));

        let bytes = snapshot.to_bytes().unwrap();
        let round_trip: TemplateSnapshot = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(round_trip, snapshot);
    }

    /// Grouped parameters appear in the flattened iteration after top-level
    /// ones.
    #[test]
    fn iter_parameters_includes_groups() {
        let mut template = Template::default();
        template
            .parameters
            .insert("greeting".to_string(), Parameter::with_default(ParameterValue::explicit("hi")));
        let mut group = ParameterGroup::default();
        group
            .parameters
            .insert("farewell".to_string(), Parameter::with_default(ParameterValue::explicit("bye")));
        template.parameter_groups.insert("tone".to_string(), group);

        let names: Vec<&str> = template.iter_parameters().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["greeting", "farewell"]);
    }
}
