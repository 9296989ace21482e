//! Boundary validation of untyped requirement payloads.
//!
//! Payloads arrive as [`Candidate`] (create / replace) or [`Patch`] (partial
//! update) and are turned into typed [`Fields`] by [`validate`], which reports
//! every offending field rather than stopping at the first.

use std::{collections::BTreeMap, fmt};

use non_empty_string::NonEmptyString;
use nonempty::NonEmpty;
use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::SerializeStruct};

use crate::domain::{
    RequirementId,
    registry::{MissReason, Registry, RegistryMiss, Vocabulary},
    requirement::{Fields, Link},
};

/// A raw, untyped requirement payload.
///
/// Every field is optional at this stage so that missing fields can be
/// reported alongside other violations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Candidate {
    /// Caller-supplied id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Title.
    pub title: Option<String>,
    /// Requirement type.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Status.
    pub status: Option<String>,
    /// Priority.
    pub priority: Option<String>,
    /// Layer.
    pub layer: Option<String>,
    /// Source.
    pub source: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Rationale.
    pub rationale: Option<String>,
    /// Verification method.
    pub verification: Option<String>,
    /// Links to other requirements.
    pub links: Vec<CandidateLink>,
    /// Auxiliary key/value pairs.
    pub metadata: BTreeMap<String, String>,
}

/// A raw link payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    /// Target requirement id.
    pub target_id: String,
    /// Link type.
    #[serde(rename = "type")]
    pub kind: String,
}

impl Candidate {
    /// A candidate with the four required fields set.
    #[must_use]
    pub fn new(title: &str, kind: &str, status: &str, priority: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            kind: Some(kind.to_string()),
            status: Some(status.to_string()),
            priority: Some(priority.to_string()),
            ..Self::default()
        }
    }

    /// Sets the caller-supplied id.
    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

impl From<&Fields> for Candidate {
    fn from(fields: &Fields) -> Self {
        Self {
            id: None,
            title: Some(fields.title.as_str().to_string()),
            kind: Some(fields.kind.to_string()),
            status: Some(fields.status.to_string()),
            priority: Some(fields.priority.to_string()),
            layer: fields.layer.map(|v| v.to_string()),
            source: fields.source.map(|v| v.to_string()),
            description: fields.description.clone(),
            rationale: fields.rationale.clone(),
            verification: fields.verification.clone(),
            links: fields
                .links
                .iter()
                .map(|link| CandidateLink {
                    target_id: link.target.to_string(),
                    kind: link.kind.to_string(),
                })
                .collect(),
            metadata: fields.metadata.clone(),
        }
    }
}

/// A partial update.
///
/// An absent field keeps its current value. For optional fields an explicit
/// `null` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Patch {
    /// Title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Requirement type.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Layer.
    #[serde(
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub layer: Option<Option<String>>,
    /// Source.
    #[serde(
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub source: Option<Option<String>>,
    /// Description.
    #[serde(
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    /// Rationale.
    #[serde(
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub rationale: Option<Option<String>>,
    /// Verification method.
    #[serde(
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub verification: Option<Option<String>>,
    /// Replacement link list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<CandidateLink>>,
    /// Replacement metadata map.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Any value that is present, including `null`, becomes `Some`.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl Patch {
    /// A patch that only changes the status.
    #[must_use]
    pub fn status(status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            ..Self::default()
        }
    }

    /// Merge onto an existing payload.
    #[must_use]
    pub fn apply(self, mut base: Candidate) -> Candidate {
        fn keep<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        keep(&mut base.title, self.title);
        keep(&mut base.kind, self.kind);
        keep(&mut base.status, self.status);
        keep(&mut base.priority, self.priority);
        if let Some(layer) = self.layer {
            base.layer = layer;
        }
        if let Some(source) = self.source {
            base.source = source;
        }
        if let Some(description) = self.description {
            base.description = description;
        }
        if let Some(rationale) = self.rationale {
            base.rationale = rationale;
        }
        if let Some(verification) = self.verification {
            base.verification = verification;
        }
        if let Some(links) = self.links {
            base.links = links;
        }
        if let Some(metadata) = self.metadata {
            base.metadata = metadata;
        }
        base
    }
}

/// A candidate that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    /// The caller-supplied id, if any.
    pub id: Option<RequirementId>,
    /// The typed fields.
    pub fields: Fields,
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Wire name of the offending field, e.g. `status` or `links[0].type`.
    pub field: String,
    /// What is wrong with it.
    pub kind: ViolationKind,
}

/// The ways a field can be invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViolationKind {
    /// A required field was absent.
    #[error("is required")]
    Missing,

    /// A required text field was blank.
    #[error("must not be blank")]
    Blank,

    /// A single-line text field contained a line break.
    #[error("must be a single line")]
    Multiline,

    /// An enum-typed field held a value outside its registry.
    #[error(transparent)]
    Registry(RegistryMiss),

    /// An id could not be parsed.
    #[error("'{value}' is not a valid requirement id: {reason}")]
    MalformedId {
        /// The offending value.
        value: String,
        /// Why it failed to parse.
        reason: String,
    },

    /// A metadata key was blank.
    #[error("metadata keys must not be blank")]
    BlankMetadataKey,

    /// The payload tried to change an existing record's id.
    #[error("does not match {expected}; ids cannot change")]
    IdChanged {
        /// The id of the record being replaced.
        expected: String,
    },
}

impl ViolationKind {
    /// A short machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Blank => "blank",
            Self::Multiline => "multiline",
            Self::Registry(RegistryMiss {
                reason: MissReason::Unknown,
                ..
            }) => "not_in_registry",
            Self::Registry(RegistryMiss {
                reason: MissReason::Retired,
                ..
            }) => "retired",
            Self::MalformedId { .. } => "malformed_id",
            Self::BlankMetadataKey => "blank_metadata_key",
            Self::IdChanged { .. } => "id_changed",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.kind)
    }
}

impl Serialize for Violation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Violation", 3)?;
        state.serialize_field("field", &self.field)?;
        state.serialize_field("code", self.kind.code())?;
        state.serialize_field("message", &self.kind.to_string())?;
        state.end()
    }
}

/// Returned when a candidate violates type or enum constraints.
///
/// Lists every violation, in field order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid requirement: {}", render_violations(.violations))]
pub struct ValidationError {
    /// Every offending field.
    pub violations: NonEmpty<Violation>,
}

fn render_violations(violations: &NonEmpty<Violation>) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Violation> for ValidationError {
    fn from(violation: Violation) -> Self {
        Self {
            violations: NonEmpty::new(violation),
        }
    }
}

impl ValidationError {
    /// Whether any violation concerns `field`.
    #[must_use]
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

struct Checker<'a> {
    registry: &'a Registry,
    previous: Option<&'a Fields>,
    violations: Vec<Violation>,
}

impl Checker<'_> {
    fn report(&mut self, field: impl Into<String>, kind: ViolationKind) {
        self.violations.push(Violation {
            field: field.into(),
            kind,
        });
    }

    fn required_text(&mut self, field: &str, raw: Option<&str>) -> Option<NonEmptyString> {
        match raw {
            None => {
                self.report(field, ViolationKind::Missing);
                None
            }
            Some(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    self.report(field, ViolationKind::Blank);
                    None
                } else if trimmed.contains(['\n', '\r']) {
                    self.report(field, ViolationKind::Multiline);
                    None
                } else {
                    NonEmptyString::new(trimmed.to_string()).ok()
                }
            }
        }
    }

    /// Registry check, except that a retired value is accepted when the
    /// previous version of the record already held it.
    fn vocabulary<V: Vocabulary>(
        &mut self,
        field: &str,
        raw: &str,
        grandfathered: impl Fn(V) -> bool,
    ) -> Option<V> {
        match self.registry.check_as::<V>(raw) {
            Ok(value) => Some(value),
            Err(miss) => {
                if miss.reason == MissReason::Retired
                    && V::lookup(raw).is_some_and(&grandfathered)
                {
                    return V::lookup(raw);
                }
                self.report(field, ViolationKind::Registry(miss));
                None
            }
        }
    }

    fn required_enum<V: Vocabulary>(
        &mut self,
        raw: Option<&str>,
        previous: impl Fn(&Fields) -> V,
    ) -> Option<V> {
        let field = V::FIELD.name();
        match raw.map(str::trim) {
            None => {
                self.report(field, ViolationKind::Missing);
                None
            }
            Some("") => {
                self.report(field, ViolationKind::Blank);
                None
            }
            Some(raw) => {
                let held = self.previous.map(previous);
                self.vocabulary(field, raw, |v| held == Some(v))
            }
        }
    }

    fn optional_enum<V: Vocabulary>(
        &mut self,
        raw: Option<&str>,
        previous: impl Fn(&Fields) -> Option<V>,
    ) -> Option<V> {
        let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
        let held = self.previous.and_then(previous);
        self.vocabulary(V::FIELD.name(), raw, |v| held == Some(v))
    }

    fn links(&mut self, links: &[CandidateLink]) -> Vec<Link> {
        let held: Vec<_> = self
            .previous
            .map(|fields| fields.links.iter().map(|link| link.kind).collect())
            .unwrap_or_default();

        let mut parsed = Vec::with_capacity(links.len());
        for (index, link) in links.iter().enumerate() {
            let target = match link.target_id.trim().parse::<RequirementId>() {
                Ok(target) => Some(target),
                Err(e) => {
                    self.report(
                        format!("links[{index}].target_id"),
                        ViolationKind::MalformedId {
                            value: link.target_id.clone(),
                            reason: e.to_string(),
                        },
                    );
                    None
                }
            };
            let field = format!("links[{index}].type");
            let kind = self.vocabulary(&field, link.kind.trim(), |v| held.contains(&v));
            if let (Some(target), Some(kind)) = (target, kind) {
                parsed.push(Link { target, kind });
            }
        }
        parsed
    }
}

fn optional_text(raw: Option<&String>) -> Option<String> {
    raw.map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Validate a candidate against the registry.
///
/// `previous` is the current field set when the candidate replaces an
/// existing record; retired registry values it already holds are accepted.
///
/// # Errors
///
/// Returns a [`ValidationError`] listing every violating field.
#[tracing::instrument(level = "debug", skip_all)]
pub fn validate(
    registry: &Registry,
    candidate: &Candidate,
    previous: Option<&Fields>,
) -> Result<Validated, ValidationError> {
    let mut checker = Checker {
        registry,
        previous,
        violations: Vec::new(),
    };

    let id = candidate.id.as_deref().map(str::trim).and_then(|raw| {
        raw.parse::<RequirementId>()
            .map_err(|e| {
                checker.report(
                    "id",
                    ViolationKind::MalformedId {
                        value: raw.to_string(),
                        reason: e.to_string(),
                    },
                );
            })
            .ok()
    });

    let title = checker.required_text("title", candidate.title.as_deref());
    let kind = checker.required_enum(candidate.kind.as_deref(), |f| f.kind);
    let status = checker.required_enum(candidate.status.as_deref(), |f| f.status);
    let priority = checker.required_enum(candidate.priority.as_deref(), |f| f.priority);
    let layer = checker.optional_enum(candidate.layer.as_deref(), |f| f.layer);
    let source = checker.optional_enum(candidate.source.as_deref(), |f| f.source);
    let links = checker.links(&candidate.links);

    if candidate.metadata.keys().any(|key| key.trim().is_empty()) {
        checker.report("metadata", ViolationKind::BlankMetadataKey);
    }

    match (
        NonEmpty::from_vec(checker.violations),
        title,
        kind,
        status,
        priority,
    ) {
        (None, Some(title), Some(kind), Some(status), Some(priority)) => Ok(Validated {
            id,
            fields: Fields {
                title,
                kind,
                status,
                priority,
                layer,
                source,
                description: optional_text(candidate.description.as_ref()),
                rationale: optional_text(candidate.rationale.as_ref()),
                verification: optional_text(candidate.verification.as_ref()),
                links,
                metadata: candidate.metadata.clone(),
            },
        }),
        (Some(violations), ..) => {
            tracing::debug!(count = violations.len(), "candidate rejected");
            Err(ValidationError { violations })
        }
        (None, ..) => unreachable!("a missing required field is always reported"),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::domain::registry::{EnumField, LinkType, Priority, RequirementType, Status};

    fn sso() -> Candidate {
        Candidate::new("Login must support SSO", "functional", "draft", "high")
    }

    #[test]
    fn valid_candidate_is_typed() {
        let validated = validate(&Registry::new(), &sso(), None).unwrap();
        assert_eq!(validated.id, None);
        assert_eq!(validated.fields.title.as_str(), "Login must support SSO");
        assert_eq!(validated.fields.kind, RequirementType::Functional);
        assert_eq!(validated.fields.status, Status::Draft);
        assert_eq!(validated.fields.priority, Priority::High);
    }

    #[test]
    fn reports_every_violation() {
        let candidate = Candidate {
            title: Some("   ".into()),
            kind: Some("wish".into()),
            status: None,
            priority: Some("urgent".into()),
            layer: Some("Hardware".into()),
            metadata: BTreeMap::from([(String::new(), "x".into())]),
            ..Candidate::default()
        };

        let error = validate(&Registry::new(), &candidate, None).unwrap_err();
        let fields: Vec<_> = error.violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(
            fields,
            ["title", "type", "status", "priority", "layer", "metadata"]
        );
        assert_eq!(error.violations[0].kind, ViolationKind::Blank);
        assert_eq!(error.violations[2].kind, ViolationKind::Missing);
    }

    #[test]
    fn registry_violation_names_offending_value() {
        let candidate = Candidate {
            kind: Some("wish".into()),
            ..sso()
        };
        let error = validate(&Registry::new(), &candidate, None).unwrap_err();
        let ViolationKind::Registry(miss) = &error.violations.head.kind else {
            panic!("expected a registry violation");
        };
        assert_eq!(miss.value, "wish");
        assert_eq!(miss.field, EnumField::Type);
    }

    #[test_case("R1"; "no dash")]
    #[test_case("r-1"; "lowercase")]
    fn malformed_ids_are_reported(id: &str) {
        let error = validate(&Registry::new(), &sso().with_id(id), None).unwrap_err();
        assert!(error.mentions("id"));
    }

    #[test]
    fn links_are_checked_individually() {
        let candidate = Candidate {
            links: vec![
                CandidateLink {
                    target_id: "R-002".into(),
                    kind: "refines".into(),
                },
                CandidateLink {
                    target_id: "nope".into(),
                    kind: "blocks".into(),
                },
            ],
            ..sso()
        };
        let error = validate(&Registry::new(), &candidate, None).unwrap_err();
        assert!(error.mentions("links[1].target_id"));
        assert!(error.mentions("links[1].type"));
        assert!(!error.mentions("links[0].target_id"));

        let candidate = Candidate {
            links: candidate.links[..1].to_vec(),
            ..candidate
        };
        let validated = validate(&Registry::new(), &candidate, None).unwrap();
        assert_eq!(validated.fields.links[0].kind, LinkType::Refines);
    }

    #[test]
    fn retired_values_are_grandfathered() {
        let mut registry = Registry::new();
        let previous = validate(&registry, &sso(), None).unwrap().fields;
        registry.retire(EnumField::Status, "Draft").unwrap();

        let error = validate(&registry, &sso(), None).unwrap_err();
        assert_eq!(error.violations.head.kind.code(), "retired");

        let validated = validate(&registry, &sso(), Some(&previous)).unwrap();
        assert_eq!(validated.fields.status, Status::Draft);
    }

    #[test]
    fn title_must_be_single_line() {
        let candidate = Candidate {
            title: Some("Line one\nLine two".into()),
            ..sso()
        };
        let error = validate(&Registry::new(), &candidate, None).unwrap_err();
        assert_eq!(error.violations.head.kind, ViolationKind::Multiline);
    }

    #[test]
    fn blank_optional_text_is_absent() {
        let candidate = Candidate {
            description: Some("  ".into()),
            layer: Some(String::new()),
            ..sso()
        };
        let validated = validate(&Registry::new(), &candidate, None).unwrap();
        assert_eq!(validated.fields.description, None);
        assert_eq!(validated.fields.layer, None);
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let patch: Patch =
            serde_json::from_str(r#"{"status": "approved", "description": null}"#).unwrap();
        assert_eq!(patch.status.as_deref(), Some("approved"));
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.rationale, None);

        let base = Candidate {
            description: Some("old".into()),
            rationale: Some("kept".into()),
            ..sso()
        };
        let merged = patch.apply(base);
        assert_eq!(merged.status.as_deref(), Some("approved"));
        assert_eq!(merged.description, None);
        assert_eq!(merged.rationale.as_deref(), Some("kept"));
        assert_eq!(merged.title.as_deref(), Some("Login must support SSO"));
    }

    #[test]
    fn violations_serialise_with_codes() {
        let error = validate(&Registry::new(), &Candidate::default(), None).unwrap_err();
        let value = serde_json::to_value(&error.violations.head).unwrap();
        assert_eq!(value["field"], "title");
        assert_eq!(value["code"], "missing");
        assert_eq!(value["message"], "is required");
    }
}
