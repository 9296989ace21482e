use std::collections::BTreeMap;

use borsh::BorshSerialize;
use chrono::{DateTime, Utc};
use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::domain::{
    RequirementId,
    registry::{Layer, LinkType, Priority, RequirementType, Source, Status},
};

/// A requirement is a single tracked specification item.
///
/// The id is assigned once and never changes. Everything a user can edit lives
/// in [`Fields`]; the timestamps and revision history are managed by the
/// service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    id: RequirementId,
    fields: Fields,
    provenance: Provenance,
}

/// The user-editable content of a requirement.
///
/// This contributes to the 'fingerprint' of the requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fields {
    /// Short summary. Never blank.
    pub title: NonEmptyString,
    /// What kind of statement this is.
    #[serde(rename = "type")]
    pub kind: RequirementType,
    /// Lifecycle state.
    pub status: Status,
    /// Relative importance.
    pub priority: Priority,
    /// Specification layer.
    #[serde(default)]
    pub layer: Option<Layer>,
    /// Origin of the requirement.
    #[serde(default)]
    pub source: Option<Source>,
    /// Free-text body.
    #[serde(default)]
    pub description: Option<String>,
    /// Why the requirement exists.
    #[serde(default)]
    pub rationale: Option<String>,
    /// How the requirement will be verified.
    #[serde(default)]
    pub verification: Option<String>,
    /// Typed relationships to other requirements.
    #[serde(default)]
    pub links: Vec<Link>,
    /// Auxiliary key/value pairs, e.g. a source document reference.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// A typed, directed relationship to another requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// The requirement being linked to. It need not exist.
    #[serde(rename = "target_id")]
    pub target: RequirementId,
    /// The relationship.
    #[serde(rename = "type")]
    pub kind: LinkType,
}

impl Fields {
    /// Minimal field set with every optional field left empty.
    #[must_use]
    pub const fn new(
        title: NonEmptyString,
        kind: RequirementType,
        status: Status,
        priority: Priority,
    ) -> Self {
        Self {
            title,
            kind,
            status,
            priority,
            layer: None,
            source: None,
            description: None,
            rationale: None,
            verification: None,
            links: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Calculate the fingerprint of these fields.
    ///
    /// The fingerprint is a SHA256 hash of the Borsh-serialized fields. Two
    /// field sets with the same fingerprint are considered unchanged.
    ///
    /// # Panics
    ///
    /// Panics if borsh serialization fails (which should never happen for this
    /// data structure).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        #[derive(BorshSerialize)]
        struct FingerprintData<'a> {
            title: &'a str,
            kind: &'a str,
            status: &'a str,
            priority: &'a str,
            layer: Option<&'a str>,
            source: Option<&'a str>,
            description: Option<&'a str>,
            rationale: Option<&'a str>,
            verification: Option<&'a str>,
            links: Vec<(String, &'a str)>,
            metadata: &'a BTreeMap<String, String>,
        }

        let data = FingerprintData {
            title: self.title.as_str(),
            kind: self.kind.as_str(),
            status: self.status.as_str(),
            priority: self.priority.as_str(),
            layer: self.layer.map(Layer::as_str),
            source: self.source.map(Source::as_str),
            description: self.description.as_deref(),
            rationale: self.rationale.as_deref(),
            verification: self.verification.as_deref(),
            links: self
                .links
                .iter()
                .map(|link| (link.target.to_string(), link.kind.as_str()))
                .collect(),
            metadata: &self.metadata,
        };

        // encode using [borsh](https://borsh.io/)
        let encoded = borsh::to_vec(&data).expect("this should never fail");

        let hash = Sha256::digest(encoded);

        format!("{hash:x}")
    }
}

/// Server-managed bookkeeping. Does not contribute to the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// When the requirement was created.
    pub created: DateTime<Utc>,
    /// When the fields last changed.
    pub updated: DateTime<Utc>,
    /// Superseded field sets, oldest first.
    pub revisions: Vec<Revision>,
}

/// A superseded snapshot of a requirement's fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// When the snapshot was superseded.
    pub recorded: DateTime<Utc>,
    /// Fingerprint of the snapshot.
    pub fingerprint: String,
    /// The fields as they were.
    pub fields: Fields,
}

impl Requirement {
    /// Construct a new [`Requirement`] created at `now`.
    #[must_use]
    pub const fn new(id: RequirementId, fields: Fields, now: DateTime<Utc>) -> Self {
        Self {
            id,
            fields,
            provenance: Provenance {
                created: now,
                updated: now,
                revisions: Vec::new(),
            },
        }
    }

    pub(crate) const fn from_parts(
        id: RequirementId,
        fields: Fields,
        provenance: Provenance,
    ) -> Self {
        Self {
            id,
            fields,
            provenance,
        }
    }

    pub(crate) fn into_parts(self) -> (RequirementId, Fields, Provenance) {
        (self.id, self.fields, self.provenance)
    }

    /// The stable identifier of this requirement.
    #[must_use]
    pub const fn id(&self) -> &RequirementId {
        &self.id
    }

    /// The editable fields.
    #[must_use]
    pub const fn fields(&self) -> &Fields {
        &self.fields
    }

    /// The requirement title.
    #[must_use]
    pub fn title(&self) -> &str {
        self.fields.title.as_str()
    }

    /// When the requirement was first created.
    #[must_use]
    pub const fn created(&self) -> DateTime<Utc> {
        self.provenance.created
    }

    /// When the fields last changed.
    #[must_use]
    pub const fn updated(&self) -> DateTime<Utc> {
        self.provenance.updated
    }

    /// Superseded field sets, oldest first.
    #[must_use]
    pub fn revisions(&self) -> &[Revision] {
        &self.provenance.revisions
    }

    pub(crate) const fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Returns a value generated by hashing the fields of the requirement.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        self.fields.fingerprint()
    }

    /// Replace the fields, keeping the id.
    ///
    /// If the new fields differ from the current ones, the current fields are
    /// kept as a [`Revision`] and `updated` moves to `now`. Returns whether
    /// anything changed.
    pub fn apply(&mut self, fields: Fields, now: DateTime<Utc>) -> bool {
        let previous = self.fields.fingerprint();
        if fields.fingerprint() == previous {
            return false;
        }
        let superseded = std::mem::replace(&mut self.fields, fields);
        self.provenance.revisions.push(Revision {
            recorded: now,
            fingerprint: previous,
            fields: superseded,
        });
        self.provenance.updated = now;
        true
    }
}

impl Serialize for Requirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            id: &'a RequirementId,
            #[serde(flatten)]
            fields: &'a Fields,
            created: DateTime<Utc>,
            updated: DateTime<Utc>,
            fingerprint: String,
        }

        Wire {
            id: &self.id,
            fields: &self.fields,
            created: self.provenance.created,
            updated: self.provenance.updated,
            fingerprint: self.fingerprint(),
        }
        .serialize(serializer)
    }
}
