//! The closed vocabulary for enum-typed requirement fields.
//!
//! Each field has a tagged-variant type whose variants are the legal values.
//! The [`Registry`] layers administrative state on top of that static mapping:
//! values may be retired (and reinstated) so that new records can no longer
//! use them, without invalidating records that already do.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Names an enum-typed requirement field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumField {
    /// `type`
    Type,
    /// `status`
    Status,
    /// `priority`
    Priority,
    /// `layer`
    Layer,
    /// `source`
    Source,
    /// `type` of a link
    LinkType,
}

impl EnumField {
    /// Every enum-typed field.
    pub const ALL: &'static [Self] = &[
        Self::Type,
        Self::Status,
        Self::Priority,
        Self::Layer,
        Self::Source,
        Self::LinkType,
    ];

    /// The wire name of the field.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::Layer => "layer",
            Self::Source => "source",
            Self::LinkType => "link_type",
        }
    }

    /// The static set of legal values, in declaration order.
    #[must_use]
    pub const fn vocabulary(self) -> &'static [&'static str] {
        match self {
            Self::Type => RequirementType::LABELS,
            Self::Status => Status::LABELS,
            Self::Priority => Priority::LABELS,
            Self::Layer => Layer::LABELS,
            Self::Source => Source::LABELS,
            Self::LinkType => LinkType::LABELS,
        }
    }

    /// Resolve a raw value to its canonical spelling, ignoring case and
    /// separators.
    #[must_use]
    pub fn canonical(self, raw: &str) -> Option<&'static str> {
        let wanted = normalise(raw);
        self.vocabulary()
            .iter()
            .copied()
            .find(|label| normalise(label) == wanted)
    }
}

impl fmt::Display for EnumField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EnumField {
    type Err = UnknownFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalise(s);
        Self::ALL
            .iter()
            .copied()
            .find(|field| normalise(field.name()) == wanted)
            .ok_or_else(|| UnknownFieldError(s.to_string()))
    }
}

/// Error returned when a string does not name an enum-typed field.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("'{0}' is not an enumerated requirement field")]
pub struct UnknownFieldError(String);

fn normalise(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// A closed vocabulary type backing one [`EnumField`].
pub trait Vocabulary: Copy + Eq + 'static {
    /// The field this vocabulary constrains.
    const FIELD: EnumField;

    /// Every legal value.
    fn all() -> &'static [Self];

    /// The canonical spelling of this value.
    fn label(self) -> &'static str;

    /// Look a value up by any accepted spelling.
    fn lookup(raw: &str) -> Option<Self> {
        let wanted = normalise(raw);
        Self::all()
            .iter()
            .copied()
            .find(|value| normalise(value.label()) == wanted)
    }
}

/// Error returned when parsing a vocabulary value fails.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("'{value}' is not a valid {field}")]
pub struct UnknownValueError {
    field: EnumField,
    value: String,
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident => $field:expr;
        $( $(#[$vmeta:meta])* $variant:ident = $label:literal ),+ $(,)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every value, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Canonical spellings, in declaration order.
            pub const LABELS: &'static [&'static str] = &[$($label),+];

            /// The canonical spelling of this value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl Vocabulary for $name {
            const FIELD: EnumField = $field;

            fn all() -> &'static [Self] {
                Self::ALL
            }

            fn label(self) -> &'static str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownValueError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <Self as Vocabulary>::lookup(s).ok_or_else(|| UnknownValueError {
                    field: $field,
                    value: s.to_string(),
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

vocabulary! {
    /// What kind of statement a requirement makes.
    RequirementType => EnumField::Type;
    /// Behaviour the system must exhibit.
    Functional = "Functional",
    /// A quality attribute (performance, availability, ...).
    NonFunctional = "Non-Functional",
    /// A restriction on the solution space.
    Constraint = "Constraint",
    /// A statement of how another requirement is verified.
    Verification = "Verification",
}

vocabulary! {
    /// Lifecycle state.
    ///
    /// The expected flow is `Draft → Approved → Deprecated` or
    /// `Draft → Rejected`, but transitions are not enforced.
    Status => EnumField::Status;
    /// Being written.
    Draft = "Draft",
    /// Put forward for review.
    Proposed = "Proposed",
    /// Accepted and scheduled.
    Planned = "Planned",
    /// Agreed.
    Approved = "Approved",
    /// Declined. Terminal.
    Rejected = "Rejected",
    /// Superseded or withdrawn.
    Deprecated = "Deprecated",
}

vocabulary! {
    /// Ordered priority scale, `Low < Medium < High`.
    Priority => EnumField::Priority;
    /// Nice to have.
    Low = "Low",
    /// Should have.
    Medium = "Medium",
    /// Must have.
    High = "High",
}

vocabulary! {
    /// The specification layer a requirement belongs to.
    Layer => EnumField::Layer;
    /// Business / stakeholder needs.
    Business = "Business",
    /// System-level specification.
    System = "System",
    /// Software-level specification.
    Software = "Software",
    /// Test specification.
    Test = "Test",
}

vocabulary! {
    /// Where a requirement originated.
    Source => EnumField::Source;
    /// A stakeholder request.
    Stakeholder = "Stakeholder",
    /// A reference document.
    Document = "Document",
    /// Behaviour inherited from a previous system.
    PreviousSystem = "PreviousSystem",
    /// A regulation or standard.
    Regulation = "Regulation",
    /// A support ticket.
    SupportTicket = "SupportTicket",
    /// The product owner.
    ProductOwner = "ProductOwner",
    /// A developer.
    Developer = "Developer",
}

vocabulary! {
    /// The relationship a link expresses, from the linking requirement to its
    /// target.
    LinkType => EnumField::LinkType;
    /// Cannot be met without the target.
    DependsOn = "DependsOn",
    /// Fulfils the target.
    Satisfies = "Satisfies",
    /// Elaborates the target in more detail.
    Refines = "Refines",
    /// Cannot be met together with the target.
    ConflictsWith = "ConflictsWith",
}

/// Why a value was refused by the [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// Not part of the vocabulary at all.
    Unknown,
    /// Part of the vocabulary but retired.
    Retired,
}

/// The outcome of a failed registry check: which field, which value, and
/// what would have been accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.describe())]
pub struct RegistryMiss {
    /// The field being checked.
    pub field: EnumField,
    /// The offending value, as supplied.
    pub value: String,
    /// Why it was refused.
    pub reason: MissReason,
    /// The values currently accepted for the field.
    pub allowed: Vec<&'static str>,
}

impl RegistryMiss {
    fn describe(&self) -> String {
        match self.reason {
            MissReason::Unknown => format!(
                "'{}' is not a valid {} (expected one of: {})",
                self.value,
                self.field,
                self.allowed.join(", ")
            ),
            MissReason::Retired => format!(
                "'{}' has been retired for {} (expected one of: {})",
                self.value,
                self.field,
                self.allowed.join(", ")
            ),
        }
    }
}

/// The set of legal values for each enum-typed field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    retired: BTreeMap<EnumField, BTreeSet<&'static str>>,
}

impl Registry {
    /// A registry with every vocabulary value available.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The values currently accepted for `field`, in declaration order.
    #[must_use]
    pub fn values(&self, field: EnumField) -> Vec<&'static str> {
        field
            .vocabulary()
            .iter()
            .copied()
            .filter(|label| !self.is_retired(field, label))
            .collect()
    }

    /// Whether `label` (a canonical spelling) has been retired for `field`.
    #[must_use]
    pub fn is_retired(&self, field: EnumField, label: &str) -> bool {
        self.retired
            .get(&field)
            .is_some_and(|set| set.contains(label))
    }

    /// Check a raw value, returning its canonical spelling.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryMiss`] naming the offending value if it is not in
    /// the vocabulary or has been retired.
    pub fn check(&self, field: EnumField, raw: &str) -> Result<&'static str, RegistryMiss> {
        let Some(label) = field.canonical(raw) else {
            return Err(self.miss(field, raw, MissReason::Unknown));
        };
        if self.is_retired(field, label) {
            return Err(self.miss(field, raw, MissReason::Retired));
        }
        Ok(label)
    }

    /// Check a raw value and convert it to its typed variant.
    ///
    /// # Errors
    ///
    /// As for [`Registry::check`].
    pub fn check_as<V: Vocabulary>(&self, raw: &str) -> Result<V, RegistryMiss> {
        let Some(value) = V::lookup(raw) else {
            return Err(self.miss(V::FIELD, raw, MissReason::Unknown));
        };
        if self.is_retired(V::FIELD, value.label()) {
            return Err(self.miss(V::FIELD, raw, MissReason::Retired));
        }
        Ok(value)
    }

    /// Retire a value so that it is refused for new records.
    ///
    /// Returns `true` if the value was newly retired.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryMiss`] if the value is not in the vocabulary.
    pub fn retire(&mut self, field: EnumField, raw: &str) -> Result<bool, RegistryMiss> {
        let label = field
            .canonical(raw)
            .ok_or_else(|| self.miss(field, raw, MissReason::Unknown))?;
        tracing::info!(%field, value = label, "retiring registry value");
        Ok(self.retired.entry(field).or_default().insert(label))
    }

    /// Make a retired value available again.
    ///
    /// Returns `true` if the value was previously retired.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryMiss`] if the value is not in the vocabulary.
    pub fn reinstate(&mut self, field: EnumField, raw: &str) -> Result<bool, RegistryMiss> {
        let label = field
            .canonical(raw)
            .ok_or_else(|| self.miss(field, raw, MissReason::Unknown))?;
        let removed = self
            .retired
            .get_mut(&field)
            .is_some_and(|set| set.remove(label));
        self.retired.retain(|_, set| !set.is_empty());
        Ok(removed)
    }

    /// Iterate over every retired `(field, value)` pair.
    pub fn retired(&self) -> impl Iterator<Item = (EnumField, &'static str)> + '_ {
        self.retired
            .iter()
            .flat_map(|(field, set)| set.iter().map(move |label| (*field, *label)))
    }

    fn miss(&self, field: EnumField, raw: &str, reason: MissReason) -> RegistryMiss {
        RegistryMiss {
            field,
            value: raw.to_string(),
            reason,
            allowed: self.values(field),
        }
    }
}
