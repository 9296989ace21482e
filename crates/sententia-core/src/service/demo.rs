use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};

use super::ServiceError;
use crate::domain::{
    Candidate, Registry, Requirement, ValidationError,
    schema::{Violation, ViolationKind, validate},
};

/// A bundled example dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demo {
    /// An ice-cream shop with layered, fully linked requirements.
    IceCream,
    /// The first Death Star.
    DeathStar,
}

impl Demo {
    /// Every bundled dataset.
    pub const ALL: &'static [Self] = &[Self::IceCream, Self::DeathStar];

    /// The name used to select the dataset.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::IceCream => "ice-cream",
            Self::DeathStar => "death-star",
        }
    }

    const fn data(self) -> &'static str {
        match self {
            Self::IceCream => include_str!("../../demos/ice-cream.json"),
            Self::DeathStar => include_str!("../../demos/death-star.json"),
        }
    }

    /// Parse and validate the dataset, stamping every record with `now`.
    pub(super) fn requirements(
        self,
        registry: &Registry,
        now: DateTime<Utc>,
    ) -> Result<Vec<Requirement>, ServiceError> {
        let candidates: Vec<Candidate> = serde_json::from_str(self.data())?;
        candidates
            .iter()
            .map(|candidate| {
                let validated = validate(registry, candidate, None)?;
                let id = validated.id.ok_or_else(|| {
                    ValidationError::from(Violation {
                        field: "id".to_string(),
                        kind: ViolationKind::Missing,
                    })
                })?;
                Ok(Requirement::new(id, validated.fields, now))
            })
            .collect()
    }
}

impl fmt::Display for Demo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Demo {
    type Err = UnknownDemoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.replace('_', "-").to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|demo| demo.name() == wanted)
            .ok_or_else(|| UnknownDemoError(s.to_string()))
    }
}

/// Returned when a demo name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("demo '{0}' not found (available: ice-cream, death-star)")]
pub struct UnknownDemoError(pub String);
