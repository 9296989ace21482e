//! Create, read, update and delete requirements.
//!
//! Every mutation is validated against the registry before it reaches the
//! [`Store`]. Read-modify-write sequences run inside [`Store::modify`], so an
//! update never races another writer.

use std::{collections::HashSet, path::Path};

use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use crate::{
    domain::{
        Candidate, Config, Patch, Registry, Requirement, RequirementId, Revision,
        ValidationError,
        registry::{Layer, LinkType, Priority, RequirementType, Status},
        schema::{Violation, ViolationKind, validate},
    },
    storage::{DuplicateIdError, NotFoundError, StorageError, Store, StoreError},
};

mod demo;
pub use demo::{Demo, UnknownDemoError};

/// Errors raised by [`RequirementService`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The payload violates type or enum constraints.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The target id is absent.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// A caller-supplied id collides with an existing record.
    #[error(transparent)]
    DuplicateId(#[from] DuplicateIdError),

    /// Persistence failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Bundled demo data could not be parsed.
    #[error("bundled demo data is corrupt: {0}")]
    Demo(#[from] serde_json::Error),
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(e) => Self::NotFound(e),
            StoreError::DuplicateId(e) => Self::DuplicateId(e),
            StoreError::Storage(e) => Self::Storage(e),
        }
    }
}

/// Restricts a listing. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Filter {
    /// Only this layer.
    pub layer: Option<Layer>,
    /// Only this status.
    pub status: Option<Status>,
    /// Only this type.
    #[serde(rename = "type")]
    pub kind: Option<RequirementType>,
    /// Only this priority.
    pub priority: Option<Priority>,
}

impl Filter {
    /// Whether the requirement passes the filter.
    #[must_use]
    pub fn matches(&self, requirement: &Requirement) -> bool {
        let fields = requirement.fields();
        self.layer.is_none_or(|layer| fields.layer == Some(layer))
            && self.status.is_none_or(|status| fields.status == status)
            && self.kind.is_none_or(|kind| fields.kind == kind)
            && self.priority.is_none_or(|priority| fields.priority == priority)
    }
}

/// A link whose target is not in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingLink {
    /// The requirement holding the link.
    pub source: RequirementId,
    /// The relationship.
    pub kind: LinkType,
    /// The missing target.
    pub target: RequirementId,
}

/// The CRUD service over a [`Store`].
#[derive(Debug)]
pub struct RequirementService {
    store: Store,
    registry: Registry,
    config: Config,
}

impl RequirementService {
    /// Wrap a store, using the registry described by `config`.
    #[must_use]
    pub fn new(store: Store, config: Config) -> Self {
        Self {
            store,
            registry: config.registry(),
            config,
        }
    }

    /// A service over an empty in-memory store.
    #[must_use]
    pub fn in_memory(config: Config) -> Self {
        Self::new(Store::in_memory(), config)
    }

    /// A service over the file-backed store at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the project cannot be loaded.
    pub fn open(root: &Path, config: Config) -> Result<Self, StorageError> {
        Ok(Self::new(Store::open(root)?, config))
    }

    /// The configuration the service was built with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The enum registry in force.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Validate and store a new requirement.
    ///
    /// If the candidate carries an id it must be free; otherwise the next id
    /// for the configured prefix is allocated.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Validation`] listing every invalid field
    /// - [`ServiceError::DuplicateId`] if a supplied id is taken
    /// - [`ServiceError::Storage`] if the record cannot be persisted
    #[instrument(skip_all)]
    pub fn create(&self, candidate: &Candidate) -> Result<Requirement, ServiceError> {
        let validated = validate(&self.registry, candidate, None)?;
        let now = Utc::now();

        let requirement = match validated.id {
            Some(id) => {
                let requirement = Requirement::new(id, validated.fields, now);
                self.store.insert_new(requirement.clone())?;
                requirement
            }
            None => self.store.insert_next(
                self.config.id_prefix(),
                self.config.digits(),
                |id| Requirement::new(id, validated.fields, now),
            )?,
        };

        tracing::info!(id = %requirement.id(), "created requirement");
        Ok(requirement)
    }

    /// Fetch a requirement.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] if the id is absent.
    pub fn get(&self, id: &RequirementId) -> Result<Requirement, NotFoundError> {
        self.store.get(id)
    }

    /// Every requirement, in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<Requirement> {
        self.store.list()
    }

    /// The requirements passing `filter`, in insertion order.
    #[must_use]
    pub fn list_filtered(&self, filter: &Filter) -> Vec<Requirement> {
        let mut requirements = self.store.list();
        requirements.retain(|requirement| filter.matches(requirement));
        requirements
    }

    /// Apply a partial update.
    ///
    /// The merged record is re-validated in full. Retired registry values the
    /// record already held are accepted. A revision is recorded only when the
    /// fields actually change.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the id is absent
    /// - [`ServiceError::Validation`] listing every invalid field
    /// - [`ServiceError::Storage`] if the record cannot be persisted
    #[instrument(skip_all, fields(%id))]
    pub fn update(&self, id: &RequirementId, patch: Patch) -> Result<Requirement, ServiceError> {
        self.store.modify(id, |current| {
            let candidate = patch.apply(Candidate::from(current.fields()));
            self.revise(current, &candidate)
        })
    }

    /// Replace every field of a requirement.
    ///
    /// If the candidate carries an id it must name the record being replaced.
    ///
    /// # Errors
    ///
    /// As for [`RequirementService::update`].
    #[instrument(skip_all, fields(%id))]
    pub fn replace(
        &self,
        id: &RequirementId,
        candidate: &Candidate,
    ) -> Result<Requirement, ServiceError> {
        self.store
            .modify(id, |current| self.revise(current, candidate))
    }

    fn revise(
        &self,
        current: &Requirement,
        candidate: &Candidate,
    ) -> Result<Option<Requirement>, ServiceError> {
        let validated = validate(&self.registry, candidate, Some(current.fields()))?;
        if let Some(supplied) = validated.id {
            if &supplied != current.id() {
                return Err(ValidationError::from(Violation {
                    field: "id".to_string(),
                    kind: ViolationKind::IdChanged {
                        expected: current.id().to_string(),
                    },
                })
                .into());
            }
        }

        let mut next = current.clone();
        if next.apply(validated.fields, Utc::now()) {
            tracing::info!(id = %current.id(), revisions = next.revisions().len(), "updated requirement");
            Ok(Some(next))
        } else {
            tracing::debug!(id = %current.id(), "update left requirement unchanged");
            Ok(None)
        }
    }

    /// Remove a requirement.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if the id is absent, on every call.
    #[instrument(skip_all, fields(%id))]
    pub fn delete(&self, id: &RequirementId) -> Result<Requirement, ServiceError> {
        let removed = self.store.delete(id)?;
        tracing::info!(%id, "deleted requirement");
        Ok(removed)
    }

    /// Superseded field sets of a requirement, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] if the id is absent.
    pub fn history(&self, id: &RequirementId) -> Result<Vec<Revision>, NotFoundError> {
        Ok(self.store.get(id)?.revisions().to_vec())
    }

    /// Clear the store and load a bundled dataset.
    ///
    /// Returns the number of requirements loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset fails validation against the current
    /// registry, or cannot be persisted.
    #[instrument(skip(self))]
    pub fn load_demo(&self, demo: Demo) -> Result<usize, ServiceError> {
        let requirements = demo.requirements(&self.registry, Utc::now())?;
        let count = requirements.len();
        self.store.replace_all(requirements)?;
        tracing::info!(demo = demo.name(), count, "loaded demo");
        Ok(count)
    }

    /// Links whose target does not exist, in listing order.
    #[must_use]
    pub fn dangling_links(&self) -> Vec<DanglingLink> {
        let requirements = self.store.list();
        let known: HashSet<&RequirementId> = requirements.iter().map(Requirement::id).collect();

        requirements
            .iter()
            .flat_map(|requirement| {
                requirement
                    .fields()
                    .links
                    .iter()
                    .filter(|link| !known.contains(&link.target))
                    .map(|link| DanglingLink {
                        source: requirement.id().clone(),
                        kind: link.kind,
                        target: link.target.clone(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use tempfile::TempDir;

    use super::*;
    use crate::domain::{EnumField, schema::CandidateLink};

    fn service() -> RequirementService {
        RequirementService::in_memory(Config::default())
    }

    fn sso() -> Candidate {
        Candidate::new("Login must support SSO", "functional", "draft", "high")
    }

    fn id(s: &str) -> RequirementId {
        s.parse().unwrap()
    }

    #[test]
    fn create_get_update_scenario() {
        let service = service();

        let created = service.create(&sso()).unwrap();
        assert_eq!(created.id().to_string(), "R-001");

        let fetched = service.get(&id("R-001")).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.title(), "Login must support SSO");
        assert_eq!(fetched.fields().kind, RequirementType::Functional);
        assert_eq!(fetched.fields().status, Status::Draft);
        assert_eq!(fetched.fields().priority, Priority::High);

        service
            .update(&id("R-001"), Patch::status("approved"))
            .unwrap();
        let updated = service.get(&id("R-001")).unwrap();
        assert_eq!(updated.fields().status, Status::Approved);
        assert_eq!(updated.id(), created.id());
        assert_eq!(updated.title(), "Login must support SSO");
    }

    #[test]
    fn duplicate_supplied_id_is_rejected() {
        let service = service();
        service.create(&sso()).unwrap();
        let result = service.create(&sso().with_id("R-001"));
        assert!(matches!(result, Err(ServiceError::DuplicateId(_))));
        assert_eq!(service.list().len(), 1);
    }

    #[test]
    fn supplied_id_is_kept() {
        let service = service();
        let created = service.create(&sso().with_id("AUTH-042")).unwrap();
        assert_eq!(created.id().to_string(), "AUTH-042");
    }

    #[test]
    fn invalid_create_reports_all_fields() {
        let service = service();
        let candidate = Candidate::new("", "wish", "draft", "urgent");
        let Err(ServiceError::Validation(error)) = service.create(&candidate) else {
            panic!("expected a validation error");
        };
        assert_eq!(error.violations.len(), 3);
        assert!(service.list().is_empty());
    }

    #[test]
    fn update_missing_is_not_found() {
        let result = service().update(&id("R-404"), Patch::status("approved"));
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn update_revalidates_merged_record() {
        let service = service();
        service.create(&sso()).unwrap();
        let result = service.update(&id("R-001"), Patch::status("pending"));
        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(
            service.get(&id("R-001")).unwrap().fields().status,
            Status::Draft
        );
    }

    #[test]
    fn history_records_changes_only() {
        let service = service();
        service.create(&sso()).unwrap();
        service
            .update(&id("R-001"), Patch::status("draft"))
            .unwrap();
        assert!(service.history(&id("R-001")).unwrap().is_empty());

        service
            .update(&id("R-001"), Patch::status("approved"))
            .unwrap();
        let history = service.history(&id("R-001")).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].fields.status, Status::Draft);
    }

    #[test]
    fn replace_cannot_change_id() {
        let service = service();
        service.create(&sso()).unwrap();
        let Err(ServiceError::Validation(error)) =
            service.replace(&id("R-001"), &sso().with_id("R-002"))
        else {
            panic!("expected a validation error");
        };
        assert_eq!(error.violations.head.kind.code(), "id_changed");

        let replaced = service
            .replace(
                &id("R-001"),
                &Candidate::new("Login must support SAML", "functional", "approved", "medium")
                    .with_id("R-1"),
            )
            .unwrap();
        assert_eq!(replaced.title(), "Login must support SAML");
        assert_eq!(replaced.id().to_string(), "R-001");
    }

    #[test]
    fn replace_clears_unspecified_fields() {
        let service = service();
        let candidate = Candidate {
            rationale: Some("Single sign-on".into()),
            ..sso()
        };
        service.create(&candidate).unwrap();
        let replaced = service.replace(&id("R-001"), &sso()).unwrap();
        assert_eq!(replaced.fields().rationale, None);
    }

    #[test]
    fn delete_twice_fails_with_not_found() {
        let service = service();
        service.create(&sso()).unwrap();
        service.delete(&id("R-001")).unwrap();
        for _ in 0..2 {
            assert!(matches!(
                service.delete(&id("R-001")),
                Err(ServiceError::NotFound(_))
            ));
        }
        assert!(service.get(&id("R-001")).is_err());
    }

    #[test]
    fn retired_value_is_grandfathered_on_update() {
        let tmp = TempDir::new().unwrap();
        RequirementService::open(tmp.path(), Config::default())
            .unwrap()
            .create(&sso())
            .unwrap();

        let mut registry = Registry::new();
        registry.retire(EnumField::Priority, "High").unwrap();
        let mut config = Config::default();
        config.set_registry(&registry);
        let service = RequirementService::open(tmp.path(), config).unwrap();

        assert!(matches!(
            service.create(&sso()),
            Err(ServiceError::Validation(_))
        ));
        let updated = service
            .update(&id("R-001"), Patch::status("approved"))
            .unwrap();
        assert_eq!(updated.fields().priority, Priority::High);
    }

    #[test]
    fn filters_combine() {
        let service = service();
        service.load_demo(Demo::IceCream).unwrap();

        let tests = service.list_filtered(&Filter {
            layer: Some(Layer::Test),
            ..Filter::default()
        });
        assert_eq!(tests.len(), 4);

        let planned_low = service.list_filtered(&Filter {
            layer: Some(Layer::Test),
            priority: Some(Priority::Low),
            ..Filter::default()
        });
        assert!(planned_low.iter().all(|r| r.fields().priority == Priority::Low));
        assert_eq!(planned_low.len(), 3);
    }

    #[test]
    fn demo_replaces_contents() {
        let service = service();
        service.create(&sso()).unwrap();
        let count = service.load_demo(Demo::DeathStar).unwrap();
        assert_eq!(service.list().len(), count);
        assert!(service.get(&id("R-001")).is_err());
        assert!(service.dangling_links().is_empty());
    }

    #[test]
    fn dangling_links_are_reported() {
        let service = service();
        let candidate = Candidate {
            links: vec![CandidateLink {
                target_id: "R-099".into(),
                kind: "DependsOn".into(),
            }],
            ..sso()
        };
        service.create(&candidate).unwrap();

        let dangling = service.dangling_links();
        assert_eq!(
            dangling,
            [DanglingLink {
                source: id("R-001"),
                kind: LinkType::DependsOn,
                target: id("R-099"),
            }]
        );
    }

    #[test]
    fn concurrent_creates_get_unique_ids() {
        let service = Arc::new(service());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = Arc::clone(&service);
                thread::spawn(move || {
                    for _ in 0..20 {
                        service.create(&sso()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ids: HashSet<_> = service
            .list()
            .into_iter()
            .map(|r| r.id().clone())
            .collect();
        assert_eq!(ids.len(), 80);
    }

    #[test]
    fn file_backed_service_persists_updates() {
        let tmp = TempDir::new().unwrap();
        {
            let service = RequirementService::open(tmp.path(), Config::default()).unwrap();
            service.create(&sso()).unwrap();
            service
                .update(&id("R-001"), Patch::status("approved"))
                .unwrap();
        }

        let service = RequirementService::open(tmp.path(), Config::default()).unwrap();
        let requirement = service.get(&id("R-001")).unwrap();
        assert_eq!(requirement.fields().status, Status::Approved);
        assert_eq!(requirement.revisions().len(), 1);

        let next = service.create(&sso()).unwrap();
        assert_eq!(next.id().to_string(), "R-002");
    }
}
