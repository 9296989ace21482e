//! The authoritative collection of requirements.
//!
//! A [`Store`] keeps records in insertion order behind a single
//! [`RwLock`]: readers share, writers are exclusive, and check-then-insert
//! sequences run under one write guard so that concurrent creates never
//! produce colliding ids. A file-backed store writes to disk before touching
//! memory, so a failed write leaves the in-memory state unchanged.

use std::{
    collections::HashMap,
    io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::{
    domain::{Prefix, Requirement, RequirementId},
    storage::directory::{self, DirectoryLoadError},
};

/// Returned when an operation targets an id that is not in the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("requirement {0} not found")]
pub struct NotFoundError(pub RequirementId);

/// Returned when a caller-supplied id is already taken.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("requirement {0} already exists")]
pub struct DuplicateIdError(pub RequirementId);

/// Failure to persist or load records.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A record could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// A record file could not be removed.
    #[error("failed to remove {}: {source}", path.display())]
    Remove {
        /// File being removed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The project directory could not be loaded.
    #[error(transparent)]
    Load(#[from] DirectoryLoadError),
}

/// Errors from store operations that can fail in more than one way.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The target id is absent.
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// The id is already taken.
    #[error(transparent)]
    DuplicateId(#[from] DuplicateIdError),

    /// Persistence failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The outcome of [`Store::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Put {
    /// The id was new.
    Inserted,
    /// An existing record was overwritten in place.
    Replaced,
}

#[derive(Debug, Default)]
struct Records {
    by_id: IndexMap<RequirementId, Requirement>,
    /// Highest number ever seen per prefix.
    high_water: HashMap<Prefix, NonZeroUsize>,
    /// Listing position persisted with each record. Increases with every
    /// insert, so reloading reproduces the listing order.
    positions: HashMap<RequirementId, u64>,
    next_position: u64,
}

impl Records {
    /// The position of `id`, or the next free one if it is new.
    fn position_of(&self, id: &RequirementId) -> u64 {
        self.positions
            .get(id)
            .copied()
            .unwrap_or(self.next_position)
    }

    fn insert(&mut self, requirement: Requirement, position: u64) -> Option<Requirement> {
        self.observe(requirement.id());
        self.positions.insert(requirement.id().clone(), position);
        self.next_position = self.next_position.max(position.saturating_add(1));
        self.by_id.insert(requirement.id().clone(), requirement)
    }

    fn observe(&mut self, id: &RequirementId) {
        let mark = self
            .high_water
            .entry(id.prefix().clone())
            .or_insert(id.number());
        *mark = (*mark).max(id.number());
    }

    fn next_number(&self, prefix: &Prefix) -> NonZeroUsize {
        self.high_water
            .get(prefix)
            .and_then(|mark| mark.checked_add(1))
            .unwrap_or(NonZeroUsize::MIN)
    }
}

/// An in-memory or file-backed collection of requirements keyed by id.
#[derive(Debug, Default)]
pub struct Store {
    records: RwLock<Records>,
    root: Option<PathBuf>,
}

impl Store {
    /// An empty store that lives only in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed store rooted at `root`, loading every record.
    ///
    /// # Errors
    ///
    /// Returns an error if any requirement file cannot be loaded.
    pub fn open(root: &Path) -> Result<Self, StorageError> {
        let mut records = Records::default();
        for loaded in directory::load_all(root)? {
            let position = loaded.position.unwrap_or(records.next_position);
            records.insert(loaded.requirement, position);
        }
        tracing::info!(root = %root.display(), count = records.by_id.len(), "opened store");
        Ok(Self {
            records: RwLock::new(records),
            root: Some(root.to_path_buf()),
        })
    }

    /// The directory records are persisted to, if any.
    #[must_use]
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn persist(&self, requirement: &Requirement, position: u64) -> Result<(), StorageError> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        directory::save(root, requirement, position).map_err(|source| StorageError::Write {
            path: super::markdown::path_for(root, requirement.id()),
            source,
        })
    }

    fn unpersist(&self, id: &RequirementId) -> Result<(), StorageError> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        directory::remove(root, id).map_err(|source| StorageError::Remove {
            path: super::markdown::path_for(root, id),
            source,
        })
    }

    /// Insert or overwrite a record.
    ///
    /// Overwriting keeps the record's original position in [`Store::list`].
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    pub fn put(&self, requirement: Requirement) -> Result<Put, StorageError> {
        let mut records = self.records.write();
        let position = records.position_of(requirement.id());
        self.persist(&requirement, position)?;
        let outcome = match records.insert(requirement, position) {
            Some(_) => Put::Replaced,
            None => Put::Inserted,
        };
        drop(records);
        Ok(outcome)
    }

    /// Fetch a copy of the record with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] if the id is absent.
    pub fn get(&self, id: &RequirementId) -> Result<Requirement, NotFoundError> {
        self.records
            .read()
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| NotFoundError(id.clone()))
    }

    /// Whether a record with this id exists.
    #[must_use]
    pub fn contains(&self, id: &RequirementId) -> bool {
        self.records.read().by_id.contains_key(id)
    }

    /// Remove a record, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the id is absent (on every call),
    /// or a storage error if the file cannot be removed.
    pub fn delete(&self, id: &RequirementId) -> Result<Requirement, StoreError> {
        let mut records = self.records.write();
        if !records.by_id.contains_key(id) {
            return Err(NotFoundError(id.clone()).into());
        }
        self.unpersist(id)?;
        records.positions.remove(id);
        records
            .by_id
            .shift_remove(id)
            .ok_or_else(|| NotFoundError(id.clone()).into())
    }

    /// A snapshot of every record, in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<Requirement> {
        self.records.read().by_id.values().cloned().collect()
    }

    /// The number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().by_id.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a record whose id must not already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] if the id is taken.
    pub fn insert_new(&self, requirement: Requirement) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if records.by_id.contains_key(requirement.id()) {
            return Err(DuplicateIdError(requirement.id().clone()).into());
        }
        let position = records.next_position;
        self.persist(&requirement, position)?;
        records.insert(requirement, position);
        drop(records);
        Ok(())
    }

    /// Allocate the next id for `prefix` and insert the record built for it.
    ///
    /// Numbers are never reissued within the lifetime of the store, even if
    /// the record holding them has been deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    pub fn insert_next(
        &self,
        prefix: &Prefix,
        digits: usize,
        build: impl FnOnce(RequirementId) -> Requirement,
    ) -> Result<Requirement, StorageError> {
        let mut records = self.records.write();
        let mut number = records.next_number(prefix);
        let mut id = RequirementId::new(prefix.clone(), number, digits);
        while records.by_id.contains_key(&id) {
            number = number.saturating_add(1);
            id = RequirementId::new(prefix.clone(), number, digits);
        }

        let requirement = build(id);
        let position = records.next_position;
        self.persist(&requirement, position)?;
        records.insert(requirement.clone(), position);
        drop(records);
        Ok(requirement)
    }

    /// Read, transform and write back a record under one write lock.
    ///
    /// `change` receives the current record and returns the replacement, or
    /// `None` to leave the record untouched. The replacement must keep the id.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] if the id is absent, any error from `change`,
    /// or a storage error if the replacement cannot be persisted.
    pub fn modify<E>(
        &self,
        id: &RequirementId,
        change: impl FnOnce(&Requirement) -> Result<Option<Requirement>, E>,
    ) -> Result<Requirement, E>
    where
        E: From<NotFoundError> + From<StorageError>,
    {
        let mut records = self.records.write();
        let current = records
            .by_id
            .get(id)
            .ok_or_else(|| NotFoundError(id.clone()))?;

        let Some(replacement) = change(current)? else {
            return Ok(current.clone());
        };
        debug_assert_eq!(replacement.id(), id);

        let position = records.position_of(id);
        self.persist(&replacement, position)?;
        records.insert(replacement.clone(), position);
        drop(records);
        Ok(replacement)
    }

    /// Replace the entire contents of the store.
    ///
    /// Id numbers already issued stay reserved.
    ///
    /// # Errors
    ///
    /// Returns an error if old records cannot be removed or new ones written.
    pub fn replace_all(&self, requirements: Vec<Requirement>) -> Result<(), StorageError> {
        let mut records = self.records.write();
        for id in records.by_id.keys() {
            self.unpersist(id)?;
        }
        records.by_id.clear();
        records.positions.clear();
        for requirement in requirements {
            let position = records.next_position;
            self.persist(&requirement, position)?;
            records.insert(requirement, position);
        }
        drop(records);
        Ok(())
    }
}
