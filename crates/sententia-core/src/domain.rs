//! Domain models for requirements management.
//!
//! This module contains the core domain types: identifiers, the enum
//! registry, the requirement model, boundary validation and configuration.

mod config;
pub use config::Config;

/// Requirement identifiers.
pub mod id;
pub use id::{Error as IdError, Prefix, RequirementId};

pub mod registry;
pub use registry::{EnumField, Registry, RegistryMiss};

/// The requirement model.
pub mod requirement;
pub use requirement::{Fields, Link, Requirement, Revision};

pub mod schema;
pub use schema::{Candidate, Patch, ValidationError, validate};
