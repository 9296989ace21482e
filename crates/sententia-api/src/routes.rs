//! Route modules, one per resource.

pub mod demo;
pub mod export;
pub mod health;
pub mod metadata;
pub mod requirements;
