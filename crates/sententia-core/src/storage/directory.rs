//! Filesystem layout of a project.
//!
//! Requirements are stored one per file as `ROOT/<ID>.md`. Project metadata
//! (configuration, custom templates) lives under `ROOT/.sen/` and is never
//! scanned for requirements.

use std::{
    collections::HashMap,
    ffi::OsStr,
    fmt, io,
    path::{Path, PathBuf},
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use walkdir::WalkDir;

use crate::{
    domain::{Requirement, RequirementId},
    storage::markdown::{LoadError, MarkdownRequirement, path_for},
};

/// Name of the project metadata directory.
pub const META_DIR: &str = ".sen";

/// Path of the configuration file for the project at `root`.
#[must_use]
pub fn config_path(root: &Path) -> PathBuf {
    root.join(META_DIR).join("config.toml")
}

/// Directory holding custom templates for the project at `root`.
#[must_use]
pub fn templates_dir(root: &Path) -> PathBuf {
    root.join(META_DIR).join("templates")
}

/// A requirement read from disk.
#[derive(Debug)]
pub struct Loaded {
    /// The file it was read from.
    pub path: PathBuf,
    /// Its recorded listing position, if the file has one.
    pub position: Option<u64>,
    /// The record.
    pub requirement: Requirement,
}

/// Load every requirement under `root`.
///
/// Files are parsed in parallel. The result is in listing order: by recorded
/// position, then files without a position by creation time and id.
///
/// # Errors
///
/// Fails if any markdown file cannot be parsed as a requirement, if a file's
/// name disagrees with the id in its heading, or if two files hold the same
/// id. Every offending file is reported.
#[tracing::instrument]
pub fn load_all(root: &Path) -> Result<Vec<Loaded>, DirectoryLoadError> {
    let md_paths = collect_markdown_paths(root);

    let (loaded, failures): (Vec<_>, Vec<_>) = md_paths
        .par_iter()
        .map(|path| try_load_requirement(path))
        .partition(Result::is_ok);

    let failures: Vec<_> = failures.into_iter().filter_map(Result::err).collect();
    if !failures.is_empty() {
        return Err(DirectoryLoadError::UnrecognisedFiles(failures));
    }

    let mut loaded: Vec<_> = loaded.into_iter().filter_map(Result::ok).collect();
    check_unique(&loaded)?;

    loaded.sort_by(|a, b| {
        let key = |entry: &Loaded| {
            (entry.position.is_none(), entry.position, entry.requirement.created())
        };
        key(a)
            .cmp(&key(b))
            .then_with(|| a.requirement.id().cmp(b.requirement.id()))
    });

    tracing::debug!(count = loaded.len(), "loaded requirements");
    Ok(loaded)
}

/// `R-1` and `R-001` are the same id, so both files cannot be loaded.
fn check_unique(loaded: &[Loaded]) -> Result<(), DirectoryLoadError> {
    let mut paths: HashMap<&RequirementId, Vec<PathBuf>> = HashMap::new();
    for entry in loaded {
        paths
            .entry(entry.requirement.id())
            .or_default()
            .push(entry.path.clone());
    }

    let mut duplicates: Vec<_> = paths
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(id, mut paths)| {
            paths.sort();
            (id.clone(), paths)
        })
        .collect();
    if duplicates.is_empty() {
        return Ok(());
    }
    duplicates.sort();
    Err(DirectoryLoadError::DuplicateIds(duplicates))
}

/// Write a requirement to `root/<ID>.md`, recording its listing position.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save(root: &Path, requirement: &Requirement, position: u64) -> io::Result<()> {
    MarkdownRequirement::from(requirement.clone())
        .with_position(position)
        .save(root)
}

/// Remove the file of the requirement `id`, if present.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn remove(root: &Path, id: &RequirementId) -> io::Result<()> {
    match std::fs::remove_file(path_for(root, id)) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn collect_markdown_paths(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != OsStr::new(META_DIR))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension() == Some(OsStr::new("md")))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

fn try_load_requirement(path: &Path) -> Result<Loaded, (PathBuf, String)> {
    let fail = |reason: String| {
        tracing::debug!("Failed to load requirement from {}: {reason}", path.display());
        (path.to_path_buf(), reason)
    };

    let md = MarkdownRequirement::load_from_path(path).map_err(|e| fail(e.to_string()))?;

    let stem = path.file_stem().and_then(OsStr::to_str).unwrap_or_default();
    let matches_name = stem
        .parse::<RequirementId>()
        .is_ok_and(|from_name| &from_name == md.id() && stem == md.id().to_string());
    if !matches_name {
        return Err(fail(format!("file name does not match id {}", md.id())));
    }

    let position = md.position();
    let requirement = Requirement::try_from(md).map_err(|e: LoadError| fail(e.to_string()))?;
    Ok(Loaded {
        path: path.to_path_buf(),
        position,
        requirement,
    })
}

/// Errors raised while loading a project directory.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryLoadError {
    /// Files that could not be loaded, with the reason for each.
    UnrecognisedFiles(Vec<(PathBuf, String)>),

    /// Ids held by more than one file, with the files.
    DuplicateIds(Vec<(RequirementId, Vec<PathBuf>)>),
}

impl fmt::Display for DirectoryLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnrecognisedFiles(failures) => {
                write!(f, "Unrecognised files: ")?;
                for (i, (path, reason)) in failures.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} ({reason})", path.display())?;
                }
                Ok(())
            }
            Self::DuplicateIds(duplicates) => {
                write!(f, "Duplicate ids: ")?;
                for (i, (id, paths)) in duplicates.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    let paths: Vec<_> = paths.iter().map(|p| p.display().to_string()).collect();
                    write!(f, "{id} in {}", paths.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use non_empty_string::NonEmptyString;
    use tempfile::TempDir;

    use super::*;
    use crate::domain::{
        registry::{Priority, RequirementType, Status},
        requirement::Fields,
    };

    fn requirement(id: &str, hour: u32) -> Requirement {
        let fields = Fields::new(
            NonEmptyString::new(format!("Requirement {id}")).unwrap(),
            RequirementType::Functional,
            Status::Draft,
            Priority::Medium,
        );
        let created = Utc.with_ymd_and_hms(2025, 1, 1, hour, 0, 0).unwrap();
        Requirement::new(id.parse().unwrap(), fields, created)
    }

    fn ids(loaded: &[Loaded]) -> Vec<String> {
        loaded
            .iter()
            .map(|l| l.requirement.id().to_string())
            .collect()
    }

    #[test]
    fn load_orders_by_position() {
        let tmp = TempDir::new().unwrap();
        save(tmp.path(), &requirement("SYS-001", 1), 0).unwrap();
        save(tmp.path(), &requirement("BUS-001", 1), 1).unwrap();
        save(tmp.path(), &requirement("SYS-002", 1), 5).unwrap();

        assert_eq!(ids(&load_all(tmp.path()).unwrap()), ["SYS-001", "BUS-001", "SYS-002"]);
    }

    #[test]
    fn unpositioned_files_follow_by_creation() {
        let tmp = TempDir::new().unwrap();
        save(tmp.path(), &requirement("R-009", 3), 0).unwrap();
        for (id, hour) in [("R-002", 1), ("R-001", 2), ("R-003", 2)] {
            MarkdownRequirement::from(requirement(id, hour))
                .save(tmp.path())
                .unwrap();
        }

        assert_eq!(
            ids(&load_all(tmp.path()).unwrap()),
            ["R-009", "R-002", "R-001", "R-003"]
        );
    }

    #[test]
    fn same_id_in_two_files_is_reported() {
        let tmp = TempDir::new().unwrap();
        save(tmp.path(), &requirement("R-001", 1), 0).unwrap();
        save(tmp.path(), &requirement("R-1", 1), 1).unwrap();

        let error = load_all(tmp.path()).unwrap_err();
        let DirectoryLoadError::DuplicateIds(duplicates) = &error else {
            panic!("expected duplicate ids, got {error}");
        };
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].1.len(), 2);
        assert!(error.to_string().contains("R-001.md"));
        assert!(error.to_string().contains("R-1.md"));
    }

    #[test]
    fn metadata_directory_is_skipped() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(templates_dir(tmp.path())).unwrap();
        std::fs::write(templates_dir(tmp.path()).join("notes.md"), "not a requirement").unwrap();
        save(tmp.path(), &requirement("R-001", 1), 0).unwrap();

        assert_eq!(load_all(tmp.path()).unwrap().len(), 1);
    }

    #[test]
    fn unparseable_files_are_reported() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("README.md"), "# Project").unwrap();
        save(tmp.path(), &requirement("R-001", 1), 0).unwrap();

        let error = load_all(tmp.path()).unwrap_err();
        let DirectoryLoadError::UnrecognisedFiles(failures) = error else {
            panic!("expected unrecognised files");
        };
        assert_eq!(failures.len(), 1);
        assert!(failures[0].0.ends_with("README.md"));
    }

    #[test]
    fn misnamed_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        save(tmp.path(), &requirement("R-001", 1), 0).unwrap();
        std::fs::rename(tmp.path().join("R-001.md"), tmp.path().join("R-007.md")).unwrap();

        assert!(load_all(tmp.path()).is_err());
    }

    #[test]
    fn remove_is_tolerant_of_missing_files() {
        let tmp = TempDir::new().unwrap();
        let id: RequirementId = "R-001".parse().unwrap();
        remove(tmp.path(), &id).unwrap();

        save(tmp.path(), &requirement("R-001", 1), 0).unwrap();
        remove(tmp.path(), &id).unwrap();
        assert!(!path_for(tmp.path(), &id).exists());
    }
}
