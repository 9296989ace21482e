use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};

use crate::domain::{
    IdError, Requirement, RequirementId,
    registry::{Layer, Priority, RequirementType, Source, Status},
    requirement::{Fields, Link, Provenance, Revision},
};

/// A requirement serialized in markdown format with YAML frontmatter.
///
/// The heading carries the id and title, the body is the description, and
/// everything else lives in the frontmatter.
#[derive(Debug, Clone)]
pub struct MarkdownRequirement {
    frontmatter: FrontMatter,
    id: RequirementId,
    title: String,
    body: String,
}

impl MarkdownRequirement {
    fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let frontmatter = serde_yaml::to_string(&self.frontmatter)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let heading = format!("# {} {}", self.id, self.title);

        let result = if self.body.is_empty() {
            format!("---\n{frontmatter}---\n{heading}\n")
        } else {
            format!("---\n{frontmatter}---\n{heading}\n\n{}\n", self.body)
        };

        writer.write_all(result.as_bytes())?;
        writer.flush()
    }

    pub(crate) fn read<R: BufRead>(reader: &mut R) -> Result<Self, LoadError> {
        let mut lines = reader.lines();

        let first_line = lines
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "Empty input"))??;

        if first_line.trim() != "---" {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Expected frontmatter starting with '---'",
            )
            .into());
        }

        let mut closed = false;
        let frontmatter = lines
            .by_ref()
            .map_while(|line| match line {
                Ok(content) if content.trim() == "---" => {
                    closed = true;
                    None
                }
                Ok(content) => Some(Ok(content)),
                Err(e) => Some(Err(e)),
            })
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");

        if !closed {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Frontmatter is not terminated by '---'",
            )
            .into());
        }

        let content = lines.collect::<Result<Vec<_>, _>>()?.join("\n");

        let frontmatter: FrontMatter = serde_yaml::from_str(&frontmatter)?;
        let (id, title, body) = parse_content(&content)?;

        Ok(Self {
            frontmatter,
            id,
            title,
            body,
        })
    }

    /// The id taken from the heading.
    #[must_use]
    pub const fn id(&self) -> &RequirementId {
        &self.id
    }

    /// Where the record sits in the project listing, if recorded.
    #[must_use]
    pub const fn position(&self) -> Option<u64> {
        self.frontmatter.position
    }

    /// Record the listing position.
    #[must_use]
    pub fn with_position(mut self, position: u64) -> Self {
        self.frontmatter.position = Some(position);
        self
    }

    /// Writes the requirement to `root/<ID>.md`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written to.
    pub fn save(&self, root: &Path) -> io::Result<()> {
        self.save_to_path(&path_for(root, &self.id))
    }

    /// Writes the requirement to a specific file path.
    ///
    /// Parent directories are created automatically if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_path(&self, file_path: &Path) -> io::Result<()> {
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(file_path)?;
        let mut writer = BufWriter::new(file);
        self.write(&mut writer)
    }

    /// Reads a requirement from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_path(file_path: &Path) -> Result<Self, LoadError> {
        let file = File::open(file_path).map_err(|io_error| match io_error.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound,
            _ => LoadError::Io(io_error),
        })?;

        let mut reader = BufReader::new(file);
        Self::read(&mut reader)
    }
}

/// The file a requirement is stored in: `root/<ID>.md`.
#[must_use]
pub fn path_for(root: &Path, id: &RequirementId) -> PathBuf {
    root.join(format!("{id}.md"))
}

/// Parses markdown content into id, title, and body.
///
/// The id must be the first token in the first heading, followed by the
/// title. The body is everything after the first heading.
fn parse_content(content: &str) -> Result<(RequirementId, String, String), LoadError> {
    let (heading_line_idx, line) = content
        .lines()
        .enumerate()
        .find(|(_, line)| line.trim().starts_with('#'))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "No heading found in content - the id must be in the first heading",
            )
        })?;

    let after_hashes = line.trim().trim_start_matches('#').trim();

    let first_token = after_hashes
        .split_whitespace()
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "No id found in heading"))?;

    let id = first_token.parse::<RequirementId>()?;

    let title = after_hashes
        .strip_prefix(first_token)
        .unwrap_or("")
        .trim()
        .to_string();

    let body = content
        .lines()
        .skip(heading_line_idx + 1)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    Ok((id, title, body))
}

/// Errors that can occur when loading a requirement from markdown.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The requirement file was not found.
    #[error("requirement file not found")]
    NotFound,
    /// An I/O error occurred.
    #[error("failed to read from markdown: {0}")]
    Io(#[from] io::Error),
    /// The YAML frontmatter could not be parsed.
    #[error("invalid frontmatter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// The id in the heading could not be parsed.
    #[error(transparent)]
    Id(#[from] IdError),
    /// The heading has no title.
    #[error("requirement {0} has no title")]
    MissingTitle(RequirementId),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(from = "FrontMatterVersion", into = "FrontMatterVersion")]
struct FrontMatter {
    kind: RequirementType,
    status: Status,
    priority: Priority,
    layer: Option<Layer>,
    source: Option<Source>,
    rationale: Option<String>,
    verification: Option<String>,
    links: Vec<Link>,
    metadata: BTreeMap<String, String>,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    revisions: Vec<Revision>,
    position: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum FrontMatterVersion {
    #[serde(rename = "1")]
    V1 {
        #[serde(rename = "type")]
        kind: RequirementType,
        status: Status,
        priority: Priority,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        layer: Option<Layer>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<Source>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verification: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        links: Vec<Link>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        metadata: BTreeMap<String, String>,
        created: DateTime<Utc>,
        updated: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        revisions: Vec<Revision>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<u64>,
    },
}

impl From<FrontMatterVersion> for FrontMatter {
    fn from(version: FrontMatterVersion) -> Self {
        match version {
            FrontMatterVersion::V1 {
                kind,
                status,
                priority,
                layer,
                source,
                rationale,
                verification,
                links,
                metadata,
                created,
                updated,
                revisions,
                position,
            } => Self {
                kind,
                status,
                priority,
                layer,
                source,
                rationale,
                verification,
                links,
                metadata,
                created,
                updated,
                revisions,
                position,
            },
        }
    }
}

impl From<FrontMatter> for FrontMatterVersion {
    fn from(front_matter: FrontMatter) -> Self {
        let FrontMatter {
            kind,
            status,
            priority,
            layer,
            source,
            rationale,
            verification,
            links,
            metadata,
            created,
            updated,
            revisions,
            position,
        } = front_matter;
        Self::V1 {
            kind,
            status,
            priority,
            layer,
            source,
            rationale,
            verification,
            links,
            metadata,
            created,
            updated,
            revisions,
            position,
        }
    }
}

impl From<Requirement> for MarkdownRequirement {
    fn from(requirement: Requirement) -> Self {
        let (
            id,
            Fields {
                title,
                kind,
                status,
                priority,
                layer,
                source,
                description,
                rationale,
                verification,
                links,
                metadata,
            },
            Provenance {
                created,
                updated,
                revisions,
            },
        ) = requirement.into_parts();

        Self {
            frontmatter: FrontMatter {
                kind,
                status,
                priority,
                layer,
                source,
                rationale,
                verification,
                links,
                metadata,
                created,
                updated,
                revisions,
                position: None,
            },
            id,
            title: title.as_str().to_string(),
            body: description.unwrap_or_default(),
        }
    }
}

impl TryFrom<MarkdownRequirement> for Requirement {
    type Error = LoadError;

    fn try_from(md: MarkdownRequirement) -> Result<Self, Self::Error> {
        let MarkdownRequirement {
            frontmatter:
                FrontMatter {
                    kind,
                    status,
                    priority,
                    layer,
                    source,
                    rationale,
                    verification,
                    links,
                    metadata,
                    created,
                    updated,
                    revisions,
                    position: _,
                },
            id,
            title,
            body,
        } = md;

        let Ok(title) = NonEmptyString::new(title) else {
            return Err(LoadError::MissingTitle(id));
        };

        let fields = Fields {
            title,
            kind,
            status,
            priority,
            layer,
            source,
            description: Some(body).filter(|body| !body.is_empty()),
            rationale,
            verification,
            links,
            metadata,
        };

        Ok(Self::from_parts(
            id,
            fields,
            Provenance {
                created,
                updated,
                revisions,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;
    use crate::domain::registry::LinkType;

    fn id() -> RequirementId {
        "R-001".parse().unwrap()
    }

    fn requirement() -> Requirement {
        let mut fields = Fields::new(
            NonEmptyString::new("Login must support SSO".to_string()).unwrap(),
            RequirementType::Functional,
            Status::Draft,
            Priority::High,
        );
        fields.layer = Some(Layer::Software);
        fields.description = Some("Users sign in once.\n\nSessions are shared.".to_string());
        fields.links.push(Link {
            target: "R-002".parse().unwrap(),
            kind: LinkType::Satisfies,
        });
        fields
            .metadata
            .insert("document".to_string(), "SRS-4.2".to_string());
        let created = Utc.with_ymd_and_hms(2025, 7, 14, 7, 15, 0).unwrap();
        Requirement::new(id(), fields, created)
    }

    #[test]
    fn markdown_round_trip() {
        let input = r"---
_version: '1'
type: Functional
status: Draft
priority: High
layer: Software
links:
- target_id: R-002
  type: Satisfies
metadata:
  document: SRS-4.2
created: 2025-07-14T07:15:00Z
updated: 2025-07-14T07:15:00Z
---
# R-001 Login must support SSO

Users sign in once.
";

        let mut reader = Cursor::new(input);
        let md = MarkdownRequirement::read(&mut reader).unwrap();

        assert_eq!(md.id, id());

        let mut bytes: Vec<u8> = vec![];
        md.write(&mut bytes).unwrap();

        let actual = String::from_utf8(bytes).unwrap();
        assert_eq!(input, &actual);
    }

    #[test]
    fn requirement_survives_conversion() {
        let original = requirement();
        let md = MarkdownRequirement::from(original.clone());
        let back = Requirement::try_from(md).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn position_is_persisted() {
        let tmp = TempDir::new().unwrap();
        MarkdownRequirement::from(requirement())
            .with_position(7)
            .save(tmp.path())
            .unwrap();

        let text = std::fs::read_to_string(path_for(tmp.path(), &id())).unwrap();
        assert!(text.contains("position: 7\n"));
        let loaded = MarkdownRequirement::load_from_path(&path_for(tmp.path(), &id())).unwrap();
        assert_eq!(loaded.position(), Some(7));
        assert_eq!(Requirement::try_from(loaded).unwrap(), requirement());
    }

    #[test]
    fn revisions_are_persisted() {
        let mut original = requirement();
        let mut changed = original.fields().clone();
        changed.status = Status::Approved;
        original.apply(changed, Utc.with_ymd_and_hms(2025, 7, 15, 0, 0, 0).unwrap());

        let tmp = TempDir::new().unwrap();
        MarkdownRequirement::from(original.clone())
            .save(tmp.path())
            .unwrap();

        let loaded = MarkdownRequirement::load_from_path(&path_for(tmp.path(), &id())).unwrap();
        let loaded = Requirement::try_from(loaded).unwrap();
        assert_eq!(loaded.revisions().len(), 1);
        assert_eq!(loaded, original);
    }

    #[test]
    fn minimal_content() {
        let content = r"---
_version: '1'
type: Constraint
status: Approved
priority: Low
created: 2025-07-14T07:15:00Z
updated: 2025-07-14T07:15:00Z
---
# R-001 Just a title
";

        let md = MarkdownRequirement::read(&mut Cursor::new(content)).unwrap();
        assert_eq!(md.title, "Just a title");
        assert_eq!(md.body, "");

        let requirement = Requirement::try_from(md).unwrap();
        assert_eq!(requirement.fields().description, None);
        assert!(requirement.fields().links.is_empty());
    }

    #[test]
    fn id_only_heading_is_rejected() {
        let content = r"---
_version: '1'
type: Constraint
status: Approved
priority: Low
created: 2025-07-14T07:15:00Z
updated: 2025-07-14T07:15:00Z
---
# R-001
";

        let md = MarkdownRequirement::read(&mut Cursor::new(content)).unwrap();
        assert!(matches!(
            Requirement::try_from(md),
            Err(LoadError::MissingTitle(_))
        ));
    }

    #[test]
    fn invalid_frontmatter_start() {
        let result = MarkdownRequirement::read(&mut Cursor::new("invalid frontmatter"));
        assert!(result.is_err());
    }

    #[test]
    fn missing_frontmatter_end() {
        let content = r"---
type: Functional
This should be content but there's no closing ---";

        let result = MarkdownRequirement::read(&mut Cursor::new(content));
        assert!(matches!(result, Err(LoadError::Io(_))));
    }

    #[test]
    fn invalid_yaml() {
        let content = r"---
invalid: yaml: structure:
---
# R-001 Content";

        let result = MarkdownRequirement::read(&mut Cursor::new(content));
        assert!(matches!(result, Err(LoadError::Yaml(_))));
    }

    #[test]
    fn unknown_enum_value_in_frontmatter() {
        let content = r"---
_version: '1'
type: Wish
status: Draft
priority: High
created: 2025-07-14T07:15:00Z
updated: 2025-07-14T07:15:00Z
---
# R-001 Content";

        let result = MarkdownRequirement::read(&mut Cursor::new(content));
        assert!(matches!(result, Err(LoadError::Yaml(_))));
    }

    #[test]
    fn missing_id_in_heading() {
        let content = r"---
_version: '1'
type: Functional
status: Draft
priority: High
created: 2025-07-14T07:15:00Z
updated: 2025-07-14T07:15:00Z
---
# Just a title without an id
";

        let result = MarkdownRequirement::read(&mut Cursor::new(content));
        assert!(matches!(result, Err(LoadError::Id(_))));
    }

    #[test]
    fn load_nonexistent_file() {
        let tmp = TempDir::new().unwrap();
        let result = MarkdownRequirement::load_from_path(&path_for(tmp.path(), &id()));
        assert!(matches!(result, Err(LoadError::NotFound)));
    }

    #[test]
    fn content_with_triple_dashes() {
        let content = r"---
_version: '1'
type: Functional
status: Draft
priority: High
created: 2025-07-14T07:15:00Z
updated: 2025-07-14T07:15:00Z
---
# R-001 Content

This content has --- in it
And more --- here
";

        let md = MarkdownRequirement::read(&mut Cursor::new(content)).unwrap();
        assert_eq!(md.body, "This content has --- in it\nAnd more --- here");
    }
}
