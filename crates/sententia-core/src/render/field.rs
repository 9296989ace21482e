//! Explicit mapping from template field names to values.

use std::fmt;

use crate::{domain::Requirement, render::TemplateError};

/// A field a placeholder may reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// `id`
    Id,
    /// `title`
    Title,
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
    /// `description`
    Description,
    /// `rationale`
    Rationale,
    /// `verification`
    Verification,
    /// `links`, as `Kind TARGET` pairs separated by `, `
    Links,
    /// `created`, as a date
    Created,
    /// `updated`, as a date
    Updated,
    /// `metadata`, the whole map as a JSON object
    Metadata,
    /// `metadata.<key>`
    MetadataKey(String),
    /// `project`
    Project,
    /// `document`
    Document,
    /// `count`, the number of selected requirements
    Count,
}

/// Values available in every section.
#[derive(Debug, Clone, Copy)]
pub struct DocumentValues<'a> {
    pub(crate) project: &'a str,
    pub(crate) document: &'a str,
    pub(crate) count: usize,
}

impl Field {
    /// Resolve a field name.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownField`] for names outside the mapping.
    pub fn parse(name: &str) -> Result<Self, TemplateError> {
        let field = match name {
            "id" => Self::Id,
            "title" => Self::Title,
            "type" => Self::Type,
            "status" => Self::Status,
            "priority" => Self::Priority,
            "layer" => Self::Layer,
            "source" => Self::Source,
            "description" => Self::Description,
            "rationale" => Self::Rationale,
            "verification" => Self::Verification,
            "links" => Self::Links,
            "created" => Self::Created,
            "updated" => Self::Updated,
            "metadata" => Self::Metadata,
            "project" => Self::Project,
            "document" => Self::Document,
            "count" => Self::Count,
            other => match other.strip_prefix("metadata.") {
                Some(key) if !key.is_empty() => Self::MetadataKey(key.to_string()),
                _ => return Err(TemplateError::UnknownField(name.to_string())),
            },
        };
        Ok(field)
    }

    /// Whether the field describes a single requirement (and so is only
    /// available in the `item` section).
    #[must_use]
    pub const fn is_per_requirement(&self) -> bool {
        !matches!(self, Self::Project | Self::Document | Self::Count)
    }

    /// The value of this field.
    ///
    /// `requirement` is `None` outside the `item` section; callers check scope
    /// before resolving, so a per-requirement field without a requirement
    /// resolves to an empty string.
    #[must_use]
    pub fn resolve(&self, requirement: Option<&Requirement>, document: DocumentValues<'_>) -> String {
        match self {
            Self::Project => return document.project.to_string(),
            Self::Document => return document.document.to_string(),
            Self::Count => return document.count.to_string(),
            _ => {}
        }

        let Some(requirement) = requirement else {
            return String::new();
        };
        let fields = requirement.fields();
        let text = |value: Option<&String>| value.cloned().unwrap_or_default();

        match self {
            Self::Id => requirement.id().to_string(),
            Self::Title => requirement.title().to_string(),
            Self::Type => fields.kind.to_string(),
            Self::Status => fields.status.to_string(),
            Self::Priority => fields.priority.to_string(),
            Self::Layer => fields.layer.map(|v| v.to_string()).unwrap_or_default(),
            Self::Source => fields.source.map(|v| v.to_string()).unwrap_or_default(),
            Self::Description => text(fields.description.as_ref()),
            Self::Rationale => text(fields.rationale.as_ref()),
            Self::Verification => text(fields.verification.as_ref()),
            Self::Links => fields
                .links
                .iter()
                .map(|link| format!("{} {}", link.kind, link.target))
                .collect::<Vec<_>>()
                .join(", "),
            Self::Created => requirement.created().format("%Y-%m-%d").to_string(),
            Self::Updated => requirement.updated().format("%Y-%m-%d").to_string(),
            Self::Metadata if fields.metadata.is_empty() => String::new(),
            Self::Metadata => serde_json::to_string(&fields.metadata).unwrap_or_default(),
            Self::MetadataKey(key) => text(fields.metadata.get(key)),
            Self::Project | Self::Document | Self::Count => String::new(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Type => "type",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::Layer => "layer",
            Self::Source => "source",
            Self::Description => "description",
            Self::Rationale => "rationale",
            Self::Verification => "verification",
            Self::Links => "links",
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Metadata => "metadata",
            Self::MetadataKey(key) => return write!(f, "metadata.{key}"),
            Self::Project => "project",
            Self::Document => "document",
            Self::Count => "count",
        };
        f.write_str(name)
    }
}

/// A transformation applied to a resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Escape for a Markdown table cell: `|` becomes `\|`, line breaks become
    /// `<br>`.
    Cell,
    /// Uppercase.
    Upper,
    /// Lowercase.
    Lower,
    /// Collapse all whitespace runs, including line breaks, to one space.
    OneLine,
}

impl Filter {
    /// Resolve a filter name.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownFilter`] for unrecognised names.
    pub fn parse(name: &str) -> Result<Self, TemplateError> {
        match name {
            "cell" => Ok(Self::Cell),
            "upper" => Ok(Self::Upper),
            "lower" => Ok(Self::Lower),
            "oneline" => Ok(Self::OneLine),
            other => Err(TemplateError::UnknownFilter(other.to_string())),
        }
    }

    /// Apply the filter.
    #[must_use]
    pub fn apply(self, value: &str) -> String {
        match self {
            Self::Cell => escape_cell(value),
            Self::Upper => value.to_uppercase(),
            Self::Lower => value.to_lowercase(),
            Self::OneLine => value.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

/// Escape a value for a Markdown table cell.
///
/// Line breaks become `<br>`. Every other `<` is backslash-escaped, so a
/// literal `<br>` in the value stays distinguishable and no raw HTML reaches
/// the cell.
#[must_use]
pub fn escape_cell(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('|', "\\|")
        .replace('<', "\\<")
        .replace("\r\n", "\n")
        .replace('\n', "<br>")
}

/// Reverse [`escape_cell`]. Only an unescaped `<br>` is a line break.
#[must_use]
pub fn unescape_cell(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix("<br>") {
            out.push('\n');
            rest = after;
            continue;
        }
        rest = &rest[c.len_utf8()..];
        if c == '\\' {
            match rest.chars().next() {
                Some(next) => {
                    out.push(next);
                    rest = &rest[next.len_utf8()..];
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
