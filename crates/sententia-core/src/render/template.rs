use std::{fmt, path::Path, sync::LazyLock};

use regex::Regex;
use serde::Deserialize;

use crate::{
    domain::{
        Requirement,
        registry::{Layer, Status},
    },
    render::{
        TemplateError,
        field::{DocumentValues, Field, Filter},
    },
};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}\n]*)\}\}").expect("placeholder pattern is valid"));

/// A declarative document template.
///
/// The `header` is written once, then `item` once per selected requirement
/// (or `empty` if nothing was selected), then the `footer`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Template {
    /// Name the template is selected by.
    #[serde(default)]
    pub name: String,
    /// Document title, available to placeholders as `document`.
    #[serde(default)]
    pub document: String,
    /// Which requirements to include.
    #[serde(default)]
    pub select: Selection,
    /// Written once, before the items.
    #[serde(default)]
    pub header: String,
    /// Written once per selected requirement.
    pub item: String,
    /// Written instead of the items when nothing was selected.
    #[serde(default)]
    pub empty: String,
    /// Written once, after the items.
    #[serde(default)]
    pub footer: String,
}

/// Restricts which requirements a template renders. Empty selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Selection {
    /// Only requirements in this layer.
    #[serde(default)]
    pub layer: Option<Layer>,
    /// Only requirements in one of these states.
    #[serde(default)]
    pub status: Vec<Status>,
}

impl Selection {
    /// Whether `requirement` is selected.
    #[must_use]
    pub fn matches(&self, requirement: &Requirement) -> bool {
        let fields = requirement.fields();
        self.layer.is_none_or(|layer| fields.layer == Some(layer))
            && (self.status.is_empty() || self.status.contains(&fields.status))
    }
}

impl Template {
    /// Parse a template from TOML.
    ///
    /// `name` is used when the document does not name itself.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Load`] if the TOML is invalid.
    pub fn from_toml(name: &str, text: &str) -> Result<Self, TemplateError> {
        let mut template: Self = toml::from_str(text).map_err(|e| TemplateError::Load {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        if template.name.is_empty() {
            template.name = name.to_string();
        }
        Ok(template)
    }

    /// Read a template from a TOML file, named after the file stem.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Load`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        let text = std::fs::read_to_string(path).map_err(|e| TemplateError::Load {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(name, &text)
    }

    /// Check every placeholder in every section.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, in section order.
    pub fn check(&self) -> Result<(), TemplateError> {
        self.compile().map(|_| ())
    }

    pub(super) fn compile(&self) -> Result<Compiled<'_>, TemplateError> {
        Ok(Compiled {
            header: compile(&self.header, Section::Header)?,
            item: compile(&self.item, Section::Item)?,
            empty: compile(&self.empty, Section::Empty)?,
            footer: compile(&self.footer, Section::Footer)?,
        })
    }
}

/// A template section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// `header`
    Header,
    /// `item`
    Item,
    /// `empty`
    Empty,
    /// `footer`
    Footer,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Header => "header",
            Self::Item => "item",
            Self::Empty => "empty",
            Self::Footer => "footer",
        })
    }
}

#[derive(Debug)]
pub(super) enum Segment<'t> {
    Text(&'t str),
    Value { field: Field, filters: Vec<Filter> },
}

#[derive(Debug)]
pub(super) struct Compiled<'t> {
    pub(super) header: Vec<Segment<'t>>,
    pub(super) item: Vec<Segment<'t>>,
    pub(super) empty: Vec<Segment<'t>>,
    pub(super) footer: Vec<Segment<'t>>,
}

pub(super) fn write_section(
    out: &mut String,
    segments: &[Segment<'_>],
    requirement: Option<&Requirement>,
    document: DocumentValues<'_>,
) {
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Value { field, filters } => {
                let value = field.resolve(requirement, document);
                let value = filters
                    .iter()
                    .fold(value, |value, filter| filter.apply(&value));
                out.push_str(&value);
            }
        }
    }
}

fn compile(source: &str, section: Section) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for captures in PLACEHOLDER.captures_iter(source) {
        let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        push_text(&mut segments, &source[cursor..whole.start()], section)?;
        segments.push(placeholder(inner.as_str(), whole.as_str(), section)?);
        cursor = whole.end();
    }
    push_text(&mut segments, &source[cursor..], section)?;

    Ok(segments)
}

fn push_text<'t>(
    segments: &mut Vec<Segment<'t>>,
    text: &'t str,
    section: Section,
) -> Result<(), TemplateError> {
    if let Some(offset) = text.find("{{").or_else(|| text.find("}}")) {
        let snippet: String = text[offset..].chars().take(24).collect();
        return Err(TemplateError::Malformed { section, snippet });
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(())
}

fn placeholder<'t>(
    inner: &str,
    whole: &str,
    section: Section,
) -> Result<Segment<'t>, TemplateError> {
    let malformed = || TemplateError::Malformed {
        section,
        snippet: whole.to_string(),
    };

    let mut parts = inner.split('|').map(str::trim);
    let name = parts.next().filter(|name| !name.is_empty()).ok_or_else(malformed)?;
    let field = Field::parse(name)?;
    if field.is_per_requirement() && section != Section::Item {
        return Err(TemplateError::OutOfScope {
            field: field.to_string(),
            section,
        });
    }

    let filters = parts
        .map(|filter| {
            if filter.is_empty() {
                Err(malformed())
            } else {
                Filter::parse(filter)
            }
        })
        .collect::<Result<_, _>>()?;

    Ok(Segment::Value { field, filters })
}
