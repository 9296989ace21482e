//! Rendering requirements into text documents.
//!
//! A [`Template`] is a set of plain-text sections with `{{ field }}` or
//! `{{ field | filter }}` placeholders. Rendering is a pure function of the
//! requirements, the template and a [`RenderContext`]; the same inputs always
//! produce the same bytes.

mod builtin;
mod field;
mod register;
mod template;

pub use builtin::Templates;
pub use field::{Field, Filter, escape_cell, unescape_cell};
pub use register::{RegisterError, read_register, traceability_matrix};
pub use template::{Section, Selection, Template};

use crate::domain::Requirement;

/// Document-level values supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    /// Project name, available to placeholders as `project`.
    pub project: String,
}

impl RenderContext {
    /// A context for the named project.
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }
}

/// Errors raised while loading or rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A placeholder names a field that does not exist.
    #[error("unknown template field '{0}'")]
    UnknownField(String),

    /// A placeholder names a filter that does not exist.
    #[error("unknown template filter '{0}'")]
    UnknownFilter(String),

    /// A requirement field used outside the `item` section.
    #[error("field '{field}' can only be used in the item section, not the {section} section")]
    OutOfScope {
        /// The field.
        field: String,
        /// Where it was used.
        section: Section,
    },

    /// A placeholder that could not be parsed.
    #[error("malformed placeholder in the {section} section near '{snippet}'")]
    Malformed {
        /// Where the placeholder is.
        section: Section,
        /// The offending text.
        snippet: String,
    },

    /// No template with the requested name.
    #[error("template '{name}' not found (available: {available})")]
    UnknownTemplate {
        /// The requested name.
        name: String,
        /// Comma-separated names of the known templates.
        available: String,
    },

    /// A template file could not be read or parsed.
    #[error("failed to load template '{name}': {reason}")]
    Load {
        /// Template name.
        name: String,
        /// What went wrong.
        reason: String,
    },
}

/// Render `requirements` through `template`.
///
/// Requirements are written in the order given, filtered by the template's
/// selection.
///
/// # Errors
///
/// Returns a [`TemplateError`] if any section contains an unknown field, an
/// unknown filter, a requirement field outside `item`, or a malformed
/// placeholder. Sections are checked even when they would not be written.
#[tracing::instrument(level = "debug", skip_all, fields(template = %template.name))]
pub fn render(
    requirements: &[Requirement],
    template: &Template,
    context: &RenderContext,
) -> Result<String, TemplateError> {
    let compiled = template.compile()?;

    let selected: Vec<_> = requirements
        .iter()
        .filter(|requirement| template.select.matches(requirement))
        .collect();

    let document = field::DocumentValues {
        project: &context.project,
        document: &template.document,
        count: selected.len(),
    };

    let mut out = String::new();
    template::write_section(&mut out, &compiled.header, None, document);
    if selected.is_empty() {
        template::write_section(&mut out, &compiled.empty, None, document);
    }
    for &requirement in &selected {
        template::write_section(&mut out, &compiled.item, Some(requirement), document);
    }
    template::write_section(&mut out, &compiled.footer, None, document);

    tracing::debug!(count = selected.len(), bytes = out.len(), "rendered");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use non_empty_string::NonEmptyString;

    use super::*;
    use crate::domain::{
        registry::{Layer, Priority, RequirementType, Status},
        requirement::Fields,
    };

    fn requirement(id: &str, title: &str, layer: Layer) -> Requirement {
        let mut fields = Fields::new(
            NonEmptyString::new(title.to_string()).unwrap(),
            RequirementType::Functional,
            Status::Draft,
            Priority::High,
        );
        fields.layer = Some(layer);
        fields
            .metadata
            .insert("owner".to_string(), "Ops".to_string());
        let created = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        Requirement::new(id.parse().unwrap(), fields, created)
    }

    fn list_template() -> Template {
        Template::from_toml(
            "list",
            r##"
document = "Plan"
header = "# {{ project }} {{ document }} ({{ count }})\n"
item = "- {{ id }}: {{ title | upper }} [{{ metadata.owner }}{{ metadata.missing }}] {{ created }}\n"
empty = "Nothing yet.\n"
footer = "End.\n"

[select]
layer = "Software"
"##,
        )
        .unwrap()
    }

    #[test]
    fn renders_sections_in_order() {
        let requirements = [
            requirement("R-001", "Login", Layer::Software),
            requirement("R-002", "Budget", Layer::Business),
            requirement("R-003", "Logout", Layer::Software),
        ];
        let output = render(&requirements, &list_template(), &RenderContext::new("Shop")).unwrap();
        assert_eq!(
            output,
            "# Shop Plan (2)\n\
             - R-001: LOGIN [Ops] 2025-03-14\n\
             - R-003: LOGOUT [Ops] 2025-03-14\n\
             End.\n"
        );
    }

    #[test]
    fn empty_section_replaces_items() {
        let requirements = [requirement("R-002", "Budget", Layer::Business)];
        let output = render(&requirements, &list_template(), &RenderContext::default()).unwrap();
        assert_eq!(output, "#  Plan (0)\nNothing yet.\nEnd.\n");
    }

    #[test]
    fn rendering_is_deterministic() {
        let requirements = [
            requirement("R-001", "Login", Layer::Software),
            requirement("R-003", "Logout", Layer::Software),
        ];
        let templates = Templates::builtin();
        let register = templates.get("register").unwrap();
        let context = RenderContext::new("Shop");
        let first = render(&requirements, register, &context).unwrap();
        let second = render(&requirements, register, &context).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn errors_are_raised_without_items() {
        let mut template = list_template();
        template.footer = "{{ owner }}".to_string();
        assert_eq!(
            render(&[], &template, &RenderContext::default()),
            Err(TemplateError::UnknownField("owner".to_string()))
        );
    }

    #[test]
    fn unknown_filter() {
        let mut template = list_template();
        template.item = "{{ id | shout }}".to_string();
        assert_eq!(
            render(&[], &template, &RenderContext::default()),
            Err(TemplateError::UnknownFilter("shout".to_string()))
        );
    }
}
