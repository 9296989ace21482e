//! The tabular register: reading it back, and the traceability matrix.

use std::{collections::BTreeMap, fmt::Write as _};

use crate::{
    domain::{Candidate, Requirement, schema::CandidateLink},
    render::field::{escape_cell, unescape_cell},
};

/// Errors raised while reading a rendered register.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    /// The text contains no table.
    #[error("no requirements table found")]
    MissingTable,

    /// The table has no `ID` column.
    #[error("the requirements table has no '{0}' column")]
    MissingColumn(&'static str),

    /// A row has a different number of cells than the heading.
    #[error("line {line}: expected {expected} cells, found {found}")]
    CellCount {
        /// One-based line number.
        line: usize,
        /// Cells in the heading row.
        expected: usize,
        /// Cells in this row.
        found: usize,
    },

    /// A link is not of the form `Kind TARGET`.
    #[error("line {line}: malformed link '{value}'")]
    Link {
        /// One-based line number.
        line: usize,
        /// The offending text.
        value: String,
    },

    /// The metadata cell is not a JSON object of strings.
    #[error("line {line}: malformed metadata: {source}")]
    Metadata {
        /// One-based line number.
        line: usize,
        /// The parse failure.
        source: serde_json::Error,
    },
}

/// Parse the first table of a rendered register back into candidates.
///
/// Columns are matched to fields by heading, case-insensitively; columns with
/// unrecognised headings are ignored. Empty cells are treated as absent. The
/// candidates are not validated.
///
/// # Errors
///
/// Returns a [`RegisterError`] if there is no table, the table has no `ID`
/// column, or a row cannot be parsed.
pub fn read_register(markdown: &str) -> Result<Vec<Candidate>, RegisterError> {
    let mut lines = markdown
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .skip_while(|(_, line)| !line.starts_with('|'));

    let (_, heading) = lines.next().ok_or(RegisterError::MissingTable)?;
    let columns: Vec<String> = split_row(heading)
        .into_iter()
        .map(|cell| cell.to_lowercase())
        .collect();
    if !columns.iter().any(|column| column == "id") {
        return Err(RegisterError::MissingColumn("ID"));
    }

    // delimiter row
    lines.next();

    lines
        .take_while(|(_, line)| line.starts_with('|'))
        .map(|(line, text)| {
            let cells = split_row(text);
            if cells.len() != columns.len() {
                return Err(RegisterError::CellCount {
                    line,
                    expected: columns.len(),
                    found: cells.len(),
                });
            }
            let mut candidate = Candidate::default();
            for (column, cell) in columns.iter().zip(cells) {
                assign(&mut candidate, column, cell, line)?;
            }
            Ok(candidate)
        })
        .collect()
}

fn assign(
    candidate: &mut Candidate,
    column: &str,
    cell: String,
    line: usize,
) -> Result<(), RegisterError> {
    if cell.is_empty() {
        return Ok(());
    }
    let slot = match column {
        "id" => &mut candidate.id,
        "title" => &mut candidate.title,
        "type" => &mut candidate.kind,
        "status" => &mut candidate.status,
        "priority" => &mut candidate.priority,
        "layer" => &mut candidate.layer,
        "source" => &mut candidate.source,
        "description" => &mut candidate.description,
        "rationale" => &mut candidate.rationale,
        "verification" => &mut candidate.verification,
        "links" => {
            candidate.links = parse_links(&cell, line)?;
            return Ok(());
        }
        "metadata" => {
            candidate.metadata = serde_json::from_str::<BTreeMap<String, String>>(&cell)
                .map_err(|source| RegisterError::Metadata { line, source })?;
            return Ok(());
        }
        _ => return Ok(()),
    };
    *slot = Some(cell);
    Ok(())
}

fn parse_links(cell: &str, line: usize) -> Result<Vec<CandidateLink>, RegisterError> {
    cell.split(',')
        .map(str::trim)
        .filter(|link| !link.is_empty())
        .map(|link| {
            let (kind, target) = link.split_once(' ').ok_or_else(|| RegisterError::Link {
                line,
                value: link.to_string(),
            })?;
            Ok(CandidateLink {
                target_id: target.trim().to_string(),
                kind: kind.to_string(),
            })
        })
        .collect()
}

/// Split a table row on unescaped pipes, unescaping each trimmed cell.
fn split_row(row: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = row.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '|' => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);

    // leading and trailing pipes leave empty edge cells
    if cells.first().is_some_and(|cell| cell.trim().is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|cell| cell.trim().is_empty()) {
        cells.pop();
    }

    cells
        .iter()
        .map(|cell| unescape_cell(cell.trim()))
        .collect()
}

/// A Markdown table of every link, one row per link, in requirement order.
///
/// Converting the table to CSV yields the traceability export.
#[must_use]
pub fn traceability_matrix(requirements: &[Requirement]) -> String {
    let mut out = String::from(
        "| Source Requirement | Link Type | Target Requirement |\n|---|---|---|\n",
    );
    for requirement in requirements {
        for link in &requirement.fields().links {
            let _ = writeln!(
                out,
                "| {} | {} | {} |",
                escape_cell(&requirement.id().to_string()),
                link.kind,
                escape_cell(&link.target.to_string()),
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        convert::{Format, convert},
        domain::{Registry, schema::validate},
        render::{RenderContext, Templates, render},
    };

    fn requirements() -> Vec<Requirement> {
        let registry = Registry::new();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let mut login = Candidate::new("Login | SSO", "functional", "draft", "high").with_id("R-001");
        login.layer = Some("Software".to_string());
        login.description = Some("Users sign in.\nSessions last 8h.".to_string());
        login.rationale = Some("Insert a <br> tag, not <b>bold</b>".to_string());
        login.links.push(CandidateLink {
            target_id: "BUS-001".to_string(),
            kind: "Satisfies".to_string(),
        });
        login
            .metadata
            .insert("reference".to_string(), "Doc A, §2".to_string());

        let budget = Candidate::new("Budget", "Constraint", "Approved", "Low").with_id("BUS-001");

        [login, budget]
            .iter()
            .map(|candidate| {
                let validated = validate(&registry, candidate, None).unwrap();
                Requirement::new(validated.id.unwrap(), validated.fields, now)
            })
            .collect()
    }

    #[test]
    fn register_reads_back() {
        let requirements = requirements();
        let templates = Templates::builtin();
        let markdown = render(
            &requirements,
            templates.get("register").unwrap(),
            &RenderContext::new("Shop"),
        )
        .unwrap();
        let converted = convert(&markdown, Format::Markdown).unwrap();

        let candidates = read_register(std::str::from_utf8(&converted.bytes).unwrap()).unwrap();
        assert_eq!(candidates.len(), requirements.len());
        for (candidate, requirement) in candidates.iter().zip(&requirements) {
            let expected = Candidate::from(requirement.fields()).with_id(&requirement.id().to_string());
            assert_eq!(candidate, &expected);
        }
    }

    #[test]
    fn empty_register_reads_back_as_nothing() {
        let templates = Templates::builtin();
        let markdown = render(&[], templates.get("register").unwrap(), &RenderContext::default())
            .unwrap();
        assert!(markdown.contains("_No requirements._"));
        assert!(read_register(&markdown).unwrap().is_empty());
    }

    #[test]
    fn text_without_a_table() {
        assert!(matches!(
            read_register("# Heading\n\nJust prose.\n"),
            Err(RegisterError::MissingTable)
        ));
    }

    #[test]
    fn ragged_rows_are_reported() {
        let markdown = "| ID | Title |\n|---|---|\n| R-001 | One | extra |\n";
        assert!(matches!(
            read_register(markdown),
            Err(RegisterError::CellCount { line: 3, expected: 2, found: 3 })
        ));
    }

    #[test]
    fn escaped_pipes_stay_in_their_cell() {
        assert_eq!(split_row(r"| a \| b | c |"), ["a | b", "c"]);
    }

    #[test]
    fn matrix_lists_every_link() {
        let matrix = traceability_matrix(&requirements());
        assert_eq!(
            matrix,
            "| Source Requirement | Link Type | Target Requirement |\n\
             |---|---|---|\n\
             | R-001 | Satisfies | BUS-001 |\n"
        );
    }
}
