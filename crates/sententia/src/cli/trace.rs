use std::path::{Path, PathBuf};

use sententia_core::{Format, convert, render::traceability_matrix};
use tracing::instrument;

use super::render::emit;
use crate::cli::open;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Output format: csv, markdown, html, docx, pdf or xlsx
    #[arg(long, short, default_value = "csv")]
    format: Format,

    /// Where to write the output
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl Command {
    #[instrument(skip(self), fields(format = %self.format))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let service = open(root)?;
        let requirements = service.list();
        let links: usize = requirements
            .iter()
            .map(|requirement| requirement.fields().links.len())
            .sum();
        tracing::info!(links, "exporting traceability matrix");

        let artifact = convert(&traceability_matrix(&requirements), self.format)?;
        emit(&artifact, self.output, "traceability")
    }
}

#[cfg(test)]
mod tests {
    use sententia_core::{Candidate, Config, RequirementService};
    use tempfile::tempdir;

    use super::*;
    use crate::cli::create::parse_link;

    #[test]
    fn matrix_is_written_as_csv() {
        let tmp = tempdir().unwrap();
        let service = RequirementService::open(tmp.path(), Config::default()).unwrap();
        service
            .create(&Candidate::new("Budget", "Constraint", "Draft", "Low"))
            .unwrap();
        let mut login = Candidate::new("Login", "Functional", "Draft", "High");
        login.links.push(parse_link("Satisfies:R-001").unwrap());
        service.create(&login).unwrap();

        let output = tmp.path().join("trace.csv");
        Command {
            format: Format::Csv,
            output: Some(output.clone()),
        }
        .run(tmp.path())
        .unwrap();

        assert_eq!(
            std::fs::read_to_string(output).unwrap(),
            "Source Requirement,Link Type,Target Requirement\r\nR-002,Satisfies,R-001\r\n"
        );
    }
}
