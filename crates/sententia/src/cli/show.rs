use std::{fmt::Write as _, path::Path};

use sententia_core::{Requirement, RequirementId};
use tracing::instrument;

use super::terminal::Colorize;
use crate::cli::{open, parse_id};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The id of the requirement to display
    #[arg(value_parser = parse_id)]
    id: RequirementId,

    /// Output format
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

impl Command {
    #[instrument(level = "debug", skip(self), fields(id = %self.id))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let service = open(root)?;
        let requirement = service.get(&self.id)?;

        match self.output {
            OutputFormat::Pretty => {
                let linked_from: Vec<_> = service
                    .list()
                    .into_iter()
                    .filter(|other| {
                        other
                            .fields()
                            .links
                            .iter()
                            .any(|link| link.target == self.id)
                    })
                    .map(|other| other.id().clone())
                    .collect();
                print!("{}", pretty(&requirement, &linked_from));
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&requirement)?),
        }
        Ok(())
    }
}

fn pretty(requirement: &Requirement, linked_from: &[RequirementId]) -> String {
    let fields = requirement.fields();
    let mut out = String::new();

    let _ = writeln!(out, "# {} {}\n", requirement.id(), requirement.title());

    let _ = writeln!(out, "{}", "Attributes".dim());
    let _ = writeln!(out, "  Type:      {}", fields.kind);
    let _ = writeln!(out, "  Status:    {}", fields.status);
    let _ = writeln!(out, "  Priority:  {}", fields.priority);
    if let Some(layer) = fields.layer {
        let _ = writeln!(out, "  Layer:     {layer}");
    }
    if let Some(source) = fields.source {
        let _ = writeln!(out, "  Source:    {source}");
    }
    let _ = writeln!(out, "  Created:   {}", requirement.created().to_rfc3339());
    let _ = writeln!(out, "  Updated:   {}", requirement.updated().to_rfc3339());
    let _ = writeln!(out, "  Revisions: {}", requirement.revisions().len());

    for (heading, text) in [
        ("Description", &fields.description),
        ("Rationale", &fields.rationale),
        ("Verification", &fields.verification),
    ] {
        if let Some(text) = text {
            let _ = writeln!(out, "\n{}", heading.dim());
            for line in text.lines() {
                let _ = writeln!(out, "  {line}");
            }
        }
    }

    if !fields.links.is_empty() {
        let _ = writeln!(out, "\n{}", "Links".dim());
        for link in &fields.links {
            let _ = writeln!(out, "  • {} {}", link.kind, link.target);
        }
    }

    if !linked_from.is_empty() {
        let _ = writeln!(out, "\n{}", "Linked from".dim());
        for id in linked_from {
            let _ = writeln!(out, "  • {id}");
        }
    }

    if !fields.metadata.is_empty() {
        let _ = writeln!(out, "\n{}", "Metadata".dim());
        for (key, value) in &fields.metadata {
            let _ = writeln!(out, "  {key}: {value}");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use sententia_core::{Candidate, Config, RequirementService};

    use super::*;

    #[test]
    fn pretty_output_lists_every_section() {
        let service = RequirementService::in_memory(Config::default());
        let mut candidate = Candidate::new("Login", "Functional", "Draft", "High");
        candidate.description = Some("Users sign in.\nWith SSO.".to_string());
        candidate
            .metadata
            .insert("owner".to_string(), "ops".to_string());
        let requirement = service.create(&candidate).unwrap();
        let from: RequirementId = "R-002".parse().unwrap();

        let text = pretty(&requirement, std::slice::from_ref(&from));
        assert!(text.starts_with("# R-001 Login\n"));
        assert!(text.contains("  Status:    Draft\n"));
        assert!(text.contains("  Users sign in.\n  With SSO.\n"));
        assert!(text.contains("  • R-002\n"));
        assert!(text.contains("  owner: ops\n"));
        assert!(!text.contains("Rationale"));
    }
}
