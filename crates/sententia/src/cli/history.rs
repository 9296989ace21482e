use std::{fmt::Write as _, path::Path};

use sententia_core::{Requirement, RequirementId};
use tracing::instrument;

use super::terminal::Colorize;
use crate::cli::{open, parse_id};

/// Characters of the fingerprint shown in the listing.
const SHORT_FINGERPRINT: usize = 12;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The id of the requirement
    #[arg(value_parser = parse_id)]
    id: RequirementId,

    /// Print the revisions as JSON
    #[arg(long)]
    json: bool,
}

impl Command {
    #[instrument(level = "debug", skip(self), fields(id = %self.id))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let service = open(root)?;
        let requirement = service.get(&self.id)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(requirement.revisions())?);
        } else {
            print!("{}", timeline(&requirement));
        }
        Ok(())
    }
}

/// Every revision, oldest first, followed by the current state.
fn timeline(requirement: &Requirement) -> String {
    let mut out = String::new();
    let short = |fingerprint: &str| fingerprint.chars().take(SHORT_FINGERPRINT).collect::<String>();

    if requirement.revisions().is_empty() {
        let _ = writeln!(out, "{}", "No earlier revisions.".dim());
    }
    for (index, revision) in requirement.revisions().iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}  {}  {}  {} [{}]",
            index + 1,
            revision.recorded.format("%Y-%m-%d %H:%M:%S"),
            short(&revision.fingerprint).dim(),
            revision.fields.title.as_str(),
            revision.fields.status,
        );
    }
    let _ = writeln!(
        out,
        "{}  {}  {}  {} [{}]",
        "now".info(),
        requirement.updated().format("%Y-%m-%d %H:%M:%S"),
        short(&requirement.fingerprint()).dim(),
        requirement.title(),
        requirement.fields().status,
    );
    out
}

#[cfg(test)]
mod tests {
    use sententia_core::{Candidate, Config, Patch, RequirementService};

    use super::*;

    #[test]
    fn timeline_lists_revisions_oldest_first() {
        let service = RequirementService::in_memory(Config::default());
        let requirement = service
            .create(&Candidate::new("Login", "Functional", "Draft", "High"))
            .unwrap();
        let id = requirement.id().clone();
        service.update(&id, Patch::status("Proposed")).unwrap();
        let requirement = service.update(&id, Patch::status("Approved")).unwrap();

        let text = timeline(&requirement);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].trim_start().starts_with("1  "));
        assert!(lines[0].ends_with("Login [Draft]"));
        assert!(lines[1].ends_with("Login [Proposed]"));
        assert!(lines[2].ends_with("Login [Approved]"));
    }

    #[test]
    fn new_requirements_have_no_history() {
        let service = RequirementService::in_memory(Config::default());
        let requirement = service
            .create(&Candidate::new("Login", "Functional", "Draft", "High"))
            .unwrap();
        assert!(timeline(&requirement).starts_with("No earlier revisions."));
    }
}
