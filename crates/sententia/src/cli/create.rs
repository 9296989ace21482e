use std::path::Path;

use sententia_core::{Candidate, domain::schema::CandidateLink};
use tracing::instrument;

use crate::cli::{open, terminal::Colorize};

/// Parse a link written `KIND:TARGET`, e.g. `Satisfies:BUS-001`.
pub(super) fn parse_link(s: &str) -> Result<CandidateLink, String> {
    let (kind, target) = s
        .split_once(':')
        .ok_or_else(|| format!("expected KIND:TARGET, got '{s}'"))?;
    Ok(CandidateLink {
        target_id: target.trim().to_uppercase(),
        kind: kind.trim().to_string(),
    })
}

/// Parse a metadata entry written `KEY=VALUE`.
pub(super) fn parse_entry(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// One-line summary
    #[arg(long, short)]
    title: String,

    /// Requirement type
    #[arg(long = "type", short = 'k', default_value = "Functional")]
    kind: String,

    /// Lifecycle status
    #[arg(long, short, default_value = "Draft")]
    status: String,

    /// Priority
    #[arg(long, short, default_value = "Medium")]
    priority: String,

    /// Abstraction layer
    #[arg(long, short)]
    layer: Option<String>,

    /// Where the requirement came from
    #[arg(long)]
    source: Option<String>,

    /// Free-text description
    #[arg(long, short)]
    description: Option<String>,

    /// Why the requirement exists
    #[arg(long)]
    rationale: Option<String>,

    /// How the requirement will be verified
    #[arg(long)]
    verification: Option<String>,

    /// Links to other requirements, as KIND:TARGET
    #[arg(long = "link", value_parser = parse_link)]
    links: Vec<CandidateLink>,

    /// Free-form metadata, as KEY=VALUE
    #[arg(long = "meta", value_parser = parse_entry)]
    metadata: Vec<(String, String)>,

    /// Use this id instead of allocating the next one
    #[arg(long)]
    id: Option<String>,
}

impl Command {
    fn candidate(self) -> Candidate {
        Candidate {
            id: self.id.map(|id| id.to_uppercase()),
            title: Some(self.title),
            kind: Some(self.kind),
            status: Some(self.status),
            priority: Some(self.priority),
            layer: self.layer,
            source: self.source,
            description: self.description,
            rationale: self.rationale,
            verification: self.verification,
            links: self.links,
            metadata: self.metadata.into_iter().collect(),
        }
    }

    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let service = open(root)?;
        let requirement = service.create(&self.candidate())?;

        println!(
            "{}",
            format!("Added requirement {}", requirement.id()).success()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use test_case::test_case;

    use super::*;

    fn command(title: &str) -> Command {
        Command {
            title: title.to_string(),
            kind: "functional".to_string(),
            status: "draft".to_string(),
            priority: "high".to_string(),
            layer: Some("software".to_string()),
            source: None,
            description: Some("Users sign in.".to_string()),
            rationale: None,
            verification: None,
            links: vec![parse_link("Satisfies:bus-001").unwrap()],
            metadata: vec![parse_entry("owner=ops").unwrap()],
            id: None,
        }
    }

    #[test]
    fn create_persists_a_requirement() {
        let tmp = tempdir().unwrap();
        command("Login").run(tmp.path()).unwrap();

        let service = open(tmp.path()).unwrap();
        let requirements = service.list();
        assert_eq!(requirements.len(), 1);

        let requirement = &requirements[0];
        assert_eq!(requirement.id().to_string(), "R-001");
        assert_eq!(requirement.title(), "Login");
        assert_eq!(requirement.fields().links[0].target.to_string(), "BUS-001");
        assert_eq!(requirement.fields().metadata["owner"], "ops");
    }

    #[test]
    fn invalid_values_are_refused() {
        let tmp = tempdir().unwrap();
        let mut bad = command("Login");
        bad.status = "Shipped".to_string();
        assert!(bad.run(tmp.path()).is_err());
        assert!(open(tmp.path()).unwrap().list().is_empty());
    }

    #[test_case("Satisfies:BUS-001", "Satisfies", "BUS-001")]
    #[test_case("refines : sys-2", "refines", "SYS-2"; "padded")]
    fn links_parse(raw: &str, kind: &str, target: &str) {
        let link = parse_link(raw).unwrap();
        assert_eq!(link.kind, kind);
        assert_eq!(link.target_id, target);
    }

    #[test]
    fn malformed_arguments() {
        assert!(parse_link("BUS-001").is_err());
        assert!(parse_entry("=value").is_err());
        assert!(parse_entry("owner").is_err());
    }
}
