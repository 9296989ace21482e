use std::path::Path;

use sententia_core::{
    Patch, RequirementId, RequirementService,
    domain::schema::CandidateLink,
};
use tracing::instrument;

use super::{
    create::{parse_entry, parse_link},
    terminal::Colorize,
};
use crate::cli::{open, parse_id};

/// Fields that can be emptied with `--clear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Clearable {
    Layer,
    Source,
    Description,
    Rationale,
    Verification,
    Links,
    Metadata,
}

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The id of the requirement to update
    #[arg(value_parser = parse_id)]
    id: RequirementId,

    /// New title
    #[arg(long, short)]
    title: Option<String>,

    /// New requirement type
    #[arg(long = "type", short = 'k')]
    kind: Option<String>,

    /// New status
    #[arg(long, short)]
    status: Option<String>,

    /// New priority
    #[arg(long, short)]
    priority: Option<String>,

    /// New layer
    #[arg(long, short)]
    layer: Option<String>,

    /// New source
    #[arg(long)]
    source: Option<String>,

    /// New description
    #[arg(long, short)]
    description: Option<String>,

    /// New rationale
    #[arg(long)]
    rationale: Option<String>,

    /// New verification method
    #[arg(long)]
    verification: Option<String>,

    /// Add a link, as KIND:TARGET
    #[arg(long = "link", value_parser = parse_link)]
    links: Vec<CandidateLink>,

    /// Set a metadata entry, as KEY=VALUE
    #[arg(long = "meta", value_parser = parse_entry)]
    metadata: Vec<(String, String)>,

    /// Empty a field before applying additions
    #[arg(long, value_enum, value_delimiter = ',')]
    clear: Vec<Clearable>,
}

impl Command {
    /// Build the patch against the current state of the requirement.
    ///
    /// Links and metadata are merged onto what is already there, after any
    /// `--clear`.
    fn patch(&self, service: &RequirementService) -> anyhow::Result<Patch> {
        let current = service.get(&self.id)?;
        let fields = current.fields();
        let cleared = |field| self.clear.contains(&field);

        let optional = |field, value: Option<String>| {
            if value.is_some() {
                Some(value)
            } else if cleared(field) {
                Some(None)
            } else {
                None
            }
        };

        let links = if self.links.is_empty() && !cleared(Clearable::Links) {
            None
        } else {
            let mut links: Vec<CandidateLink> = if cleared(Clearable::Links) {
                Vec::new()
            } else {
                fields
                    .links
                    .iter()
                    .map(|link| CandidateLink {
                        target_id: link.target.to_string(),
                        kind: link.kind.to_string(),
                    })
                    .collect()
            };
            links.extend(self.links.iter().cloned());
            Some(links)
        };

        let metadata = if self.metadata.is_empty() && !cleared(Clearable::Metadata) {
            None
        } else {
            let mut metadata = if cleared(Clearable::Metadata) {
                Default::default()
            } else {
                fields.metadata.clone()
            };
            metadata.extend(self.metadata.iter().cloned());
            Some(metadata)
        };

        Ok(Patch {
            title: self.title.clone(),
            kind: self.kind.clone(),
            status: self.status.clone(),
            priority: self.priority.clone(),
            layer: optional(Clearable::Layer, self.layer.clone()),
            source: optional(Clearable::Source, self.source.clone()),
            description: optional(Clearable::Description, self.description.clone()),
            rationale: optional(Clearable::Rationale, self.rationale.clone()),
            verification: optional(Clearable::Verification, self.verification.clone()),
            links,
            metadata,
        })
    }

    #[instrument(skip(self), fields(id = %self.id))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let service = open(root)?;
        let id = &self.id;
        let before = service.get(id)?.fingerprint();

        let patch = self.patch(&service)?;
        let requirement = service.update(id, patch)?;

        if requirement.fingerprint() == before {
            println!("{}", format!("{id} unchanged").dim());
        } else {
            println!("{}", format!("Updated requirement {id}").success());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use sententia_core::{Candidate, Config};

    use super::*;

    fn service() -> RequirementService {
        let service = RequirementService::in_memory(Config::default());
        let mut candidate = Candidate::new("Login", "Functional", "Draft", "High");
        candidate.layer = Some("Software".to_string());
        candidate.links.push(parse_link("Satisfies:BUS-001").unwrap());
        candidate
            .metadata
            .insert("owner".to_string(), "ops".to_string());
        service.create(&candidate).unwrap();
        service
    }

    fn command(args: &[&str]) -> Command {
        Command::try_parse_from(["update", "R-001"].iter().chain(args)).unwrap()
    }

    #[test]
    fn untouched_fields_are_left_alone() {
        let service = service();
        let patch = command(&["--status", "approved"]).patch(&service).unwrap();
        assert_eq!(patch, Patch::status("approved"));
    }

    #[test]
    fn links_and_metadata_are_merged() {
        let service = service();
        let patch = command(&["--link", "Refines:SYS-002", "--meta", "team=web"])
            .patch(&service)
            .unwrap();

        let links = patch.links.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].target_id, "SYS-002");

        let metadata = patch.metadata.unwrap();
        assert_eq!(metadata["owner"], "ops");
        assert_eq!(metadata["team"], "web");
    }

    #[test]
    fn clear_empties_fields() {
        let service = service();
        let patch = command(&["--clear", "layer,links"]).patch(&service).unwrap();
        assert_eq!(patch.layer, Some(None));
        assert_eq!(patch.links, Some(Vec::new()));
        assert_eq!(patch.metadata, None);

        let updated = service.update(&"R-001".parse().unwrap(), patch).unwrap();
        assert_eq!(updated.fields().layer, None);
        assert!(updated.fields().links.is_empty());
    }

    #[test]
    fn missing_requirement_is_an_error() {
        let service = RequirementService::in_memory(Config::default());
        assert!(command(&["--title", "x"]).patch(&service).is_err());
    }
}
