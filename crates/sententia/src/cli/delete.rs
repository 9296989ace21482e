use std::path::Path;

use sententia_core::RequirementId;
use tracing::instrument;

use crate::cli::{confirm, open, parse_id, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The id of the requirement to delete
    #[arg(value_parser = parse_id)]
    id: RequirementId,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,
}

impl Command {
    #[instrument(skip(self), fields(id = %self.id))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let service = open(root)?;
        let requirement = service.get(&self.id)?;

        let linked_from: Vec<_> = service
            .list()
            .into_iter()
            .filter(|other| other.fields().links.iter().any(|link| link.target == self.id))
            .map(|other| other.id().to_string())
            .collect();
        if !linked_from.is_empty() {
            eprintln!(
                "{}",
                format!(
                    "⚠️  {} is linked from {}; those links will dangle",
                    self.id,
                    linked_from.join(", ")
                )
                .warning()
            );
        }

        let prompt = format!("Delete {} ({})?", self.id, requirement.title());
        if !confirm(&prompt, self.yes)? {
            println!("Cancelled");
            return Ok(());
        }

        service.delete(&self.id)?;
        println!("{}", format!("✅ Deleted {}", self.id).success());
        Ok(())
    }
}
