use std::path::Path;

use sententia_core::service::Demo;
use tracing::instrument;

use crate::cli::{confirm, open, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The dataset to load: ice-cream or death-star
    name: Demo,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,
}

impl Command {
    #[instrument(skip(self), fields(demo = %self.name))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let service = open(root)?;

        let existing = service.list().len();
        if existing > 0 {
            let prompt = format!("Replace the {existing} existing requirement(s)?");
            if !confirm(&prompt, self.yes)? {
                println!("Cancelled");
                return Ok(());
            }
        }

        let count = service.load_demo(self.name)?;
        println!(
            "{}",
            format!("Loaded {count} requirements from the {} demo", self.name).success()
        );
        Ok(())
    }
}
