use std::{fmt::Write as _, path::Path};

use sententia_core::{
    Requirement,
    domain::registry::{Layer, Priority, RequirementType, Status},
    service::Filter,
};
use tracing::instrument;

use super::terminal::{self, Colorize};
use crate::cli::open;

/// Column widths for the table, excluding the title.
const ID_WIDTH: usize = 10;
const KIND_WIDTH: usize = 15;
const STATUS_WIDTH: usize = 11;
const PRIORITY_WIDTH: usize = 9;
const LAYER_WIDTH: usize = 9;
const MIN_TITLE_WIDTH: usize = 20;

#[derive(Debug, Default, clap::Parser)]
pub struct Command {
    /// Only requirements in this layer
    #[arg(long)]
    layer: Option<Layer>,

    /// Only requirements with this status
    #[arg(long)]
    status: Option<Status>,

    /// Only requirements of this type
    #[arg(long = "type")]
    kind: Option<RequirementType>,

    /// Only requirements with this priority
    #[arg(long)]
    priority: Option<Priority>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
    Ids,
}

impl Command {
    fn filter(&self) -> Filter {
        Filter {
            layer: self.layer,
            status: self.status,
            kind: self.kind,
            priority: self.priority,
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let service = open(root)?;
        let requirements = service.list_filtered(&self.filter());

        match self.output {
            OutputFormat::Table => {
                if requirements.is_empty() {
                    println!("{}", "No requirements found.".dim());
                    return Ok(());
                }
                let width = terminal::terminal_width().unwrap_or(120);
                print!("{}", table(&requirements, width));
                println!(
                    "\n{}",
                    format!("{} requirement(s)", requirements.len()).dim()
                );
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&requirements)?),
            OutputFormat::Ids => {
                for requirement in &requirements {
                    println!("{}", requirement.id());
                }
            }
        }
        Ok(())
    }
}

/// A fixed-width table, with titles truncated to fit `width` columns.
fn table(requirements: &[Requirement], width: usize) -> String {
    let fixed = ID_WIDTH + KIND_WIDTH + STATUS_WIDTH + PRIORITY_WIDTH + LAYER_WIDTH + 5;
    let title_width = width.saturating_sub(fixed).max(MIN_TITLE_WIDTH);

    let mut out = format!(
        "{:<ID_WIDTH$} {:<KIND_WIDTH$} {:<STATUS_WIDTH$} {:<PRIORITY_WIDTH$} {:<LAYER_WIDTH$} {}\n",
        "ID", "TYPE", "STATUS", "PRIORITY", "LAYER", "TITLE"
    );
    for requirement in requirements {
        let fields = requirement.fields();
        let _ = writeln!(
            out,
            "{:<ID_WIDTH$} {:<KIND_WIDTH$} {:<STATUS_WIDTH$} {:<PRIORITY_WIDTH$} {:<LAYER_WIDTH$} {}",
            requirement.id().to_string(),
            fields.kind.as_str(),
            fields.status.as_str(),
            fields.priority.as_str(),
            fields.layer.map_or("-", Layer::as_str),
            terminal::truncate(requirement.title(), title_width),
        );
    }
    out
}
