use std::{fmt::Write as _, path::Path};

use sententia_core::{
    Config, Registry,
    domain::EnumField,
    storage::directory,
};
use tracing::instrument;

use super::terminal::Colorize;
use crate::cli::load_config;

#[derive(Debug, clap::Parser)]
pub struct Command {
    #[command(subcommand)]
    command: RegistryCommand,
}

#[derive(Debug, clap::Parser)]
enum RegistryCommand {
    /// List the values of every enumerated field, or of one
    List {
        /// type, status, priority, layer, source or link-type
        field: Option<EnumField>,
    },

    /// Refuse a value for new requirements
    ///
    /// Existing requirements keep the value.
    Retire {
        /// The field the value belongs to
        field: EnumField,
        /// The value to retire
        value: String,
    },

    /// Accept a retired value again
    Reinstate {
        /// The field the value belongs to
        field: EnumField,
        /// The value to reinstate
        value: String,
    },
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut config = load_config(root)?;

        match self.command {
            RegistryCommand::List { field } => {
                print!("{}", listing(&config.registry(), field));
                Ok(())
            }
            RegistryCommand::Retire { field, value } => {
                let mut registry = config.registry();
                if registry.retire(field, &value)? {
                    save(root, &mut config, &registry)?;
                    println!("{}", format!("Retired {field} '{value}'").success());
                } else {
                    println!("{}", format!("{field} '{value}' is already retired").dim());
                }
                Ok(())
            }
            RegistryCommand::Reinstate { field, value } => {
                let mut registry = config.registry();
                if registry.reinstate(field, &value)? {
                    save(root, &mut config, &registry)?;
                    println!("{}", format!("Reinstated {field} '{value}'").success());
                } else {
                    println!("{}", format!("{field} '{value}' is not retired").dim());
                }
                Ok(())
            }
        }
    }
}

fn save(root: &Path, config: &mut Config, registry: &Registry) -> anyhow::Result<()> {
    let path = directory::config_path(root);
    if !path.exists() {
        anyhow::bail!(
            "{} is not a requirements project (run `sen init` first)",
            root.display()
        );
    }
    config.set_registry(registry);
    config
        .save(&path)
        .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))
}

fn listing(registry: &Registry, field: Option<EnumField>) -> String {
    let fields = field.map_or_else(|| EnumField::ALL.to_vec(), |field| vec![field]);
    let mut out = String::new();
    for field in fields {
        let _ = writeln!(out, "{}", field.name().dim());
        for label in field.vocabulary() {
            if registry.is_retired(field, label) {
                let _ = writeln!(out, "  {} {}", label, "(retired)".warning());
            } else {
                let _ = writeln!(out, "  {label}");
            }
        }
    }
    out
}
