use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::ArgAction;
use sententia_core::{Config, RequirementId, RequirementService, storage::directory};

mod complete;
mod create;
mod delete;
mod demo;
mod history;
mod init;
mod list;
mod registry;
mod render;
mod show;
mod terminal;
mod trace;
mod update;
mod validate;

/// Parse a requirement id, accepting a lowercase prefix.
///
/// `r-001` and `R-001` name the same requirement.
fn parse_id(s: &str) -> Result<RequirementId, String> {
    s.trim()
        .to_uppercase()
        .parse()
        .map_err(|e| format!("{e}"))
}

/// Read the project configuration, falling back to defaults when the project
/// has not been initialised.
fn load_config(root: &Path) -> anyhow::Result<Config> {
    let path = directory::config_path(root);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    Config::load(&path).map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))
}

/// Open the file-backed service rooted at `root`.
fn open(root: &Path) -> anyhow::Result<RequirementService> {
    let config = load_config(root)?;
    RequirementService::open(root, config)
        .with_context(|| format!("failed to load requirements from {}", root.display()))
}

/// Ask for confirmation before a destructive action. `--yes` skips the
/// prompt.
fn confirm(prompt: &str, yes: bool) -> anyhow::Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the requirements project
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command.unwrap_or_default().run(&self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Initialise a new requirements project
    Init(init::Command),

    /// Create a new requirement
    Create(create::Command),

    /// Show a single requirement
    Show(show::Command),

    /// List requirements (default)
    List(list::Command),

    /// Change some fields of a requirement
    Update(update::Command),

    /// Delete a requirement
    Delete(delete::Command),

    /// Show the superseded revisions of a requirement
    History(history::Command),

    /// Render a document template and convert it to a deliverable format
    #[command(alias = "export")]
    Render(render::Command),

    /// Export the traceability matrix
    Trace(trace::Command),

    /// Inspect and administer the enum registry
    ///
    /// Retired values are rejected on create but kept by existing
    /// requirements.
    Registry(registry::Command),

    /// Replace every requirement with a bundled demo dataset
    Demo(demo::Command),

    /// Check the project for problems
    Validate(validate::Command),

    /// Generate shell completion scripts
    Completions(complete::Command),
}

impl Default for Command {
    fn default() -> Self {
        Self::List(list::Command::default())
    }
}

impl Command {
    fn run(self, root: &Path) -> anyhow::Result<()> {
        match self {
            Self::Init(command) => command.run(root),
            Self::Create(command) => command.run(root),
            Self::Show(command) => command.run(root),
            Self::List(command) => command.run(root),
            Self::Update(command) => command.run(root),
            Self::Delete(command) => command.run(root),
            Self::History(command) => command.run(root),
            Self::Render(command) => command.run(root),
            Self::Trace(command) => command.run(root),
            Self::Registry(command) => command.run(root),
            Self::Demo(command) => command.run(root),
            Self::Validate(command) => command.run(root),
            Self::Completions(command) => {
                command.run();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use test_case::test_case;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test_case("R-001", "R-001")]
    #[test_case("r-001", "R-001"; "lowercase prefix")]
    #[test_case(" sys-12 ", "SYS-12"; "padded")]
    fn ids_parse(raw: &str, expected: &str) {
        assert_eq!(parse_id(raw).unwrap().to_string(), expected);
    }

    #[test_case("R001")]
    #[test_case("R-abc")]
    #[test_case("R-0")]
    fn bad_ids_are_rejected(raw: &str) {
        assert!(parse_id(raw).is_err());
    }

    #[test]
    fn no_subcommand_lists() {
        let cli = Cli::parse_from(["sen", "--root", "somewhere"]);
        assert!(cli.command.is_none());
        assert!(matches!(Command::default(), Command::List(_)));
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(load_config(tmp.path()).unwrap(), Config::default());
    }
}
