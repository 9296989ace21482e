use std::{fs, path::Path};

use anyhow::Context;
use sententia_core::{Config, domain::Prefix, storage::directory};
use tracing::instrument;

use crate::cli::terminal::Colorize;

/// A starter template, written so new projects have something to copy.
const STARTER_TEMPLATE: &str = r#"# A custom document template.
#
# Placeholders are written {{ field }} or {{ field | filter }}. Requirement
# fields may only appear in `item`.
document = "Approved Requirements"

header = '''
# {{ document }}

'''

item = '''
- **{{ id }}** {{ title }} ({{ priority | lower }})
'''

empty = '''
_Nothing approved yet._
'''

[select]
status = ["Approved"]
"#;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Project name shown in document headers
    #[arg(long)]
    project: Option<String>,

    /// Prefix for allocated ids
    #[arg(long, default_value = "R")]
    prefix: Prefix,

    /// Digits in allocated ids, padded with zeros
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=9))]
    digits: u8,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let meta = root.join(directory::META_DIR);
        if meta.exists() {
            anyhow::bail!(
                "Project already initialised (found existing {} directory)",
                directory::META_DIR
            );
        }

        let templates = directory::templates_dir(root);
        fs::create_dir_all(&templates)
            .with_context(|| format!("failed to create {}", templates.display()))?;

        let mut config = Config::default();
        config.project = self.project;
        config.set_id_prefix(self.prefix);
        config.set_digits(usize::from(self.digits));
        config
            .save(&directory::config_path(root))
            .map_err(|e| anyhow::anyhow!("Failed to create config.toml: {e}"))?;

        let starter = templates.join("approved.toml");
        fs::write(&starter, STARTER_TEMPLATE)
            .with_context(|| format!("failed to write {}", starter.display()))?;

        println!(
            "{}",
            format!("Initialised requirements project in {}", root.display()).success()
        );
        println!("  Created: {}/config.toml", directory::META_DIR);
        println!("  Created: {}/templates/approved.toml", directory::META_DIR);
        println!();
        println!("{}", "Next steps:".dim());
        println!("  sen create --title \"Your first requirement\"");
        println!("  sen render register");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sententia_core::{Template, Templates};
    use tempfile::tempdir;

    use super::*;
    use crate::cli::load_config;

    fn init(root: &Path, project: Option<&str>) -> anyhow::Result<()> {
        Command {
            project: project.map(str::to_string),
            prefix: "REQ".parse().unwrap(),
            digits: 4,
        }
        .run(root)
    }

    #[test]
    fn init_writes_config_and_templates() {
        let tmp = tempdir().unwrap();
        init(tmp.path(), Some("Shop")).unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.project.as_deref(), Some("Shop"));
        assert_eq!(config.id_prefix().as_str(), "REQ");
        assert_eq!(config.digits(), 4);

        let templates = Templates::load(&directory::templates_dir(tmp.path())).unwrap();
        assert!(templates.get("approved").is_ok());
        assert!(templates.get("register").is_ok());
    }

    #[test]
    fn starter_template_is_valid() {
        let template = Template::from_toml("approved", STARTER_TEMPLATE).unwrap();
        template.check().unwrap();
    }

    #[test]
    fn init_refuses_to_run_twice() {
        let tmp = tempdir().unwrap();
        init(tmp.path(), None).unwrap();
        assert!(init(tmp.path(), None).is_err());
    }
}
