use std::path::Path;

use sententia_core::{
    Registry, RequirementService, Templates,
    domain::EnumField,
    storage::directory,
};
use serde_json::json;
use tracing::instrument;

use super::terminal::Colorize;
use crate::cli::open;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,

    /// Output format
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Issue {
    severity: Severity,
    message: String,
}

impl Issue {
    fn warning(message: String) -> Self {
        Self {
            severity: Severity::Warning,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            severity: Severity::Error,
            message,
        }
    }
}

/// Links to requirements that do not exist.
fn dangling_links(service: &RequirementService) -> Vec<Issue> {
    service
        .dangling_links()
        .into_iter()
        .map(|link| {
            Issue::warning(format!(
                "{} {} {}, which does not exist",
                link.source, link.kind, link.target
            ))
        })
        .collect()
}

/// Requirements still using values that have since been retired.
fn retired_values(service: &RequirementService, registry: &Registry) -> Vec<Issue> {
    let mut issues = Vec::new();
    for requirement in service.list() {
        let fields = requirement.fields();
        let mut used = vec![
            (EnumField::Type, fields.kind.as_str()),
            (EnumField::Status, fields.status.as_str()),
            (EnumField::Priority, fields.priority.as_str()),
        ];
        used.extend(fields.layer.map(|layer| (EnumField::Layer, layer.as_str())));
        used.extend(fields.source.map(|source| (EnumField::Source, source.as_str())));
        used.extend(
            fields
                .links
                .iter()
                .map(|link| (EnumField::LinkType, link.kind.as_str())),
        );

        for (field, value) in used {
            if registry.is_retired(field, value) {
                issues.push(Issue::warning(format!(
                    "{} uses retired {field} '{value}'",
                    requirement.id()
                )));
            }
        }
    }
    issues
}

/// Every template loads and compiles.
fn templates(root: &Path) -> Vec<Issue> {
    let templates = match Templates::load(&directory::templates_dir(root)) {
        Ok(templates) => templates,
        Err(e) => return vec![Issue::error(e.to_string())],
    };
    templates
        .names()
        .filter_map(|name| {
            let template = templates.get(name).ok()?;
            template
                .check()
                .err()
                .map(|e| Issue::error(format!("template '{name}': {e}")))
        })
        .collect()
}

fn check(root: &Path) -> anyhow::Result<Vec<Issue>> {
    let service = open(root)?;
    let mut issues = templates(root);
    issues.extend(dangling_links(&service));
    issues.extend(retired_values(&service, service.registry()));
    Ok(issues)
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let issues = check(root)?;
        let errors = issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error || self.strict)
            .count();

        match self.output {
            OutputFormat::Table => {
                for issue in &issues {
                    match issue.severity {
                        Severity::Error => println!("{} {}", "error:".error(), issue.message),
                        Severity::Warning => {
                            println!("{} {}", "warning:".warning(), issue.message);
                        }
                    }
                }
                if issues.is_empty() {
                    println!("{}", "✅ No problems found".success());
                }
            }
            OutputFormat::Json => {
                let report: Vec<_> = issues
                    .iter()
                    .map(|issue| {
                        json!({
                            "severity": match issue.severity {
                                Severity::Error => "error",
                                Severity::Warning => "warning",
                            },
                            "message": issue.message,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }

        if errors > 0 {
            anyhow::bail!("validation failed with {errors} error(s)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sententia_core::{Candidate, Config};
    use tempfile::tempdir;

    use super::*;
    use crate::cli::create::parse_link;

    #[test]
    fn clean_projects_pass() {
        let tmp = tempdir().unwrap();
        let service = RequirementService::open(tmp.path(), Config::default()).unwrap();
        service
            .create(&Candidate::new("Login", "Functional", "Draft", "High"))
            .unwrap();
        assert!(check(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn dangling_links_are_warnings() {
        let tmp = tempdir().unwrap();
        let service = RequirementService::open(tmp.path(), Config::default()).unwrap();
        let mut login = Candidate::new("Login", "Functional", "Draft", "High");
        login.links.push(parse_link("Satisfies:BUS-009").unwrap());
        service.create(&login).unwrap();

        let issues = check(tmp.path()).unwrap();
        assert_eq!(
            issues,
            [Issue::warning(
                "R-001 Satisfies BUS-009, which does not exist".to_string()
            )]
        );

        let lenient = Command {
            strict: false,
            output: OutputFormat::Table,
        };
        assert!(lenient.run(tmp.path()).is_ok());
        let strict = Command {
            strict: true,
            output: OutputFormat::Table,
        };
        assert!(strict.run(tmp.path()).is_err());
    }

    #[test]
    fn retired_values_in_use_are_reported() {
        let service = RequirementService::in_memory(Config::default());
        service
            .create(&Candidate::new("Login", "Functional", "Proposed", "High"))
            .unwrap();
        let mut registry = Registry::new();
        registry.retire(EnumField::Status, "Proposed").unwrap();

        let issues = retired_values(&service, &registry);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("retired status 'Proposed'"));
    }

    #[test]
    fn broken_templates_are_errors() {
        let tmp = tempdir().unwrap();
        let dir = directory::templates_dir(tmp.path());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("broken.toml"), "header = \"{{ title }}\"\nitem = \"x\"\n").unwrap();

        let issues = check(tmp.path()).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues[0].message.contains("broken"));
    }
}
