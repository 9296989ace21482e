use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use sententia_core::{
    Artifact, Format, RenderContext, Templates, convert, render, storage::directory,
};
use tracing::instrument;

use super::terminal::Colorize;
use crate::cli::open;

/// Write an artifact to `output`, to stdout if it is text, or otherwise to a
/// file named after `stem` in the working directory.
pub(super) fn emit(artifact: &Artifact, output: Option<PathBuf>, stem: &str) -> anyhow::Result<()> {
    let path = match output {
        Some(path) => path,
        None if artifact.format.is_text() => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&artifact.bytes)?;
            stdout.flush()?;
            return Ok(());
        }
        None => PathBuf::from(artifact.file_name(stem)),
    };

    fs::write(&path, &artifact.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    eprintln!(
        "{}",
        format!("Wrote {} ({} bytes)", path.display(), artifact.bytes.len()).success()
    );
    Ok(())
}

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Template to render
    #[arg(default_value = "register")]
    template: String,

    /// Output format: markdown, html, docx, pdf, xlsx or csv
    #[arg(long, short, default_value = "markdown")]
    format: Format,

    /// Where to write the output
    ///
    /// Text formats go to stdout by default, binary formats to
    /// `<template>.<extension>`.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Project name for the document header, overriding the configured one
    #[arg(long)]
    project: Option<String>,

    /// List the available templates and exit
    #[arg(long, conflicts_with_all = ["format", "output", "project"])]
    list: bool,
}

impl Command {
    fn artifact(&self, root: &Path, templates: &Templates) -> anyhow::Result<Artifact> {
        let service = open(root)?;
        let template = templates.get(&self.template)?;

        let project = self
            .project
            .clone()
            .or_else(|| service.config().project.clone())
            .unwrap_or_default();
        let markdown = render(&service.list(), template, &RenderContext::new(project))?;
        Ok(convert(&markdown, self.format)?)
    }

    #[instrument(skip(self), fields(template = %self.template, format = %self.format))]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let templates = Templates::load(&directory::templates_dir(root))?;

        if self.list {
            for name in templates.names() {
                println!("{name}");
            }
            return Ok(());
        }

        let artifact = self.artifact(root, &templates)?;
        emit(&artifact, self.output, &self.template)
    }
}
