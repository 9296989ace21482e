//! Shell completions for `sen`.
//!
//! The generated script goes to stdout; save it wherever your shell loads
//! completions from.

use std::io;

use clap::CommandFactory;
use clap_complete::Shell;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

impl Command {
    pub fn run(self) {
        let mut cmd = crate::cli::Cli::command();
        clap_complete::generate(self.shell, &mut cmd, "sen", &mut io::stdout());
    }
}
