//! `dist completions <shell>`

use clap::CommandFactory;

use crate::cmd::Cli;

pub fn execute(shell: clap_complete::Shell) {
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "dist", &mut std::io::stdout());
}
