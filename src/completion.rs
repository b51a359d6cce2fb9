//! # Shell Completion Module
//!
//! Generates completion scripts for the supported shells through clap's
//! completion system.
//!
//! ## Usage
//!
//! ```bash
//! # Generate bash completions
//! mediaspinner completion bash > ~/.local/share/bash-completion/completions/mediaspinner
//!
//! # Generate zsh completions
//! mediaspinner completion zsh > ~/.config/zsh/completions/_mediaspinner
//! ```

use crate::cli::Shell;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::Write;

/// Write the completion script for `cmd` to `out`
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command, out: &mut dyn Write) {
    let name = cmd.get_name().to_string();
    generate(gen, cmd, name, out);
}

pub fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}
