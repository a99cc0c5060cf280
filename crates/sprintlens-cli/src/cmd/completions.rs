//! `slens completions`: shell completion scripts.

use std::io::Write;

use clap::Args;
use clap_complete::{Shell, generate};

/// Arguments for `slens completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script generation.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `shell` to stdout.
pub fn run_completions(args: &CompletionsArgs, command: &mut clap::Command) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_completions(args.shell, command, &mut out);
    out.flush()?;
    Ok(())
}

fn write_completions(shell: Shell, command: &mut clap::Command, out: &mut dyn Write) {
    generate(shell, command, "slens", out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_script_names_the_binary_and_commands() {
        let mut command = clap::Command::new("slens")
            .subcommand(clap::Command::new("burndown"))
            .subcommand(clap::Command::new("lead-time"));
        let mut buf = Vec::new();
        write_completions(Shell::Bash, &mut command, &mut buf);

        let script = String::from_utf8(buf).unwrap();
        assert!(script.contains("slens"));
        assert!(script.contains("burndown"));
        assert!(script.contains("lead-time"));
    }
}
