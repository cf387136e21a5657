//! latdrift command line interface: capture host snapshots and diff them.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "latdrift")]
#[command(about = "Snapshot and diff the latency-relevant configuration of Linux hosts")]
#[command(version = latdrift_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a snapshot of this host into a timestamped directory
    Snapshot {
        /// Base directory the snapshot directory is created inside
        #[arg(long, default_value = ".")]
        out: String,
    },

    /// Diff two snapshot documents and classify every change
    Diff {
        /// Path to the old snapshot.json
        old: String,

        /// Path to the new snapshot.json
        new: String,

        /// Write a Markdown report to this file
        #[arg(long)]
        md: Option<String>,

        /// Write the classified diff as JSON to this file
        #[arg(long)]
        json: Option<String>,

        /// Drop categories with no changes from the outputs
        #[arg(long)]
        only_changed: bool,

        /// Exit with status 2 when any CRITICAL drift is found
        #[arg(long)]
        exit_on_critical: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Snapshot { out } => commands::snapshot::run(&out),
        Commands::Diff { old, new, md, json, only_changed, exit_on_critical } => {
            commands::diff::run(&old, &new, md.as_deref(), json.as_deref(), only_changed, exit_on_critical)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn diff_flags_parse() {
        let cli = Cli::parse_from([
            "latdrift",
            "diff",
            "a.json",
            "b.json",
            "--only-changed",
            "--exit-on-critical",
            "--md",
            "report.md",
        ]);
        match cli.command {
            Commands::Diff { old, new, md, json, only_changed, exit_on_critical } => {
                assert_eq!(old, "a.json");
                assert_eq!(new, "b.json");
                assert_eq!(md.as_deref(), Some("report.md"));
                assert!(json.is_none());
                assert!(only_changed);
                assert!(exit_on_critical);
            }
            _ => panic!("expected diff subcommand"),
        }
    }

    #[test]
    fn snapshot_out_defaults_to_cwd() {
        let cli = Cli::parse_from(["latdrift", "snapshot"]);
        match cli.command {
            Commands::Snapshot { out } => assert_eq!(out, "."),
            _ => panic!("expected snapshot subcommand"),
        }
    }
}
