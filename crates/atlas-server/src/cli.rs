use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "mushroomatlas")]
#[command(about = "Community atlas of mushrooms, recipes and findings")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Dump every table to a timestamped JSON file
    Backup {
        /// Output directory (defaults to ATLAS_BACKUP_DIR)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Allow a user to add mushrooms, families and habitats
    Grant {
        username: String,
        /// Take the permission away instead
        #[arg(long)]
        revoke: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::parse_from(["mushroomatlas"]);
        assert_eq!(cli.command, None);
    }

    #[test]
    fn parses_backup_and_grant() {
        let cli = Cli::parse_from(["mushroomatlas", "backup", "--dir", "/tmp/atlas"]);
        assert_eq!(cli.command, Some(Commands::Backup { dir: Some("/tmp/atlas".into()) }));

        let cli = Cli::parse_from(["mushroomatlas", "grant", "houbar", "--revoke"]);
        assert_eq!(
            cli.command,
            Some(Commands::Grant { username: "houbar".into(), revoke: true })
        );
    }
}
