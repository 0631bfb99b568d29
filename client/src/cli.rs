//! Command line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "elchi-client", version, about = "On-host network-management agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Start the agent
    Start {
        /// Path to the YAML configuration file
        #[arg(long)]
        config: PathBuf,

        /// Override client.name from the configuration
        #[arg(long)]
        name: Option<String>,
    },
    /// Print version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start() {
        let cli = Cli::try_parse_from([
            "elchi-client",
            "start",
            "--config",
            "/etc/elchi/client.yaml",
            "--name",
            "edge-override",
        ])
        .unwrap();

        match cli.command {
            CliCommand::Start { config, name } => {
                assert_eq!(config, PathBuf::from("/etc/elchi/client.yaml"));
                assert_eq!(name.as_deref(), Some("edge-override"));
            }
            _ => panic!("expected start subcommand"),
        }
    }

    #[test]
    fn test_parse_version() {
        let cli = Cli::try_parse_from(["elchi-client", "version"]).unwrap();
        assert!(matches!(cli.command, CliCommand::Version));
    }

    #[test]
    fn test_start_requires_config() {
        assert!(Cli::try_parse_from(["elchi-client", "start"]).is_err());
    }
}
