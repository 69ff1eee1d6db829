//! Command-Line Interface

use crate::feedback::Verdict;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Intent Sentinel - Behavioral intent scoring and evidence capture
#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the tick loop over a recorded observation log
    Replay {
        /// JSON Lines file with one tick record per line
        #[arg(short, long)]
        input: PathBuf,

        /// Synthetic frame width
        #[arg(long, default_value = "160")]
        width: u32,

        /// Synthetic frame height
        #[arg(long, default_value = "120")]
        height: u32,

        /// Pace ticks at the configured frame rate instead of running flat out
        #[arg(long)]
        realtime: bool,
    },

    /// List recorded events
    Events {
        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },

    /// Analyze operator feedback for a recorded event
    Feedback {
        /// Event (clip) ID
        event_id: String,

        /// Operator verdict
        #[arg(value_enum)]
        verdict: VerdictArg,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Get a specific configuration value
    Get {
        /// Configuration key (e.g., "fusion.th_calm", "capture.clip_duration_s")
        key: String,
    },

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Verdict as accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerdictArg {
    Accurate,
    Inaccurate,
}

impl From<VerdictArg> for Verdict {
    fn from(arg: VerdictArg) -> Self {
        match arg {
            VerdictArg::Accurate => Verdict::Accurate,
            VerdictArg::Inaccurate => Verdict::Inaccurate,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_replay_with_defaults() {
        let cli = Cli::try_parse_from(["sentinel", "replay", "--input", "ticks.jsonl"]).unwrap();

        match cli.command {
            Commands::Replay { input, width, height, realtime } => {
                assert_eq!(input, PathBuf::from("ticks.jsonl"));
                assert_eq!(width, 160);
                assert_eq!(height, 120);
                assert!(!realtime);
            }
            _ => panic!("Expected Replay command"),
        }
    }

    #[test]
    fn test_cli_parse_replay_with_all_options() {
        let args = vec![
            "sentinel",
            "replay",
            "-i", "/data/session.jsonl",
            "--width", "320",
            "--height", "240",
            "--realtime",
        ];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Replay { input, width, height, realtime } => {
                assert_eq!(input, PathBuf::from("/data/session.jsonl"));
                assert_eq!(width, 320);
                assert_eq!(height, 240);
                assert!(realtime);
            }
            _ => panic!("Expected Replay command"),
        }
    }

    #[test]
    fn test_cli_replay_requires_input() {
        assert!(Cli::try_parse_from(["sentinel", "replay"]).is_err());
    }

    #[test]
    fn test_cli_parse_events_command() {
        let cli = Cli::try_parse_from(["sentinel", "events", "--detailed"]).unwrap();
        match cli.command {
            Commands::Events { detailed } => assert!(detailed),
            _ => panic!("Expected Events command"),
        }
    }

    #[test]
    fn test_cli_parse_feedback_command() {
        let cli = Cli::try_parse_from(["sentinel", "feedback", "abc-123", "inaccurate"]).unwrap();
        match cli.command {
            Commands::Feedback { event_id, verdict } => {
                assert_eq!(event_id, "abc-123");
                assert_eq!(verdict, VerdictArg::Inaccurate);
                assert_eq!(Verdict::from(verdict), Verdict::Inaccurate);
            }
            _ => panic!("Expected Feedback command"),
        }
    }

    #[test]
    fn test_cli_feedback_rejects_unknown_verdict() {
        assert!(Cli::try_parse_from(["sentinel", "feedback", "abc", "maybe"]).is_err());
    }

    #[test]
    fn test_cli_parse_init_command_defaults() {
        let cli = Cli::try_parse_from(["sentinel", "init"]).unwrap();
        match cli.command {
            Commands::Init { force } => assert!(!force),
            _ => panic!("Expected Init command"),
        }
    }

    #[test]
    fn test_cli_parse_config_get() {
        let cli = Cli::try_parse_from(["sentinel", "config", "get", "fusion.th_calm"]).unwrap();
        match cli.command {
            Commands::Config { action: ConfigAction::Get { key } } => {
                assert_eq!(key, "fusion.th_calm");
            }
            _ => panic!("Expected Config Get command"),
        }
    }

    #[test]
    fn test_cli_parse_config_reset_force() {
        let cli = Cli::try_parse_from(["sentinel", "config", "reset", "-f"]).unwrap();
        match cli.command {
            Commands::Config { action: ConfigAction::Reset { force } } => assert!(force),
            _ => panic!("Expected Config Reset command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from(["sentinel", "-v", "-c", "/custom/config.toml", "events"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["sentinel", "events", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_missing_subcommand_fails() {
        assert!(Cli::try_parse_from(["sentinel"]).is_err());
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
