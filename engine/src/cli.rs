//! CLI interface for the concierge
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Session used when none is given
pub const DEFAULT_SESSION: &str = "default";

/// Shopping Concierge
///
/// Interviews you about what you need, researches products on the live web
/// and recommends only products backed by retrieved evidence.
#[derive(Parser, Debug)]
#[command(name = "concierge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a shopping session
    Shop {
        /// What you are shopping for, e.g. "laptop"
        #[arg(required = true, num_args = 1..)]
        topic: Vec<String>,

        /// Session whose preferences are loaded and saved
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },

    /// Manage remembered preferences
    Preferences {
        #[command(subcommand)]
        action: PreferencesAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check credentials and provider availability
    Doctor,
}

/// Preference memory actions
#[derive(Subcommand, Debug)]
pub enum PreferencesAction {
    /// Show active preferences
    Show {
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },

    /// Delete all preferences of a session
    Forget {
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the configuration file path
    Path,
}

impl Command {
    /// Topic words joined into one request
    pub fn topic(words: &[String]) -> String {
        words.join(" ").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["concierge", "doctor"]);
        assert!(matches!(cli.command, Command::Doctor));
        assert!(!cli.json);
        assert!(cli.log.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["concierge", "--json", "--log", "debug", "doctor"]);
        assert!(cli.json);
        assert_eq!(cli.log, Some("debug".to_string()));
    }

    #[test]
    fn test_shop_command() {
        let cli = Cli::parse_from(["concierge", "shop", "robot", "vacuum", "--session", "alice"]);
        if let Command::Shop { topic, session } = cli.command {
            assert_eq!(Command::topic(&topic), "robot vacuum");
            assert_eq!(session, "alice");
        } else {
            panic!("Expected Shop command");
        }
    }

    #[test]
    fn test_shop_requires_topic() {
        assert!(Cli::try_parse_from(["concierge", "shop"]).is_err());
    }

    #[test]
    fn test_preferences_forget_default_session() {
        let cli = Cli::parse_from(["concierge", "preferences", "forget"]);
        if let Command::Preferences { action } = cli.command {
            if let PreferencesAction::Forget { session } = action {
                assert_eq!(session, DEFAULT_SESSION);
            } else {
                panic!("Expected PreferencesAction::Forget");
            }
        } else {
            panic!("Expected Preferences command");
        }
    }

    #[test]
    fn test_config_path() {
        let cli = Cli::parse_from(["concierge", "--config", "/tmp/c.toml", "config", "path"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Path
            }
        ));
    }
}
