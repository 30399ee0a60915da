//! Command definitions for the pomosync CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::timer::Role;
use crate::types::{ConfigureParams, DurationConfig, DurationLimits, SessionKind};

// ============================================================================
// CLI Structure
// ============================================================================

/// pomosync - cycle timer with a mirrored companion instance
#[derive(Parser, Debug)]
#[command(
    name = "pomosync",
    version,
    about = "集中と休憩のサイクルを同期するタイマーCLI",
    long_about = "4回の集中セッションと休憩を1サイクルとして管理するタイマー。\n\
                  プライマリのDaemonが状態をミラーのDaemonへ同期します。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Command socket of the daemon to talk to
    #[arg(short, long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start or resume the current session
    Start,

    /// Pause the running session
    Pause,

    /// Reset the current session to its full duration
    Reset,

    /// Reset the cycle back to the first focus session
    ResetCycle,

    /// Skip to the next session without counting the current one
    Skip {
        /// Start the next session right away
        #[arg(long)]
        start: bool,
    },

    /// Switch to a specific session
    Select {
        /// Session to switch to
        #[arg(value_enum)]
        session: SessionArg,
    },

    /// Change session durations
    Configure(ConfigureArgs),

    /// Recompute the remaining time (e.g. after the machine woke up)
    Resync,

    /// Push the current state to the mirror now
    Sync,

    /// Show current timer status
    Status,

    /// Run a timer daemon
    Daemon(DaemonArgs),

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Value Enums
// ============================================================================

/// Session names accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionArg {
    Focus,
    ShortBreak,
    LongBreak,
}

impl From<SessionArg> for SessionKind {
    fn from(arg: SessionArg) -> Self {
        match arg {
            SessionArg::Focus => SessionKind::Focus,
            SessionArg::ShortBreak => SessionKind::ShortBreak,
            SessionArg::LongBreak => SessionKind::LongBreak,
        }
    }
}

/// Daemon roles accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleArg {
    #[default]
    Primary,
    Mirror,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Primary => Role::Primary,
            RoleArg::Mirror => Role::Mirror,
        }
    }
}

// ============================================================================
// Configure Command Arguments
// ============================================================================

/// Arguments for the configure command
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigureArgs {
    /// Focus duration in minutes (1-120)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=120))]
    pub focus: Option<u32>,

    /// Short break duration in minutes (1-60)
    #[arg(short = 'b', long, value_parser = clap::value_parser!(u32).range(1..=60))]
    pub short_break: Option<u32>,

    /// Long break duration in minutes (1-60)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=60))]
    pub long_break: Option<u32>,
}

impl ConfigureArgs {
    pub fn is_empty(&self) -> bool {
        self.focus.is_none() && self.short_break.is_none() && self.long_break.is_none()
    }
}

impl From<&ConfigureArgs> for ConfigureParams {
    fn from(args: &ConfigureArgs) -> Self {
        Self {
            focus_minutes: args.focus.map(i64::from),
            short_break_minutes: args.short_break.map(i64::from),
            long_break_minutes: args.long_break.map(i64::from),
        }
    }
}

// ============================================================================
// Daemon Command Arguments
// ============================================================================

/// Arguments for the daemon command
#[derive(Args, Debug, Clone)]
pub struct DaemonArgs {
    /// Instance role
    #[arg(short, long, value_enum, default_value_t = RoleArg::Primary)]
    pub role: RoleArg,

    /// Peer socket of the mirror to publish snapshots to (primary only)
    #[arg(long, value_name = "PATH", conflicts_with = "peer_socket")]
    pub mirror_socket: Option<PathBuf>,

    /// Socket to receive snapshots on (mirror only)
    #[arg(long, value_name = "PATH")]
    pub peer_socket: Option<PathBuf>,

    /// Focus duration in minutes (1-120)
    #[arg(
        short,
        long,
        default_value = "25",
        value_parser = clap::value_parser!(u32).range(1..=120)
    )]
    pub focus: u32,

    /// Short break duration in minutes (1-60)
    #[arg(
        short = 'b',
        long,
        default_value = "5",
        value_parser = clap::value_parser!(u32).range(1..=60)
    )]
    pub short_break: u32,

    /// Long break duration in minutes (1-60)
    #[arg(
        short,
        long,
        default_value = "15",
        value_parser = clap::value_parser!(u32).range(1..=60)
    )]
    pub long_break: u32,

    /// Start the next session automatically when one completes
    #[arg(short, long)]
    pub auto_advance: bool,

    /// Minimum seconds between snapshots of a merely ticking timer
    #[arg(
        long,
        default_value = "5",
        value_parser = clap::value_parser!(u64).range(1..=3600)
    )]
    pub throttle_secs: u64,
}

impl DaemonArgs {
    /// Durations given on the command line, clamped to the advisory limits.
    pub fn durations(&self) -> DurationConfig {
        DurationConfig {
            focus_minutes: self.focus,
            short_break_minutes: self.short_break,
            long_break_minutes: self.long_break,
        }
        .within(&DurationLimits::default())
    }
}

impl Default for DaemonArgs {
    fn default() -> Self {
        Self {
            role: RoleArg::Primary,
            mirror_socket: None,
            peer_socket: None,
            focus: 25,
            short_break: 5,
            long_break: 15,
            auto_advance: false,
            throttle_secs: 5,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // Cli Tests
    // ------------------------------------------------------------------------

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_no_args() {
            let cli = Cli::parse_from(["pomosync"]);
            assert!(cli.command.is_none());
            assert!(!cli.verbose);
            assert!(cli.socket.is_none());
        }

        #[test]
        fn test_parse_global_flags_after_subcommand() {
            let cli = Cli::parse_from(["pomosync", "status", "-v", "--socket", "/tmp/a.sock"]);
            assert!(cli.verbose);
            assert_eq!(cli.socket, Some(PathBuf::from("/tmp/a.sock")));
        }

        #[test]
        fn test_parse_simple_commands() {
            let cases = [
                ("start", "Start"),
                ("pause", "Pause"),
                ("reset", "Reset"),
                ("reset-cycle", "ResetCycle"),
                ("resync", "Resync"),
                ("sync", "Sync"),
                ("status", "Status"),
            ];
            for (arg, expected) in cases {
                let cli = Cli::parse_from(["pomosync", arg]);
                let command = cli.command.expect("command");
                assert!(
                    format!("{:?}", command).starts_with(expected),
                    "{} parsed as {:?}",
                    arg,
                    command
                );
            }
        }

        #[test]
        fn test_parse_skip() {
            let cli = Cli::parse_from(["pomosync", "skip"]);
            assert!(matches!(cli.command, Some(Commands::Skip { start: false })));

            let cli = Cli::parse_from(["pomosync", "skip", "--start"]);
            assert!(matches!(cli.command, Some(Commands::Skip { start: true })));
        }

        #[test]
        fn test_parse_select() {
            let cli = Cli::parse_from(["pomosync", "select", "short-break"]);
            match cli.command {
                Some(Commands::Select { session }) => {
                    assert_eq!(SessionKind::from(session), SessionKind::ShortBreak);
                }
                _ => panic!("Expected Select command"),
            }
        }

        #[test]
        fn test_parse_select_invalid() {
            let result = Cli::try_parse_from(["pomosync", "select", "nap"]);
            assert!(result.is_err());
        }

        #[test]
        fn test_parse_completions_zsh() {
            let cli = Cli::parse_from(["pomosync", "completions", "zsh"]);
            match cli.command {
                Some(Commands::Completions { shell }) => {
                    assert_eq!(shell, clap_complete::Shell::Zsh);
                }
                _ => panic!("Expected Completions command"),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Configure Command Tests
    // ------------------------------------------------------------------------

    mod configure_args_tests {
        use super::*;

        #[test]
        fn test_parse_configure_partial() {
            let cli = Cli::parse_from(["pomosync", "configure", "--focus", "50"]);
            match cli.command {
                Some(Commands::Configure(args)) => {
                    assert_eq!(args.focus, Some(50));
                    assert_eq!(args.short_break, None);
                    let params = ConfigureParams::from(&args);
                    assert_eq!(params.focus_minutes, Some(50));
                    assert!(params.short_break_minutes.is_none());
                }
                _ => panic!("Expected Configure command"),
            }
        }

        #[test]
        fn test_parse_configure_short_flags() {
            let cli = Cli::parse_from(["pomosync", "configure", "-f", "30", "-b", "10", "-l", "20"]);
            match cli.command {
                Some(Commands::Configure(args)) => {
                    assert_eq!(args.focus, Some(30));
                    assert_eq!(args.short_break, Some(10));
                    assert_eq!(args.long_break, Some(20));
                }
                _ => panic!("Expected Configure command"),
            }
        }

        #[test]
        fn test_parse_configure_empty() {
            let cli = Cli::parse_from(["pomosync", "configure"]);
            match cli.command {
                Some(Commands::Configure(args)) => assert!(args.is_empty()),
                _ => panic!("Expected Configure command"),
            }
        }

        #[test]
        fn test_parse_configure_out_of_range() {
            assert!(Cli::try_parse_from(["pomosync", "configure", "--focus", "0"]).is_err());
            assert!(Cli::try_parse_from(["pomosync", "configure", "--focus", "121"]).is_err());
            assert!(Cli::try_parse_from(["pomosync", "configure", "--short-break", "61"]).is_err());
            assert!(Cli::try_parse_from(["pomosync", "configure", "--long-break", "61"]).is_err());
        }
    }

    // ------------------------------------------------------------------------
    // Daemon Command Tests
    // ------------------------------------------------------------------------

    mod daemon_args_tests {
        use super::*;

        #[test]
        fn test_parse_daemon_defaults() {
            let cli = Cli::parse_from(["pomosync", "daemon"]);
            match cli.command {
                Some(Commands::Daemon(args)) => {
                    assert_eq!(args.role, RoleArg::Primary);
                    assert!(args.mirror_socket.is_none());
                    assert!(args.peer_socket.is_none());
                    assert_eq!(args.durations(), DurationConfig::default());
                    assert!(!args.auto_advance);
                    assert_eq!(args.throttle_secs, 5);
                }
                _ => panic!("Expected Daemon command"),
            }
        }

        #[test]
        fn test_parse_daemon_mirror() {
            let cli = Cli::parse_from([
                "pomosync",
                "daemon",
                "--role",
                "mirror",
                "--peer-socket",
                "/tmp/peer.sock",
                "--auto-advance",
            ]);
            match cli.command {
                Some(Commands::Daemon(args)) => {
                    assert_eq!(Role::from(args.role), Role::Mirror);
                    assert_eq!(args.peer_socket, Some(PathBuf::from("/tmp/peer.sock")));
                    assert!(args.auto_advance);
                }
                _ => panic!("Expected Daemon command"),
            }
        }

        #[test]
        fn test_parse_daemon_socket_conflict() {
            let result = Cli::try_parse_from([
                "pomosync",
                "daemon",
                "--mirror-socket",
                "/tmp/a.sock",
                "--peer-socket",
                "/tmp/b.sock",
            ]);
            assert!(result.is_err());
        }

        #[test]
        fn test_parse_daemon_throttle_range() {
            assert!(Cli::try_parse_from(["pomosync", "daemon", "--throttle-secs", "0"]).is_err());
        }
    }
}
