use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(
    name = "notify",
    version,
    about = "Developer notifications: sounds, speech, toasts and chat messages per profile",
    after_help = "Trigger an action with `notify <profile> <action>` (or `notify <action>` to pick the profile from the current directory)."
)]
pub struct Cli {
    /// Config file (defaults to next to the binary, then the data directory).
    #[arg(short, long, global = true, env = "NOTIFY_CONFIG")]
    pub config: Option<PathBuf>,
    /// Debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one ad-hoc step through the default profile's credentials.
    Send(SendOpts),
    /// Serve the dashboard on 127.0.0.1.
    Dashboard(DashboardOpts),
    /// Show or maintain the event log.
    History(HistoryOpts),
    /// Manage the pre-rendered voice cache.
    Voice {
        #[command(subcommand)]
        action: VoiceAction,
    },
    /// `30m`, `1h`, `1h30m`, `off` or `status`.
    Silent { value: Option<String> },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List profiles and their actions.
    List,
    /// Dry-run every action of a profile.
    Test(TestOpts),
    /// Wait for a process to exit, then trigger an action.
    Watch(WatchOpts),
    /// Print the shell precmd hook for bash, zsh or fish.
    ShellHook { shell: String },
    /// Read an AI-assistant hook payload on stdin and trigger from it.
    ClaudeHook { profile: Option<String> },
    /// Called by the shell hook after each command.
    #[command(name = "_hook", hide = true)]
    Hook(HookOpts),
    /// `<profile> <action> [--volume N]`
    #[command(external_subcommand)]
    Trigger(Vec<String>),
}

#[derive(clap::Args)]
pub struct SendOpts {
    /// Step type (`say`, `toast`, `slack`, `telegram`, ...).
    pub step_type: String,
    pub message: String,
    #[arg(long)]
    pub volume: Option<u8>,
}

#[derive(clap::Args)]
pub struct DashboardOpts {
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(clap::Args)]
#[command(args_conflicts_with_subcommands = true)]
pub struct HistoryOpts {
    /// Number of recent entries to show.
    pub count: Option<usize>,
    #[command(subcommand)]
    pub action: Option<HistoryAction>,
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Per-day counts of executions and skips.
    Summary {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Drop entries older than N days.
    Clean { days: u32 },
    /// Write entries as a JSON array.
    Export {
        #[arg(long, default_value_t = 0)]
        days: u32,
    },
    /// Breakdown of executions for a day, week, month, year or all time.
    Watch {
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value = "day")]
        range: String,
    },
    /// Remove every entry of one profile.
    Remove { profile: String },
    /// Remove everything.
    Clear,
}

#[derive(Subcommand)]
pub enum VoiceAction {
    Stats,
    List,
    /// Render `text` with the configured engine and cache it.
    Generate {
        text: String,
        #[arg(long)]
        voice: Option<String>,
    },
    Remove { hash: String },
    Clear,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Validate,
    /// Print the config file in use.
    Path,
    /// Write an example config to the data directory.
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args)]
pub struct TestOpts {
    pub profile: Option<String>,
    /// Override the idle probe.
    #[arg(long)]
    pub afk: Option<bool>,
    #[arg(long, default_value = "direct")]
    pub mode: String,
    #[arg(long)]
    pub hour: Option<u32>,
}

#[derive(clap::Args)]
pub struct WatchOpts {
    #[arg(long)]
    pub pid: u32,
    #[arg(long)]
    pub profile: Option<String>,
    #[arg(long, default_value = "done")]
    pub action: String,
}

#[derive(clap::Args)]
pub struct HookOpts {
    #[arg(long)]
    pub command: String,
    #[arg(long)]
    pub seconds: u64,
    #[arg(long = "exit", allow_hyphen_values = true)]
    pub exit_code: i32,
}
