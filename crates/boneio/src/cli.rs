//! Command-line definitions.
//!
//! Kept free of crate-internal imports: `build.rs` includes this file
//! directly to render man pages.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// boneIO console: live state, outputs, covers and device files from the shell.
#[derive(Debug, Parser)]
#[command(
    name = "boneio",
    version,
    about = "Control boneIO home automation controllers from the command line",
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct GlobalOpts {
    /// Profile from the config file
    #[arg(short, long, env = "BONEIO_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Device URL, overrides the profile (e.g. http://boneio.local:8090)
    #[arg(short, long, env = "BONEIO_URL", global = true)]
    pub url: Option<String>,

    /// Output format
    #[arg(
        short,
        long,
        env = "BONEIO_OUTPUT",
        value_enum,
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use colors
    #[arg(long, value_enum, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress regular output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Answer yes to confirmation prompts
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long, env = "BONEIO_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "BONEIO_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Session token to use instead of the stored one
    #[arg(long, env = "BONEIO_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    JsonCompact,
    Yaml,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show device reachability, version and authentication requirement
    Status,

    /// Log in and keep the session token in the system keyring
    Login(LoginArgs),

    /// Forget the stored session token
    Logout,

    /// Stream live entity state
    Watch(WatchArgs),

    /// Relays and other switchable outputs
    Outputs(OutputsArgs),

    /// Roller shutters and venetian blinds
    Covers(CoversArgs),

    /// Device configuration files
    Files(FilesArgs),

    /// Device-side configuration checks
    Config(ConfigArgs),

    /// Show device logs
    Logs(LogsArgs),

    /// Restart the boneIO service
    Restart,

    /// Firmware updates
    Update(UpdateArgs),

    /// Manage local CLI profiles
    Profile(ProfileArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Session ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Login name (defaults to the profile's username)
    #[arg(long)]
    pub username: Option<String>,

    /// Also store the password in the system keyring
    #[arg(long)]
    pub save_password: bool,
}

// ── Live state ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntityKind {
    Output,
    Input,
    Sensor,
    Cover,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only show these entity kinds (repeatable or comma-separated)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub kind: Vec<EntityKind>,

    /// Print the tables once the initial burst settles, then exit
    #[arg(long)]
    pub snapshot: bool,

    /// Quiet period that ends the initial burst in snapshot mode
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    pub settle: Duration,
}

#[derive(Debug, Args)]
pub struct OutputsArgs {
    #[command(subcommand)]
    pub command: OutputsCommand,
}

#[derive(Debug, Subcommand)]
pub enum OutputsCommand {
    /// List outputs with their current state
    List,
    /// Toggle an output
    Toggle { id: String },
}

#[derive(Debug, Args)]
pub struct CoversArgs {
    #[command(subcommand)]
    pub command: CoversCommand,
}

#[derive(Debug, Subcommand)]
pub enum CoversCommand {
    /// List covers with position and tilt
    List,
    /// Open a cover
    Open { id: String },
    /// Close a cover
    Close { id: String },
    /// Stop a moving cover
    Stop { id: String },
    /// Reverse or start cover motion
    Toggle { id: String },
    /// Move to a position
    Position {
        id: String,
        /// Percent, 0 closed to 100 open
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        value: u8,
    },
    /// Set the slat tilt of a venetian blind
    Tilt {
        id: String,
        /// Percent, 0-100
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        value: u8,
    },
}

// ── Files ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct FilesArgs {
    #[command(subcommand)]
    pub command: FilesCommand,
}

#[derive(Debug, Subcommand)]
pub enum FilesCommand {
    /// List the configuration file tree
    List {
        /// Start below this directory
        #[arg(long)]
        path: Option<String>,
    },
    /// Print a file, or write it with --out
    Get {
        path: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Upload a local file to the device
    Put {
        path: String,
        #[arg(long)]
        from: PathBuf,
    },
}

// ── System ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Validate the device's configuration
    Check,

    /// Show the configuration as the device parsed it, includes resolved
    Show {
        /// Only this top-level section (e.g. mqtt, output, cover)
        #[arg(long)]
        section: Option<String>,
    },

    /// Replace one top-level section from a YAML or JSON file
    Put {
        /// Section name (e.g. mqtt, output, cover)
        section: String,
        /// File holding the section's new content
        #[arg(long)]
        from: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct LogsArgs {
    /// Only entries since this point (e.g. "1h", "2024-05-01 10:00")
    #[arg(long)]
    pub since: Option<String>,

    /// Maximum number of entries
    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    #[command(subcommand)]
    pub command: UpdateCommand,
}

#[derive(Debug, Subcommand)]
pub enum UpdateCommand {
    /// Ask the device whether newer firmware exists
    Check,

    /// Install the latest boneIO release and restart the service
    Apply,
}

// ── Profiles ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Interactive setup wizard
    Init,
    /// Print the current configuration
    Show,
    /// Set a key on the active profile
    Set { key: String, value: String },
    /// Make a profile the default
    Use { name: String },
    /// List profiles
    Profiles,
    /// Print the config file location
    Path,
    /// Store the profile password in the system keyring
    SetPassword,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
