//! Clap derive structures for the `pawtrack` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pawtrack -- live pet telemetry, location and geofencing from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "pawtrack",
    version,
    about = "Watch pet telemetry, location and geofences from the command line",
    long_about = "Reconciles polled REST data with the Socket.IO push stream of a\n\
        pet tracking backend into one current view per pet.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "PAWTRACK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// REST API root (overrides profile)
    #[arg(long, env = "PAWTRACK_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Push server root (overrides profile; defaults to the API root)
    #[arg(long, env = "PAWTRACK_PUSH_URL", global = true)]
    pub push_url: Option<String>,

    /// Bearer token
    #[arg(long, env = "PAWTRACK_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PAWTRACK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "PAWTRACK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "PAWTRACK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Live/polled precedence rule (overrides profile)
    #[arg(long, global = true)]
    pub merge: Option<MergeArg>,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON (one document per line in `watch`)
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MergeArg {
    /// Any pushed value shadows the polled one
    PushPrecedence,
    /// The newer timestamp wins
    Freshest,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Observe a pet live (poll + push) until Ctrl-C
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// One-shot polled view of a pet
    #[command(alias = "st")]
    Status(PetArg),

    /// Show the active device for a pet
    Resolve(PetArg),

    /// Evaluate a coordinate against the configured zones
    #[command(alias = "geo")]
    Geofence(GeofenceArgs),

    /// List and inspect pets
    Pets(PetsArgs),

    /// Recent telemetry readings for a pet
    History(HistoryArgs),

    /// Aggregate telemetry for a pet
    Stats(StatsArgs),

    /// Owner notifications
    #[command(alias = "notif")]
    Notifications(NotificationsArgs),

    /// Ask a pet's collar to report its location now
    Find(PetArg),

    /// Assign a collar to a pet
    Assign(AssignArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command Arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PetArg {
    /// Pet id
    pub pet: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Pet id
    pub pet: String,

    /// Poll only; do not open the push connection
    #[arg(long)]
    pub no_push: bool,
}

#[derive(Debug, Args)]
pub struct GeofenceArgs {
    /// Latitude in degrees
    #[arg(allow_negative_numbers = true)]
    pub latitude: f64,

    /// Longitude in degrees
    #[arg(allow_negative_numbers = true)]
    pub longitude: f64,
}

#[derive(Debug, Args)]
pub struct PetsArgs {
    #[command(subcommand)]
    pub command: PetsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PetsCommand {
    /// List all pets
    #[command(alias = "ls")]
    List,

    /// Show one pet
    Show(PetArg),
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Pet id
    pub pet: String,

    /// Max readings to return
    #[arg(long, short = 'l')]
    pub limit: Option<u32>,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Pet id
    pub pet: String,

    /// Trailing window in hours (profile default when omitted)
    #[arg(long)]
    pub hours: Option<u32>,
}

#[derive(Debug, Args)]
pub struct NotificationsArgs {
    /// Only print the unread count
    #[arg(long)]
    pub unread: bool,
}

#[derive(Debug, Args)]
pub struct AssignArgs {
    /// Pet id
    pub pet: String,

    /// Collar (device) id
    pub device: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create a profile (guided unless the global --api-url is given)
    Init(ConfigInitArgs),

    /// Display the current configuration with secrets masked
    Show,

    /// Store a profile's token in the system keyring
    SetToken {
        /// Token value (prompted for when omitted)
        token: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Profile name
    #[arg(long)]
    pub name: Option<String>,

    /// Environment variable that holds the token
    #[arg(long)]
    pub token_env: Option<String>,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
