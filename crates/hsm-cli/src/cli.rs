use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "hsm", about = "Hardware State Manager operator CLI", version)]
pub struct Cli {
    /// Base URL of a running hsmd server. Every subcommand except `serve`
    /// talks to this over HTTP; there is no in-process fallback, matching
    /// the core's own split between the engine and its REST surface.
    #[arg(long, env = "HSM_URL", global = true, default_value = "http://127.0.0.1:27779")]
    pub remote: String,

    /// Bearer token sent as `Authorization: Bearer <token>`. Required iff
    /// the server was started with `--jwks-url` unset (static-token mode).
    #[arg(long, env = "HSM_TOKEN", global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the hsmd server in this process (axum REST surface + event
    /// ingest + polling scheduler + reservation sweep, all in one binary).
    Serve {
        #[command(flatten)]
        config: hsm_config::AppConfig,
    },

    /// Print a coarse inventory count.
    Status,

    /// Component inventory operations.
    #[command(subcommand)]
    Component(ComponentCommand),

    /// Reservation V2 operations.
    #[command(subcommand)]
    Reservation(ReservationCommand),

    /// Admin lock operations.
    #[command(subcommand)]
    Lock(LockCommand),

    /// Submit a discovery bundle read from a JSON file.
    Discover {
        /// Path to a JSON-encoded `DiscoveryBundle`.
        bundle_path: std::path::PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum ComponentCommand {
    /// Show one component by xname.
    Get { xname: String },

    /// List components, optionally filtered.
    List {
        #[arg(long)]
        component_type: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },

    /// Bulk `StateData` update.
    SetState {
        xnames: Vec<String>,
        #[arg(long)]
        state: String,
        #[arg(long)]
        flag: Option<String>,
        #[arg(long)]
        force: bool,
    },

    /// Bulk `Enabled` update.
    SetEnabled { xnames: Vec<String>, #[arg(long)] enabled: bool },
}

#[derive(Debug, Subcommand)]
pub enum ReservationCommand {
    /// Reserve one or more components.
    Reserve {
        xnames: Vec<String>,
        /// Lease duration in seconds; omit for a permanent (locked) reservation.
        #[arg(long)]
        duration_secs: Option<i64>,
        #[arg(long, value_enum, default_value = "rigid")]
        model: ProcessingModelArg,
    },

    /// Release a reservation by key.
    Release { xnames: Vec<String>, #[arg(long)] reservation_key: String },

    /// Admin override: release regardless of key.
    ForceRelease { xnames: Vec<String> },

    /// Snapshot reservation status for one or more components.
    Status { xnames: Vec<String> },
}

#[derive(Debug, Subcommand)]
pub enum LockCommand {
    Lock { xnames: Vec<String>, #[arg(long)] force: bool },
    Unlock { xnames: Vec<String>, #[arg(long)] force: bool },
    Disable { xnames: Vec<String>, #[arg(long)] force: bool },
    Repair { xnames: Vec<String>, #[arg(long)] force: bool },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProcessingModelArg {
    Rigid,
    Flexible,
}
