//! CLI argument parsing module
//!
//! Handles the command-line interface using clap:
//! - The daemon entry point
//! - Management of tracked states, compliance features, logs and foreign resources
//! - On-demand validation and configuration checks
//! - Output format selection (human/JSON)

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

#[derive(Debug, Parser)]
#[command(name = "stateguard")]
#[command(about = "Keep infrastructure state files policy-compliant and find resources outside them")]
#[command(long_about = r#"
stateguard watches remote infrastructure state files, re-runs compliance checks
whenever one changes, keeps an audit log of every check, and reports cloud
resources that no tracked state mentions.

Examples:
  # Track a state file
  stateguard state add --bucket states --path network/prod.tfstate --tag prod

  # Register a compliance feature for prod states
  stateguard feature add encryption --file encryption.feature --tag prod

  # Validate a plan once
  stateguard validate plan.json --tag prod

  # Run the reconciliation daemon
  stateguard daemon run
"#)]
#[command(version = env!("STATEGUARD_VERSION"))]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the reconciliation daemon
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },

    /// Manage tracked states
    State {
        #[command(subcommand)]
        action: StateAction,
    },

    /// Manage compliance features
    Feature {
        #[command(subcommand)]
        action: FeatureAction,
    },

    /// Inspect validation logs
    Log {
        #[command(subcommand)]
        action: LogAction,
    },

    /// Inspect resources found outside every tracked state
    Foreign {
        #[command(subcommand)]
        action: ForeignAction,
    },

    /// Check a state or plan file once and record the result
    Validate(ValidateArgs),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum DaemonAction {
    /// Run in the foreground until interrupted
    Run,
}

#[derive(Debug, Subcommand)]
pub enum StateAction {
    /// Start tracking a state file
    Add(StateAddArgs),
    /// List tracked states
    List,
    /// Show one tracked state
    Show { id: String },
    /// Change a tracked state's location, account or tags
    Edit(StateEditArgs),
    /// Stop tracking a state
    Remove { id: String },
    /// Recheck a state on the next daemon tick even if it did not change
    Force { id: String },
}

#[derive(Debug, Args)]
pub struct StateAddArgs {
    /// Bucket holding the state file
    #[arg(long)]
    pub bucket: String,

    /// Object key of the state file inside the bucket
    #[arg(long)]
    pub path: String,

    /// Account label
    #[arg(long, default_value = "")]
    pub account: String,

    /// Tag selecting compliance features (repeatable)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

#[derive(Debug, Args)]
pub struct StateEditArgs {
    pub id: String,

    #[arg(long)]
    pub bucket: Option<String>,

    #[arg(long)]
    pub path: Option<String>,

    #[arg(long)]
    pub account: Option<String>,

    /// Replace the tag list (repeatable)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Remove all tags
    #[arg(long, conflicts_with = "tags")]
    pub clear_tags: bool,
}

#[derive(Debug, Subcommand)]
pub enum FeatureAction {
    /// Add a compliance feature from a file
    Add(FeatureAddArgs),
    /// List compliance features
    List,
    /// Show a feature's source
    Show { name: String },
    /// Delete a feature
    Remove { name: String },
    /// Include a feature in checks again
    Enable { name: String },
    /// Exclude a feature from checks without deleting it
    Disable { name: String },
}

#[derive(Debug, Args)]
pub struct FeatureAddArgs {
    /// Feature name; letters, digits, '_', '-' and '.' (no leading '.')
    pub name: String,

    /// File holding the feature source
    #[arg(short, long, value_name = "PATH")]
    pub file: PathBuf,

    /// Tag or glob pattern selecting the states this feature applies to (repeatable)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Overwrite an existing feature with the same name
    #[arg(long)]
    pub replace: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogKindFilter {
    StateCheck,
    ManualValidation,
}

#[derive(Debug, Subcommand)]
pub enum LogAction {
    /// List log entries, newest first
    List {
        /// Only entries of this kind
        #[arg(long)]
        kind: Option<LogKindFilter>,

        /// Maximum number of entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show the differences and results of one entry
    Show { id: String },
    /// Delete a log entry
    Remove { id: String },
}

#[derive(Debug, Subcommand)]
pub enum ForeignAction {
    /// List foreign resources
    List {
        /// Hide resources marked as exceptions
        #[arg(long)]
        hide_exceptions: bool,
    },
    /// Show one foreign resource
    Show { id: String },
    /// Mark a foreign resource as a known exception
    Except {
        id: String,
        /// Clear the exception mark instead
        #[arg(long)]
        unset: bool,
    },
    /// Delete a foreign resource record
    Remove { id: String },
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// State or plan file, binary or JSON
    pub file: PathBuf,

    /// Only run features selected by these tags (default: every enabled feature)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration and print the effective settings
    Check,
    /// Print the default configuration file path
    Path,
}
