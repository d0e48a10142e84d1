use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Operator console for the WireGuard gateway: allow-list and peer status
#[derive(Debug, Parser)]
#[command(name = "peer-console", version)]
pub struct Cli {
    /// YAML config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Gateway management API root, e.g. http://10.9.0.1:8000
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Derive online/offline locally with this freshness window
    #[arg(long, global = true)]
    pub online_threshold_secs: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the IP allow-list
    Allow {
        #[command(subcommand)]
        action: AllowCommand,
    },
    /// Inspect and manage peers
    Peers {
        #[command(subcommand)]
        action: PeerCommand,
    },
    /// Poll peer status and log reachability changes
    Watch {
        /// Read the template status endpoint
        #[arg(long)]
        blank: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum AllowCommand {
    List {
        /// Substring filter on the address
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        id: Option<i64>,
    },
    Add {
        #[arg(required = true)]
        ips: Vec<String>,
    },
    /// Upload a CSV file, one address in the first column of each row
    Import { file: PathBuf },
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum PeerCommand {
    List {
        /// Read the template status endpoint
        #[arg(long)]
        blank: bool,
    },
    /// Mark peers not-removable (cannot be undone here)
    Protect {
        #[arg(required = true)]
        names: Vec<String>,
    },
    Delete {
        #[arg(required = true)]
        pub_keys: Vec<String>,
        /// Confirm deletion of protected peers without prompting
        #[arg(long, short = 'y')]
        yes: bool,
    },
    Summary,
    /// Remove every offline peer that is not protected
    Sweep {
        #[arg(long, short = 'y')]
        yes: bool,
    },
}
