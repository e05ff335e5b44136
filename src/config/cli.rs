use crate::domain::model::MeasuredValue;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "netilion")]
#[command(about = "Command line access to the Netilion technical API")]
pub struct CliConfig {
    /// TOML file with a [netilion] table; NETILION_* environment variables otherwise
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// List all client applications visible to the user
    Applications,
    /// Show the client application this configuration acts as
    Me,
    Assets,
    Asset {
        id: u64,
    },
    FindAsset {
        serial_number: String,
    },
    /// Latest value per key of an asset
    Values {
        asset_id: u64,
    },
    PushValue {
        #[arg(long)]
        asset: u64,
        #[arg(long)]
        key: String,
        /// Unit code, e.g. degree_celsius
        #[arg(long)]
        unit: String,
        /// Sent as an integer unless it has a fractional part
        #[arg(long, allow_negative_numbers = true)]
        value: MeasuredValue,
        /// RFC 3339 timestamp, defaults to now
        #[arg(long)]
        timestamp: Option<String>,
    },
    History {
        asset_id: u64,
        key: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    Units {
        code: String,
    },
    Webhooks,
    CreateWebhook {
        url: String,
        #[arg(required = true)]
        event_types: Vec<String>,
    },
    DeleteWebhook {
        id: u64,
    },
}
