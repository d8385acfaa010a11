//! Command-line interface.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fileprov_engine::ProvisionRequest;
use fileprov_protocol::SourceType;

use crate::config::parse_parameters;

#[derive(Debug, Parser)]
#[command(name = "fileprov", version, about = "Provision a single file from a URL or an upload")]
pub struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Provision the file and serve its status until done
    Start(StartArgs),
    /// Talk to a running provisioner
    File {
        #[command(subcommand)]
        action: FileAction,
    },
}

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Address to serve the status API on [default: 0.0.0.0:8001]
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Destination file name inside the work directory
    #[arg(long)]
    pub file_name: String,

    /// Where the content comes from: url or upload
    #[arg(long)]
    pub source_type: SourceType,

    /// Source parameter as KEY=VALUE, repeatable (e.g. url=http://host/file)
    #[arg(long = "parameters", value_name = "KEY=VALUE")]
    pub parameters: Vec<String>,

    /// Disk root holding the identity file [default: /data/]
    #[arg(long)]
    pub disk_path: Option<PathBuf>,

    /// Abort a pull after this many seconds without data [default: 60]
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,

    /// Keep serving this many seconds after success [default: 30]
    #[arg(long)]
    pub linger_secs: Option<u64>,

    /// TOML file with server and engine settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl StartArgs {
    pub fn provision_request(&self) -> anyhow::Result<ProvisionRequest> {
        Ok(ProvisionRequest {
            file_name: self.file_name.clone(),
            source_type: self.source_type,
            parameters: parse_parameters(&self.parameters)?,
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum FileAction {
    /// Print the status record as JSON
    Get {
        #[arg(long, default_value = DEFAULT_REMOTE)]
        url: String,
    },
    /// Ask the provisioner to shut down
    Close {
        #[arg(long, default_value = DEFAULT_REMOTE)]
        url: String,
    },
    /// Upload a local file
    Upload {
        #[arg(long, default_value = DEFAULT_REMOTE)]
        url: String,
        #[arg(long)]
        path: PathBuf,
    },
}

const DEFAULT_REMOTE: &str = "localhost:8001";
