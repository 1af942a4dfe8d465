// CLI module for restgate
// Author: kelexine (https://github.com/kelexine)

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

/// restgate - Declarative HTTP gateway for REST services
#[derive(Parser, Debug)]
#[command(name = "restgate", version, about, long_about = None)]
pub struct Args {
    /// Configuration file (defaults to ~/.restgate/config.toml)
    #[arg(long, global = true, env = "RESTGATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile every descriptor and print the resulting routes
    Check {
        /// Descriptor file (TOML)
        #[arg(long)]
        descriptors: PathBuf,
    },

    /// Invoke one operation and print its result as JSON
    Call {
        /// Descriptor file (TOML)
        #[arg(long)]
        descriptors: PathBuf,

        /// Service alias
        #[arg(long)]
        service: String,

        /// Operation id
        #[arg(long)]
        operation: String,

        /// Positional argument, in declaration order. Parsed as JSON, or
        /// taken as a plain string when it is not valid JSON.
        #[arg(long = "arg", value_parser = parse_arg)]
        args: Vec<Value>,

        /// Give up (cancel) after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print Prometheus metrics after the call
        #[arg(long)]
        metrics: bool,
    },
}

/// `42` and `{"a":1}` are JSON; `octo` is the string `"octo"`.
pub fn parse_arg(raw: &str) -> Result<Value, String> {
    Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
}
