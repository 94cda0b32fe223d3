//! Command-line interfaces for `conftpl` and `confadm`.
//! Provides argument parsing and help text formatting using clap.

use crate::config::parse_mode;
use crate::constants::{DEFAULT_TIMEOUT_SECS, URL_ENV};
use crate::http::parse_scope_pair;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;

/// Command-line arguments for `conftpl`.
///
/// Exactly one mode is chosen: `--single KEY`, `--template FILE` or
/// `--config-dir DIR`.
#[derive(Parser, Debug)]
#[command(
    name = "conftpl",
    author,
    version,
    about = "conftpl: render configuration templates from the configuration service",
    long_about = None
)]
pub struct Args {
    /// Base URL of the configuration service
    #[arg(short = 'u', long, env = URL_ENV, value_name = "URL")]
    pub url: Option<String>,

    /// Read values from a snapshot file (JSON, YAML or TOML) instead of the service.
    /// Takes precedence over --url.
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Request scope entry sent as an x-cfg-NAME header; adds to CFG_* variables
    #[arg(long = "scope", value_name = "NAME=VALUE", value_parser = parse_scope_pair)]
    pub scope: Vec<(String, String)>,

    /// Connect and read timeout for the service, in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Print the string value of a single key
    #[arg(short = 's', long = "single", value_name = "KEY", conflicts_with_all = ["template", "config_dir"])]
    pub key: Option<String>,

    /// Render a single template file
    #[arg(short = 't', long, value_name = "FILE", conflicts_with = "config_dir")]
    pub template: Option<PathBuf>,

    /// Install the rendered template here instead of printing it
    #[arg(long, value_name = "PATH", requires = "template")]
    pub dest: Option<PathBuf>,

    /// Permission mode for the installed file (e.g. 0644)
    #[arg(long, value_name = "MODE", requires = "dest", value_parser = parse_mode)]
    pub mode: Option<u32>,

    /// Owner uid for the installed file (defaults to the effective uid)
    #[arg(long, requires = "dest")]
    pub uid: Option<u32>,

    /// Owner gid for the installed file (defaults to the effective gid)
    #[arg(long, requires = "dest")]
    pub gid: Option<u32>,

    /// Directory of job descriptors (batch mode)
    #[arg(short = 'c', long, value_name = "DIR", requires = "template_dir")]
    pub config_dir: Option<PathBuf>,

    /// Directory descriptor `src` paths are relative to
    #[arg(short = 'T', long, value_name = "DIR")]
    pub template_dir: Option<PathBuf>,

    /// Keep processing remaining jobs after a failure
    #[arg(short = 'k', long, requires = "config_dir")]
    pub keep_going: bool,

    /// Log level (off|error|warn|info|debug|trace)
    #[arg(short = 'l', long, default_value = "warn")]
    pub log_level: LevelFilter,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Check command run against the staged file, after `--`.
    /// Arguments equal to FILE are replaced by the staged file path.
    #[arg(last = true, value_name = "CHECK_CMD")]
    pub check: Vec<String>,
}

/// Command-line arguments for `confadm`.
#[derive(Parser, Debug)]
#[command(
    name = "confadm",
    author,
    version,
    about = "confadm: inspect and modify keys on the configuration service",
    long_about = None
)]
pub struct AdminArgs {
    /// Base URL of the configuration service
    #[arg(short = 's', long, env = URL_ENV, value_name = "URL")]
    pub url: String,

    /// Request scope entry sent as an x-cfg-NAME header; adds to CFG_* variables
    #[arg(long = "scope", value_name = "NAME=VALUE", value_parser = parse_scope_pair)]
    pub scope: Vec<(String, String)>,

    /// Connect and read timeout for the service, in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Log level (off|error|warn|info|debug|trace)
    #[arg(short = 'l', long, default_value = "error")]
    pub log_level: LevelFilter,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: AdminCommand,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum AdminCommand {
    /// Get a key as JSON
    Get { key: String },
    /// Get a key as text
    Gett { key: String },
    /// Get every key matching '*:<partial>' as text
    Geta { partial: String },
    /// Set a key from JSON on stdin, or a string key from VALUE
    Set { key: String, value: Option<String> },
    /// Delete a key
    Del { key: String },
    /// List keys matching a filter
    List { filter: Option<String> },
    /// List keys sharing the last ':'-separated segment of KEY
    Related { key: String },
    /// Get the type of a key
    Type { key: String },
    /// Get one field of a hash
    Hget { key: String, field: String },
    /// Set one field of a hash
    Hset { key: String, field: String, value: String },
    /// Get a field from every hash matching '*:<partial>'
    Hgeta { partial: String, field: String },
    /// List the fields of a hash
    Hlist { key: String },
    /// Get the list item at a position
    Lget { key: String, index: usize },
    /// Append to a list, creating it if needed
    Lpush { key: String, value: String },
    /// Write every key as JSON into a directory
    Dump { output: PathBuf },
}
