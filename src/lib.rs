//! confclient is a client for a key/value configuration service.
//! It renders templates from configuration values and publishes the result
//! atomically, optionally gated by an external check command.

/// Admin operations: read, write and delete keys
pub mod admin;

/// Command-line interfaces for `conftpl` and `confadm`
pub mod cli;

/// Template job descriptors
/// Supports TOML, JSON and YAML descriptor files
pub mod config;

/// Common constants
pub mod constants;

/// Error types and handling
pub mod error;

/// HTTP transport and the HTTP-backed configuration source
pub mod http;

/// env_logger setup
pub mod logger;

/// Render, validate and install orchestration
pub mod publisher;

/// MiniJinja binding of the lookup functions
pub mod renderer;

/// Lookup policies (defaults, fail-fast, existence probes)
pub mod resolver;

/// The configuration source trait and in-memory source
pub mod source;

/// Check-command execution
pub mod validator;
