//! Common constants used throughout confclient.

/// Provenance reported when a default value was substituted for a missing key
pub const DEFAULT_SOURCE: &str = "__DEFAULT__";

/// Suffix appended to a destination path to form its staging path
pub const STAGING_SUFFIX: &str = ".tmp";

/// Environment variables with this prefix become request scope entries
pub const SCOPE_ENV_PREFIX: &str = "cfg_";

/// Header prefix for request scope entries
pub const SCOPE_HEADER_PREFIX: &str = "x-cfg-";

/// Environment variable holding the configuration service base URL
pub const URL_ENV: &str = "CONFIGMGR_URL";

/// Argument token replaced by the staging path in argv-style check commands
pub const FILE_PLACEHOLDER: &str = "FILE";

/// Shell used for descriptor check commands
pub const SHELL: &str = "/bin/sh";

/// Default connect/read timeout for the HTTP source, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
