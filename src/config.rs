//! Template job descriptors.
//! This module turns descriptor files (one job per file) into [`TemplateJob`]s
//! and provides the format-by-extension parsing shared with snapshot files.
//!
//! A descriptor looks like:
//!
//! ```toml
//! [template]
//! src = "nginx.conf.j2"
//! dest = "/etc/nginx/nginx.conf"
//! uid = 0
//! gid = 0
//! mode = "0644"
//! check_cmd = "nginx -t -c {{ src }}"
//! ```

use crate::constants::STAGING_SUFFIX;
use crate::error::{Error, Result};
use crate::validator::CheckCommand;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// An ordered set of jobs, one per descriptor file.
pub type TemplateJobBatch = Vec<TemplateJob>;

/// One rendering task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateJob {
    /// Logical identifier used in logs and errors
    pub name: String,
    /// Template file
    pub source_path: PathBuf,
    /// Install location; `None` renders to standard output
    pub dest_path: Option<PathBuf>,
    /// `dest_path` + ".tmp"; set exactly when `dest_path` is
    pub staging_path: Option<PathBuf>,
    pub owner_uid: u32,
    pub owner_gid: u32,
    /// Permission bits applied before install; `None` leaves them alone
    pub mode: Option<u32>,
    pub check: Option<CheckCommand>,
}

impl TemplateJob {
    /// A job that renders `source_path` to standard output.
    pub fn new<P: Into<PathBuf>>(source_path: P) -> Self {
        let source_path = source_path.into();
        Self {
            name: source_path.display().to_string(),
            source_path,
            dest_path: None,
            staging_path: None,
            owner_uid: nix::unistd::geteuid().as_raw(),
            owner_gid: nix::unistd::getegid().as_raw(),
            mode: None,
            check: None,
        }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_dest<P: Into<PathBuf>>(mut self, dest: P) -> Self {
        let dest = dest.into();
        self.staging_path = Some(staging_path_for(&dest));
        self.dest_path = Some(dest);
        self
    }

    /// Overrides the owner; `None` keeps the effective id.
    pub fn with_owner(mut self, uid: Option<u32>, gid: Option<u32>) -> Self {
        if let Some(uid) = uid {
            self.owner_uid = uid;
        }
        if let Some(gid) = gid {
            self.owner_gid = gid;
        }
        self
    }

    pub fn with_mode(mut self, mode: Option<u32>) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_check(mut self, check: Option<CheckCommand>) -> Self {
        self.check = check;
        self
    }
}

/// Staging path for a destination: the destination with ".tmp" appended.
pub fn staging_path_for(dest: &Path) -> PathBuf {
    let mut staging = dest.as_os_str().to_owned();
    staging.push(STAGING_SUFFIX);
    PathBuf::from(staging)
}

/// Parses a permission mode string with base prefixes: `0x` hex, `0o` or a
/// leading `0` octal, `0b` binary, decimal otherwise.
pub fn parse_mode(mode: &str) -> std::result::Result<u32, String> {
    let mode = mode.trim();
    let lower = mode.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        u32::from_str_radix(oct, 8)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u32::from_str_radix(bin, 2)
    } else if lower.len() > 1 && lower.starts_with('0') {
        u32::from_str_radix(&lower[1..], 8)
    } else {
        lower.parse::<u32>()
    };
    parsed.map_err(|e| format!("invalid mode '{mode}': {e}"))
}

/// Deserializes `content` according to the extension of `path`:
/// `.json`, `.yml`/`.yaml`, anything else as TOML.
pub fn load_structured<T: DeserializeOwned>(path: &Path, content: &str) -> std::result::Result<T, String> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(content).map_err(|e| e.to_string()),
        Some("yml") | Some("yaml") => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        _ => toml::from_str(content).map_err(|e| e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct DescriptorFile {
    template: RawDescriptor,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawMode {
    Text(String),
    Number(u32),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDescriptor {
    src: String,
    dest: String,
    uid: Option<u32>,
    gid: Option<u32>,
    mode: Option<RawMode>,
    check_cmd: String,
}

/// Loads a single descriptor; `src` is resolved against `template_dir`.
///
/// # Errors
/// * `Error::DescriptorError` if the file is unreadable, malformed, lacks
///   `src`, or carries an invalid mode
pub fn load_descriptor<P: AsRef<Path>, T: AsRef<Path>>(path: P, template_dir: T) -> Result<TemplateJob> {
    let path = path.as_ref();
    info!("Loading config {}", path.display());
    let descriptor_error =
        |reason: String| Error::DescriptorError { path: path.to_path_buf(), reason };

    let content = std::fs::read_to_string(path).map_err(|e| descriptor_error(e.to_string()))?;
    let raw = load_structured::<DescriptorFile>(path, &content).map_err(descriptor_error)?.template;

    if raw.src.trim().is_empty() {
        return Err(descriptor_error("missing 'src'".to_string()));
    }

    let mode = match raw.mode {
        Some(RawMode::Text(text)) if text.trim().is_empty() => None,
        Some(RawMode::Text(text)) => Some(parse_mode(&text).map_err(descriptor_error)?),
        Some(RawMode::Number(number)) => Some(number),
        None => None,
    };
    let check = (!raw.check_cmd.trim().is_empty()).then(|| CheckCommand::Shell(raw.check_cmd));

    let mut job = TemplateJob::new(template_dir.as_ref().join(&raw.src))
        .with_name(raw.src)
        .with_owner(raw.uid, raw.gid)
        .with_mode(mode)
        .with_check(check);
    if !raw.dest.trim().is_empty() {
        job = job.with_dest(raw.dest);
    }
    debug!("Loaded job {:?}", job);
    Ok(job)
}

/// Loads every descriptor in `config_dir`, ordered by file name.
///
/// Hidden files and subdirectories are skipped. The first invalid
/// descriptor aborts loading.
pub fn load_descriptors<P: AsRef<Path>, T: AsRef<Path>>(config_dir: P, template_dir: T) -> Result<TemplateJobBatch> {
    let config_dir = config_dir.as_ref();
    info!("Reading config from: '{}'", config_dir.display());

    if !config_dir.is_dir() {
        return Err(Error::ConfigError(format!(
            "cannot open config dir '{}'",
            config_dir.display()
        )));
    }

    let mut jobs = TemplateJobBatch::new();
    for entry in WalkDir::new(config_dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::ConfigError(format!("cannot read config dir: {e}")))?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !entry.file_type().is_file() || hidden {
            debug!("Skipping {}", entry.path().display());
            continue;
        }
        jobs.push(load_descriptor(entry.path(), template_dir.as_ref())?);
    }
    Ok(jobs)
}
