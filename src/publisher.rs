//! Render, validate and install orchestration.
//!
//! A job moves through `RENDER -> STAGE -> VALIDATE -> INSTALL`, or straight
//! from `RENDER` to emission when it has no destination. The staging file is
//! removed on every failure after it was created, so the destination either
//! keeps its previous content or receives the complete new content in a
//! single `rename`.

use crate::config::TemplateJob;
use crate::error::{Error, Result};
use crate::renderer::TemplateRenderer;
use crate::validator::validate;
use log::{debug, error, info, warn};
use nix::unistd::{chown, Gid, Uid};
use std::fs::{self, OpenOptions, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// What happened to a successfully processed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The job has no destination; carries the rendered text for stdout.
    Emitted(String),
    /// The rendered text now lives at this path.
    Installed(PathBuf),
}

/// How a batch reacts to a failing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Stop at the first failure; later jobs are not attempted.
    #[default]
    AbortOnFirstFailure,
    /// Attempt every job and report all failures.
    ContinueOnFailure,
}

#[derive(Debug)]
pub struct JobReport {
    pub name: String,
    pub result: Result<PublishOutcome>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub jobs: Vec<JobReport>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|job| job.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Drives jobs through rendering and installation.
pub struct Publisher<'a> {
    renderer: &'a dyn TemplateRenderer,
}

impl<'a> Publisher<'a> {
    pub fn new(renderer: &'a dyn TemplateRenderer) -> Self {
        Self { renderer }
    }

    /// Processes one job.
    ///
    /// # Errors
    /// * `Error::TemplateError` if rendering fails; nothing is written
    /// * `Error::ValidationError` if the check command rejects the output
    /// * `Error::InstallError` if staging, chmod, chown or rename fails
    pub fn publish(&self, job: &TemplateJob) -> Result<PublishOutcome> {
        info!("Processing template {} ({})", job.name, job.source_path.display());
        let content = self.renderer.render_file(&job.source_path)?;

        let (dest, staging) = match (&job.dest_path, &job.staging_path) {
            (Some(dest), Some(staging)) => (dest, staging),
            _ => {
                debug!("No destination for {}, emitting", job.name);
                return Ok(PublishOutcome::Emitted(content));
            }
        };

        stage(staging, &content, job.mode)?;

        if let Some(check) = &job.check {
            if let Err(err) = validate(check, staging) {
                discard(staging);
                return Err(err);
            }
        }

        if let Err(err) = install(job, staging, dest) {
            discard(staging);
            return Err(err);
        }

        info!("Installed {}", dest.display());
        Ok(PublishOutcome::Installed(dest.clone()))
    }

    /// Processes `jobs` in order according to `policy`.
    ///
    /// # Errors
    /// * `Error::JobFailed` for the first failing job under
    ///   [`BatchPolicy::AbortOnFirstFailure`]; under
    ///   [`BatchPolicy::ContinueOnFailure`] failures are only reported.
    pub fn publish_batch(&self, jobs: &[TemplateJob], policy: BatchPolicy) -> Result<BatchReport> {
        self.publish_batch_with(jobs, policy, |_| {})
    }

    /// Like [`Publisher::publish_batch`], calling `on_job` as each job
    /// finishes. The failing job that aborts a batch is passed to `on_job`
    /// before the error is returned.
    pub fn publish_batch_with<F>(&self, jobs: &[TemplateJob], policy: BatchPolicy, mut on_job: F) -> Result<BatchReport>
    where
        F: FnMut(&JobReport),
    {
        let mut report = BatchReport::default();
        for job in jobs {
            let job_report = JobReport { name: job.name.clone(), result: self.publish(job) };
            if let Err(err) = &job_report.result {
                error!("Job '{}' failed: {}", job.name, err);
            }
            on_job(&job_report);

            match job_report {
                JobReport { name, result: Err(err) } if policy == BatchPolicy::AbortOnFirstFailure => {
                    return Err(Error::JobFailed { name, source: Box::new(err) });
                }
                job_report => report.jobs.push(job_report),
            }
        }
        Ok(report)
    }
}

/// Writes `content` to `staging`, creating it with `mode` when given.
fn stage(staging: &Path, content: &str, mode: Option<u32>) -> Result<()> {
    debug!("Writing to staging file {}", staging.display());
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    if let Some(mode) = mode {
        options.mode(mode);
    }
    let mut file = options.open(staging).map_err(|e| Error::install("open", staging, e))?;

    let written = file
        .write_all(content.as_bytes())
        .map_err(|e| Error::install("write", staging, e))
        .and_then(|_| file.sync_all().map_err(|e| Error::install("sync", staging, e)));
    if let Err(err) = written {
        discard(staging);
        return Err(err);
    }
    Ok(())
}

/// Applies ownership and mode to `staging`, then renames it onto `dest`.
fn install(job: &TemplateJob, staging: &Path, dest: &Path) -> Result<()> {
    // chown clears setuid/setgid, so the mode goes on afterwards
    chown(staging, Some(Uid::from_raw(job.owner_uid)), Some(Gid::from_raw(job.owner_gid)))
        .map_err(|errno| Error::install("chown", staging, io::Error::from(errno)))?;
    if let Some(mode) = job.mode {
        fs::set_permissions(staging, Permissions::from_mode(mode))
            .map_err(|e| Error::install("chmod", staging, e))?;
    }
    fs::rename(staging, dest).map_err(|e| Error::install("rename", dest, e))
}

fn discard(staging: &Path) {
    match fs::remove_file(staging) {
        Ok(()) => debug!("Removed staging file {}", staging.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Cannot remove staging file {}: {}", staging.display(), e),
    }
}
