use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use confclient::config::TemplateJob;
use confclient::error::Error;
use confclient::publisher::{BatchPolicy, PublishOutcome, Publisher};
use confclient::renderer::MiniJinjaRenderer;
use confclient::resolver::ValueResolver;
use confclient::source::MemorySource;
use confclient::validator::CheckCommand;
use tempfile::TempDir;

fn renderer() -> MiniJinjaRenderer {
    let source = MemorySource::new()
        .with_string("listen", "8080", "site")
        .with_list("upstreams", &[("app1", "site"), ("app2", "site")]);
    MiniJinjaRenderer::new(ValueResolver::new(Arc::new(source)))
}

fn template(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn shell(cmd: &str) -> Option<CheckCommand> {
    Some(CheckCommand::Shell(cmd.to_string()))
}

#[test_log::test]
fn test_emit_without_destination() {
    let temp_dir = TempDir::new().unwrap();
    let src = template(temp_dir.path(), "a.j2", "listen {{ key(\"listen\") }}\n");
    let renderer = renderer();
    let publisher = Publisher::new(&renderer);

    let job = TemplateJob::new(&src).with_check(shell("false"));
    let outcome = publisher.publish(&job).unwrap();
    assert_eq!(outcome, PublishOutcome::Emitted("listen 8080\n".to_string()));

    // nothing but the template itself on disk
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 1);
}

#[test_log::test]
fn test_install_after_successful_validation() {
    let temp_dir = TempDir::new().unwrap();
    let src = template(temp_dir.path(), "a.j2", "{% for u in list(\"upstreams\") %}server {{ u }};\n{% endfor %}");
    let dest = temp_dir.path().join("upstreams.conf");
    let uid = nix::unistd::geteuid().as_raw();
    let gid = nix::unistd::getegid().as_raw();

    let job = TemplateJob::new(&src)
        .with_dest(&dest)
        .with_owner(Some(uid), Some(gid))
        .with_mode(Some(0o640))
        .with_check(shell("grep -q app2 {{ src }}"));

    let renderer = renderer();
    let outcome = Publisher::new(&renderer).publish(&job).unwrap();

    assert_eq!(outcome, PublishOutcome::Installed(dest.clone()));
    assert_eq!(fs::read_to_string(&dest).unwrap(), "server app1;\nserver app2;\n");
    let metadata = fs::metadata(&dest).unwrap();
    assert_eq!(metadata.permissions().mode() & 0o777, 0o640);
    assert_eq!((metadata.uid(), metadata.gid()), (uid, gid));
    assert!(!job.staging_path.as_ref().unwrap().exists());
}

#[test]
fn test_install_keeps_setuid_and_setgid_bits() {
    let temp_dir = TempDir::new().unwrap();
    let src = template(temp_dir.path(), "a.j2", "#!/bin/sh\n");
    let renderer = renderer();

    for (name, mode) in [("suid", 0o4755), ("sgid", 0o2750)] {
        let dest = temp_dir.path().join(name);
        let job = TemplateJob::new(&src).with_dest(&dest).with_mode(Some(mode));
        Publisher::new(&renderer).publish(&job).unwrap();

        let installed = fs::metadata(&dest).unwrap().permissions().mode() & 0o7777;
        assert_eq!(installed, mode, "mode of {name}");
    }
}

#[test_log::test]
fn test_failed_validation_keeps_previous_destination() {
    let temp_dir = TempDir::new().unwrap();
    let src = template(temp_dir.path(), "a.j2", "new content\n");
    let dest = temp_dir.path().join("app.conf");
    fs::write(&dest, "old content\n").unwrap();

    let job = TemplateJob::new(&src).with_dest(&dest).with_check(shell("exit 1"));
    let renderer = renderer();
    let result = Publisher::new(&renderer).publish(&job);

    assert!(matches!(result, Err(Error::ValidationError { .. })));
    assert_eq!(fs::read_to_string(&dest).unwrap(), "old content\n");
    assert!(!job.staging_path.as_ref().unwrap().exists());
}

#[test]
fn test_failed_validation_without_previous_destination() {
    let temp_dir = TempDir::new().unwrap();
    let src = template(temp_dir.path(), "a.j2", "content\n");
    let dest = temp_dir.path().join("app.conf");

    let job = TemplateJob::new(&src).with_dest(&dest).with_check(shell("false"));
    let renderer = renderer();
    assert!(Publisher::new(&renderer).publish(&job).is_err());
    assert!(!dest.exists());
    assert!(!job.staging_path.as_ref().unwrap().exists());
}

#[test]
fn test_render_failure_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let src = template(temp_dir.path(), "a.j2", "{% for x in list(\"missing\") %}{{ x }}{% endfor %}");
    let dest = temp_dir.path().join("app.conf");

    let job = TemplateJob::new(&src).with_dest(&dest);
    let renderer = renderer();
    let result = Publisher::new(&renderer).publish(&job);

    assert!(matches!(result, Err(Error::TemplateError { .. })));
    assert!(!dest.exists());
    assert!(!job.staging_path.as_ref().unwrap().exists());
}

#[test]
fn test_stale_staging_file_is_truncated() {
    let temp_dir = TempDir::new().unwrap();
    let src = template(temp_dir.path(), "a.j2", "short\n");
    let dest = temp_dir.path().join("app.conf");
    let job = TemplateJob::new(&src).with_dest(&dest);
    fs::write(job.staging_path.as_ref().unwrap(), "a much longer leftover from an earlier run\n").unwrap();

    let renderer = renderer();
    Publisher::new(&renderer).publish(&job).unwrap();
    assert_eq!(fs::read_to_string(&dest).unwrap(), "short\n");
}

#[test]
fn test_install_into_missing_directory_fails_cleanly() {
    let temp_dir = TempDir::new().unwrap();
    let src = template(temp_dir.path(), "a.j2", "x\n");
    let dest = temp_dir.path().join("absent").join("app.conf");

    let job = TemplateJob::new(&src).with_dest(&dest);
    let renderer = renderer();
    match Publisher::new(&renderer).publish(&job) {
        Err(Error::InstallError { operation, .. }) => assert_eq!(operation, "open"),
        other => panic!("Expected InstallError, got {other:?}"),
    }
}

fn three_jobs(dir: &Path) -> Vec<TemplateJob> {
    let src = template(dir, "a.j2", "listen {{ key(\"listen\") }}\n");
    vec![
        TemplateJob::new(&src).with_name("first").with_dest(dir.join("first.conf")),
        TemplateJob::new(&src)
            .with_name("second")
            .with_dest(dir.join("second.conf"))
            .with_check(shell("false")),
        TemplateJob::new(&src).with_name("third").with_dest(dir.join("third.conf")),
    ]
}

#[test_log::test]
fn test_batch_aborts_on_first_failure() {
    let temp_dir = TempDir::new().unwrap();
    let jobs = three_jobs(temp_dir.path());
    fs::write(temp_dir.path().join("second.conf"), "previous\n").unwrap();

    let renderer = renderer();
    let result = Publisher::new(&renderer).publish_batch(&jobs, BatchPolicy::AbortOnFirstFailure);

    match result {
        Err(Error::JobFailed { name, source }) => {
            assert_eq!(name, "second");
            assert!(matches!(*source, Error::ValidationError { .. }));
        }
        other => panic!("Expected JobFailed, got {other:?}"),
    }
    assert_eq!(fs::read_to_string(temp_dir.path().join("first.conf")).unwrap(), "listen 8080\n");
    assert_eq!(fs::read_to_string(temp_dir.path().join("second.conf")).unwrap(), "previous\n");
    assert!(!temp_dir.path().join("third.conf").exists());
    assert!(!temp_dir.path().join("third.conf.tmp").exists());
}

#[test]
fn test_batch_reports_finished_jobs_before_abort() {
    let temp_dir = TempDir::new().unwrap();
    let src = template(temp_dir.path(), "b.j2", "listen {{ key(\"listen\") }}\n");
    let mut jobs = vec![TemplateJob::new(&src).with_name("stdout")];
    jobs.extend(three_jobs(temp_dir.path()));

    let renderer = renderer();
    let mut seen = Vec::new();
    let result = Publisher::new(&renderer).publish_batch_with(&jobs, BatchPolicy::AbortOnFirstFailure, |job| {
        seen.push((job.name.clone(), job.result.as_ref().ok().cloned()))
    });

    assert!(matches!(result, Err(Error::JobFailed { ref name, .. }) if name == "second"));
    assert_eq!(
        seen,
        vec![
            ("stdout".to_string(), Some(PublishOutcome::Emitted("listen 8080\n".to_string()))),
            ("first".to_string(), Some(PublishOutcome::Installed(temp_dir.path().join("first.conf")))),
            ("second".to_string(), None),
        ]
    );
}

#[test]
fn test_batch_continue_on_failure() {
    let temp_dir = TempDir::new().unwrap();
    let jobs = three_jobs(temp_dir.path());

    let renderer = renderer();
    let report = Publisher::new(&renderer)
        .publish_batch(&jobs, BatchPolicy::ContinueOnFailure)
        .unwrap();

    assert!(!report.is_success());
    let failed: Vec<&str> = report.failures().map(|j| j.name.as_str()).collect();
    assert_eq!(failed, vec!["second"]);
    assert_eq!(report.jobs.len(), 3);
    assert!(temp_dir.path().join("first.conf").exists());
    assert!(!temp_dir.path().join("second.conf").exists());
    assert!(temp_dir.path().join("third.conf").exists());
}
