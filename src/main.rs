//! conftpl entry point.
//! Resolves single keys, renders one template, or runs a descriptor batch.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use confclient::{
    cli::Args,
    config::{load_descriptors, TemplateJob},
    error::{default_error_handler, Error},
    http::{HttpSource, Scope, Transport},
    logger::init_logger,
    publisher::{BatchPolicy, JobReport, PublishOutcome, Publisher},
    renderer::MiniJinjaRenderer,
    resolver::ValueResolver,
    source::{ConfigSource, MemorySource},
    validator::CheckCommand,
};
use log::info;

fn main() {
    let args = Args::parse();
    init_logger(args.log_level, args.verbose);

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

fn build_source(args: &Args) -> anyhow::Result<Arc<dyn ConfigSource>> {
    if let Some(snapshot) = &args.snapshot {
        info!("Reading values from snapshot {}", snapshot.display());
        return Ok(Arc::new(MemorySource::from_path(snapshot)?));
    }

    let url = args
        .url
        .as_deref()
        .context("service URL not set. Either set -u or the CONFIGMGR_URL environment variable")?;
    let mut scope = Scope::from_env();
    for (name, value) in &args.scope {
        scope.insert(name.clone(), value.clone());
    }
    let transport = Transport::new(url, &scope, Duration::from_secs(args.timeout))?;
    Ok(Arc::new(HttpSource::new(transport)))
}

fn single_job(args: &Args, template: &Path) -> anyhow::Result<TemplateJob> {
    let check = (!args.check.is_empty()).then(|| CheckCommand::Argv(args.check.clone()));
    let mut job = TemplateJob::new(template).with_check(check);

    match &args.dest {
        Some(dest) => job = job.with_dest(dest).with_owner(args.uid, args.gid).with_mode(args.mode),
        None if job.check.is_some() => {
            return Err(Error::ConfigError("a check command requires --dest".to_string()).into())
        }
        None => {}
    }
    Ok(job)
}

fn print_job_report(job: &JobReport) {
    match &job.result {
        Ok(PublishOutcome::Emitted(content)) => print!("{content}"),
        Ok(PublishOutcome::Installed(dest)) => println!("OK: {} -> {}", job.name, dest.display()),
        Err(err) => println!("FAILED: {}: {}", job.name, err),
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let source = build_source(&args)?;
    let resolver = ValueResolver::new(source);

    if let Some(key) = &args.key {
        let found = resolver.key_with_provenance(key, None)?;
        print!("{}", found.value);
        return Ok(());
    }

    let renderer = MiniJinjaRenderer::new(resolver);
    let publisher = Publisher::new(&renderer);

    if let Some(template) = &args.template {
        let job = single_job(&args, template)?;
        let outcome = publisher
            .publish(&job)
            .with_context(|| format!("cannot process template {}", template.display()))?;
        match outcome {
            PublishOutcome::Emitted(content) => print!("{content}"),
            PublishOutcome::Installed(dest) => info!("Installed {}", dest.display()),
        }
        return Ok(());
    }

    if let (Some(config_dir), Some(template_dir)) = (&args.config_dir, &args.template_dir) {
        let jobs = load_descriptors(config_dir, template_dir)?;
        let policy = if args.keep_going {
            BatchPolicy::ContinueOnFailure
        } else {
            BatchPolicy::AbortOnFirstFailure
        };

        let report = publisher.publish_batch_with(&jobs, policy, print_job_report)?;
        let failed = report.failures().count();
        if failed > 0 {
            bail!("{} of {} jobs failed", failed, report.jobs.len());
        }
        return Ok(());
    }

    Args::command().print_help()?;
    std::process::exit(1);
}
