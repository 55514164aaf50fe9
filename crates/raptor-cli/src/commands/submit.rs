//! `raptor submit`: deploy a descriptor, then tail logs until Ctrl-C.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail, ensure};
use raptor_cluster::{DockerNetworkProvisioner, HttpNodeAgent};
use raptor_core::RaptorConfig;
use raptor_rollout::{ConsoleSink, Orchestrator};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info};

pub struct SubmitArgs {
    pub input: String,
    pub entity: String,
    pub config: Option<String>,
    pub compiler: Option<String>,
}

pub async fn submit(args: SubmitArgs) -> Result<ExitCode> {
    let input = expand_tilde(&args.input);
    let entity = expand_tilde(&args.entity);
    ensure!(input.is_file(), "input file {} does not exist", input.display());

    let config_path = args.config.as_deref().map(expand_tilde);
    let config = RaptorConfig::load_or_default(config_path.as_deref())
        .with_context(|| format!("failed to load config {}", args.config.as_deref().unwrap_or_default()))?;

    // Keeps the compiled descriptor alive until the run has read it.
    let compiled = match &args.compiler {
        Some(compiler) => Some(compile_descriptor(compiler, &input).await?),
        None => None,
    };
    let descriptor = compiled.as_ref().map_or(input.as_path(), |f| f.path());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut orchestrator = Orchestrator::new(
        Arc::new(HttpNodeAgent::from_config(&config.agent)),
        Arc::new(ConsoleSink),
        shutdown_rx,
    )
    .with_discovery_config(config.discovery.clone())
    .with_rollout_config(config.rollout.clone());
    if config.rollout.provision_network {
        orchestrator = orchestrator
            .with_network_provisioner(Arc::new(DockerNetworkProvisioner::new(&config.agent.docker_binary)));
    }

    let report = match orchestrator.run_file(descriptor, &entity.to_string_lossy()).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Deployment failed: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };
    drop(compiled);

    println!("Deployment complete, tailing logs. Ctrl-C to quit.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl-C handler")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    for drain in report.drains {
        let _ = drain.await;
    }
    Ok(ExitCode::SUCCESS)
}

/// Run `<compiler> <input> <output>` and return the output file.
async fn compile_descriptor(compiler: &str, input: &Path) -> Result<NamedTempFile> {
    let output = NamedTempFile::new().context("failed to create temporary descriptor file")?;
    debug!(%compiler, input = %input.display(), output = %output.path().display(), "compiling descriptor");

    let result = Command::new(compiler)
        .arg(input)
        .arg(output.path())
        .output()
        .await
        .with_context(|| format!("failed to run descriptor compiler '{compiler}'"))?;

    if !result.status.success() {
        bail!(
            "descriptor compiler exited with {}:\n{}",
            result.status,
            String::from_utf8_lossy(&result.stdout).trim_end()
        );
    }
    Ok(output)
}

fn expand_tilde(path: &str) -> PathBuf {
    expand_tilde_with(path, std::env::var_os("HOME").map(PathBuf::from).as_deref())
}

fn expand_tilde_with(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(path),
    }
}
