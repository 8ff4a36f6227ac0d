mod artifact;
mod cli;
mod config;
mod engine;
mod error;
mod poll;
mod redact;
mod registry;
mod runner;
mod state_machine;
mod status;
mod storage;
mod trace;
mod ui;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::{Map, Value};
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::artifact::FailureArtifactWriter;
use crate::cli::{Cli, Command};
use crate::config::RunbookConfig;
use crate::engine::CommandEngine;
use crate::poll::LookupMode;
use crate::registry::RegistryClient;
use crate::runner::{JobRunner, RunRequest};
use crate::state_machine::RunContext;
use crate::storage::HttpFetcher;
use crate::trace::TraceExtractor;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // A failed run must leave the process with a non-zero exit code;
    // that code is the signal the orchestrator reads.
    if let Err(err) = dispatch(cli).await {
        error!(error = %format!("{err:#}"), "command failed");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = RunbookConfig::load(Path::new(&cli.config))?;
    config.validate()?;

    match cli.command {
        Command::Run {
            input,
            workflow,
            output,
            params,
        } => run(&config, input, workflow, output, params).await,
        Command::Poll { job_id, scan } => poll_status(&config, job_id, scan).await,
    }
}

async fn run(
    config: &RunbookConfig,
    input: Option<String>,
    workflow: Option<String>,
    output: Option<String>,
    params: Option<String>,
) -> Result<()> {
    let request = build_request(config, input, workflow.as_deref(), output, params)?;

    let extractor =
        TraceExtractor::new(config.show_locals, config.locals_max_string, config.max_frames)?;
    let runner = JobRunner::new(
        CommandEngine::new(config.engine_command.clone()),
        HttpFetcher::new(),
        extractor,
        FailureArtifactWriter::new(config.artifact_path.clone()),
    );

    let mut ctx = RunContext::new(workflow);
    let progress = ui::RunProgress::start(&request.input);
    let result = runner.run(&mut ctx, request).await;
    progress.complete(&ctx);

    result.map(|_| ()).map_err(Into::into)
}

fn build_request(
    config: &RunbookConfig,
    input: Option<String>,
    workflow: Option<&str>,
    output: Option<String>,
    params: Option<String>,
) -> Result<RunRequest> {
    let input = match input.or_else(|| std::env::var(config::INPUT_VAR).ok()) {
        Some(location) => location,
        None => match workflow {
            Some(name) => config.workflow_input(name)?.to_string(),
            None => bail!(
                "no input given: pass INPUT, --workflow, or set {}",
                config::INPUT_VAR
            ),
        },
    };

    let output = output
        .or_else(|| std::env::var(config::OUTPUT_VAR).ok())
        .with_context(|| format!("no output given: pass --output or set {}", config::OUTPUT_VAR))?;

    let raw_params = params
        .or_else(|| std::env::var(config::PARAMS_VAR).ok())
        .unwrap_or_else(|| "{}".to_string());
    let params = match serde_json::from_str::<Value>(&raw_params)
        .context("params are not valid JSON")?
    {
        Value::Object(map) => map,
        _ => bail!("params must be a JSON object"),
    };

    Ok(RunRequest {
        input,
        output: PathBuf::from(output),
        params,
    })
}

async fn poll_status(config: &RunbookConfig, job_id: String, scan: bool) -> Result<()> {
    let registry = RegistryClient::new(
        config.registry_url.clone(),
        config.registry_token.clone(),
    );

    let mut body = Map::new();
    body.insert(poll::JOB_ID_KEY.to_string(), Value::String(job_id));

    let mode = if scan {
        LookupMode::Scan {
            window_minutes: config.scan_window_minutes,
        }
    } else {
        LookupMode::Direct
    };

    let response = poll::handle_poll(&registry, body, mode).await;
    ui::print_poll_response(&response);
    Ok(())
}
