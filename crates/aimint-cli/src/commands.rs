use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use aimint_chain::{ChainContext, JsonRpcClient};
use aimint_pipeline::{AssetPipeline, RunReport};
use aimint_server::AimintServer;
use aimint_store::{InMemoryMetadataStore, MetadataStore, NftStorageClient};
use aimint_synth::HuggingFaceClient;
use aimint_types::{CreationRequest, PipelineState, ProgressEvent};
use anyhow::Context;
use colored::Colorize;
use serde_json::json;
use tokio::sync::broadcast;

use crate::cli::*;
use crate::config::{AppConfig, StorageBackend};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Init(args) => cmd_init(&cli.config, args),
        Command::Create(args) => cmd_create(&cli.config, &cli.format, args).await,
        Command::Chains(_) => cmd_chains(&cli.config, &cli.format),
        Command::Serve(args) => cmd_serve(&cli.config, args).await,
    }
}

fn cmd_init(config_path: &Path, args: InitArgs) -> anyhow::Result<()> {
    let path = args.path.as_deref().unwrap_or(config_path);
    if path.exists() && !args.force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let config = AppConfig::default();
    std::fs::write(path, config.to_toml_string()?)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("{} Wrote {}", "✓".green().bold(), path.display().to_string().bold());
    println!("  Image token: ${}", config.synthesis.token_env.cyan());
    println!("  Storage token: ${}", config.storage.token_env.cyan());
    println!("  RPC: {}", config.chain.rpc_url.blue());
    Ok(())
}

fn cmd_chains(config_path: &Path, format: &OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    let registry = config.registry();
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(registry)?);
        return Ok(());
    }
    if registry.is_empty() {
        println!("No networks configured.");
        return Ok(());
    }
    for (chain_id, entry) in registry.iter() {
        let name = if entry.name.is_empty() { "-" } else { entry.name.as_str() };
        println!(
            "{:>10}  {:<12} {}",
            chain_id.to_string().yellow(),
            name.bold(),
            entry.contract_address.to_string().cyan()
        );
        if let Some(abi) = &entry.abi_path {
            println!("{:>10}  abi: {}", "", abi.display());
        }
    }
    Ok(())
}

/// Wire the configured backends into a pipeline.
async fn build_pipeline(config: &AppConfig) -> anyhow::Result<AssetPipeline> {
    let synth = Arc::new(HuggingFaceClient::new(config.synth_config()?)?);
    let store: Arc<dyn MetadataStore> = match config.storage.backend {
        StorageBackend::NftStorage => Arc::new(NftStorageClient::new(config.storage_config()?)?),
        StorageBackend::Memory => Arc::new(InMemoryMetadataStore::new()),
    };

    let rpc = Arc::new(JsonRpcClient::new(
        &config.chain.rpc_url,
        Some(Duration::from_secs(config.chain.rpc_timeout_secs)),
    )?);
    let chain = ChainContext::connect(rpc, config.registry(), config.chain.account)
        .await
        .with_context(|| format!("connecting to {}", config.chain.rpc_url))?;

    Ok(AssetPipeline::from_chain(
        synth,
        store,
        &chain,
        config.confirmation_policy(),
        config.pipeline_config()?,
    ))
}

async fn cmd_create(
    config_path: &Path,
    format: &OutputFormat,
    args: CreateArgs,
) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    let request = CreationRequest::new(args.name, args.description);
    // Refuse bad input before touching the network.
    request.validate()?;

    let pipeline = build_pipeline(&config).await?;
    let events = pipeline.subscribe();
    let printer = tokio::spawn(print_progress(events));
    let report = pipeline.run(request).await?;
    let image = pipeline.latest_image();
    drop(pipeline);
    // The channel closes once the last sender is gone.
    let _ = printer.await;

    if let (Some(out), Some(image)) = (&args.out, image) {
        std::fs::write(out, &image.bytes).with_context(|| format!("writing {}", out.display()))?;
        println!("  Image saved to {}", out.display().to_string().bold());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report_json(&report))?),
        OutputFormat::Text => print_report(&report),
    }
    if !report.is_completed() {
        anyhow::bail!("run {} did not complete", report.run_id);
    }
    Ok(())
}

async fn print_progress(mut events: broadcast::Receiver<ProgressEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let line = match &event.state {
                    PipelineState::Failed { .. } => event.message.red().to_string(),
                    PipelineState::Completed { .. } => event.message.green().to_string(),
                    _ => event.message.clone(),
                };
                println!("{} {}", "→".cyan(), line);
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "progress printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_report(report: &RunReport) {
    for stage in &report.stages {
        let mark = if stage.passed { "✓".green() } else { "✗".red() };
        println!("  {} {:<8} {:>8.2?}", mark, stage.stage.as_str(), stage.elapsed);
        if let Some(reason) = &stage.reason {
            println!("      {}", reason.dimmed());
        }
    }
    match &report.state {
        PipelineState::Completed {
            metadata_uri,
            tx_hash,
            ..
        } => {
            println!("{} Minted in {:.1?}", "✓".green().bold(), report.elapsed);
            println!("  Token URI: {}", metadata_uri.blue());
            println!("  Transaction: {}", tx_hash.yellow());
        }
        PipelineState::Failed { stage, cause } => {
            println!("{} Failed at {} stage", "✗".red().bold(), stage.to_string().bold());
            println!("  Cause: {}", cause.message);
            println!("  Funds: {}", cause.spend.describe().yellow());
        }
        other => println!("Run ended in {}", other.name()),
    }
}

fn report_json(report: &RunReport) -> serde_json::Value {
    let failure = match &report.state {
        PipelineState::Failed { stage, cause } => json!({ "stage": stage, "cause": cause }),
        _ => serde_json::Value::Null,
    };
    let stages: Vec<_> = report
        .stages
        .iter()
        .map(|s| {
            json!({
                "stage": s.stage,
                "passed": s.passed,
                "reason": s.reason,
                "elapsed_ms": s.elapsed.as_millis() as u64,
            })
        })
        .collect();
    json!({
        "run_id": report.run_id,
        "state": report.state.name(),
        "metadata_uri": report.metadata_uri(),
        "tx_hash": report.tx_hash(),
        "failure": failure,
        "stages": stages,
        "elapsed_ms": report.elapsed.as_millis() as u64,
    })
}

async fn cmd_serve(config_path: &Path, args: ServeArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::load_or_default(config_path)?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind
            .parse()
            .with_context(|| format!("invalid bind address `{bind}`"))?;
    }
    let pipeline = build_pipeline(&config).await?;
    println!(
        "{} AIMint server on {}",
        "✓".green().bold(),
        config.server.bind_addr.to_string().bold()
    );
    AimintServer::new(config.server.clone(), pipeline).serve().await?;
    Ok(())
}
