use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_FILE;

#[derive(Parser)]
#[command(
    name = "aimint",
    about = "AIMint: generate an image from a prompt, pin it to IPFS, mint it as an NFT",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a default configuration file
    Init(InitArgs),
    /// Generate, store and mint one asset
    Create(CreateArgs),
    /// List configured networks and their contracts
    Chains(ChainsArgs),
    /// Serve the pipeline over HTTP
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Where to write the file. Defaults to the global `--config` path.
    pub path: Option<PathBuf>,
    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct CreateArgs {
    /// Token name.
    #[arg(short, long)]
    pub name: String,
    /// Token description; also the image prompt.
    #[arg(short, long)]
    pub description: String,
    /// Save the generated image to this file.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct ChainsArgs {}

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address, overriding `[server].bind_addr`.
    #[arg(long)]
    pub bind: Option<String>,
}
