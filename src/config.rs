use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, path::PathBuf};
use tus_staging_store::Metadata;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Centralized driver configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub input: PathBuf,
    pub key: String,
    pub chunk_size: usize,
    pub output: Option<PathBuf>,
    pub metadata: Metadata,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Stage a file through the resumable upload store")]
pub struct Args {
    /// File to upload
    #[arg(long)]
    pub input: PathBuf,

    /// Target object key (overrides TUS_STAGE_KEY, defaults to the file name)
    #[arg(long)]
    pub key: Option<String>,

    /// Bytes per append call (overrides TUS_STAGE_CHUNK_SIZE)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Write the finalized object here (overrides TUS_STAGE_OUTPUT)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Metadata entry as `name=value`, repeatable
    #[arg(long = "metadata", value_parser = parse_metadata_entry)]
    pub metadata: Vec<(String, String)>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_key = env::var("TUS_STAGE_KEY").ok();
        let env_chunk = match env::var("TUS_STAGE_CHUNK_SIZE") {
            Ok(value) => Some(
                value
                    .parse::<usize>()
                    .with_context(|| format!("parsing TUS_STAGE_CHUNK_SIZE value `{}`", value))?,
            ),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(err).context("reading TUS_STAGE_CHUNK_SIZE"),
        };
        let env_output = env::var("TUS_STAGE_OUTPUT").ok().map(PathBuf::from);

        // --- Merge ---
        let key = match args.key.or(env_key) {
            Some(key) => key,
            None => args
                .input
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .with_context(|| format!("no key given and {:?} has no file name", args.input))?,
        };
        let chunk_size = args.chunk_size.or(env_chunk).unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            bail!("chunk size must be greater than zero");
        }

        let metadata = args
            .metadata
            .into_iter()
            .map(|(name, value)| (name, serde_json::Value::String(value)))
            .collect();

        Ok(Self {
            input: args.input,
            key,
            chunk_size,
            output: args.output.or(env_output),
            metadata,
        })
    }
}

fn parse_metadata_entry(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("metadata must look like `name=value`, got `{}`", raw)),
    }
}
