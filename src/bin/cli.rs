//! CLI for bucket-backed storage operations

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::{Parser, Subcommand};
use s3vault::common::{format_bytes, parse_duration, validate_key};
use s3vault::{Config, EncryptedCodec, Storage};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "s3vault")]
#[command(about = "Object-store backed key/value storage with distributed locks")]
#[command(version)]
struct Cli {
    /// Config file (TOML); defaults to $S3VAULT_CONFIG
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bucket name
    #[arg(long)]
    bucket: Option<String>,

    /// Bucket region
    #[arg(long)]
    region: Option<String>,

    /// Key namespace prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Custom endpoint for S3-compatible services
    #[arg(long)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file under a key
    Put {
        /// Key
        key: String,

        /// File path
        #[arg(long)]
        file: PathBuf,
    },

    /// Load a key into a file
    Get {
        /// Key
        key: String,

        /// Output file
        #[arg(long)]
        output: PathBuf,
    },

    /// Delete a key
    Delete {
        /// Key
        key: String,
    },

    /// Check whether a key exists
    Exists {
        /// Key
        key: String,
    },

    /// List keys under a prefix
    List {
        /// Prefix (bucket namespace root if omitted)
        #[arg(default_value = "")]
        prefix: String,

        /// Descend into every level
        #[arg(long)]
        recursive: bool,
    },

    /// Show key metadata as JSON
    Stat {
        /// Key
        key: String,
    },

    /// Acquire the lock for a key
    Lock {
        /// Key
        key: String,

        /// Acquisition timeout (e.g. "30s", "2m")
        #[arg(long)]
        timeout: Option<String>,
    },

    /// Release the lock for a key
    Unlock {
        /// Key
        key: String,
    },

    /// Print a new random encryption key
    GenKey,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::GenKey = cli.command {
        println!("base64:{}", BASE64.encode(EncryptedCodec::generate_key()));
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bucket) = cli.bucket {
        config.bucket = bucket;
    }
    if cli.region.is_some() {
        config.region = cli.region;
    }
    if cli.prefix.is_some() {
        config.prefix = cli.prefix;
    }
    if cli.endpoint.is_some() {
        config.endpoint = cli.endpoint;
    }
    if let Commands::Lock {
        timeout: Some(timeout),
        ..
    } = &cli.command
    {
        config.lock = config.lock.with_timeout(parse_duration(timeout)?);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let storage = Storage::connect(&config).await?;

    match cli.command {
        Commands::Put { key, file } => {
            validate_key(&key)?;
            let value = tokio::fs::read(&file).await?;
            storage.store(&key, &value).await?;
            println!("Stored {} ({})", key, format_bytes(value.len() as u64));
        }

        Commands::Get { key, output } => {
            validate_key(&key)?;
            let value = storage.load(&key).await?;
            tokio::fs::write(&output, &value).await?;
            println!("Wrote {} to {:?}", format_bytes(value.len() as u64), output);
        }

        Commands::Delete { key } => {
            validate_key(&key)?;
            storage.delete(&key).await?;
            println!("Deleted {}", key);
        }

        Commands::Exists { key } => {
            validate_key(&key)?;
            println!("{}", storage.exists(&key).await);
        }

        Commands::List { prefix, recursive } => {
            for key in storage.list(&prefix, recursive).await? {
                println!("{}", key);
            }
        }

        Commands::Stat { key } => {
            validate_key(&key)?;
            let info = storage.stat(&key).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Lock { key, .. } => {
            validate_key(&key)?;
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });
            storage.lock(&key, &cancel).await?;
            println!("Locked {}", key);
        }

        Commands::Unlock { key } => {
            validate_key(&key)?;
            storage.unlock(&key).await?;
            println!("Unlocked {}", key);
        }

        Commands::GenKey => unreachable!("handled before connecting"),
    }

    Ok(())
}
