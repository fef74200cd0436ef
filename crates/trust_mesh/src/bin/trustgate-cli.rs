//! Trustgate operator CLI
//!
//! Offline helpers for operators and arbitrators: inspect the trusted key
//! lists, check a privileged key, sign witness requests and verify signed
//! dispute summaries. Private keys are always read from stdin, never from
//! arguments.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use trustgate_core::{logging, TrustConfig};
use trustgate_identity::{FactCategory, KeyRegistry};
use trustgate_trust_mesh::{AttestationLedger, DisputeResultVerifier, WitnessSignRequest};
use zeroize::Zeroizing;

/// Trustgate privileged-signer tools
#[derive(Parser)]
#[command(name = "trustgate-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file path (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Network environment (local, stagenet, mainnet); overrides the config
    #[arg(short, long, global = true)]
    network: Option<String>,

    /// Trust only the well-known developer key
    #[arg(long, global = true)]
    dev_keys: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List trusted public keys
    Keys {
        /// Restrict to one category (alert, private_notification,
        /// witness_signing, dispute_result)
        #[arg(long)]
        category: Option<String>,
    },

    /// Read a private key from stdin and report whether it is trusted
    CheckKey {
        #[arg(long)]
        category: String,
    },

    /// Sign a "<hash>,<owner public key>" witness request with an
    /// arbitrator key read from stdin
    SignWitness {
        sign_info: String,

        /// Attestation timestamp; defaults to now
        #[arg(long)]
        timestamp_ms: Option<u64>,
    },

    /// Verify a signed dispute summary file
    VerifyDispute { file: PathBuf },
}

#[derive(Serialize)]
struct KeyListing {
    category: FactCategory,
    public_keys: Vec<String>,
}

fn load_config(cli: &Cli) -> Result<TrustConfig> {
    let mut config = match &cli.config {
        Some(path) => TrustConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => TrustConfig::default_config(),
    };
    config = config.apply_env_overrides()?;

    if let Some(network) = &cli.network {
        config.network = network.parse()?;
    }
    if cli.dev_keys {
        config.use_dev_privilege_keys = true;
    }
    config.logging.level = cli.log_level.clone();
    Ok(config)
}

fn read_private_key() -> Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read private key from stdin")?;
    if line.trim().is_empty() {
        bail!("no private key on stdin");
    }
    Ok(line)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn cmd_keys(registry: &KeyRegistry, category: Option<&str>) -> Result<()> {
    let categories = match category {
        Some(name) => vec![name.parse::<FactCategory>()?],
        None => FactCategory::ALL.to_vec(),
    };

    let listings: Vec<KeyListing> = categories
        .into_iter()
        .map(|category| KeyListing {
            category,
            public_keys: registry
                .trusted_keys(category)
                .iter()
                .map(|k| k.public_key.to_hex())
                .collect(),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&listings)?);
    Ok(())
}

fn cmd_check_key(registry: &KeyRegistry, category: &str) -> Result<bool> {
    let category: FactCategory = category.parse()?;
    let private_key = read_private_key()?;

    match registry.authorize_signer(category, private_key.trim()) {
        Ok(key) => {
            println!("{} trusted for {}", key.public_key(), category);
            Ok(true)
        }
        Err(e) => {
            println!("refused: {e}");
            Ok(false)
        }
    }
}

fn cmd_sign_witness(
    registry: Arc<KeyRegistry>,
    sign_info: &str,
    timestamp_ms: Option<u64>,
) -> Result<()> {
    let request = WitnessSignRequest::parse(sign_info)?;
    let private_key = read_private_key()?;

    let ledger = AttestationLedger::new(registry);
    let (attestation, _) = ledger.sign(
        &request.hash,
        private_key.trim(),
        timestamp_ms.unwrap_or_else(now_millis),
        Some(request.owner_public_key),
    )?;

    println!("{}", serde_json::to_string_pretty(&attestation)?);
    Ok(())
}

fn cmd_verify_dispute(registry: Arc<KeyRegistry>, file: &Path) -> Result<bool> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let valid = DisputeResultVerifier::new(registry).verify_summary(&text);
    println!("{}", if valid { "VALID" } else { "INVALID" });
    Ok(valid)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    logging::init_with(&config.logging)?;

    let registry = Arc::new(KeyRegistry::from_config(&config));
    let ok = match &cli.command {
        Commands::Keys { category } => cmd_keys(&registry, category.as_deref()).map(|_| true)?,
        Commands::CheckKey { category } => cmd_check_key(&registry, category)?,
        Commands::SignWitness {
            sign_info,
            timestamp_ms,
        } => cmd_sign_witness(registry, sign_info, *timestamp_ms).map(|_| true)?,
        Commands::VerifyDispute { file } => cmd_verify_dispute(registry, file)?,
    };

    if !ok {
        process::exit(1);
    }
    Ok(())
}
