// SPDX-License-Identifier: AGPL-3.0-or-later
//! barman-keyfacts: SSH key facts for barman and its PostgreSQL servers

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use barman_keyfacts::{
    authorized_key::AuthorizedKey,
    facts::{FactGatherer, FactRegistry},
    Config, KeyProvisioner,
};

/// barman-keyfacts: SSH key facts for backup orchestration
///
/// Publishes the barman and postgres public keys as facts, generating the
/// key pairs on first use.
#[derive(Parser, Debug)]
#[command(name = "barman-keyfacts")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "keyfacts.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Gather every key fact
    Facts {
        /// Print facts as a JSON object
        #[arg(long)]
        json: bool,
    },

    /// Print a single fact value
    Fact {
        /// Fact name, e.g. barman_key
        name: String,
    },

    /// Provision and print the public key of an account
    Key {
        /// Account name
        user: String,
    },

    /// Print the authorized_keys line for a key fact
    AuthorizedKey {
        /// Fact name, e.g. postgres_key
        fact: String,

        /// Replace the key comment
        #[arg(long)]
        comment: Option<String>,
    },

    /// Show configuration
    Config,

    /// Initialize a new configuration
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli);

    match cli.command {
        Commands::Version => {
            println!("barman-keyfacts v{}", env!("CARGO_PKG_VERSION"));
            println!("SSH key facts for barman and PostgreSQL");
            Ok(())
        }

        Commands::Init { force } => init_config(&cli.config, force),

        Commands::Config => show_config(&cli.config),

        Commands::Facts { json } => show_facts(&cli.config, json).await,

        Commands::Fact { ref name } => show_fact(&cli.config, name).await,

        Commands::Key { ref user } => provision_key(&cli.config, user),

        Commands::AuthorizedKey { ref fact, ref comment } => {
            show_authorized_key(&cli.config, fact, comment.as_deref()).await
        }
    }
}

/// Logs go to stderr; stdout carries fact values only.
fn init_logging(cli: &Cli) {
    // A broken config is reported by the command itself
    let logging = Config::load_or_default(&cli.config)
        .map(|config| config.logging)
        .unwrap_or_default();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.debug)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(config_path: &Path) -> anyhow::Result<Config> {
    Config::load_or_default(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

fn gatherer(config: &Config) -> anyhow::Result<FactGatherer> {
    let registry = FactRegistry::from_config(config).context("Failed to register facts")?;
    Ok(FactGatherer::new(registry).with_timeout(config.fact_timeout_secs.map(Duration::from_secs)))
}

/// Initialize a new configuration file
fn init_config(config_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let default_config = r#"# SPDX-License-Identifier: AGPL-3.0-or-later
# barman-keyfacts configuration

name = "barman-keyfacts"
passwd_file = "/etc/passwd"
# fact_timeout_secs = 30

[keygen]
program = "ssh-keygen"
impersonate = true
switch_program = "runuser"

[[facts]]
name = "barman_key"
user = "barman"

[[facts]]
name = "postgres_key"
user = "postgres"

[logging]
level = "warn"
format = "text"
"#;

    std::fs::write(config_path, default_config)?;
    info!("Created configuration file: {}", config_path.display());
    println!("Created configuration file: {}", config_path.display());
    Ok(())
}

/// Show the current configuration
fn show_config(config_path: &Path) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("No configuration file found. Using defaults:");
        println!();
        println!("{}", toml::to_string_pretty(&Config::default())?);
        return Ok(());
    }

    let config = load_config(config_path)?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Gather and print every fact
async fn show_facts(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let facts = gatherer(&config)?.gather().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&facts)?);
    } else {
        for (name, value) in facts.iter() {
            println!("{} => {}", name, value);
        }
    }

    Ok(())
}

/// Print one fact value
async fn show_fact(config_path: &Path, name: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let value = gatherer(&config)?.resolve(name).await?;

    println!("{}", value.unwrap_or_default());
    Ok(())
}

/// Provision an account's key directly
fn provision_key(config_path: &Path, user: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let provisioner = KeyProvisioner::from_config(&config);

    let outcome = provisioner.provision(user);
    info!(user = %user, outcome = outcome.kind(), "Provisioning finished");

    println!("{}", outcome.into_material());
    Ok(())
}

/// Print the authorized_keys line for a key fact
async fn show_authorized_key(
    config_path: &Path,
    fact: &str,
    comment: Option<&str>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let material = gatherer(&config)?.resolve(fact).await?.unwrap_or_default();

    let Some(key) = AuthorizedKey::parse(&material) else {
        anyhow::bail!("Fact '{}' has no key yet", fact);
    };

    let key = match comment {
        Some(comment) => key.with_comment(comment),
        None => key,
    };

    println!("{}", key.to_line());
    Ok(())
}
