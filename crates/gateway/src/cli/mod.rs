pub mod config;

use clap::{Parser, Subcommand};

/// Anteroom — a session-fronted tool gateway.
#[derive(Debug, Parser)]
#[command(name = "anteroom", version, about)]
pub struct Cli {
    /// Path to the config file (overrides `AR_CONFIG`).
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the `--config` path, falling back to the
/// `AR_CONFIG` environment variable, then `config.toml`.  Returns the
/// parsed config and the path that was used. A missing file means
/// defaults, not an error.
pub fn load_config(
    override_path: Option<&str>,
) -> anyhow::Result<(ar_domain::config::Config, String)> {
    let config_path = override_path.map(str::to_owned).unwrap_or_else(|| {
        std::env::var("AR_CONFIG").unwrap_or_else(|_| "config.toml".into())
    });

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        ar_domain::config::Config::default()
    };

    Ok((config, config_path))
}
