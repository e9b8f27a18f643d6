pub mod toml_config;

pub use toml_config::RelayConfig;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "sportsllm")]
#[command(about = "Relay server between a chat frontend and a local Ollama server")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Address to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (frontend OLLAMA_BASE_URL points here)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Base URL of the inference server
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Enable sports tool calling on /api/chat
    #[arg(long)]
    pub tools: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Load the file configuration (or defaults) and apply command line overrides.
    pub fn resolve(&self) -> Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::from_file(path)?,
            None => RelayConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut RelayConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = &self.backend_url {
            config.backend.url = url.clone();
        }
        if self.tools {
            config.tools.enabled = true;
        }
        if self.json_logs {
            config.logging.json = true;
        }
    }
}
