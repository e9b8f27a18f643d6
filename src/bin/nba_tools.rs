use anyhow::Context;
use clap::{Parser, Subcommand};
use sports_llm::adapters::balldontlie::BalldontlieClient;
use sports_llm::config::RelayConfig;
use sports_llm::domain::ports::Tool;
use sports_llm::tools::nba::{NbaTool, NbaToolKind, NbaToolkit};
use sports_llm::utils::{logger, validation};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "nba-tools")]
#[command(about = "Call the SportsLLM sports tools directly, without a model in the loop")]
struct Args {
    /// Path to TOML configuration file (for the balldontlie section)
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the tools and their JSON schemas
    List,
    /// Call a tool by name with a JSON arguments object
    Call {
        /// Tool name, e.g. get_team_info
        name: String,
        /// Arguments, e.g. '{"team_name": "Warriors"}'
        #[arg(default_value = "{}")]
        arguments: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose, None);

    let config = match &args.config {
        Some(path) => RelayConfig::from_file(path)
            .with_context(|| format!("failed to load config file '{}'", path))?,
        None => RelayConfig::default(),
    };

    match args.command {
        Command::List => {
            for kind in NbaToolKind::ALL {
                println!("{} - {}", kind.name(), kind.description());
                println!("{}", serde_json::to_string_pretty(&kind.parameters())?);
            }
        }
        Command::Call { name, arguments } => {
            let kind = NbaToolKind::from_name(&name).with_context(|| {
                let known: Vec<&str> = NbaToolKind::ALL.iter().map(|kind| kind.name()).collect();
                format!("unknown tool '{}'; known tools: {}", name, known.join(", "))
            })?;
            let arguments: serde_json::Value =
                serde_json::from_str(&arguments).context("arguments must be a JSON object")?;

            let api_key = config.balldontlie_api_key();
            validation::validate_required_field("BALLDONTLIE_API_KEY", &api_key)?;

            let toolkit = Arc::new(NbaToolkit::new(BalldontlieClient::from_config(&config)?));
            let result = NbaTool::new(kind, toolkit).call(arguments).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
