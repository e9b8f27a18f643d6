pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod tools;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::http::{router, serve, serve_on};
pub use adapters::ollama::OllamaClient;
pub use config::RelayConfig;
pub use core::relay::{RelayService, RelaySettings};
pub use tools::ToolRegistry;
pub use utils::error::{RelayError, Result};
