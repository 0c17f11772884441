pub mod commands;
pub mod docs;
pub mod run;
pub mod session;

pub use commands::{Cli, Commands};

use impactlens::config::{parse_config, ClientConfig};
use impactlens::errors::ImpactError;
use tracing::debug;

/// Defaults, then the config file, then the environment, then flags.
pub async fn load_client_config(cli: &Cli) -> Result<ClientConfig, ImpactError> {
    let file = match &cli.config {
        Some(path) => Some(parse_config(path).await?),
        None => None,
    };
    let mut config = ClientConfig::resolve(file.as_ref(), |key| std::env::var(key).ok());
    if let Some(url) = &cli.sdlc_url {
        config = config.with_sdlc_url(url.clone());
    }
    if let Some(url) = &cli.pipeline_url {
        config = config.with_pipeline_url(url.clone());
    }
    debug!(sdlc = %config.sdlc_api_url, pipeline = %config.pipeline_api_url, "Resolved client config");
    Ok(config)
}
