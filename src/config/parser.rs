use std::path::Path;
use crate::errors::ImpactError;
use super::types::ImpactConfig;
use tracing::warn;

pub async fn parse_config(path: &Path) -> Result<ImpactConfig, ImpactError> {
    if !path.exists() {
        return Err(ImpactError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(ImpactError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config: ImpactConfig = serde_yaml::from_str(&content)?;

    validate_config(&config)?;

    Ok(config)
}

/// Reject settings that could never produce a working client.
fn validate_config(config: &ImpactConfig) -> Result<(), ImpactError> {
    let urls = [
        ("sdlc", config.sdlc.as_ref().and_then(|b| b.base_url.as_deref())),
        ("pipeline", config.pipeline.as_ref().and_then(|b| b.base_url.as_deref())),
    ];
    for (section, url) in urls {
        if let Some(url) = url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ImpactError::Config(format!(
                    "{}.base_url must start with http:// or https://, got '{}'",
                    section, url
                )));
            }
        }
    }

    if let Some(http) = &config.http {
        if http.request_timeout_secs == Some(0) || http.connect_timeout_secs == Some(0) {
            return Err(ImpactError::Config("http timeouts must be greater than zero".into()));
        }
        if http.poll_interval_secs == Some(0) {
            warn!("poll_interval_secs is 0, job polling will spin without delay");
        }
    }

    Ok(())
}
