use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::errors::RetryConfig;

pub const DEFAULT_SDLC_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_PIPELINE_API_URL: &str = "http://localhost:8001";

pub const SDLC_API_URL_ENV: &str = "IMPACT_SDLC_API_URL";
pub const PIPELINE_API_URL_ENV: &str = "IMPACT_PIPELINE_API_URL";

/// On-disk configuration file. Every section is optional.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ImpactConfig {
    pub sdlc: Option<BackendConfig>,
    pub pipeline: Option<BackendConfig>,
    pub http: Option<HttpConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BackendConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct HttpConfig {
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub poll_interval_secs: Option<u64>,
}

/// Fully resolved client settings shared by both backend clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub sdlc_api_url: String,
    pub pipeline_api_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_retries: u32,
    pub poll_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sdlc_api_url: DEFAULT_SDLC_API_URL.to_string(),
            pipeline_api_url: DEFAULT_PIPELINE_API_URL.to_string(),
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            max_retries: 2,
            poll_interval_secs: 2,
        }
    }
}

impl ClientConfig {
    /// Layer file settings, then environment, over the defaults.
    pub fn resolve<F>(file: Option<&ImpactConfig>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(file) = file {
            if let Some(url) = file.sdlc.as_ref().and_then(|b| b.base_url.clone()) {
                config.sdlc_api_url = url;
            }
            if let Some(url) = file.pipeline.as_ref().and_then(|b| b.base_url.clone()) {
                config.pipeline_api_url = url;
            }
            if let Some(http) = &file.http {
                config.request_timeout_secs = http.request_timeout_secs.unwrap_or(config.request_timeout_secs);
                config.connect_timeout_secs = http.connect_timeout_secs.unwrap_or(config.connect_timeout_secs);
                config.max_retries = http.max_retries.unwrap_or(config.max_retries);
                config.poll_interval_secs = http.poll_interval_secs.unwrap_or(config.poll_interval_secs);
            }
        }

        if let Some(url) = env(SDLC_API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            config.sdlc_api_url = url;
        }
        if let Some(url) = env(PIPELINE_API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            config.pipeline_api_url = url;
        }

        config.normalize()
    }

    pub fn from_env() -> Self {
        Self::resolve(None, |key| std::env::var(key).ok())
    }

    pub fn with_sdlc_url(mut self, url: impl Into<String>) -> Self {
        self.sdlc_api_url = url.into();
        self.normalize()
    }

    pub fn with_pipeline_url(mut self, url: impl Into<String>) -> Self {
        self.pipeline_api_url = url.into();
        self.normalize()
    }

    fn normalize(mut self) -> Self {
        self.sdlc_api_url = self.sdlc_api_url.trim().trim_end_matches('/').to_string();
        self.pipeline_api_url = self.pipeline_api_url.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            ..Default::default()
        }
    }
}
