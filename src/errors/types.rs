use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImpactError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Pipeline failed: {0}")]
    Pipeline(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("No active job")]
    NoActiveJob,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImpactError {
    /// Message suitable for an inline error banner. Backend-provided text is
    /// shown as-is, without the variant prefix.
    pub fn user_message(&self) -> String {
        match self {
            ImpactError::Api { message, .. } => message.clone(),
            ImpactError::Pipeline(message) => message.clone(),
            ImpactError::Validation(message) => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ImpactError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ImpactError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ImpactError::Timeout(err.to_string());
        }
        if err.is_decode() {
            return ImpactError::Decode(err.to_string());
        }
        if let Some(status) = err.status() {
            return ImpactError::Api {
                status: status.as_u16(),
                message: format!("API error: {}", status.as_u16()),
            };
        }
        ImpactError::Network(err.to_string())
    }
}
