use super::types::ImpactError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl ImpactError {
    /// Classify this error to determine its type and whether it can be retried.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Retryable errors
            ImpactError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            ImpactError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },
            ImpactError::Api { status: 429, .. } => ErrorClassification {
                error_type: "RateLimitError",
                retryable: true,
            },
            ImpactError::Api { status, .. } if *status >= 500 => ErrorClassification {
                error_type: "ServerError",
                retryable: true,
            },
            ImpactError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },

            // Non-retryable errors
            ImpactError::Api { .. } => ErrorClassification {
                error_type: "ClientError",
                retryable: false,
            },
            ImpactError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            ImpactError::Validation(_) => ErrorClassification {
                error_type: "ValidationError",
                retryable: false,
            },
            ImpactError::Pipeline(_) => ErrorClassification {
                error_type: "PipelineError",
                retryable: false,
            },
            ImpactError::Decode(_) => ErrorClassification {
                error_type: "DecodeError",
                retryable: false,
            },
            ImpactError::NoActiveJob => ErrorClassification {
                error_type: "NoActiveJobError",
                retryable: false,
            },
            ImpactError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
            },
            ImpactError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },
            ImpactError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = ImpactError::Api { status: 429, message: "slow down".into() };
        let class = err.classify();
        assert!(class.retryable);
        assert_eq!(class.error_type, "RateLimitError");
    }

    #[test]
    fn test_server_error_retryable() {
        let err = ImpactError::Api { status: 503, message: "unavailable".into() };
        let class = err.classify();
        assert!(class.retryable);
        assert_eq!(class.error_type, "ServerError");
    }

    #[test]
    fn test_client_error_not_retryable() {
        let err = ImpactError::Api { status: 404, message: "Session not found".into() };
        let class = err.classify();
        assert!(!class.retryable);
        assert_eq!(class.error_type, "ClientError");
    }

    #[test]
    fn test_network_error_retryable() {
        let err = ImpactError::Network("connection refused".into());
        assert!(err.classify().retryable);
    }

    #[test]
    fn test_timeout_retryable() {
        let err = ImpactError::Timeout("timed out".into());
        assert!(err.classify().retryable);
    }

    #[test]
    fn test_validation_not_retryable() {
        let err = ImpactError::Validation("too short".into());
        assert!(!err.classify().retryable);
    }

    #[test]
    fn test_pipeline_failure_not_retryable() {
        let err = ImpactError::Pipeline("agent crashed".into());
        assert!(!err.classify().retryable);
    }
}
