use crate::utils::config_loader::LoadConfigError;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    // Upstream subscription
    #[error("failed to start upstream feed `{command}`: {source}")]
    FeedSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("upstream feed unavailable: {0}")]
    FeedUnavailable(String),

    // Configuration
    #[error(transparent)]
    LoadConfig(#[from] LoadConfigError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MonitorError::FeedSpawn {
            command: "substreams".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "failed to start upstream feed `substreams`: not found");

        let err = MonitorError::InvalidConfig("module must not be empty".to_string());
        assert_eq!(err.to_string(), "invalid configuration: module must not be empty");
    }
}
