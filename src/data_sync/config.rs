use crate::utils::{MonitorError, config_loader};
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_PACKAGE: &str = "polymarket-pnl@v0.3.1";
pub const DEFAULT_MODULE: &str = "map_enhanced_pnl_with_neg_risk";
pub const DEFAULT_START_BLOCK: u64 = 60_000_000;
pub const DEFAULT_ENDPOINT: &str = "polygon.streamingfast.io:443";

/// Env var naming an optional TOML config file
pub const CONFIG_FILE_VAR: &str = "MONITOR_CONFIG";

/// Configuration for the block monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Upstream package identifier (name@version or path to an .spkg)
    pub package: String,
    /// Output module to stream
    pub module: String,
    /// First block to stream
    pub start_block: u64,
    /// Last block to stream; the upstream ends naturally after it
    pub stop_block: Option<u64>,
    /// Upstream gRPC endpoint
    pub endpoint: String,
    /// Path to the substreams CLI
    pub substreams_bin: String,
    /// Buffer size for the block channel between feed and consumer
    pub channel_buffer_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            package: DEFAULT_PACKAGE.to_string(),
            module: DEFAULT_MODULE.to_string(),
            start_block: DEFAULT_START_BLOCK,
            stop_block: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            substreams_bin: "substreams".to_string(),
            channel_buffer_size: 100,
        }
    }
}

/// Subscription parameters, frozen once the monitor starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub package: String,
    pub module: String,
    pub start_block: u64,
    pub stop_block: Option<u64>,
}

impl MonitorConfig {
    /// Load from the file named by `MONITOR_CONFIG` (if set), then apply env overrides
    pub async fn load() -> eyre::Result<Self> {
        let base = match std::env::var(CONFIG_FILE_VAR) {
            Ok(path) => Self::from_file(&path).await?,
            Err(_) => Self::default(),
        };

        let config = base.with_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file; keys left out keep their defaults
    pub async fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        config_loader::load_from_file::<Self>(path)
            .await
            .map_err(MonitorError::from)
            .wrap_err_with(|| format!("Failed to load {}", path.display()))
    }

    /// Apply overrides from a variable lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> eyre::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(package) = lookup("SUBSTREAMS_PACKAGE") {
            self.package = package;
        }

        if let Some(module) = lookup("SUBSTREAMS_MODULE") {
            self.module = module;
        }

        if let Some(start_block) = lookup("START_BLOCK") {
            self.start_block = parse_var("START_BLOCK", &start_block)?;
        }

        if let Some(stop_block) = lookup("STOP_BLOCK") {
            self.stop_block = Some(parse_var("STOP_BLOCK", &stop_block)?);
        }

        if let Some(endpoint) = lookup("SUBSTREAMS_ENDPOINT") {
            self.endpoint = endpoint;
        }

        if let Some(bin) = lookup("SUBSTREAMS_BIN") {
            self.substreams_bin = bin;
        }

        if let Some(buffer_size) = lookup("CHANNEL_BUFFER_SIZE") {
            self.channel_buffer_size = parse_var("CHANNEL_BUFFER_SIZE", &buffer_size)?;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.package.trim().is_empty() {
            return Err(MonitorError::InvalidConfig("package must not be empty".to_string()));
        }
        if self.module.trim().is_empty() {
            return Err(MonitorError::InvalidConfig("module must not be empty".to_string()));
        }
        if self.channel_buffer_size == 0 {
            return Err(MonitorError::InvalidConfig("channel_buffer_size must be positive".to_string()));
        }
        if let Some(stop_block) = self.stop_block {
            if stop_block < self.start_block {
                return Err(MonitorError::InvalidConfig(format!(
                    "stop_block {} is before start_block {}",
                    stop_block, self.start_block
                )));
            }
        }
        Ok(())
    }

    pub fn subscription(&self) -> SubscriptionRequest {
        SubscriptionRequest {
            package: self.package.clone(),
            module: self.module.clone(),
            start_block: self.start_block,
            stop_block: self.stop_block,
        }
    }
}

fn parse_var<T>(name: &str, raw: &str) -> eyre::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| eyre::eyre!("Invalid {}: {}", name, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.package, "polymarket-pnl@v0.3.1");
        assert_eq!(config.module, "map_enhanced_pnl_with_neg_risk");
        assert_eq!(config.start_block, 60_000_000);
        assert_eq!(config.stop_block, None);
        assert_eq!(config.channel_buffer_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let lookup = lookup_from(&[
            ("SUBSTREAMS_MODULE", "map_pure_dune_pnl"),
            ("START_BLOCK", " 50000000 "),
            ("STOP_BLOCK", "50000999"),
            ("CHANNEL_BUFFER_SIZE", "8"),
        ]);

        let config = MonitorConfig::default().with_overrides(lookup).unwrap();
        assert_eq!(config.package, DEFAULT_PACKAGE);
        assert_eq!(config.module, "map_pure_dune_pnl");
        assert_eq!(config.start_block, 50_000_000);
        assert_eq!(config.stop_block, Some(50_000_999));
        assert_eq!(config.channel_buffer_size, 8);
    }

    #[test]
    fn test_invalid_override() {
        let result = MonitorConfig::default().with_overrides(lookup_from(&[("START_BLOCK", "soon")]));
        assert!(result.unwrap_err().to_string().contains("START_BLOCK"));
    }

    #[test]
    fn test_validate() {
        let config = MonitorConfig { module: " ".to_string(), ..Default::default() };
        assert!(config.validate().is_err());

        let config = MonitorConfig { channel_buffer_size: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = MonitorConfig { start_block: 10, stop_block: Some(9), ..Default::default() };
        assert!(config.validate().is_err());

        let config = MonitorConfig { start_block: 10, stop_block: Some(10), ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let lookup = lookup_from(&[("MODULE", "map_risk_management")]);
        let config: MonitorConfig = config_loader::parse_expanded(
            "module = \"${MODULE}\"\nstart_block = 70000000\nstop_block = 70000100\n",
            lookup,
        )
        .unwrap();

        assert_eq!(config.module, "map_risk_management");
        assert_eq!(config.start_block, 70_000_000);
        assert_eq!(config.stop_block, Some(70_000_100));
        assert_eq!(config.package, DEFAULT_PACKAGE);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[tokio::test]
    async fn test_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "module = \"map_user_pnl\"\nchannel_buffer_size = 16").unwrap();

        let config = MonitorConfig::from_file(file.path()).await.unwrap();
        assert_eq!(config.module, "map_user_pnl");
        assert_eq!(config.channel_buffer_size, 16);
        assert_eq!(config.package, DEFAULT_PACKAGE);
    }

    #[tokio::test]
    async fn test_from_missing_file() {
        use crate::utils::LoadConfigError;

        let err = MonitorConfig::from_file("/nonexistent/monitor.toml").await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/monitor.toml"));
        assert!(matches!(
            err.downcast_ref::<MonitorError>(),
            Some(MonitorError::LoadConfig(LoadConfigError::IoError(_)))
        ));
    }

    #[test]
    fn test_subscription_request() {
        let config = MonitorConfig { stop_block: Some(60_000_010), ..Default::default() };
        let request = config.subscription();
        assert_eq!(request.package, config.package);
        assert_eq!(request.module, config.module);
        assert_eq!(request.start_block, 60_000_000);
        assert_eq!(request.stop_block, Some(60_000_010));
    }
}
