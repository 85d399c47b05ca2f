use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for one ledger node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Human-readable node name, used in logs
    pub name: String,
    /// How long a session waits for the counterparty's next message
    pub session_timeout_secs: u64,
    /// How long an acceptor waits for the finalised transition after signing
    pub finality_wait_secs: u64,
    /// Upper bound on ancestor transitions fetched by one resolution
    pub max_dependencies: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "node".to_string(),
            session_timeout_secs: 30,
            finality_wait_secs: 30,
            max_dependencies: 1000,
        }
    }
}

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_session_timeout(mut self, secs: u64) -> Self {
        self.session_timeout_secs = secs;
        self
    }

    pub fn with_finality_wait(mut self, secs: u64) -> Self {
        self.finality_wait_secs = secs;
        self
    }

    pub fn with_max_dependencies(mut self, max: usize) -> Self {
        self.max_dependencies = max;
        self
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn finality_wait(&self) -> Duration {
        Duration::from_secs(self.finality_wait_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig("name cannot be empty".to_string()));
        }
        if self.session_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "session_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.finality_wait_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "finality_wait_secs must be > 0".to_string(),
            ));
        }
        if self.max_dependencies == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_dependencies cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}
