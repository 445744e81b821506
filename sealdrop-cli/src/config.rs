use sealdrop_core::{DropError, OcsClientBuilder, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub account: AccountConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Account the drops are published with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub server_url: String,
    pub user: String,
    /// App password; prefer `SEALDROP_ACCOUNT__PASSWORD` over the file.
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("SEALDROP").separator("__"))
            .build()
            .map_err(|e| DropError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| DropError::Config(e.to_string()))?;

        Ok(config)
    }

    pub fn client_builder(&self) -> OcsClientBuilder {
        let mut builder = OcsClientBuilder::new()
            .server_url(self.account.server_url.clone())
            .user(self.account.user.clone())
            .password(self.account.password.clone().unwrap_or_default())
            .connect_timeout(Duration::from_secs(self.transport.connect_timeout_secs))
            .request_timeout(Duration::from_secs(self.transport.request_timeout_secs));

        if let Some(user_agent) = &self.transport.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        builder
    }
}
