use super::OcsClient;
use crate::{DropError, Result};
use reqwest::Url;
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default)]
pub struct OcsClientBuilder {
    server_url: Option<String>,
    user: Option<String>,
    password: Option<String>,
    user_agent: Option<String>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl OcsClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn resolve_server_url(&self) -> Result<Url> {
        let raw = self.server_url.as_deref().unwrap_or_default().trim();
        if raw.is_empty() {
            return Err(DropError::Config("server url cannot be empty".to_string()));
        }

        let url = Url::parse(raw)
            .map_err(|error| DropError::Config(format!("invalid server url '{}': {}", raw, error)))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(DropError::Config(format!(
                    "unsupported server url scheme '{}': expected http | https",
                    other
                )));
            }
        }

        if url.cannot_be_a_base() {
            return Err(DropError::Config(format!(
                "server url '{}' cannot be used as a base url",
                raw
            )));
        }

        Ok(url)
    }

    fn resolve_user(&self) -> Result<String> {
        let user = self.user.as_deref().unwrap_or_default().trim().to_string();
        if user.is_empty() {
            return Err(DropError::Config("user cannot be empty".to_string()));
        }

        Ok(user)
    }

    pub fn build(&self) -> Result<OcsClient> {
        let server_url = self.resolve_server_url()?;
        let user = self.resolve_user()?;
        let password = self.password.clone().unwrap_or_default();

        let user_agent = self
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("sealdrop/{}", env!("CARGO_PKG_VERSION")));

        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT))
            .timeout(self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
            .user_agent(user_agent)
            .build()
            .map_err(|error| DropError::Config(format!("failed to build http client: {}", error)))?;

        Ok(OcsClient::new(client, server_url, user, password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_server_url() {
        let error = OcsClientBuilder::new().user("alice").build().unwrap_err();
        assert!(matches!(error, DropError::Config(_)));
    }

    #[test]
    fn test_build_rejects_non_http_scheme() {
        let error = OcsClientBuilder::new()
            .server_url("ftp://cloud.example.com")
            .user("alice")
            .build()
            .unwrap_err();
        assert!(error.to_string().contains("unsupported server url scheme"));
    }

    #[test]
    fn test_build_requires_user() {
        let error = OcsClientBuilder::new()
            .server_url("https://cloud.example.com")
            .user("  ")
            .build()
            .unwrap_err();
        assert!(error.to_string().contains("user cannot be empty"));
    }

    #[test]
    fn test_build_ok() {
        let client = OcsClientBuilder::new()
            .server_url("https://cloud.example.com/nextcloud")
            .user("alice")
            .password("app-password")
            .build()
            .unwrap();
        assert_eq!(client.user(), "alice");
    }
}
