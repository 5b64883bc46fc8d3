//! Client configuration with environment overrides.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ZypConfig {
    /// REST endpoint root, including the API version segment.
    pub api_base_url: String,
    /// Realtime notification socket endpoint.
    pub ws_url: String,
    /// Domain appended to bare usernames passed to `login_by_email`.
    pub email_domain: String,
    /// Keepalive ping period for the realtime connection.
    pub keepalive_interval: Duration,
    /// Delay before the raw socket retries a dropped connection.
    pub reconnect_delay: Duration,
}

impl Default for ZypConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://beta.conversepoint.com:19690/v1".to_string(),
            ws_url: "ws://beta.conversepoint.com:19691".to_string(),
            email_domain: "zyphub.lib".to_string(),
            keepalive_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

impl ZypConfig {
    /// Defaults, with `ZYP_API_URL`, `ZYP_WS_URL`, and `ZYP_EMAIL_DOMAIN`
    /// taken from the environment when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("ZYP_API_URL") {
            config.api_base_url = url;
        }
        if let Ok(url) = std::env::var("ZYP_WS_URL") {
            config.ws_url = url;
        }
        if let Ok(domain) = std::env::var("ZYP_EMAIL_DOMAIN") {
            config.email_domain = domain;
        }
        config
    }
}
