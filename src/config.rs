//! Service configuration parsed from environment variables.

use std::net::SocketAddr;

use crate::protocol::MessagePolicy;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_WS_OUTBOUND_BUFFER: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {var}")]
    Missing { var: &'static str },
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub message_policy: MessagePolicy,
    pub ws_outbound_buffer: usize,
}

impl AppConfig {
    /// Build typed config from the process environment.
    ///
    /// Required:
    /// - `JWT_SECRET`: HS256 key shared with the account service
    ///
    /// Optional:
    /// - `HOST`: default `0.0.0.0`
    /// - `PORT`: default 3000
    /// - `MESSAGE_TYPE_POLICY`: `strict` (default) or `lenient`
    /// - `WS_OUTBOUND_BUFFER`: queued messages per connection, default 256
    ///
    /// # Errors
    ///
    /// Returns an error if `JWT_SECRET` is missing or any value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing { var: "JWT_SECRET" })?;

        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let port = parse_or("PORT", lookup("PORT"), DEFAULT_PORT)?;
        let ws_outbound_buffer = parse_or("WS_OUTBOUND_BUFFER", lookup("WS_OUTBOUND_BUFFER"), DEFAULT_WS_OUTBOUND_BUFFER)?;
        if ws_outbound_buffer == 0 {
            return Err(ConfigError::Invalid { var: "WS_OUTBOUND_BUFFER", message: "must be at least 1".into() });
        }

        let message_policy = match lookup("MESSAGE_TYPE_POLICY") {
            Some(raw) => raw
                .parse::<MessagePolicy>()
                .map_err(|message| ConfigError::Invalid { var: "MESSAGE_TYPE_POLICY", message })?,
            None => MessagePolicy::default(),
        };

        Ok(Self { host, port, jwt_secret, message_policy, ws_outbound_buffer })
    }

    /// Socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not a valid IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid { var: "HOST", message: e.to_string() })
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::Invalid { var, message: e.to_string() }),
        None => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
