use anyhow::{Context, Result};

use crate::auth::jwt::DEFAULT_TTL_MINS;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub server_host: String,
    pub server_port: u16,
    /// HS256 signing key. When absent a random key is generated at startup
    /// and tokens do not survive a restart.
    pub jwt_secret: Option<String>,
    /// Access token lifetime in minutes.
    pub access_token_expire_minutes: i64,
    /// Accept the first reading of a previously unseen server.
    pub auto_register_servers: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key).with_context(|| format!("missing required env var: {key}"))
        };
        let optional =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        let access_token_expire_minutes: i64 =
            optional("ACCESS_TOKEN_EXPIRE_MINUTES", &DEFAULT_TTL_MINS.to_string())
                .parse()
                .context("ACCESS_TOKEN_EXPIRE_MINUTES must be an integer")?;
        anyhow::ensure!(
            access_token_expire_minutes > 0,
            "ACCESS_TOKEN_EXPIRE_MINUTES must be positive"
        );

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: optional("DATABASE_MAX_CONNECTIONS", "10")
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            jwt_secret: lookup("JWT_SECRET").filter(|s| !s.is_empty()),
            access_token_expire_minutes,
            auto_register_servers: optional("AUTO_REGISTER_SERVERS", "false")
                .parse()
                .context("AUTO_REGISTER_SERVERS must be true or false")?,
        })
    }
}
