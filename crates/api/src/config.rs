use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::auth::jwt::JwtConfig;

/// Origin the web client is served from during local development.
const DEV_CLIENT_ORIGIN: &str = "http://localhost:5173";

/// Runtime settings for the skillforge API server.
///
/// Every field except the JWT secret has a development default, so a bare
/// `.env` with `DATABASE_URL` and `JWT_SECRET` is enough to start locally.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS. Read from the comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// Requests running longer than this are answered with 408.
    pub request_timeout_secs: u64,
    /// Grace period for the event logger to drain after the listener closes.
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    ///
    /// JWT settings come from [`JwtConfig::from_env`].
    ///
    /// # Panics
    ///
    /// Panics when a numeric variable is set but does not parse.
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0".to_string()),
            port: env_or("PORT", 3000),
            cors_origins: split_origins(&env_or("CORS_ORIGINS", DEV_CLIENT_ORIGIN.to_string())),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            jwt: JwtConfig::from_env(),
        }
    }

    /// Socket address the listener binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let ip: IpAddr = self.host.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Parse `key` from the environment, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str, port: u16) -> ServerConfig {
        ServerConfig {
            host: host.to_string(),
            port,
            cors_origins: vec![],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
            jwt: JwtConfig {
                secret: "secret".to_string(),
                access_token_expiry_mins: 60,
            },
        }
    }

    #[test]
    fn origins_are_trimmed_and_blanks_dropped() {
        assert_eq!(
            split_origins(" http://a.test , ,http://b.test,"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn unset_variable_uses_default() {
        let port: u16 = env_or("SKILLFORGE_TEST_SURELY_UNSET_PORT", 4321);
        assert_eq!(port, 4321);
    }

    #[test]
    fn bind_addr_combines_host_and_port() {
        let addr = config("127.0.0.1", 8080).bind_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn bind_addr_rejects_hostnames() {
        assert!(config("localhost", 8080).bind_addr().is_err());
    }
}
