use std::path::Path;
use std::str::FromStr;

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use crate::error::WorkerError;

/// Validated worker configuration.
///
/// The original daemon carried an untyped section/key map; here every
/// consumed key is a typed field, validated once at startup.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub redis: RedisConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// `host:port`, or an absolute path to a unix socket.
    pub address: String,
    pub password: Option<String>,
    pub database: i64,
}

impl RedisConfig {
    pub fn new(
        address: String,
        password: Option<String>,
        database: i64,
    ) -> Result<Self, WorkerError> {
        validate_address(&address)?;
        if database < 0 {
            return Err(WorkerError::Config(format!(
                "bad Redis database: {}",
                database
            )));
        }
        Ok(Self {
            address,
            password,
            database,
        })
    }

    /// Build the client connection parameters for this configuration.
    pub fn connection_info(&self) -> ConnectionInfo {
        let addr = match parse_host_port(&self.address) {
            Some((host, port)) => ConnectionAddr::Tcp(host.to_string(), port),
            None => ConnectionAddr::Unix(self.address.clone().into()),
        };

        ConnectionInfo {
            addr,
            redis: RedisConnectionInfo {
                db: self.database,
                password: self.password.clone(),
                ..Default::default()
            },
        }
    }
}

fn parse_host_port(address: &str) -> Option<(&str, u16)> {
    if Path::new(address).is_absolute() {
        return None;
    }
    let (host, port) = address.rsplit_once(':')?;
    Some((host, port.parse().ok()?))
}

/// A Redis server address is either an absolute unix socket path or
/// `host:port` with a numeric port.
fn validate_address(address: &str) -> Result<(), WorkerError> {
    if Path::new(address).is_absolute() {
        return Ok(());
    }

    match parse_host_port(address) {
        Some((host, _)) if !host.is_empty() => Ok(()),
        _ => Err(WorkerError::Config(format!(
            "bad Redis address: {}",
            address
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn new(level: &str, format: &str) -> Result<Self, WorkerError> {
        tracing::Level::from_str(level)
            .map_err(|_| WorkerError::Config(format!("bad log level: {}", level)))?;

        Ok(Self {
            level: level.to_string(),
            format: format.parse()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(WorkerError::Config(format!("bad log format: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_address_accepted() {
        let cfg = RedisConfig::new("127.0.0.1:6379".to_string(), None, 0).unwrap();
        assert!(matches!(
            cfg.connection_info().addr,
            ConnectionAddr::Tcp(ref host, 6379) if host == "127.0.0.1"
        ));
    }

    #[test]
    fn unix_socket_address_accepted() {
        let cfg = RedisConfig::new("/var/run/redis.sock".to_string(), None, 2).unwrap();
        let info = cfg.connection_info();
        assert!(matches!(info.addr, ConnectionAddr::Unix(_)));
        assert_eq!(info.redis.db, 2);
    }

    #[test]
    fn address_without_port_rejected() {
        assert!(RedisConfig::new("localhost".to_string(), None, 0).is_err());
    }

    #[test]
    fn non_numeric_port_rejected() {
        assert!(RedisConfig::new("localhost:redis".to_string(), None, 0).is_err());
    }

    #[test]
    fn negative_database_rejected() {
        assert!(RedisConfig::new("127.0.0.1:6379".to_string(), None, -1).is_err());
    }

    #[test]
    fn log_settings_validated() {
        assert!(LogConfig::new("info", "text").is_ok());
        assert!(LogConfig::new("verbose", "text").is_err());
        assert!(LogConfig::new("info", "xml").is_err());
    }
}
