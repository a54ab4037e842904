use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub name: String,
    pub tls_ca_file: Option<PathBuf>,
    pub timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database = DatabaseConfig {
            uri: std::env::var("MONGODB_URI")?,
            name: std::env::var("MONGODB_DB_NAME").unwrap_or_else(|_| "medassist".into()),
            tls_ca_file: std::env::var("MONGODB_TLS_CA_FILE")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            timeout_ms: std::env::var("MONGODB_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
        };
        Ok(Self { database })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_expressed_in_millis() {
        let cfg = DatabaseConfig {
            uri: "mongodb://localhost:27017".into(),
            name: "medassist".into(),
            tls_ca_file: None,
            timeout_ms: 1500,
        };
        assert_eq!(cfg.timeout(), Duration::from_millis(1500));
    }
}
