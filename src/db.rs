use bson::doc;
use mongodb::{
    options::{ClientOptions, Tls, TlsOptions},
    Client, Collection,
};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::config::DatabaseConfig;
use crate::errors::UserError;

static DATABASE: OnceCell<Database> = OnceCell::const_new();

/// Handle to the document database.
///
/// A `Disconnected` handle keeps the process alive with database-backed
/// features turned off; every collection lookup on it fails.
#[derive(Clone, Debug)]
pub enum Database {
    Connected {
        client: Client,
        db: mongodb::Database,
    },
    Disconnected {
        reason: String,
    },
}

impl Database {
    /// Connect and ping, failing fast on any error.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, UserError> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.app_name = Some("medassist".into());
        options.server_selection_timeout = Some(config.timeout());
        options.connect_timeout = Some(config.timeout());

        // TLS is on unless the URI turns it off; a configured CA bundle
        // replaces the driver's default roots.
        if let Some(Tls::Enabled(tls)) = options.tls.as_mut() {
            if config.tls_ca_file.is_some() {
                tls.ca_file_path = config.tls_ca_file.clone();
            }
        } else if options.tls.is_none() {
            let mut tls = TlsOptions::default();
            tls.ca_file_path = config.tls_ca_file.clone();
            options.tls = Some(Tls::Enabled(tls));
        }

        let client = Client::with_options(options)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        let db = client.database(&config.name);
        info!(db = %config.name, "mongodb connected");
        Ok(Self::Connected { client, db })
    }

    /// Process-wide handle. Connects on the first call only; a failed
    /// connection is logged and yields a `Disconnected` handle.
    pub async fn acquire(config: &DatabaseConfig) -> &'static Database {
        DATABASE
            .get_or_init(|| async {
                match Self::connect(config).await {
                    Ok(db) => db,
                    Err(e) => {
                        error!(error = %e, "mongodb connection error");
                        warn!("continuing without database; database features are disabled");
                        Self::Disconnected {
                            reason: e.to_string(),
                        }
                    }
                }
            })
            .await
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn collection<T>(&self, name: &str) -> Result<Collection<T>, UserError>
    where
        T: Send + Sync,
    {
        match self {
            Self::Connected { db, .. } => Ok(db.collection::<T>(name)),
            Self::Disconnected { .. } => Err(UserError::NotConnected),
        }
    }

    pub fn client(&self) -> Option<&Client> {
        match self {
            Self::Connected { client, .. } => Some(client),
            Self::Disconnected { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> DatabaseConfig {
        DatabaseConfig {
            uri: "mongodb://127.0.0.1:1/?directConnection=true".into(),
            name: "medassist_test".into(),
            tls_ca_file: None,
            timeout_ms: 200,
        }
    }

    #[test]
    fn disconnected_handle_refuses_collections() {
        let db = Database::Disconnected {
            reason: "offline".into(),
        };
        assert!(!db.is_connected());
        assert!(db.client().is_none());
        let err = db.collection::<bson::Document>("users").unwrap_err();
        assert!(matches!(err, UserError::NotConnected));
    }

    #[tokio::test]
    async fn connect_fails_fast_against_unreachable_server() {
        let err = Database::connect(&unreachable_config()).await.unwrap_err();
        assert!(matches!(err, UserError::Storage(_)));
    }

    #[tokio::test]
    async fn acquire_degrades_and_returns_the_same_handle() {
        let first = Database::acquire(&unreachable_config()).await;
        assert!(!first.is_connected());

        let second = Database::acquire(&unreachable_config()).await;
        assert!(std::ptr::eq(first, second));
    }
}
