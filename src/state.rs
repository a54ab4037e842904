use crate::config::{AppConfig, DatabaseConfig};
use crate::db::Database;
use crate::users::{MemoryUserStore, MongoUserStore, UserStore, Users};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Database,
    pub users: Users,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = Database::acquire(&config.database).await;

        let store = MongoUserStore::new(db.clone());
        if db.is_connected() {
            if let Err(e) = store.init().await {
                tracing::warn!(error = %e, "index creation failed; continuing");
            }
        }

        Ok(Self {
            config,
            db: db.clone(),
            users: Users::new(Arc::new(store) as Arc<dyn UserStore>),
        })
    }

    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database: DatabaseConfig {
                uri: "mongodb://localhost:27017".into(),
                name: "medassist_test".into(),
                tls_ca_file: None,
                timeout_ms: 1_000,
            },
        });
        let store = Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>;
        Self {
            config,
            db: Database::Disconnected {
                reason: "in-memory user store".into(),
            },
            users: Users::new(store),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::NewUser;

    #[tokio::test]
    async fn fake_state_serves_users_from_memory() {
        let state = AppState::fake();
        state
            .users
            .create_user(NewUser::with_password("a@x.com", "Alice", "pw1"))
            .await
            .expect("create");

        assert!(!state.db.is_connected());
        let cloned = state.clone();
        assert!(cloned
            .users
            .verify_password("a@x.com", "pw1")
            .await
            .expect("verify"));
    }
}
