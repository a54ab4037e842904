use medassist::{db::Database, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let state = AppState::init().await?;

    match &state.db {
        Database::Connected { .. } => {
            tracing::info!(db = %state.config.database.name, "database ready");
        }
        Database::Disconnected { reason } => {
            tracing::warn!(%reason, "database unavailable; account features disabled");
        }
    }

    Ok(())
}
