use std::sync::Arc;

use tracing::error;

use atlas_db::Database;

use crate::error::ApiError;
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub storage: Storage,
    pub jwt_secret: String,
    pub token_days: i64,
}

/// Run blocking DB work off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::from)
}
