use std::sync::Arc;

use tracing::error;

use backstage_db::Database;
use backstage_gateway::connection::GatewayContext;
use backstage_gateway::dispatcher::Dispatcher;
use backstage_storage::Storage;

use crate::error::{AppError, AppResult};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub storage: Storage,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    pub max_upload_bytes: usize,
}

impl AppStateInner {
    /// Run a database call on the blocking pool.
    pub async fn db<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                AppError::Internal(e.to_string())
            })?
            .map_err(AppError::Remote)
    }

    pub fn gateway_context(&self) -> GatewayContext {
        GatewayContext {
            dispatcher: self.dispatcher.clone(),
            db: self.db.clone(),
            jwt_secret: self.jwt_secret.clone(),
        }
    }

    pub fn max_upload_mb(&self) -> usize {
        self.max_upload_bytes / (1024 * 1024)
    }
}
