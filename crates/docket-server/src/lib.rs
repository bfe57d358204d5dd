pub mod config;
mod routes;
#[cfg(feature = "test-helpers")]
pub mod test_helpers;

use std::sync::Arc;

use anyhow::Result;
use docket_db::SqliteDatabase;
use docket_service::LocalService;
use docket_store::LocalStore;
use tokio::net::TcpListener;
use tracing::info;

use config::ServerConfig;
pub use routes::{build_router, AppState, InnerAppState};

/// Open the record store and storage root named by `config` and wire up
/// the service behind the routes.
pub fn build_state(config: &ServerConfig) -> Result<AppState> {
    let db = Arc::new(SqliteDatabase::open(&config.db_config())?);
    let store = Arc::new(LocalStore::from_config(&config.store_config())?);
    info!(storage_root = %store.root().display(), "attachment storage ready");
    if let Some(dir) = &config.pdfium_dir {
        info!(pdfium_dir = %dir.display(), "looking for pdfium in configured directory first");
    }
    let rasterizer = Arc::new(config.rasterizer());
    let service = LocalService::new(db, store, rasterizer, config.render_policy());
    Ok(Arc::new(InnerAppState {
        service,
        max_upload_bytes: config.max_upload_bytes(),
    }))
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = routes::build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
