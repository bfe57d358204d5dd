use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use docket_db::DbConfig;
use docket_service::render::PdfiumRasterizer;
use docket_service::RenderPolicy;
use docket_store::StoreConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "docket-server", about = "Docket task and attachment server")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "DOCKET_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(long, env = "DOCKET_PORT", default_value = "3710")]
    pub port: u16,

    /// SQLite database file
    #[arg(long, env = "DOCKET_DATABASE")]
    pub database: Option<String>,

    /// Directory attachment files are stored under
    #[arg(long, env = "DOCKET_STORAGE_ROOT")]
    pub storage_root: Option<String>,

    /// Resolution PDF pages are rendered at
    #[arg(long, env = "DOCKET_RENDER_DPI", default_value = "300")]
    pub render_dpi: u32,

    /// Directory holding the pdfium shared library, searched before the
    /// system library paths
    #[arg(long, env = "DOCKET_PDFIUM_DIR")]
    pub pdfium_dir: Option<PathBuf>,

    /// Reject PDF uploads whose pages cannot be rendered instead of keeping
    /// them without page images
    #[arg(long, env = "DOCKET_STRICT_RENDER", default_value_t = false)]
    pub strict_render: bool,

    /// Largest accepted request body, in megabytes
    #[arg(long, env = "DOCKET_MAX_UPLOAD_MB", default_value = "64")]
    pub max_upload_mb: usize,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            sqlite_path: self.database.clone(),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            storage_root: self.storage_root.clone(),
        }
    }

    pub fn render_policy(&self) -> RenderPolicy {
        if self.strict_render {
            RenderPolicy::Strict
        } else {
            RenderPolicy::Lenient
        }
    }

    pub fn rasterizer(&self) -> PdfiumRasterizer {
        let rasterizer = PdfiumRasterizer::new(self.render_dpi);
        match &self.pdfium_dir {
            Some(dir) => rasterizer.with_library_dir(dir),
            None => rasterizer,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
