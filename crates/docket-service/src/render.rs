//! PDF page rasterization.
//!
//! The attachment store only needs "PDF bytes in, PNG pages out"; the
//! pdfium-backed implementation lives behind the `pdfium` feature so the
//! rest of the crate builds and tests without the native library.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("pdfium unavailable: {0}")]
    Unavailable(String),

    #[error("could not load pdf: {0}")]
    Load(String),

    #[error("page {page}: {detail}")]
    Page { page: usize, detail: String },

    #[error("png encoding failed: {0}")]
    Encode(String),
}

/// Turns a PDF document into one PNG buffer per page, in page order.
///
/// Implementations are synchronous and CPU bound; callers run them on the
/// blocking pool.
pub trait PageRasterizer: Send + Sync {
    fn render(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, RenderError>;
}

/// What to do with a PDF whose pages could not be rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderPolicy {
    /// Fail the upload.
    Strict,
    /// Keep the PDF record with no page images and log a warning.
    #[default]
    Lenient,
}

pub const DEFAULT_DPI: u32 = 300;

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRasterizer;

#[cfg(feature = "pdfium")]
mod pdfium {
    use std::io::Cursor;
    use std::path::PathBuf;

    use pdfium_render::prelude::*;
    use tracing::debug;

    use super::{PageRasterizer, RenderError, DEFAULT_DPI};

    /// Points per inch in PDF user space.
    const PDF_POINTS_PER_INCH: f32 = 72.0;

    /// Renders pages through the pdfium C library.
    ///
    /// The library is bound per call: pdfium keeps thread-local state and
    /// every render runs on whichever blocking thread picked it up.
    #[derive(Debug, Clone)]
    pub struct PdfiumRasterizer {
        dpi: u32,
        library_dir: Option<PathBuf>,
    }

    impl Default for PdfiumRasterizer {
        fn default() -> Self {
            Self::new(DEFAULT_DPI)
        }
    }

    impl PdfiumRasterizer {
        pub fn new(dpi: u32) -> Self {
            Self {
                dpi: dpi.max(1),
                library_dir: None,
            }
        }

        /// Look for the pdfium shared library in `dir` before the system paths.
        pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
            self.library_dir = Some(dir.into());
            self
        }

        pub fn dpi(&self) -> u32 {
            self.dpi
        }

        fn bind(&self) -> Result<Pdfium, RenderError> {
            let bindings = match &self.library_dir {
                Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                    .or_else(|_| Pdfium::bind_to_system_library()),
                None => Pdfium::bind_to_system_library(),
            }
            .map_err(|e| RenderError::Unavailable(format!("{e:?}")))?;
            Ok(Pdfium::new(bindings))
        }
    }

    impl PageRasterizer for PdfiumRasterizer {
        fn render(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, RenderError> {
            let pdfium = self.bind()?;
            let document = pdfium
                .load_pdf_from_byte_slice(pdf, None)
                .map_err(|e| RenderError::Load(format!("{e:?}")))?;

            let config = PdfRenderConfig::new()
                .scale_page_by_factor(self.dpi as f32 / PDF_POINTS_PER_INCH);

            let mut pages = Vec::new();
            for (index, page) in document.pages().iter().enumerate() {
                let bitmap = page
                    .render_with_config(&config)
                    .map_err(|e| RenderError::Page {
                        page: index,
                        detail: format!("{e:?}"),
                    })?;
                let rendered = bitmap.as_image();
                let mut png = Vec::new();
                rendered
                    .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                    .map_err(|e| RenderError::Encode(e.to_string()))?;
                debug!(
                    page = index,
                    width = rendered.width(),
                    height = rendered.height(),
                    "rendered pdf page"
                );
                pages.push(png);
            }
            Ok(pages)
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use mock::MockRasterizer;

#[cfg(any(test, feature = "test-helpers"))]
mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{PageRasterizer, RenderError};

    /// Rasterizer with a canned outcome, for tests.
    #[derive(Debug, Default)]
    pub struct MockRasterizer {
        pages: Option<usize>,
        calls: AtomicUsize,
    }

    impl MockRasterizer {
        /// Every document "has" `count` pages. Page `i` renders to a small
        /// buffer starting with the PNG signature and ending in `page-i`.
        pub fn with_pages(count: usize) -> Self {
            Self {
                pages: Some(count),
                calls: AtomicUsize::new(0),
            }
        }

        /// Every render fails.
        pub fn failing() -> Self {
            Self {
                pages: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn page_bytes(index: usize) -> Vec<u8> {
            let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
            bytes.extend_from_slice(format!("page-{index}").as_bytes());
            bytes
        }
    }

    impl PageRasterizer for MockRasterizer {
        fn render(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !pdf.starts_with(b"%PDF") {
                return Err(RenderError::Load("missing %PDF header".into()));
            }
            match self.pages {
                Some(count) => Ok((0..count).map(Self::page_bytes).collect()),
                None => Err(RenderError::Page {
                    page: 0,
                    detail: "mock failure".into(),
                }),
            }
        }
    }
}
