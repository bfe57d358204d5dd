pub mod archive;
pub mod attachments;
mod local;
pub mod render;
mod traits;

pub use archive::{ArchiveError, ArchiveImporter, TaskDocument};
pub use attachments::{AttachmentError, AttachmentStore, Download, Upload};
pub use local::LocalService;
pub use render::{PageRasterizer, RenderError, RenderPolicy};
pub use traits::{ArchiveFile, SavedTask, ServiceError, TaskService, UploadFailure};
