pub mod attachment;
pub mod category;
pub mod error;
pub mod file_name;
pub mod media;
pub mod tag;
pub mod task;

pub use attachment::Attachment;
pub use category::Category;
pub use error::DocketError;
pub use tag::Tag;
pub use task::{Task, TaskSort};
