//! Service layer separating byte-level I/O from session logic

pub mod io;

pub use io::{ImageIOService, DOWNLOAD_MIME_TYPE, SUPPORTED_UPLOAD_FORMATS};
