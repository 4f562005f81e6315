//! Admin-side tooling: batch image upload through the proxy, with a manual
//! fallback directory for anything the proxy could not take.

mod fallback;
mod upload;

pub use fallback::ManualFallback;
pub use upload::{
    BatchReport, SkipReason, Skipped, UploadDriver, UploadError, UploadFile, UploadOutcome,
    UploadStatus,
};
