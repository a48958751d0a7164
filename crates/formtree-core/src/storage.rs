use crate::{error::EngineError, value::FileUpload};

///
/// BlobStorage
///
/// The file-persistence seam. Fields validate extensions before calling
/// `store`; the returned path is what gets written onto the record and must
/// be usable with `url` later.
///

pub trait BlobStorage {
    /// Persist an upload under `dir` on `disk`, returning the stored path.
    /// `keep_name` asks for the submitted file name; otherwise the storage
    /// picks a collision-free one.
    fn store(
        &self,
        upload: &FileUpload,
        dir: &str,
        disk: &str,
        keep_name: bool,
    ) -> Result<String, EngineError>;

    /// Public URL for a previously stored path.
    fn url(&self, disk: &str, path: &str) -> Result<String, EngineError>;
}
