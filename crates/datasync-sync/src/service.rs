//! Remote dataset service interface.

use std::path::Path;

use datasync_core::Listing;

use crate::error::ServiceError;

/// Listing and upload operations of a dataset service.
///
/// Remote paths are `/`-separated and relative to the dataset root; the empty
/// string is the root itself.
pub trait DatasetService {
    /// Fetch the root listing of a dataset.
    ///
    /// `Ok(None)` means the dataset is not visible yet; freshly created
    /// datasets may take a while to propagate.
    fn get_contents(&self, dataset_id: &str) -> Result<Option<Listing>, ServiceError>;

    /// Upload one file into `remote_dir`, keeping its local name.
    fn put_file(
        &self,
        local_path: &Path,
        remote_dir: &str,
        dataset_id: &str,
        overwrite: bool,
    ) -> Result<(), ServiceError>;

    /// Upload a whole directory tree under `remote_parent`.
    fn put_directory(
        &self,
        local_path: &Path,
        remote_parent: &str,
        dataset_id: &str,
    ) -> Result<(), ServiceError>;
}

impl<T: DatasetService + ?Sized> DatasetService for &T {
    fn get_contents(&self, dataset_id: &str) -> Result<Option<Listing>, ServiceError> {
        (**self).get_contents(dataset_id)
    }

    fn put_file(
        &self,
        local_path: &Path,
        remote_dir: &str,
        dataset_id: &str,
        overwrite: bool,
    ) -> Result<(), ServiceError> {
        (**self).put_file(local_path, remote_dir, dataset_id, overwrite)
    }

    fn put_directory(
        &self,
        local_path: &Path,
        remote_parent: &str,
        dataset_id: &str,
    ) -> Result<(), ServiceError> {
        (**self).put_directory(local_path, remote_parent, dataset_id)
    }
}
