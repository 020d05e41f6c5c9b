//! Sync driver and dataset services for datasync.
//!
//! A [`SyncSession`] owns a [`DatasetService`] and a [`SyncConfig`] and runs
//! one sync pass per call:
//!
//! 1. Fetch the remote root listing, retrying while the dataset is not yet
//!    visible.
//! 2. Check whether the local file or directory already exists remotely.
//! 3. Skip it, upload it whole, or diff the trees and upload only what
//!    changed.
//!
//! [`ObjectStore`] is a directory-backed, content-addressed implementation of
//! the service, and [`verify`] compares remote file digests with local ones.
//!
//! [`SyncConfig`]: datasync_core::SyncConfig

mod driver;
mod error;
mod listing;
mod operation;
mod service;
mod session;
mod store;
pub mod verify;

pub use driver::{SyncDriver, UploadPlan, plan_uploads};
pub use error::{ServiceError, SyncError, SyncWarning};
pub use listing::{ListingFetch, fetch_listing};
pub use operation::{SkippedUpload, UploadOperation};
pub use service::DatasetService;
pub use session::{SyncDecision, SyncReport, SyncSession};
pub use store::ObjectStore;
pub use verify::{HashPoll, HashService, HashVerdict};
