//! Existence checks and recursive tree diffing for datasync.
//!
//! Two levels of comparison are provided:
//!
//! 1. [`check_file`] / [`check_directory`]: a cheap test of whether a single
//!    top-level item already exists in a listing with a matching size.
//! 2. [`diff`]: a full recursive comparison of a remote listing against a
//!    local tree, classifying every entry as missing locally, extra locally
//!    or mismatched.
//!
//! A remote size that is unknown never confirms a match at either level.

mod checker;
mod differ;
mod result;

pub use checker::{MatchOutcome, check_directory, check_file};
pub use differ::{diff, diff_at};
pub use result::{DiffResult, DiffWarning, ExtraEntry, Mismatch, MismatchKind, MissingEntry, Side};
