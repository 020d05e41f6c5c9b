//! Polling for a dataset listing that may not be visible yet.

use std::time::Duration;

use tracing::{debug, warn};

use datasync_core::ContentEntry;

use crate::service::DatasetService;

/// Outcome of fetching a root listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFetch {
    /// Validated root entries (empty when unavailable).
    pub entries: Vec<ContentEntry>,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Whether the service ever returned a listing.
    pub available: bool,
}

/// Fetch the root listing of `dataset_id`, retrying with a fixed delay.
///
/// A `None` response and a service error each consume one attempt. When all
/// attempts are used up the listing is treated as empty.
pub fn fetch_listing<S: DatasetService + ?Sized>(
    service: &S,
    dataset_id: &str,
    max_attempts: u32,
    delay: Duration,
) -> ListingFetch {
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match service.get_contents(dataset_id) {
            Ok(Some(listing)) => {
                let entries = listing.into_entries();
                debug!(dataset_id, attempt, entries = entries.len(), "listing fetched");
                return ListingFetch {
                    entries,
                    attempts: attempt,
                    available: true,
                };
            }
            Ok(None) => {
                debug!(dataset_id, attempt, max_attempts, "listing not visible yet");
            }
            Err(err) => {
                warn!(dataset_id, attempt, max_attempts, error = %err, "listing request failed");
            }
        }

        if attempt < max_attempts {
            std::thread::sleep(delay);
        }
    }

    warn!(
        dataset_id,
        attempts = max_attempts,
        "listing unavailable, proceeding with an empty remote tree"
    );
    ListingFetch {
        entries: Vec::new(),
        attempts: max_attempts,
        available: false,
    }
}
