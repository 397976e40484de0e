//! Human-readable status lines on stdout, one per outcome. Pure reporting;
//! retries are not triggered from here.

use std::path::Path;

/// Verify the output file landed on disk and emit the status line for this
/// item. `fetch_succeeded` is whether the fetch/write step itself reported
/// success. Returns true only when the item genuinely completed.
pub fn item_outcome(path: &Path, fetch_succeeded: bool) -> bool {
    if fetch_succeeded && path.exists() {
        println!("Saved {}", path.display());
        true
    } else {
        println!(
            "Error: {} was not written; check network connectivity and the asset signing service",
            path.display()
        );
        false
    }
}

/// Emitted when an item is dropped before any fetch was attempted, e.g. the
/// requested band is absent from its asset mapping.
pub fn item_skipped(item_id: &str, reason: &dyn std::fmt::Display) {
    println!("Skipping item {}: {}", item_id, reason);
}

/// The dedicated message for a search that matched nothing.
pub fn no_matching_imagery() {
    println!("No matching imagery found for the given search criteria");
}

/// End-of-batch summary line.
pub fn batch_summary(completed: usize, failed: usize) {
    println!("Done: {} file(s) written, {} failed", completed, failed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_item_outcome_requires_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("band.tif");
        assert!(!item_outcome(&path, true));

        std::fs::write(&path, b"not really a tiff").unwrap();
        assert!(item_outcome(&path, true));
    }

    #[test]
    fn test_item_outcome_failed_fetch_is_reported_even_if_file_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("band.tif");
        std::fs::write(&path, b"stale").unwrap();
        assert!(!item_outcome(&path, false));
    }
}
