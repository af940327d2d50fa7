//! Mtime-based freshness detection for generated files.
//!
//! Every per-file conversion (fonts, webp, images, assets) is guarded by the
//! same rule: the destination is fresh when it exists and its modification
//! time is not older than the source's. A fresh destination is skipped.

use std::path::Path;
use std::time::SystemTime;

/// Get the modification time of a file
///
/// Returns `None` if the file doesn't exist or mtime cannot be read
pub fn get_mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// Check if `dest` is up to date with respect to `source`.
///
/// Returns `true` when `dest` exists and is newer than or equal to `source`.
/// A missing source never counts as fresh, so the caller reports the error.
pub fn is_fresh(source: &Path, dest: &Path) -> bool {
    let (Some(src_time), Some(dest_time)) = (get_mtime(source), get_mtime(dest)) else {
        return false;
    };
    dest_time >= src_time
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_missing_dest_is_stale() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.ttf");
        fs::write(&src, "x").unwrap();
        assert!(!is_fresh(&src, &dir.path().join("a.woff2")));
    }

    #[test]
    fn test_missing_source_is_stale() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("a.woff2");
        fs::write(&dest, "x").unwrap();
        assert!(!is_fresh(&dir.path().join("a.ttf"), &dest));
    }

    #[test]
    fn test_source_newer_is_stale() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.ttf");
        let dest = dir.path().join("a.woff2");
        fs::write(&src, "x").unwrap();
        fs::write(&dest, "y").unwrap();

        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        set_mtime(&dest, base);
        set_mtime(&src, base + Duration::from_secs(5));

        assert!(!is_fresh(&src, &dest));
    }

    #[test]
    fn test_equal_or_older_source_is_fresh() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.ttf");
        let dest = dir.path().join("a.woff2");
        fs::write(&src, "x").unwrap();
        fs::write(&dest, "y").unwrap();

        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        set_mtime(&src, base);
        set_mtime(&dest, base);
        assert!(is_fresh(&src, &dest));

        set_mtime(&dest, base + Duration::from_secs(5));
        assert!(is_fresh(&src, &dest));
    }
}
