//! Services: reversible store recovery and block-log repair.

pub mod block_log;
pub mod recovery;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Sibling path `<dir>-<timestamp>` used for backups.
///
/// Returns `None` when `dir` has no usable final component.
pub(crate) fn timestamped_sibling(dir: &Path, now: DateTime<Utc>) -> Option<PathBuf> {
    let name = dir.file_name()?.to_str()?;
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    let stamp = now.format("%Y-%m-%dT%H:%M:%S%.3f");
    Some(dir.with_file_name(format!("{name}-{stamp}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamped_sibling() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 15, 2).unwrap();
        let path = timestamped_sibling(Path::new("/data/blocks/reversible"), now).unwrap();
        assert_eq!(
            path,
            PathBuf::from("/data/blocks/reversible-2026-10-18T09:15:02.000")
        );
    }

    #[test]
    fn test_timestamped_sibling_rejects_dot() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 15, 2).unwrap();
        assert!(timestamped_sibling(Path::new("/"), now).is_none());
    }
}
