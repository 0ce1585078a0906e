//! Serial device discovery on POSIX systems.
//!
//! USB sensor boards show up as CDC-ACM (`ttyACM*`) or USB-serial bridge
//! (`ttyUSB*`) character devices under `/dev`. Discovery keeps directory
//! order; the caller simply tries the first entry.
//!
//! ## Example
//!
//! ```rust
//! use capserial::detect::filter_candidates;
//!
//! let names = filter_candidates(["ttyACM0", "ttyUSB1", "video0", "ttyACM2"]);
//! assert_eq!(names, ["ttyACM0", "ttyUSB1", "ttyACM2"]);
//! ```

use {
    crate::error::Result,
    log::{debug, trace},
    std::{
        fs, io,
        path::{Path, PathBuf},
    },
};

/// Directory holding device nodes.
pub const DEVICE_DIR: &str = "/dev";

/// File name prefixes of USB-ACM and USB-serial character devices.
pub const DEVICE_PREFIXES: [&str; 2] = ["ttyACM", "ttyUSB"];

/// Check whether a device file name looks like a sensor board.
pub fn is_candidate(file_name: &str) -> bool {
    DEVICE_PREFIXES
        .iter()
        .any(|prefix| file_name.starts_with(prefix))
}

/// Keep candidate names, preserving their order.
pub fn filter_candidates<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter(|name| is_candidate(name.as_ref()))
        .map(|name| {
            name.as_ref()
                .to_string()
        })
        .collect()
}

/// List candidate devices in `dir` as full paths, in directory order.
///
/// Only failing to open `dir` is an error. Entries that cannot be read are
/// skipped.
pub fn scan_dir(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir)?.map(|entry| entry.map(|e| e.path()));
    Ok(collect_candidates(entries))
}

fn collect_candidates<I>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
{
    let mut devices = Vec::new();

    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                debug!("Skipping unreadable directory entry: {e}");
                continue;
            },
        };
        let Some(name) = path
            .file_name()
            .and_then(|n| n.to_str())
        else {
            continue;
        };

        if is_candidate(name) {
            trace!("Found serial device {}", path.display());
            devices.push(
                path.to_string_lossy()
                    .into_owned(),
            );
        }
    }

    devices
}

/// List candidate devices under [`DEVICE_DIR`].
///
/// Failures are logged and reported as an empty list.
pub fn scan_device_dir() -> Vec<String> {
    match scan_dir(Path::new(DEVICE_DIR)) {
        Ok(devices) => devices,
        Err(e) => {
            debug!("Failed to scan {DEVICE_DIR}: {e}");
            Vec::new()
        },
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::fs::File, tempfile::tempdir};

    #[test]
    fn test_is_candidate() {
        assert!(is_candidate("ttyACM0"));
        assert!(is_candidate("ttyUSB12"));
        assert!(!is_candidate("ttyS0"));
        assert!(!is_candidate("video0"));
        assert!(!is_candidate("xttyACM0"));
    }

    #[test]
    fn test_filter_candidates_keeps_order() {
        let names = filter_candidates(["ttyACM0", "ttyUSB1", "video0", "ttyACM2"]);
        assert_eq!(names, vec!["ttyACM0", "ttyUSB1", "ttyACM2"]);
    }

    #[test]
    fn test_filter_candidates_empty() {
        assert!(filter_candidates(Vec::<String>::new()).is_empty());
        assert!(filter_candidates(["null", "zero"]).is_empty());
    }

    #[test]
    fn test_scan_dir_follows_directory_order() {
        let dir = tempdir().unwrap();
        for name in ["ttyACM0", "ttyUSB1", "video0", "ttyACM2"] {
            File::create(
                dir.path()
                    .join(name),
            )
            .unwrap();
        }

        // Directory order is filesystem-defined; compare against read_dir.
        let expected: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.file_name().unwrap() != "video0")
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        let found = scan_dir(dir.path()).unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found, expected);
        assert!(
            found
                .iter()
                .all(|p| !p.ends_with("video0"))
        );
    }

    #[test]
    fn test_unreadable_entry_does_not_hide_others() {
        let entries = vec![
            Ok(PathBuf::from("/dev/ttyACM0")),
            Err(io::Error::other("stale entry")),
            Ok(PathBuf::from("/dev/null")),
            Ok(PathBuf::from("/dev/ttyUSB1")),
        ];
        assert_eq!(
            collect_candidates(entries),
            vec!["/dev/ttyACM0", "/dev/ttyUSB1"]
        );
    }

    #[test]
    fn test_scan_missing_dir_is_error() {
        let dir = tempdir().unwrap();
        assert!(scan_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_scan_device_dir_does_not_panic() {
        let _ = scan_device_dir();
    }
}
