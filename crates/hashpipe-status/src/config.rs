//! Library discovery and status buffer options

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Explicit path to the hashpipe library
pub const SO_PATH_ENV: &str = "HASHPIPE_SO_PATH";
/// Library file name searched for on `LD_LIBRARY_PATH`
pub const SO_FILENAME_ENV: &str = "HASHPIPE_SO_FILENAME";
pub const DEFAULT_SO_FILENAME: &str = "libhashpipe.so";
/// Lock timeout in seconds
pub const LOCK_TIMEOUT_ENV: &str = "HASHPIPE_STATUS_LOCK_TIMEOUT";
/// Cap on records read per parse
pub const MAX_RECORDS_ENV: &str = "HASHPIPE_STATUS_MAX_RECORDS";

/// Resolves where `libhashpipe.so` lives
///
/// `HASHPIPE_SO_PATH` wins outright. Otherwise every non-empty directory of
/// `LD_LIBRARY_PATH` is tried in order for `HASHPIPE_SO_FILENAME`
/// (`libhashpipe.so` by default).
#[derive(Debug, Clone, Default)]
pub struct LibraryLocator {
    so_path: Option<PathBuf>,
    search_path: Option<OsString>,
    filename: Option<OsString>,
}

impl LibraryLocator {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        Self {
            so_path: lookup(SO_PATH_ENV).map(PathBuf::from),
            search_path: lookup("LD_LIBRARY_PATH"),
            filename: lookup(SO_FILENAME_ENV),
        }
    }

    pub fn locate(&self) -> Result<PathBuf> {
        if let Some(path) = &self.so_path {
            return Ok(path.clone());
        }

        let filename = self
            .filename
            .clone()
            .unwrap_or_else(|| OsString::from(DEFAULT_SO_FILENAME));
        let mut searched = Vec::new();

        if let Some(search_path) = &self.search_path {
            for dir in std::env::split_paths(search_path) {
                if dir.as_os_str().is_empty() {
                    continue;
                }
                let candidate = dir.join(&filename);
                if candidate.exists() {
                    return Ok(candidate);
                }
                searched.push(candidate);
            }
        }

        Err(Error::LibraryNotFound { searched })
    }
}

/// Per-handle options
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatusOptions {
    /// Lock wait budget, `None` blocks until the lock is free
    pub lock_timeout: Option<Duration>,
    /// Records read before giving up on finding `END`
    pub max_records: Option<usize>,
}

impl StatusOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// A zero timeout means no timeout
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Timeout in seconds; zero, negative or non-finite values mean no timeout
    pub fn with_lock_timeout_secs(self, secs: f64) -> Self {
        let timeout = if secs.is_finite() && secs > 0.0 {
            Duration::try_from_secs_f64(secs).ok()
        } else {
            None
        };
        self.with_lock_timeout(timeout)
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup, ignoring unparsable values
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::new();

        if let Some(raw) = lookup(LOCK_TIMEOUT_ENV) {
            match raw.trim().parse::<f64>() {
                Ok(secs) => options = options.with_lock_timeout_secs(secs),
                Err(_) => tracing::warn!(%raw, "ignoring invalid {}", LOCK_TIMEOUT_ENV),
            }
        }
        if let Some(raw) = lookup(MAX_RECORDS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(max) => options = options.with_max_records(max),
                Err(_) => tracing::warn!(%raw, "ignoring invalid {}", MAX_RECORDS_ENV),
            }
        }

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_so_path_wins() {
        let locator = LibraryLocator::from_lookup(lookup(&[
            (SO_PATH_ENV, "/opt/hashpipe/lib/libhashpipe.so"),
            ("LD_LIBRARY_PATH", "/usr/lib"),
        ]));
        assert_eq!(
            locator.locate().unwrap(),
            PathBuf::from("/opt/hashpipe/lib/libhashpipe.so")
        );
    }

    #[test]
    fn test_search_ld_library_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libhashpipe.so"), b"").unwrap();
        let search = format!("::/nonexistent:{}", dir.path().display());

        let locator = LibraryLocator::from_lookup(lookup(&[("LD_LIBRARY_PATH", search.as_str())]));
        assert_eq!(locator.locate().unwrap(), dir.path().join("libhashpipe.so"));
    }

    #[test]
    fn test_custom_filename() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libhashpipe-dev.so"), b"").unwrap();
        let search = dir.path().display().to_string();

        let locator = LibraryLocator::from_lookup(lookup(&[
            ("LD_LIBRARY_PATH", search.as_str()),
            (SO_FILENAME_ENV, "libhashpipe-dev.so"),
        ]));
        assert_eq!(
            locator.locate().unwrap(),
            dir.path().join("libhashpipe-dev.so")
        );
    }

    #[test]
    fn test_not_found() {
        let locator = LibraryLocator::from_lookup(lookup(&[("LD_LIBRARY_PATH", "/nonexistent")]));
        match locator.locate() {
            Err(Error::LibraryNotFound { searched }) => {
                assert_eq!(searched, vec![PathBuf::from("/nonexistent/libhashpipe.so")]);
            }
            other => panic!("expected LibraryNotFound, got {:?}", other),
        }
        assert!(LibraryLocator::default().locate().is_err());
    }

    #[test]
    fn test_lock_timeout_validation() {
        assert_eq!(StatusOptions::new().with_lock_timeout_secs(0.0).lock_timeout, None);
        assert_eq!(StatusOptions::new().with_lock_timeout_secs(-1.0).lock_timeout, None);
        assert_eq!(StatusOptions::new().with_lock_timeout_secs(f64::NAN).lock_timeout, None);
        assert_eq!(
            StatusOptions::new().with_lock_timeout(Some(Duration::ZERO)).lock_timeout,
            None
        );
        assert_eq!(
            StatusOptions::new().with_lock_timeout_secs(0.5).lock_timeout,
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn test_options_from_lookup() {
        let vars: HashMap<&str, &str> =
            [(LOCK_TIMEOUT_ENV, "2.5"), (MAX_RECORDS_ENV, "bogus")].into();
        let options = StatusOptions::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(options.lock_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(options.max_records, None);
    }
}
