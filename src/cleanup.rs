//! Staging area teardown.
//!
//! [`cleanup`] unmounts a staging area's encfs view (if one was mounted)
//! and deletes the whole staging tree. It is idempotent: running it on an
//! already cleaned area does nothing and returns `Ok`.
//!
//! [`CleanupGuard`] owns a staging area for the lifetime of a job and runs
//! [`cleanup`] when dropped, so the area is released on every exit path,
//! including early returns and panics.

use crate::encryption::{Encryptor, UnmountError};
use crate::staging::StagingArea;
use std::fs;
use std::io;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("unmount failed: {0}")]
    Unmount(#[from] UnmountError),
    #[error("could not delete staging area: {0}")]
    Io(#[from] io::Error),
}

/// Unmount (when mounted) and recursively delete the staging area.
///
/// An unmount failure is logged and deletion still proceeds; the first
/// error is returned once both steps have run.
pub fn cleanup(area: &mut StagingArea, encryptor: Option<&Encryptor<'_>>) -> Result<(), CleanupError> {
    let mut first_error = None;

    if area.is_mounted() {
        match encryptor {
            Some(encryptor) => {
                if let Err(e) = encryptor.unmount(area) {
                    log::error!("failed to unmount {}: {e}", area.plain().display());
                    first_error = Some(CleanupError::Unmount(e));
                }
            }
            None => log::warn!("{} is mounted but no unmounter is configured", area.plain().display()),
        }
    }

    match fs::remove_dir_all(area.root()) {
        Ok(()) => log::debug!("deleted staging area {}", area.root().display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            log::error!("failed to delete {}: {e}", area.root().display());
            first_error.get_or_insert(CleanupError::Io(e));
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Owns a staging area and cleans it up exactly once.
pub struct CleanupGuard<'a> {
    area: StagingArea,
    encryptor: Option<&'a Encryptor<'a>>,
    done: bool,
}

impl<'a> CleanupGuard<'a> {
    pub fn new(area: StagingArea, encryptor: Option<&'a Encryptor<'a>>) -> Self {
        Self {
            area,
            encryptor,
            done: false,
        }
    }

    /// Clean up now and report the result instead of logging it on drop.
    pub fn finish(mut self) -> Result<(), CleanupError> {
        self.done = true;
        cleanup(&mut self.area, self.encryptor)
    }
}

impl Deref for CleanupGuard<'_> {
    type Target = StagingArea;

    fn deref(&self) -> &StagingArea {
        &self.area
    }
}

impl DerefMut for CleanupGuard<'_> {
    fn deref_mut(&mut self) -> &mut StagingArea {
        &mut self.area
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.done = true;
            // Errors are already logged by cleanup().
            let _ = cleanup(&mut self.area, self.encryptor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CloudConfig, EncryptionConfig};
    use crate::test_helpers::MockRunner;
    use tempfile::TempDir;

    #[test]
    fn cleanup_removes_tree() {
        let tmp = TempDir::new().unwrap();
        let mut area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();
        fs::create_dir_all(area.plain().join("TV/Show")).unwrap();
        fs::write(area.plain().join("TV/Show/x.mkv"), b"x").unwrap();

        cleanup(&mut area, None).unwrap();
        assert!(!area.root().exists());
    }

    #[test]
    fn cleanup_twice_is_ok() {
        let tmp = TempDir::new().unwrap();
        let mut area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();
        cleanup(&mut area, None).unwrap();
        cleanup(&mut area, None).unwrap();
        assert!(!area.root().exists());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn cleanup_unmounts_first() {
        let tmp = TempDir::new().unwrap();
        let mut area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();
        let runner = MockRunner::new();
        let config = EncryptionConfig::default();
        let encryptor = Encryptor::new(&config, &runner);
        encryptor.encrypt(&mut area).unwrap();

        cleanup(&mut area, Some(&encryptor)).unwrap();
        cleanup(&mut area, Some(&encryptor)).unwrap();

        assert!(!area.is_mounted());
        assert_eq!(runner.calls_to("fusermount").len(), 1);
        assert!(!area.root().exists());
    }

    #[test]
    fn cleanup_without_mount_never_unmounts() {
        let tmp = TempDir::new().unwrap();
        let mut area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();
        let runner = MockRunner::new();
        let config = EncryptionConfig::default();
        let encryptor = Encryptor::new(&config, &runner);

        cleanup(&mut area, Some(&encryptor)).unwrap();
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn failed_unmount_still_deletes() {
        let tmp = TempDir::new().unwrap();
        let mut area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();
        let runner = MockRunner::new().timeout_on("fusermount");
        let config = EncryptionConfig::default();
        let encryptor = Encryptor::new(&config, &runner);
        encryptor.encrypt(&mut area).unwrap();

        let result = cleanup(&mut area, Some(&encryptor));
        assert!(matches!(result, Err(CleanupError::Unmount(_))));
        assert!(!area.root().exists());
    }

    #[test]
    fn fusermount_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let mut area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();
        let runner = MockRunner::new().on("fusermount", &[1]);
        let config = EncryptionConfig::default();
        let encryptor = Encryptor::new(&config, &runner);
        encryptor.encrypt(&mut area).unwrap();

        let result = cleanup(&mut area, Some(&encryptor));
        assert!(matches!(
            result,
            Err(CleanupError::Unmount(UnmountError::ExitCode(Some(1))))
        ));
        assert!(area.is_mounted());
        assert!(!area.root().exists());
        assert_eq!(runner.calls_to("fusermount").len(), 1);
    }

    #[test]
    fn guard_cleans_up_on_drop() {
        let tmp = TempDir::new().unwrap();
        let root = {
            let area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();
            let guard = CleanupGuard::new(area, None);
            guard.root().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn guard_cleans_up_on_panic() {
        let tmp = TempDir::new().unwrap();
        let area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();
        let root = area.root().to_path_buf();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = CleanupGuard::new(area, None);
            panic!("upload blew up");
        }));
        assert!(result.is_err());
        assert!(!root.exists());
    }

    #[test]
    fn guard_finish_reports_result() {
        let tmp = TempDir::new().unwrap();
        let area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();
        let root = area.root().to_path_buf();
        CleanupGuard::new(area, None).finish().unwrap();
        assert!(!root.exists());
    }
}
