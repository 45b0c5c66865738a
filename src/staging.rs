//! Per-job staging areas.
//!
//! Each job gets a randomly named directory next to its source file, holding
//! a plain subtree that mirrors the cloud layout and, when encryption is on,
//! an encrypted subtree mounted over it:
//!
//! ```text
//! /downloads/
//! ├── Show.Name.S01E02.mkv          ← source (moved away while staged)
//! └── Q7K2M0ZP4D/                   ← staging root
//!     ├── Media/                    ← plain subtree (encfs mount point)
//!     │   └── TV/Show Name/Season 01/Show Name - S01E02.mkv
//!     └── Encrypted/                ← encrypted subtree (encfs root dir)
//! ```
//!
//! Living next to the source keeps the move a cheap same-filesystem rename
//! in the common case. Moves that cross filesystems (into an encfs mount)
//! fall back to copy + delete.

use crate::config::CloudConfig;
use crate::types::UploadJob;
use rand::Rng;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const NAME_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const NAME_LENGTH: usize = 10;
/// Fresh names tried before giving up on a collision.
const MAX_NAME_ATTEMPTS: usize = 5;

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("no free staging directory name under {0}")]
    NameCollision(PathBuf),
    #[error("cannot restore {0}: a file already exists there")]
    RestoreTargetExists(PathBuf),
}

/// Random upper-case alphanumeric directory name.
pub fn random_name() -> String {
    let mut rng = rand::thread_rng();
    (0..NAME_LENGTH)
        .map(|_| NAME_CHARSET[rng.gen_range(0..NAME_CHARSET.len())] as char)
        .collect()
}

/// A job's temporary directory tree.
#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
    plain: PathBuf,
    plain_name: String,
    encrypted: PathBuf,
    encrypted_name: String,
    /// Set once encfs has mounted `plain` over `encrypted`.
    mounted: bool,
}

impl StagingArea {
    /// Create a fresh staging root and its plain subtree under `parent`.
    pub fn create(parent: &Path, cloud: &CloudConfig) -> Result<Self, StagingError> {
        Self::create_named(parent, cloud, std::iter::repeat_with(random_name))
    }

    /// Like [`create`](Self::create), drawing candidate names from `names`.
    pub fn create_named(
        parent: &Path,
        cloud: &CloudConfig,
        names: impl IntoIterator<Item = String>,
    ) -> Result<Self, StagingError> {
        for name in names.into_iter().take(MAX_NAME_ATTEMPTS) {
            let root = parent.join(&name);
            match fs::create_dir(&root) {
                Ok(()) => {
                    let plain = root.join(&cloud.plain_dir);
                    if let Err(e) = fs::create_dir(&plain) {
                        let _ = fs::remove_dir_all(&root);
                        return Err(e.into());
                    }
                    log::debug!("created staging area {}", root.display());
                    return Ok(Self {
                        encrypted: root.join(&cloud.encrypted_dir),
                        encrypted_name: cloud.encrypted_dir.clone(),
                        plain,
                        plain_name: cloud.plain_dir.clone(),
                        root,
                        mounted: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    log::warn!("staging name {name} already taken, trying another");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StagingError::NameCollision(parent.to_path_buf()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plain(&self) -> &Path {
        &self.plain
    }

    pub fn encrypted(&self) -> &Path {
        &self.encrypted
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub(crate) fn set_mounted(&mut self, mounted: bool) {
        self.mounted = mounted;
    }

    /// Local directory handed to the upload tool.
    pub fn upload_root(&self) -> &Path {
        if self.mounted { &self.encrypted } else { &self.plain }
    }

    /// Remote directory mirroring [`upload_root`](Self::upload_root).
    pub fn remote_dir(&self) -> &str {
        if self.mounted {
            &self.encrypted_name
        } else {
            &self.plain_name
        }
    }

    /// Where the job's file lives once staged.
    pub fn staged_path(&self, job: &UploadJob) -> PathBuf {
        self.plain.join(&job.cloud_dir).join(&job.cloud_file)
    }

    /// Move (or copy) the job's source file into the plain subtree under its
    /// classified name. Returns the staged path.
    pub fn stage(&self, job: &UploadJob, move_files: bool) -> Result<PathBuf, StagingError> {
        let staged = self.staged_path(job);
        if let Some(dir) = staged.parent() {
            fs::create_dir_all(dir)?;
        }
        if move_files {
            log::info!("moving file to temporary path: {}", staged.display());
            move_file(&job.source_path, &staged)?;
        } else {
            log::info!("copying file to temporary path: {}", staged.display());
            fs::copy(&job.source_path, &staged)?;
        }
        Ok(staged)
    }

    /// Put a staged file back at the job's source path under its original name.
    pub fn restore(&self, job: &UploadJob, staged: &Path) -> Result<(), StagingError> {
        if job.source_path.exists() {
            return Err(StagingError::RestoreTargetExists(job.source_path.clone()));
        }
        move_file(staged, &job.source_path)?;
        log::info!("restored {}", job.source_path.display());
        Ok(())
    }
}

/// Rename, falling back to copy + delete when the rename fails (different
/// filesystems, FUSE mounts).
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if !from.is_file() {
                return Err(rename_err);
            }
            log::debug!(
                "rename {} → {} failed ({rename_err}), copying instead",
                from.display(),
                to.display()
            );
            if let Err(e) = fs::copy(from, to) {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{episode_job, write_file};
    use tempfile::TempDir;

    #[test]
    fn random_names_are_uppercase_alphanumeric() {
        let name = random_name();
        assert_eq!(name.len(), NAME_LENGTH);
        assert!(name.bytes().all(|b| NAME_CHARSET.contains(&b)));
    }

    #[test]
    fn create_builds_plain_subtree() {
        let tmp = TempDir::new().unwrap();
        let area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();
        assert!(area.root().starts_with(tmp.path()));
        assert!(area.plain().is_dir());
        assert!(!area.encrypted().exists());
        assert_eq!(area.upload_root(), area.plain());
        assert_eq!(area.remote_dir(), "Media");
    }

    #[test]
    fn create_retries_on_collision() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("TAKEN")).unwrap();
        let names = ["TAKEN", "FREE"].map(String::from);
        let area = StagingArea::create_named(tmp.path(), &CloudConfig::default(), names).unwrap();
        assert_eq!(area.root(), tmp.path().join("FREE"));
    }

    #[test]
    fn create_gives_up_after_repeated_collisions() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("TAKEN")).unwrap();
        let names = std::iter::repeat("TAKEN".to_string());
        let result = StagingArea::create_named(tmp.path(), &CloudConfig::default(), names);
        assert!(matches!(result, Err(StagingError::NameCollision(_))));
    }

    #[test]
    fn mounted_area_uploads_encrypted_subtree() {
        let tmp = TempDir::new().unwrap();
        let mut area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();
        area.set_mounted(true);
        assert_eq!(area.upload_root(), area.encrypted());
        assert_eq!(area.remote_dir(), "Encrypted");
    }

    #[test]
    fn stage_moves_and_renames() {
        let tmp = TempDir::new().unwrap();
        let source = write_file(tmp.path(), "Show.Name.S01E02.mkv", b"video");
        let job = episode_job(&source);
        let area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();

        let staged = area.stage(&job, true).unwrap();
        assert_eq!(
            staged,
            area.plain().join("TV/Show Name/Season 01/Show Name - S01E02.mkv")
        );
        assert_eq!(fs::read(&staged).unwrap(), b"video");
        assert!(!source.exists());
    }

    #[test]
    fn stage_copy_leaves_original() {
        let tmp = TempDir::new().unwrap();
        let source = write_file(tmp.path(), "Show.Name.S01E02.mkv", b"video");
        let job = episode_job(&source);
        let area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();

        let staged = area.stage(&job, false).unwrap();
        assert!(staged.is_file());
        assert_eq!(fs::read(&source).unwrap(), b"video");
    }

    #[test]
    fn stage_then_restore_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let content: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let source = write_file(tmp.path(), "Show.Name.S01E02.mkv", &content);
        let job = episode_job(&source);
        let area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();

        let staged = area.stage(&job, true).unwrap();
        area.restore(&job, &staged).unwrap();

        assert_eq!(fs::read(&source).unwrap(), content);
        assert!(!staged.exists());
    }

    #[test]
    fn restore_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let source = write_file(tmp.path(), "Show.Name.S01E02.mkv", b"video");
        let job = episode_job(&source);
        let area = StagingArea::create(tmp.path(), &CloudConfig::default()).unwrap();
        let staged = area.stage(&job, false).unwrap();

        let result = area.restore(&job, &staged);
        assert!(matches!(result, Err(StagingError::RestoreTargetExists(_))));
        assert!(staged.exists());
    }

    #[test]
    fn move_file_missing_source_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = move_file(&tmp.path().join("nope"), &tmp.path().join("dest"));
        assert!(result.is_err());
        assert!(!tmp.path().join("dest").exists());
    }
}
