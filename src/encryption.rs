//! encfs encryption of a staging area.
//!
//! encfs is started in reverse of the usual mental model: the staging
//! area's *plain* subtree becomes the mount point and the *encrypted*
//! subtree is the backing directory. Files moved into the plain subtree
//! afterwards land encrypted on disk, and the encrypted subtree is what gets
//! uploaded.
//!
//! ```text
//! encfs -S <staging>/Encrypted <staging>/Media   (password on stdin)
//! fusermount -u <staging>/Media
//! ```
//!
//! encfs finds its key file through an environment variable (usually
//! `ENCFS6_CONFIG`). When the uploader's own environment doesn't define it,
//! the configured default is passed to the encfs child only.

use crate::config::{EncryptionConfig, timeout};
use crate::staging::StagingArea;
use crate::tools::{CommandRunner, ToolCommand, ToolError};
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncryptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("encfs exited with code {0:?}")]
    ExitCode(Option<i32>),
}

#[derive(Error, Debug)]
pub enum UnmountError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("fusermount exited with code {0:?}")]
    ExitCode(Option<i32>),
}

impl EncryptError {
    /// Exit code of the failed encfs run, when it got that far.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            EncryptError::ExitCode(code) => *code,
            _ => None,
        }
    }
}

/// Build the encfs mount command.
///
/// `inherited` is the current value of the config environment variable;
/// when absent or empty the configured default path is set on the child.
pub fn encfs_command(
    config: &EncryptionConfig,
    encrypted: &Path,
    plain: &Path,
    inherited: Option<&OsStr>,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(&config.encfs_path)
        .arg("-S")
        .arg(encrypted)
        .arg(plain)
        .stdin(format!("{}\n", config.password))
        .timeout(timeout(config.timeout_secs));
    if inherited.is_none_or(OsStr::is_empty) {
        log::info!(
            "{} environment variable is not defined, using {}",
            config.env_var,
            config.config_path.display()
        );
        cmd = cmd.env(&config.env_var, &config.config_path);
    }
    cmd
}

/// Build the unmount command for an encfs mount point.
pub fn unmount_command(config: &EncryptionConfig, mount_point: &Path) -> ToolCommand {
    ToolCommand::new(&config.fusermount_path)
        .arg("-u")
        .arg(mount_point)
        .timeout(timeout(config.timeout_secs))
}

/// Mounts and unmounts encfs views of staging areas.
pub struct Encryptor<'a> {
    config: &'a EncryptionConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> Encryptor<'a> {
    pub fn new(config: &'a EncryptionConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Mount the encrypted view over the area's plain subtree.
    ///
    /// Exit code 0 is the only success. On failure the area stays unmounted
    /// and the caller discards it.
    pub fn encrypt(&self, area: &mut StagingArea) -> Result<(), EncryptError> {
        log::info!("encrypting directory tree...");
        fs::create_dir_all(area.encrypted())?;
        let inherited = std::env::var_os(&self.config.env_var);
        let cmd = encfs_command(self.config, area.encrypted(), area.plain(), inherited.as_deref());
        let output = self.runner.run(&cmd)?;
        if !output.success() {
            log::error!("bad return code ({:?}) for encryption, stopping", output.code);
            return Err(EncryptError::ExitCode(output.code));
        }
        area.set_mounted(true);
        Ok(())
    }

    /// Unmount the area if it is mounted. A no-op otherwise.
    ///
    /// A non-zero fusermount exit is an error and the area stays marked as
    /// mounted.
    pub fn unmount(&self, area: &mut StagingArea) -> Result<(), UnmountError> {
        if !area.is_mounted() {
            return Ok(());
        }
        let output = self.runner.run(&unmount_command(self.config, area.plain()))?;
        if !output.success() {
            return Err(UnmountError::ExitCode(output.code));
        }
        area.set_mounted(false);
        Ok(())
    }
}
