//! Upload of a staging area with bounded retries.
//!
//! Two external tools are supported:
//!
//! | Backend | Prepare | Attempt | Between failed attempts |
//! |---------|---------|---------|-------------------------|
//! | `rclone` | `mkdir <remote>:<dir>` | `copyto <local> <remote>:<dir>` | nothing |
//! | `acd_cli` | `sync` | `upload -o <local>/<entry>... /` | `sync` |
//!
//! acd_cli keeps a local index of the remote that goes stale, and a failed
//! upload may still have reached the drive, so it is re-synced before the
//! next try.
//!
//! Attempts follow each other immediately. There is no backoff, which makes
//! the loop a poor fit for rate-limited remotes; `upload.timeout_secs` at
//! least bounds how long a single hung attempt can block the job.

use crate::config::{UploadBackend, UploadConfig, timeout};
use crate::tools::{CommandRunner, ToolCommand, remote_path};
use std::fs;
use std::path::{Path, PathBuf};

/// Bookkeeping for one job's retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadAttempt {
    pub try_count: u32,
    /// `None` when the tool never ran to completion (spawn failure, timeout,
    /// killed by a signal).
    pub last_exit_code: Option<i32>,
}

impl UploadAttempt {
    pub fn succeeded(&self) -> bool {
        self.last_exit_code == Some(0)
    }
}

/// Runs the configured upload tool.
pub struct UploadExecutor<'a> {
    config: &'a UploadConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> UploadExecutor<'a> {
    pub fn new(config: &'a UploadConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    fn base_command(&self) -> ToolCommand {
        let cmd = match self.config.backend {
            UploadBackend::Rclone => ToolCommand::new(&self.config.rclone_path)
                .arg("--config")
                .arg(&self.config.rclone_config),
            UploadBackend::AcdCli => ToolCommand::new(&self.config.acd_cli_path),
        };
        cmd.timeout(timeout(self.config.timeout_secs))
    }

    /// Refresh the tool's view of the remote (acd_cli only).
    pub fn sync_command(&self) -> Option<ToolCommand> {
        match self.config.backend {
            UploadBackend::Rclone => None,
            UploadBackend::AcdCli => Some(self.base_command().arg("sync")),
        }
    }

    pub fn mkdir_command(&self, remote_dir: &str) -> ToolCommand {
        match self.config.backend {
            UploadBackend::Rclone => self
                .base_command()
                .arg("mkdir")
                .arg(remote_path(&self.config.remote, Path::new(remote_dir))),
            UploadBackend::AcdCli => self.base_command().arg("mkdir").arg(format!("/{remote_dir}")),
        }
    }

    /// The command for one upload attempt of `local_root`. rclone copies into
    /// `remote_dir`; acd_cli always targets the drive root.
    pub fn upload_command(&self, local_root: &Path, remote_dir: &str) -> std::io::Result<ToolCommand> {
        let cmd = match self.config.backend {
            UploadBackend::Rclone => self
                .base_command()
                .arg("copyto")
                .arg(local_root)
                .arg(remote_path(&self.config.remote, Path::new(remote_dir))),
            UploadBackend::AcdCli => {
                // Each top-level entry (`TV`, `Movies`, ...) lands at the
                // drive root, merging into the existing tree.
                let mut entries: Vec<PathBuf> = fs::read_dir(local_root)?
                    .map(|entry| entry.map(|e| e.path()))
                    .collect::<Result<_, _>>()?;
                entries.sort();
                self.base_command()
                    .arg("upload")
                    .arg("-o")
                    .args(entries)
                    .arg("/")
            }
        };
        Ok(cmd)
    }

    /// Run a command, logging instead of propagating tool errors.
    fn run_logged(&self, cmd: &ToolCommand) -> Option<i32> {
        match self.runner.run(cmd) {
            Ok(output) => output.code,
            Err(e) => {
                log::error!("{e}");
                None
            }
        }
    }

    /// Pre-create the remote directory (rclone) or sync the index (acd_cli).
    /// Failures are logged and otherwise ignored; the attempt will tell.
    pub fn prepare(&self, remote_dir: &str) {
        let cmd = match self.sync_command() {
            Some(sync) => sync,
            None => self.mkdir_command(remote_dir),
        };
        match self.run_logged(&cmd) {
            Some(0) => {}
            code => log::warn!("bad return code ({code:?}) for {}", cmd.name()),
        }
    }

    /// Upload `local_root` to `remote_dir`, trying at most `max_tries` times.
    pub fn upload(&self, local_root: &Path, remote_dir: &str, max_tries: u32, label: &str) -> UploadAttempt {
        let mut attempt = UploadAttempt {
            try_count: 0,
            last_exit_code: None,
        };
        self.prepare(remote_dir);

        while attempt.try_count < max_tries {
            attempt.try_count += 1;
            log::info!("uploading file (try {}/{max_tries})...", attempt.try_count);
            attempt.last_exit_code = match self.upload_command(local_root, remote_dir) {
                Ok(cmd) => self.run_logged(&cmd),
                Err(e) => {
                    log::error!("cannot list {}: {e}", local_root.display());
                    None
                }
            };
            if attempt.succeeded() {
                log::info!("upload succeeded");
                break;
            }

            log::error!("bad return code ({:?}) for file: {label}", attempt.last_exit_code);
            if attempt.try_count < max_tries {
                log::info!("trying again!");
                if let Some(sync) = self.sync_command() {
                    self.run_logged(&sync);
                }
            } else {
                log::error!("max retries with no success, giving up");
            }
        }
        attempt
    }
}
