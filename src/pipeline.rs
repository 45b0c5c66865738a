//! One upload job, end to end.
//!
//! ```text
//! classify → stage area → (encrypt | plain only) → stage file → upload
//!          → { ledger | rollback } → cleanup
//! ```
//!
//! The staging area is created and (optionally) mounted before the source
//! file is moved, so a failed encryption never touches the original. Once
//! the file is staged, an upload that exhausts its retries moves it back to
//! its original path and name. Cleanup runs on every path out of
//! [`Uploader::run_job`] through [`CleanupGuard`].
//!
//! Jobs are independent: a batch logs and counts each failure and carries on.

use crate::classify::{Classifier, SkipReason};
use crate::cleanup::CleanupGuard;
use crate::config::UploaderConfig;
use crate::encryption::Encryptor;
use crate::guess::{Guesser, ShowNameFormatter};
use crate::ledger::Ledger;
use crate::staging::{StagingArea, StagingError};
use crate::tools::CommandRunner;
use crate::types::{FailedStage, JobOutcome, UploadJob};
use crate::upload::UploadExecutor;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid file path given: {0}")]
    InvalidPath(PathBuf),
    #[error("Invalid directory given: {0}")]
    InvalidDir(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("staging failed: {0}")]
    Staging(#[from] StagingError),
    #[error("cannot walk directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Where a job is in its lifecycle. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Classified,
    Encrypted,
    PlainOnly,
    Staged,
    Uploading,
    Succeeded,
    Failed,
    RolledBack,
    CleanedUp,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Classified => "classified",
            JobState::Encrypted => "encrypted",
            JobState::PlainOnly => "plain only",
            JobState::Staged => "staged",
            JobState::Uploading => "uploading",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::RolledBack => "rolled back",
            JobState::CleanedUp => "cleaned up",
        };
        f.write_str(name)
    }
}

fn transition(job: &UploadJob, state: JobState) {
    log::debug!("[{}] {state}", job.cloud_file);
}

/// Counts for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Files that could not even be attempted (unreadable, staging failure).
    pub errors: usize,
    /// Exit code of the last failed job, 0 when nothing failed.
    pub exit_code: i32,
}

impl BatchSummary {
    fn record(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Skipped { .. } => self.skipped += 1,
            JobOutcome::Succeeded { .. } => self.succeeded += 1,
            JobOutcome::Failed { .. } => {
                self.failed += 1;
                self.exit_code = outcome.exit_code();
            }
        }
    }

    fn record_error(&mut self) {
        self.errors += 1;
        self.exit_code = 1;
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped + self.errors
    }
}

/// Runs upload jobs against one configuration and set of collaborators.
pub struct Uploader<'a> {
    config: &'a UploaderConfig,
    runner: &'a dyn CommandRunner,
    guesser: &'a dyn Guesser,
    shows: &'a dyn ShowNameFormatter,
    ledger: Ledger,
}

impl<'a> Uploader<'a> {
    pub fn new(
        config: &'a UploaderConfig,
        runner: &'a dyn CommandRunner,
        guesser: &'a dyn Guesser,
        shows: &'a dyn ShowNameFormatter,
    ) -> Self {
        Self {
            config,
            runner,
            guesser,
            shows,
            ledger: Ledger::new(&config.ledger.path),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Work out where a file would go, without touching it.
    pub fn classify(&self, path: &Path) -> Result<UploadJob, SkipReason> {
        Classifier::new(&self.config.files, &self.config.cloud, self.guesser, self.shows).classify(path)
    }

    /// Classify and upload one file.
    pub fn upload_file(&self, path: &Path) -> Result<JobOutcome, PipelineError> {
        let path = checked_file(path)?;
        log::info!("processing file: {}", path.display());
        match self.classify(&path) {
            Ok(job) => {
                log::info!("cloud path: {}", job.cloud_path().display());
                self.run_job(&job)
            }
            Err(reason) => {
                log::info!("skipping {}: {reason}", path.display());
                Ok(JobOutcome::Skipped {
                    reason: reason.to_string(),
                })
            }
        }
    }

    /// Upload one file as-is under the videos root.
    pub fn upload_video(&self, path: &Path) -> Result<JobOutcome, PipelineError> {
        let path = checked_file(path)?;
        let job = UploadJob::video(path.clone(), &self.config.cloud.videos_root)
            .ok_or(PipelineError::InvalidPath(path))?;
        log::info!("cloud path: {}", job.cloud_path().display());
        self.run_job(&job)
    }

    /// Upload every regular file below `dir`, one job at a time.
    ///
    /// The file list is collected before the first job starts, so staging
    /// areas created next to the files are never picked up.
    pub fn upload_dir(&self, dir: &Path, videos: bool) -> Result<BatchSummary, PipelineError> {
        if !dir.is_dir() {
            return Err(PipelineError::InvalidDir(dir.to_path_buf()));
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        log::info!("found {} files under {}", files.len(), dir.display());

        let mut summary = BatchSummary::default();
        for path in files {
            let result = if videos {
                self.upload_video(&path)
            } else {
                self.upload_file(&path)
            };
            match result {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    log::error!("{}: {e}", path.display());
                    summary.record_error();
                }
            }
        }
        Ok(summary)
    }

    /// Stage, (encrypt), upload, then record or roll back. Always cleans up.
    pub fn run_job(&self, job: &UploadJob) -> Result<JobOutcome, PipelineError> {
        transition(job, JobState::Classified);
        let encryptor = Encryptor::new(&self.config.encryption, self.runner);
        let encrypt = self.config.encryption.enabled;
        let area = StagingArea::create(job.source_dir(), &self.config.cloud)?;
        let mut area = CleanupGuard::new(area, encrypt.then_some(&encryptor));

        if encrypt {
            if let Err(e) = encryptor.encrypt(&mut area) {
                log::error!("encryption failed for {}: {e}", job.source_path.display());
                transition(job, JobState::Failed);
                finish(job, area);
                return Ok(JobOutcome::Failed {
                    stage: FailedStage::Encryption,
                    exit_code: e.exit_code(),
                    tries: 0,
                    restored: true,
                });
            }
            transition(job, JobState::Encrypted);
        } else {
            transition(job, JobState::PlainOnly);
        }

        let staged = area.stage(job, self.config.move_files)?;
        transition(job, JobState::Staged);

        transition(job, JobState::Uploading);
        let executor = UploadExecutor::new(&self.config.upload, self.runner);
        let attempt = executor.upload(
            area.upload_root(),
            area.remote_dir(),
            self.config.upload.max_tries,
            &job.cloud_file,
        );

        let outcome = if attempt.succeeded() {
            transition(job, JobState::Succeeded);
            if job.record_in_ledger {
                // The file is already in the cloud; a ledger hiccup only
                // costs subtitle discovery for this one entry.
                if let Err(e) = self.ledger.record(&job.source_path) {
                    log::error!("could not record {} in ledger: {e}", job.source_path.display());
                }
            }
            JobOutcome::Succeeded {
                cloud_path: job.cloud_path(),
                tries: attempt.try_count,
            }
        } else {
            transition(job, JobState::Failed);
            let restored = if self.config.move_files {
                match area.restore(job, &staged) {
                    Ok(()) => {
                        transition(job, JobState::RolledBack);
                        true
                    }
                    Err(e) => {
                        log::error!("rollback failed, file left at {}: {e}", staged.display());
                        false
                    }
                }
            } else {
                true
            };
            JobOutcome::Failed {
                stage: FailedStage::Upload,
                exit_code: attempt.last_exit_code,
                tries: attempt.try_count,
                restored,
            }
        };

        finish(job, area);
        Ok(outcome)
    }
}

fn finish(job: &UploadJob, area: CleanupGuard<'_>) {
    match area.finish() {
        Ok(()) => transition(job, JobState::CleanedUp),
        Err(e) => log::error!("cleanup failed: {e}"),
    }
}

/// Absolute path of an existing regular file.
fn checked_file(path: &Path) -> Result<PathBuf, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::InvalidPath(path.to_path_buf()));
    }
    Ok(std::path::absolute(path)?)
}
