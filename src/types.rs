//! Shared types passed between pipeline stages.

use crate::classify::CloudTarget;
use crate::naming::ParsedName;
use std::path::{Path, PathBuf};

/// One file on its way to the cloud.
///
/// Built once classification succeeds and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    /// Absolute path of the file as it was handed to the uploader.
    pub source_path: PathBuf,
    /// Directory relative to the staging subtree, e.g. `TV/Show/Season 01`.
    pub cloud_dir: PathBuf,
    /// Final file name, including language tag and extension.
    pub cloud_file: String,
    pub extension: String,
    pub language_tag: Option<String>,
    pub is_subtitle: bool,
    /// Whether a successful upload is appended to the ledger.
    pub record_in_ledger: bool,
}

impl UploadJob {
    pub fn new(source_path: PathBuf, parsed: ParsedName, target: CloudTarget) -> Self {
        let mut cloud_file = target.file_base;
        if let Some(tag) = &parsed.language_tag {
            cloud_file.push_str(tag);
        }
        cloud_file.push_str(&parsed.extension);
        Self {
            source_path,
            cloud_dir: target.dir,
            cloud_file,
            extension: parsed.extension,
            language_tag: parsed.language_tag,
            record_in_ledger: !parsed.is_subtitle,
            is_subtitle: parsed.is_subtitle,
        }
    }

    /// A file uploaded as-is under the videos root, skipping classification.
    ///
    /// Returns `None` when the path has no UTF-8 file name.
    pub fn video(source_path: PathBuf, videos_root: &str) -> Option<Self> {
        let cloud_file = source_path.file_name()?.to_str()?.to_string();
        let extension = Path::new(&cloud_file)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        Some(Self {
            source_path,
            cloud_dir: PathBuf::from(videos_root),
            cloud_file,
            extension,
            language_tag: None,
            is_subtitle: false,
            record_in_ledger: false,
        })
    }

    /// Path relative to the staging subtree / remote root.
    pub fn cloud_path(&self) -> PathBuf {
        self.cloud_dir.join(&self.cloud_file)
    }

    /// Directory the source file lives in.
    pub fn source_dir(&self) -> &Path {
        self.source_path.parent().unwrap_or(Path::new("."))
    }
}

/// Which stage a failed job died in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    Encryption,
    Upload,
}

/// Terminal result of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Classification refused the file; nothing was touched.
    Skipped { reason: String },
    Succeeded { cloud_path: PathBuf, tries: u32 },
    Failed {
        stage: FailedStage,
        exit_code: Option<i32>,
        tries: u32,
        /// The original is back at its source path (or was never moved).
        restored: bool,
    },
}

impl JobOutcome {
    /// Process exit code for this outcome: the failing tool's code, or 0.
    pub fn exit_code(&self) -> i32 {
        match self {
            JobOutcome::Skipped { .. } | JobOutcome::Succeeded { .. } => 0,
            JobOutcome::Failed { exit_code, .. } => match exit_code {
                Some(0) | None => 1,
                Some(code) => *code,
            },
        }
    }
}
