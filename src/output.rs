//! CLI output formatting.
//!
//! Log lines (stderr, see [`crate::logging`]) narrate what the pipeline is doing; the
//! lines produced here are the result a user or a calling script reads on
//! stdout once a command finishes.
//!
//! # Output Format
//!
//! ## Classify
//!
//! ```text
//! Show.Name.S01E02.he.srt
//!     Cloud path: TV/Show Name/Season 01/Show Name - S01E02.he.srt
//!     Subtitle: .he
//!     Ledger: no
//! ```
//!
//! ## Upload
//!
//! ```text
//! Show.Name.S01E02.mkv → TV/Show Name/Season 01/Show Name - S01E02.mkv (1 try)
//! Movie.Title.2020.mkv → upload failed after 3 tries (exit code 1), restored
//! notes.txt → skipped: extension .txt is not whitelisted
//! ```
//!
//! ## Batch
//!
//! ```text
//! Processed 4 files: 2 uploaded, 1 failed, 1 skipped
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::classify::SkipReason;
use crate::pipeline::BatchSummary;
use crate::types::{FailedStage, JobOutcome, UploadJob};
use std::path::Path;

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn tries(n: u32) -> String {
    if n == 1 {
        "1 try".to_string()
    } else {
        format!("{n} tries")
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

// ============================================================================
// Classify (dry run)
// ============================================================================

pub fn format_classification(path: &Path, result: &Result<UploadJob, SkipReason>) -> Vec<String> {
    let mut lines = vec![display_name(path)];
    match result {
        Ok(job) => {
            lines.push(format!("    Cloud path: {}", job.cloud_path().display()));
            if let Some(tag) = &job.language_tag {
                lines.push(format!("    Subtitle: {tag}"));
            }
            lines.push(format!("    Ledger: {}", yes_no(job.record_in_ledger)));
        }
        Err(reason) => lines.push(format!("    Skipped: {reason}")),
    }
    lines
}

pub fn print_classification(path: &Path, result: &Result<UploadJob, SkipReason>) {
    for line in format_classification(path, result) {
        println!("{}", line);
    }
}

// ============================================================================
// Upload
// ============================================================================

/// One line per job: source name, arrow, what happened.
pub fn format_outcome(path: &Path, outcome: &JobOutcome) -> String {
    let name = display_name(path);
    match outcome {
        JobOutcome::Skipped { reason } => format!("{name} → skipped: {reason}"),
        JobOutcome::Succeeded { cloud_path, tries: n } => {
            format!("{name} → {} ({})", cloud_path.display(), tries(*n))
        }
        JobOutcome::Failed {
            stage,
            exit_code,
            tries: n,
            restored,
        } => {
            let code = match exit_code {
                Some(code) => format!("exit code {code}"),
                None => "no exit code".to_string(),
            };
            let what = match stage {
                FailedStage::Encryption => format!("encryption failed ({code})"),
                FailedStage::Upload => format!("upload failed after {} ({code})", tries(*n)),
            };
            let state = if *restored {
                "restored"
            } else {
                "NOT restored, check the staging area"
            };
            format!("{name} → {what}, {state}")
        }
    }
}

pub fn print_outcome(path: &Path, outcome: &JobOutcome) {
    println!("{}", format_outcome(path, outcome));
}

// ============================================================================
// Batch
// ============================================================================

pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Processed {} files: {} uploaded, {} failed, {} skipped",
        summary.total(),
        summary.succeeded,
        summary.failed,
        summary.skipped
    )];
    if summary.errors > 0 {
        lines.push(format!("    {} files could not be processed, see log", summary.errors));
    }
    lines
}

pub fn print_batch_summary(summary: &BatchSummary) {
    for line in format_batch_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// Entries oldest first, numbered from 1.
pub fn format_ledger(entries: &[String]) -> Vec<String> {
    if entries.is_empty() {
        return vec!["Ledger is empty".to_string()];
    }
    let width = entries.len().to_string().len().max(3);
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("{:0>width$} {entry}", i + 1))
        .collect()
}

pub fn print_ledger(entries: &[String]) {
    for line in format_ledger(entries) {
        println!("{}", line);
    }
}
