//! # Cloud Uploader
//!
//! Moves downloaded media files into a cloud drive under a canonical layout.
//! A file name is enough to work out where a file belongs: episodes go to
//! `TV/<Show>/Season NN/`, movies to `Movies/<Title> (<Year>)/`, and the
//! file is renamed to match on the way.
//!
//! # Architecture: One Job Per File
//!
//! Every file is an independent job that runs through the same stages:
//!
//! ```text
//! 1. Classify   file name  →  cloud path       (guessit + naming rules)
//! 2. Stage      staging area next to the file  (random dir, optional encfs)
//! 3. Upload     staging area  →  remote        (rclone / acd_cli, bounded retries)
//! 4. Settle     success → ledger, failure → file moved back
//! 5. Clean up   unmount + delete staging area  (always)
//! ```
//!
//! A job either ends with the original archived in the cloud and its path in
//! the ledger, or with the original back where it started under its original
//! name. Batches run jobs one after another; a failed job never stops the
//! batch.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | File name rules: whitelist, blacklist, subtitle language tags, `[Group]` prefixes |
//! | [`guess`] | guessit invocation and show-name normalization |
//! | [`classify`] | Cloud directory and file name for a source file, including UFC and lecture buckets |
//! | [`staging`] | Per-job staging areas, file moves and rollback |
//! | [`encryption`] | encfs mount/unmount of a staging area |
//! | [`upload`] | Upload tool invocation with bounded retries |
//! | [`ledger`] | Append-only record of uploaded originals |
//! | [`cleanup`] | Unmount and delete staging areas, scoped guard |
//! | [`pipeline`] | Job orchestration, single file and batch |
//! | [`tools`] | Structured external commands with timeouts |
//! | [`config`] | `config.toml` loading, merging with stock defaults, validation |
//! | [`logging`] | stderr logger, optional size-rotated log file |
//! | [`types`] | Jobs and outcomes shared between stages |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## External Tools, Structured Commands
//!
//! Metadata guessing, encryption and upload are all done by external
//! programs. They are invoked with argument vectors, never through a shell,
//! so file names with quotes or `$` cannot inject anything. Every invocation
//! goes through the [`tools::CommandRunner`] trait, which is also where the
//! tests substitute scripted runners.
//!
//! ## Bounded Waits
//!
//! Each tool gets an optional timeout from the config. A tool that hangs is
//! killed and the attempt counts as failed, instead of blocking the job (and
//! every job queued behind it) forever.
//!
//! ## Staging Next To The Source
//!
//! The staging area is created in the source file's own directory. Moving a
//! file into it is a same-filesystem rename, which is instant for multi-GB
//! video files and cannot leave half-copied data behind.
//!
//! ## Encrypt Before Staging
//!
//! When encryption is enabled the encfs view is mounted before the file is
//! moved in. If encfs fails the original was never touched, so there is
//! nothing to roll back.
//!
//! ## One Writer
//!
//! The ledger and the remote sync index are shared, unlocked resources.
//! Running two uploaders at once is unsupported; schedule them serially.

pub mod classify;
pub mod cleanup;
pub mod config;
pub mod encryption;
pub mod guess;
pub mod ledger;
pub mod logging;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod staging;
pub mod tools;
pub mod types;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_helpers;
