//! Metadata guessing and show-name normalization.
//!
//! Title/season/episode/year extraction is delegated to guessit, run as an
//! external tool with JSON output (`guessit --json <name>`). Only the keys
//! the classifier needs are read; everything else guessit reports is ignored.
//!
//! guessit is loose about value shapes: `title` and `episode` may come back
//! as lists (multi-episode releases, ambiguous titles), so both are modelled
//! with [`OneOrMany`].

use crate::config::GuessitConfig;
use crate::tools::{CommandRunner, ToolCommand, ToolError};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuessError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("guessit exited with code {0:?}")]
    ExitCode(Option<i32>),
    #[error("could not parse guessit output: {0}")]
    Json(#[from] serde_json::Error),
}

/// A JSON value that is either a single item or a list of items.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(v) => Some(v),
            OneOrMany::Many(v) => v.first(),
        }
    }

    pub fn last(&self) -> Option<&T> {
        match self {
            OneOrMany::One(v) => Some(v),
            OneOrMany::Many(v) => v.last(),
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Episode,
    Movie,
    #[serde(other)]
    Other,
}

/// The subset of guessit's output the classifier uses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Guess {
    #[serde(rename = "type")]
    pub kind: Option<MediaKind>,
    pub title: Option<OneOrMany<String>>,
    pub season: Option<OneOrMany<u32>>,
    pub episode: Option<OneOrMany<u32>>,
    pub year: Option<u32>,
}

impl Guess {
    /// First title, ignoring empty strings.
    pub fn title(&self) -> Option<&str> {
        self.title
            .as_ref()
            .and_then(OneOrMany::first)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }
}

/// Extracts media metadata from a file name.
pub trait Guesser {
    fn guess(&self, name: &str) -> Result<Guess, GuessError>;
}

/// Runs the guessit command line tool.
pub struct GuessitCli<'a> {
    config: &'a GuessitConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> GuessitCli<'a> {
    pub fn new(config: &'a GuessitConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    pub fn command(&self, name: &str) -> ToolCommand {
        ToolCommand::new(&self.config.path)
            .arg("--json")
            .arg(name)
            .capture_stdout()
            .timeout(crate::config::timeout(self.config.timeout_secs))
    }
}

impl Guesser for GuessitCli<'_> {
    fn guess(&self, name: &str) -> Result<Guess, GuessError> {
        let output = self.runner.run(&self.command(name))?;
        if !output.success() {
            return Err(GuessError::ExitCode(output.code));
        }
        let guess: Guess = serde_json::from_slice(&output.stdout)?;
        log::debug!("guessit: {name} → {guess:?}");
        Ok(guess)
    }
}

/// Maps a guessed show title to its canonical form.
pub trait ShowNameFormatter {
    fn format_show(&self, title: &str) -> String;
}

/// Table-driven show name normalizer.
///
/// Exact matches win; otherwise the lookup is case-insensitive. Unknown
/// titles pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct ShowNames {
    names: BTreeMap<String, String>,
}

impl ShowNames {
    pub fn new(names: BTreeMap<String, String>) -> Self {
        Self { names }
    }
}

impl ShowNameFormatter for ShowNames {
    fn format_show(&self, title: &str) -> String {
        if let Some(name) = self.names.get(title) {
            return name.clone();
        }
        self.names
            .iter()
            .find(|(guessed, _)| guessed.eq_ignore_ascii_case(title))
            .map(|(_, canonical)| canonical.clone())
            .unwrap_or_else(|| title.to_string())
    }
}
