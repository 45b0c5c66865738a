//! Shared test utilities for the cloud-uploader test suite.
//!
//! Provides scripted stand-ins for the external tools ([`MockRunner`]) and
//! for guessit ([`StaticGuesser`]), plus small fixture builders.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! // encfs fails, everything else succeeds
//! let runner = MockRunner::new().on("encfs", &[1]);
//! let guesser = StaticGuesser::new()
//!     .with("Show.Name.S01E02.mkv", episode_guess("Show Name", 1, 2));
//!
//! // ... run the code under test ...
//!
//! assert_eq!(runner.calls_to("encfs").len(), 1);
//! assert_eq!(guesser.seen(), vec!["Show.Name.S01E02.mkv"]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::guess::{Guess, GuessError, Guesser, MediaKind, OneOrMany};
use crate::tools::{CommandRunner, ToolCommand, ToolError, ToolOutput};
use crate::types::UploadJob;

// =========================================================================
// Scripted command runner
// =========================================================================

/// Queue key matching any program.
const ANY: &str = "*";

#[derive(Debug, Clone)]
enum Scripted {
    Code(i32),
    Stdout(String),
}

/// A [`CommandRunner`] that records every command and answers from scripts.
///
/// Answers are looked up by program file name (`rclone`, `encfs`, ...):
/// first that program's queue, then the any-program queue, then the
/// default exit code (0 unless changed).
pub struct MockRunner {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    timeouts: Vec<String>,
    default_code: i32,
    calls: Mutex<Vec<ToolCommand>>,
}

impl MockRunner {
    /// Every command succeeds.
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            timeouts: Vec::new(),
            default_code: 0,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Commands exit with `codes` in order, whatever the program.
    pub fn with_codes(codes: &[i32]) -> Self {
        let runner = Self::new();
        runner.push(ANY, codes.iter().map(|&c| Scripted::Code(c)));
        runner
    }

    /// Queue exit codes for one program.
    pub fn on(self, program: &str, codes: &[i32]) -> Self {
        self.push(program, codes.iter().map(|&c| Scripted::Code(c)));
        self
    }

    /// Exit code once the scripts run dry.
    pub fn default_code(mut self, code: i32) -> Self {
        self.default_code = code;
        self
    }

    /// Every run of `program` times out.
    pub fn timeout_on(mut self, program: &str) -> Self {
        self.timeouts.push(program.to_string());
        self
    }

    /// Queue a successful run that prints `stdout`.
    pub fn push_stdout(&self, stdout: &str) {
        self.push(ANY, [Scripted::Stdout(stdout.to_string())]);
    }

    fn push(&self, program: &str, items: impl IntoIterator<Item = Scripted>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(program.to_string())
            .or_default()
            .extend(items);
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands run for one program.
    pub fn calls_to(&self, program: &str) -> Vec<ToolCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.name() == program)
            .collect()
    }

    /// Commands whose argument list contains `arg`.
    pub fn calls_with_arg(&self, arg: &str) -> Vec<ToolCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.has_arg(arg))
            .collect()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(command.clone());
        let name = command.name();

        if self.timeouts.contains(&name) {
            return Err(ToolError::TimedOut {
                program: command.program.clone(),
                timeout: command.timeout.unwrap_or(Duration::from_secs(1)),
            });
        }

        let next = {
            let mut scripts = self.scripts.lock().unwrap();
            scripts
                .get_mut(&name)
                .and_then(VecDeque::pop_front)
                .or_else(|| scripts.get_mut(ANY).and_then(VecDeque::pop_front))
        };
        Ok(match next {
            Some(Scripted::Code(code)) => ToolOutput {
                code: Some(code),
                stdout: Vec::new(),
            },
            Some(Scripted::Stdout(out)) => ToolOutput {
                code: Some(0),
                stdout: out.into_bytes(),
            },
            None => ToolOutput {
                code: Some(self.default_code),
                stdout: Vec::new(),
            },
        })
    }
}

/// The argument list of a command as plain strings.
pub fn arg_strings(cmd: &ToolCommand) -> Vec<String> {
    cmd.args
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

// =========================================================================
// Canned guesses
// =========================================================================

/// A [`Guesser`] answering from a fixed table.
///
/// Unknown names get an empty [`Guess`], which the classifier treats as
/// unrecognized. Every queried name is recorded.
#[derive(Default)]
pub struct StaticGuesser {
    answers: HashMap<String, Guess>,
    seen: Mutex<Vec<String>>,
}

impl StaticGuesser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, guess: Guess) -> Self {
        self.answers.insert(name.to_string(), guess);
        self
    }

    /// Names the guesser was asked about, in order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl Guesser for StaticGuesser {
    fn guess(&self, name: &str) -> Result<Guess, GuessError> {
        self.seen.lock().unwrap().push(name.to_string());
        Ok(self.answers.get(name).cloned().unwrap_or_default())
    }
}

pub fn episode_guess(title: &str, season: u32, episode: u32) -> Guess {
    Guess {
        kind: Some(MediaKind::Episode),
        title: Some(OneOrMany::One(title.to_string())),
        season: Some(OneOrMany::One(season)),
        episode: Some(OneOrMany::One(episode)),
        year: None,
    }
}

pub fn movie_guess(title: &str, year: u32) -> Guess {
    Guess {
        kind: Some(MediaKind::Movie),
        title: Some(OneOrMany::One(title.to_string())),
        season: None,
        episode: None,
        year: Some(year),
    }
}

// =========================================================================
// Fixtures
// =========================================================================

/// Write `contents` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// The job classification would build for `Show.Name.S01E02.mkv`.
pub fn episode_job(source: &Path) -> UploadJob {
    UploadJob {
        source_path: source.to_path_buf(),
        cloud_dir: PathBuf::from("TV/Show Name/Season 01"),
        cloud_file: "Show Name - S01E02.mkv".to_string(),
        extension: ".mkv".to_string(),
        language_tag: None,
        is_subtitle: false,
        record_in_ledger: true,
    }
}
