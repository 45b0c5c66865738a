use clap::{CommandFactory, Parser, Subcommand};
use cloud_uploader::guess::{GuessitCli, ShowNames};
use cloud_uploader::ledger::DEFAULT_RECENT_LIMIT;
use cloud_uploader::pipeline::{PipelineError, Uploader};
use cloud_uploader::tools::SystemRunner;
use cloud_uploader::types::JobOutcome;
use cloud_uploader::{config, logging, output};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "cloud-uploader")]
#[command(about = "Stage, encrypt and upload media files into a cloud drive")]
#[command(long_about = "\
Stage, encrypt and upload media files into a cloud drive

The file name decides where a file goes. guessit extracts title, season,
episode and year, and the file is renamed on the way:

  Show.Name.S01E02.mkv     → TV/Show Name/Season 01/Show Name - S01E02.mkv
  Show.Name.S01E02.he.srt  → TV/Show Name/Season 01/Show Name - S01E02.he.srt
  Movie.Title.2020.mkv     → Movies/Movie Title (2020)/Movie Title (2020).mkv

Each file is staged in a temporary directory next to it, optionally
encrypted with encfs, and uploaded with rclone or acd_cli. A failed upload
moves the file back under its original name. Uploaded originals are
appended to the ledger for subtitle discovery.

Run 'cloud-uploader gen-config' to generate a documented config.toml.")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Config file (stock defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// File to classify and upload (same as `upload <FILE>`)
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a file and upload it
    Upload { file: PathBuf },
    /// Upload a file as-is under the videos root
    Video { file: PathBuf },
    /// Upload every file below a directory, one at a time
    Batch {
        dir: PathBuf,
        /// Upload as plain videos instead of classifying
        #[arg(long)]
        videos: bool,
    },
    /// Show where a file would be uploaded, without touching it
    Classify { file: PathBuf },
    /// Print the most recent ledger entries
    Ledger {
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let command = match (cli.command, cli.file) {
        (Some(command), _) => command,
        (None, Some(file)) => Command::Upload { file },
        (None, None) => {
            eprintln!("{}", Cli::command().render_help());
            return Ok(ExitCode::from(2));
        }
    };

    if let Command::GenConfig = command {
        print!("{}", config::stock_config_toml());
        return Ok(ExitCode::SUCCESS);
    }

    let config = config::load_config(cli.config.as_deref())?;
    logging::init(&config)?;

    let runner = SystemRunner;
    let guesser = GuessitCli::new(&config.guessit, &runner);
    let shows = ShowNames::new(config.show_names.clone());
    let uploader = Uploader::new(&config, &runner, &guesser, &shows);

    let code = match command {
        Command::Upload { file } => report(&file, uploader.upload_file(&file)),
        Command::Video { file } => report(&file, uploader.upload_video(&file)),
        Command::Batch { dir, videos } => match uploader.upload_dir(&dir, videos) {
            Ok(summary) => {
                output::print_batch_summary(&summary);
                summary.exit_code
            }
            Err(e) => {
                log::error!("{e}");
                1
            }
        },
        Command::Classify { file } => {
            output::print_classification(&file, &uploader.classify(&file));
            0
        }
        Command::Ledger { limit } => {
            let entries = uploader.ledger().recent(limit)?;
            output::print_ledger(&entries);
            0
        }
        Command::GenConfig => 0,
    };

    Ok(exit_code(code))
}

/// Print a single job's result and return its exit code.
fn report(file: &Path, result: Result<JobOutcome, PipelineError>) -> i32 {
    match result {
        Ok(outcome) => {
            output::print_outcome(file, &outcome);
            outcome.exit_code()
        }
        Err(e) => {
            log::error!("{e}");
            1
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}
