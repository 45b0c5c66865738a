//! File classification: raw file name → cloud directory and file name.
//!
//! ## Cloud Layout
//!
//! ```text
//! TV/Show Name/Season 01/Show Name - S01E02.mkv
//! TV/Show Name/Season 01/Show Name - S01E02-E03.he.srt
//! Movies/Movie Title (2020)/Movie Title (2020).mkv
//! UFC/UFC Fight Night 105/UFC Fight Night 105 - Preliminaries.mp4
//! Videos/Masterclass Cooking 01.mp4
//! ```
//!
//! ## Rule Order
//!
//! 1. [`parse_file_name`] rejects non-whitelisted and blacklisted names
//!    before anything else runs.
//! 2. Special buckets, matched by a case-insensitive substring of the name:
//!    `ufc` (fight events, numbered by event) and `masterclass` (lecture
//!    series, kept under the videos root with their original name).
//! 3. The general guesser: episodes need a title, a single season and an
//!    episode; movies need a title and a year.
//!
//! Anything that falls through is skipped, never retried.

use crate::config::{CloudConfig, FilesConfig};
use crate::guess::{GuessError, Guesser, MediaKind, ShowNameFormatter};
use crate::naming::{ParsedName, Rejection, parse_file_name, split_extension, title_case};
use crate::types::UploadJob;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a file was skipped.
#[derive(Error, Debug)]
pub enum SkipReason {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("metadata guess failed: {0}")]
    Guess(#[from] GuessError),
    #[error("couldn't guess file info")]
    Unrecognized,
    #[error("path has no usable file name")]
    NoFileName,
}

/// Where a file goes, relative to the staging subtree / remote root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudTarget {
    pub dir: PathBuf,
    /// File name without language tag and extension.
    pub file_base: String,
}

/// Derives cloud targets from file names.
pub struct Classifier<'a> {
    files: &'a FilesConfig,
    cloud: &'a CloudConfig,
    guesser: &'a dyn Guesser,
    shows: &'a dyn ShowNameFormatter,
}

impl<'a> Classifier<'a> {
    pub fn new(
        files: &'a FilesConfig,
        cloud: &'a CloudConfig,
        guesser: &'a dyn Guesser,
        shows: &'a dyn ShowNameFormatter,
    ) -> Self {
        Self {
            files,
            cloud,
            guesser,
            shows,
        }
    }

    /// Classify a source file into an [`UploadJob`].
    pub fn classify(&self, source_path: &Path) -> Result<UploadJob, SkipReason> {
        let file_name = source_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(SkipReason::NoFileName)?;
        let parsed = parse_file_name(file_name, self.files)?;
        let target = self.target(&parsed)?;
        Ok(UploadJob::new(source_path.to_path_buf(), parsed, target))
    }

    /// Pick the cloud target for an already parsed name.
    pub fn target(&self, parsed: &ParsedName) -> Result<CloudTarget, SkipReason> {
        let lowercase = parsed.guess_name.to_lowercase();
        let target = if lowercase.contains("ufc") {
            self.ufc_target(&parsed.guess_name)?
        } else if lowercase.contains("masterclass") {
            Some(self.masterclass_target(&parsed.guess_name))
        } else {
            self.guessed_target(&parsed.guess_name)?
        };
        target.ok_or(SkipReason::Unrecognized)
    }

    /// Fight events: `UFC/{Title} {NNN}/{Title} {NNN}[ - Preliminaries]`.
    ///
    /// guessit reads `UFC.205` as episode 205; releases numbered like
    /// `S02E05` become event 205.
    fn ufc_target(&self, name: &str) -> Result<Option<CloudTarget>, GuessError> {
        let guess = self.guesser.guess(name)?;
        let Some(mut event) = guess.episode.as_ref().and_then(|e| e.first()).copied() else {
            return Ok(None);
        };
        if let Some(&season) = guess.season.as_ref().and_then(|s| s.first()) {
            match season.checked_mul(100).and_then(|s| event.checked_add(s)) {
                Some(numbered) => event = numbered,
                None => return Ok(None),
            }
        }

        let lowercase = name.to_lowercase();
        let title = if lowercase.contains("fox") {
            "UFC On FOX"
        } else if (lowercase.contains("fight") && lowercase.contains("night"))
            || lowercase.contains("fn")
        {
            "UFC Fight Night"
        } else {
            "UFC"
        };

        let base = format!("{title} {event:03}");
        let mut file_base = base.clone();
        if lowercase.contains("prelim") {
            file_base.push_str(" - Preliminaries");
        }
        Ok(Some(CloudTarget {
            dir: Path::new(&self.cloud.ufc_root).join(base),
            file_base,
        }))
    }

    /// Lecture series keep their name under the videos root.
    fn masterclass_target(&self, name: &str) -> CloudTarget {
        let (stem, _) = split_extension(name);
        CloudTarget {
            dir: PathBuf::from(&self.cloud.videos_root),
            file_base: stem.to_string(),
        }
    }

    fn guessed_target(&self, name: &str) -> Result<Option<CloudTarget>, GuessError> {
        let guess = self.guesser.guess(name)?;
        let Some(title) = guess.title() else {
            return Ok(None);
        };

        let target = match guess.kind {
            Some(MediaKind::Episode) => {
                let title = self.shows.format_show(title);
                let season = match &guess.season {
                    Some(season) if !season.is_many() => season.first().copied(),
                    _ => None,
                };
                match (season, &guess.episode) {
                    (Some(season), Some(episode)) => {
                        let episode_part = match (episode.first(), episode.last()) {
                            (Some(first), Some(last)) if episode.is_many() && first != last => {
                                format!("E{first:02}-E{last:02}")
                            }
                            (Some(first), _) => format!("E{first:02}"),
                            _ => return Ok(None),
                        };
                        // Directories ending with '.' break some cloud drives.
                        let show_dir = title.trim_end_matches('.');
                        Some(CloudTarget {
                            dir: Path::new(&self.cloud.tv_root)
                                .join(show_dir)
                                .join(format!("Season {season:02}")),
                            file_base: format!("{title} - S{season:02}{episode_part}"),
                        })
                    }
                    _ => None,
                }
            }
            Some(MediaKind::Movie) => guess.year.map(|year| {
                let title = title_case(title);
                let base = format!("{title} ({year})");
                CloudTarget {
                    dir: Path::new(&self.cloud.movies_root).join(&base),
                    file_base: base,
                }
            }),
            _ => None,
        };
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guess::{Guess, OneOrMany, ShowNames};
    use crate::test_helpers::{StaticGuesser, episode_guess, movie_guess};
    use std::collections::BTreeMap;

    fn classify_with(guesser: &StaticGuesser, name: &str) -> Result<UploadJob, SkipReason> {
        let files = FilesConfig::default();
        let cloud = CloudConfig::default();
        let shows = ShowNames::default();
        Classifier::new(&files, &cloud, guesser, &shows).classify(Path::new(name))
    }

    #[test]
    fn episode_path() {
        let guesser = StaticGuesser::new().with("Show.Name.S01E02.mkv", episode_guess("Show Name", 1, 2));
        let job = classify_with(&guesser, "/downloads/Show.Name.S01E02.mkv").unwrap();
        assert_eq!(
            job.cloud_path(),
            PathBuf::from("TV/Show Name/Season 01/Show Name - S01E02.mkv")
        );
        assert!(!job.is_subtitle);
    }

    #[test]
    fn movie_path() {
        let guesser = StaticGuesser::new().with("Movie.Title.2020.mkv", movie_guess("movie title", 2020));
        let job = classify_with(&guesser, "Movie.Title.2020.mkv").unwrap();
        assert_eq!(
            job.cloud_path(),
            PathBuf::from("Movies/Movie Title (2020)/Movie Title (2020).mkv")
        );
    }

    #[test]
    fn subtitle_tag_reattached() {
        let guesser = StaticGuesser::new().with("Show.Name.S01E02.mkv", episode_guess("Show Name", 1, 2));
        let job = classify_with(&guesser, "Show.Name.S01E02.he.srt").unwrap();
        assert_eq!(job.cloud_file, "Show Name - S01E02.he.srt");
        assert_eq!(job.language_tag.as_deref(), Some(".he"));
        assert!(job.is_subtitle);
        assert_eq!(guesser.seen(), vec!["Show.Name.S01E02.mkv"]);
    }

    #[test]
    fn subtitle_without_tag_defaults_to_english() {
        let guesser = StaticGuesser::new().with("Show.Name.S01E02.mkv", episode_guess("Show Name", 1, 2));
        let job = classify_with(&guesser, "Show.Name.S01E02.srt").unwrap();
        assert_eq!(job.cloud_file, "Show Name - S01E02.en.srt");
    }

    #[test]
    fn multi_episode_range() {
        let mut guess = episode_guess("Show", 3, 1);
        guess.episode = Some(OneOrMany::Many(vec![1, 2]));
        let guesser = StaticGuesser::new().with("Show.S03E01E02.mkv", guess);
        let job = classify_with(&guesser, "Show.S03E01E02.mkv").unwrap();
        assert_eq!(job.cloud_file, "Show - S03E01-E02.mkv");
    }

    #[test]
    fn season_list_is_unrecognized() {
        let mut guess = episode_guess("Show", 1, 1);
        guess.season = Some(OneOrMany::Many(vec![1, 2]));
        let guesser = StaticGuesser::new().with("Show.S01-S02.mkv", guess);
        assert!(matches!(
            classify_with(&guesser, "Show.S01-S02.mkv"),
            Err(SkipReason::Unrecognized)
        ));
    }

    #[test]
    fn show_dir_trailing_dot_stripped() {
        let guesser = StaticGuesser::new().with("Marvels.Agents.of.S.H.I.E.L.D.S01E01.mkv", episode_guess("Agents of S.H.I.E.L.D.", 1, 1));
        let job = classify_with(&guesser, "Marvels.Agents.of.S.H.I.E.L.D.S01E01.mkv").unwrap();
        assert_eq!(job.cloud_dir, PathBuf::from("TV/Agents of S.H.I.E.L.D/Season 01"));
        assert_eq!(job.cloud_file, "Agents of S.H.I.E.L.D. - S01E01.mkv");
    }

    #[test]
    fn show_title_left_as_guessed() {
        let guesser = StaticGuesser::new().with("the.show.S01E01.mkv", episode_guess("the show", 1, 1));
        let job = classify_with(&guesser, "the.show.S01E01.mkv").unwrap();
        assert_eq!(job.cloud_file, "the show - S01E01.mkv");
    }

    #[test]
    fn show_name_normalizer_applied() {
        let guesser = StaticGuesser::new().with("Office.US.S01E01.mkv", episode_guess("Office US", 1, 1));
        let files = FilesConfig::default();
        let cloud = CloudConfig::default();
        let mut table = BTreeMap::new();
        table.insert("Office US".to_string(), "The Office (US)".to_string());
        let shows = ShowNames::new(table);
        let job = Classifier::new(&files, &cloud, &guesser, &shows)
            .classify(Path::new("Office.US.S01E01.mkv"))
            .unwrap();
        assert_eq!(
            job.cloud_path(),
            PathBuf::from("TV/The Office (US)/Season 01/The Office (US) - S01E01.mkv")
        );
    }

    #[test]
    fn movie_without_year_unrecognized() {
        let mut guess = movie_guess("Movie", 2000);
        guess.year = None;
        let guesser = StaticGuesser::new().with("Movie.mkv", guess);
        assert!(matches!(classify_with(&guesser, "Movie.mkv"), Err(SkipReason::Unrecognized)));
    }

    #[test]
    fn missing_title_unrecognized() {
        let guesser = StaticGuesser::new().with("x.mkv", Guess::default());
        assert!(matches!(classify_with(&guesser, "x.mkv"), Err(SkipReason::Unrecognized)));
    }

    #[test]
    fn whitelist_rejection_never_guesses() {
        let guesser = StaticGuesser::new();
        let result = classify_with(&guesser, "Show.Name.S01E02.nfo");
        assert!(matches!(result, Err(SkipReason::Rejected(Rejection::NotWhitelisted(_)))));
        assert!(guesser.seen().is_empty());
    }

    #[test]
    fn blacklist_rejection_never_guesses() {
        let guesser = StaticGuesser::new();
        let result = classify_with(&guesser, "Movie.2020.Sample.mkv");
        assert!(matches!(result, Err(SkipReason::Rejected(Rejection::Blacklisted(_)))));
        assert!(guesser.seen().is_empty());
    }

    // =========================================================================
    // Special buckets
    // =========================================================================

    #[test]
    fn ufc_numbered_event() {
        let mut guess = Guess::default();
        guess.episode = Some(OneOrMany::One(205));
        let guesser = StaticGuesser::new().with("UFC.205.Alvarez.vs.McGregor.mp4", guess);
        let job = classify_with(&guesser, "UFC.205.Alvarez.vs.McGregor.mp4").unwrap();
        assert_eq!(job.cloud_path(), PathBuf::from("UFC/UFC 205/UFC 205.mp4"));
    }

    #[test]
    fn ufc_fight_night_prelims_with_season() {
        let mut guess = Guess::default();
        guess.season = Some(OneOrMany::One(1));
        guess.episode = Some(OneOrMany::One(5));
        let name = "UFC.Fight.Night.S01E05.Prelims.mkv";
        let guesser = StaticGuesser::new().with(name, guess);
        let job = classify_with(&guesser, name).unwrap();
        assert_eq!(
            job.cloud_path(),
            PathBuf::from("UFC/UFC Fight Night 105/UFC Fight Night 105 - Preliminaries.mkv")
        );
    }

    #[test]
    fn ufc_on_fox() {
        let mut guess = Guess::default();
        guess.episode = Some(OneOrMany::One(22));
        let guesser = StaticGuesser::new().with("UFC.on.FOX.22.mkv", guess);
        let job = classify_with(&guesser, "UFC.on.FOX.22.mkv").unwrap();
        assert_eq!(job.cloud_file, "UFC On FOX 022.mkv");
    }

    #[test]
    fn ufc_without_event_number_unrecognized() {
        let guesser = StaticGuesser::new().with("UFC.Highlights.mkv", Guess::default());
        assert!(matches!(
            classify_with(&guesser, "UFC.Highlights.mkv"),
            Err(SkipReason::Unrecognized)
        ));
    }

    #[test]
    fn masterclass_bucket_skips_guesser() {
        let guesser = StaticGuesser::new();
        let job = classify_with(&guesser, "MasterClass.Cooking.01.mp4").unwrap();
        assert_eq!(job.cloud_path(), PathBuf::from("Videos/MasterClass.Cooking.01.mp4"));
        assert!(guesser.seen().is_empty());
    }

    #[test]
    fn ufc_event_number_overflow_unrecognized() {
        let mut guess = Guess::default();
        guess.season = Some(OneOrMany::One(u32::MAX));
        guess.episode = Some(OneOrMany::One(5));
        let guesser = StaticGuesser::new().with("UFC.S4294967295E05.mkv", guess);
        let result = classify_with(&guesser, "UFC.S4294967295E05.mkv");
        assert!(matches!(result, Err(SkipReason::Unrecognized)));
    }

    #[test]
    fn special_bucket_checked_before_guesser() {
        // Would otherwise guess as a regular episode.
        let mut guess = episode_guess("UFC", 1, 5);
        guess.kind = Some(MediaKind::Episode);
        let guesser = StaticGuesser::new().with("UFC.S01E05.mkv", guess);
        let job = classify_with(&guesser, "UFC.S01E05.mkv").unwrap();
        assert_eq!(job.cloud_dir, PathBuf::from("UFC/UFC 105"));
    }
}
