//! Filename parsing for incoming media files.
//!
//! Every file handed to the uploader goes through [`parse_file_name`] before
//! any metadata guessing happens. It enforces the extension whitelist and the
//! name blacklist, splits off the extension (and for subtitles, the language
//! tag), and produces the name the metadata guesser should see.
//!
//! ## Subtitle Names
//!
//! Subtitles carry a two-letter language tag before the extension:
//! - `Show.Name.S01E02.he.srt` → tag `.he`, guessed as `Show.Name.S01E02.mkv`
//! - `Show.Name.S01E02.srt` → no tag, the default language (`.en`) is assumed
//!
//! The guesser is fed a fake video extension so it classifies the subtitle
//! the same way it would classify the matching video.
//!
//! ## Release Group Prefixes
//!
//! A leading `[Group]` prefix is dropped before guessing:
//! `[HorribleSubs] Show - 01.mkv` → `Show - 01.mkv`.

use crate::config::FilesConfig;
use thiserror::Error;

/// Why a file name was refused before classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("file has no extension")]
    NoExtension,
    #[error("extension '{0}' is not in the white list")]
    NotWhitelisted(String),
    #[error("file name contains a black listed word ({0})")]
    Blacklisted(String),
}

/// Result of parsing an incoming media file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Lower-cased extension with leading dot (`.mkv`).
    pub extension: String,
    /// Language tag for subtitles (`.he`), always set when `is_subtitle`.
    pub language_tag: Option<String>,
    pub is_subtitle: bool,
    /// Name handed to the metadata guesser.
    pub guess_name: String,
}

/// Split `name` into `(stem, extension)` at the last dot.
///
/// Leading dots don't count, so `.hidden` has no extension.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && !name[..pos].chars().all(|c| c == '.') => {
            (&name[..pos], Some(&name[pos..]))
        }
        _ => (name, None),
    }
}

/// Drop a leading `[Group]` release prefix.
pub fn strip_group_prefix(name: &str) -> &str {
    if name.starts_with('[')
        && let Some(end) = name.find(']')
    {
        return name[end + 1..].trim_start();
    }
    name
}

/// Parse a file name against the configured whitelist, blacklist and
/// subtitle rules.
pub fn parse_file_name(file_name: &str, files: &FilesConfig) -> Result<ParsedName, Rejection> {
    let (stem, extension) = split_extension(file_name);
    let extension = extension.ok_or(Rejection::NoExtension)?.to_lowercase();
    if !files.whitelist.iter().any(|w| w.eq_ignore_ascii_case(&extension)) {
        return Err(Rejection::NotWhitelisted(extension));
    }

    let lowercase_stem = stem.to_lowercase();
    if let Some(word) = files
        .blacklist
        .iter()
        .find(|word| lowercase_stem.contains(&word.to_lowercase()))
    {
        return Err(Rejection::Blacklisted(word.clone()));
    }

    let is_subtitle = files
        .subtitle_extensions
        .iter()
        .any(|s| s.eq_ignore_ascii_case(&extension));

    let (guess_stem, language_tag) = if is_subtitle {
        let (inner_stem, inner_ext) = split_extension(stem);
        let tag = inner_ext.and_then(|ext| {
            files
                .language_tags
                .iter()
                .find(|tag| tag.eq_ignore_ascii_case(ext))
        });
        match tag {
            Some(tag) => (inner_stem, Some(tag.clone())),
            None => (stem, Some(files.default_language.clone())),
        }
    } else {
        (stem, None)
    };

    let guess_name = if is_subtitle {
        format!("{}{}", guess_stem, files.default_video_extension)
    } else {
        format!("{}{}", guess_stem, extension)
    };

    Ok(ParsedName {
        extension,
        language_tag,
        is_subtitle,
        guess_name: strip_group_prefix(&guess_name).to_string(),
    })
}

/// Capitalize the first letter of every word and lower-case the rest.
///
/// A word starts after any character that is neither alphanumeric nor an
/// apostrophe.
///
/// - `"movie title"` → `"Movie Title"`
/// - `"THE MATRIX"` → `"The Matrix"`
/// - `"spider-man"` → `"Spider-Man"`
/// - `"it's"` → `"It's"`
pub fn title_case(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut prev: Option<char> = None;
    for c in title.chars() {
        let starts_word = prev.is_none_or(|p| !p.is_alphanumeric() && p != '\'');
        if starts_word {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        prev = Some(c);
    }
    out
}
