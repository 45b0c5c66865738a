//! Uploader configuration module.
//!
//! Handles loading, validating, and merging the uploader's `config.toml`.
//! Stock defaults are the base layer; a user file only needs the keys it
//! wants to override. The resulting [`UploaderConfig`] is built once at
//! process start and passed by reference into every pipeline component.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! move_files = true            # false = copy, leaving the original in place
//! # log_file = "/var/log/cloud_uploader.log"
//! log_max_bytes = 5242880      # rotate the log file at 5 MiB
//! log_backups = 1              # rotated files kept (.1, .2, ...)
//!
//! [files]
//! whitelist = [".srt", ".mkv", ".avi", ".mp4", ".m4v", ".wmv", ".mpg", ".mov"]
//! blacklist = ["sample"]
//! subtitle_extensions = [".srt"]
//! language_tags = [".he", ".en"]
//! default_language = ".en"
//! default_video_extension = ".mkv"
//!
//! [cloud]
//! plain_dir = "Media"
//! encrypted_dir = "Encrypted"
//! tv_root = "TV"
//! movies_root = "Movies"
//! ufc_root = "UFC"
//! videos_root = "Videos"
//!
//! [upload]
//! backend = "rclone"           # or "acd_cli"
//! rclone_path = "/usr/bin/rclone"
//! rclone_config = "/mnt/vdb/rclone.conf"
//! remote = "GDrive"
//! acd_cli_path = "/usr/bin/acd_cli"
//! max_tries = 3
//! # timeout_secs = 7200
//!
//! [encryption]
//! enabled = false
//! encfs_path = "/usr/bin/encfs"
//! fusermount_path = "/usr/bin/fusermount"
//! env_var = "ENCFS6_CONFIG"
//! config_path = "/mnt/vdb/encfs6.xml"
//! password = ""
//! # timeout_secs = 60
//!
//! [guessit]
//! path = "guessit"
//! timeout_secs = 60
//!
//! [ledger]
//! path = "/mnt/vdb/original_names.log"
//!
//! [show_names]
//! "Its Always Sunny in Philadelphia" = "It's Always Sunny in Philadelphia"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Uploader configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploaderConfig {
    /// Move the source into staging (true) or copy it (false).
    /// Only move semantics need a rollback on failure.
    pub move_files: bool,
    /// Optional file that receives a copy of every log line.
    pub log_file: Option<PathBuf>,
    /// Size at which `log_file` is rotated.
    pub log_max_bytes: u64,
    /// Rotated log files kept next to `log_file`.
    pub log_backups: u32,
    pub files: FilesConfig,
    pub cloud: CloudConfig,
    pub upload: UploadConfig,
    pub encryption: EncryptionConfig,
    pub guessit: GuessitConfig,
    pub ledger: LedgerConfig,
    /// Guessed show title → canonical show title.
    pub show_names: BTreeMap<String, String>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            move_files: true,
            log_file: None,
            log_max_bytes: 5 * 1024 * 1024,
            log_backups: 1,
            files: FilesConfig::default(),
            cloud: CloudConfig::default(),
            upload: UploadConfig::default(),
            encryption: EncryptionConfig::default(),
            guessit: GuessitConfig::default(),
            ledger: LedgerConfig::default(),
            show_names: BTreeMap::new(),
        }
    }
}

impl UploaderConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload.max_tries == 0 {
            return Err(ConfigError::Validation(
                "upload.max_tries must be at least 1".into(),
            ));
        }
        if self.log_max_bytes == 0 || self.log_backups == 0 {
            return Err(ConfigError::Validation(
                "log_max_bytes and log_backups must be at least 1".into(),
            ));
        }
        if self.files.whitelist.is_empty() {
            return Err(ConfigError::Validation(
                "files.whitelist must not be empty".into(),
            ));
        }
        for ext in self.files.whitelist.iter().chain(&self.files.subtitle_extensions) {
            if !ext.starts_with('.') {
                return Err(ConfigError::Validation(format!(
                    "extension '{ext}' must start with a dot"
                )));
            }
        }
        for tag in self
            .files
            .language_tags
            .iter()
            .chain(std::iter::once(&self.files.default_language))
        {
            if !is_language_tag(tag) {
                return Err(ConfigError::Validation(format!(
                    "language tag '{tag}' must look like '.xx'"
                )));
            }
        }
        if self.cloud.plain_dir == self.cloud.encrypted_dir {
            return Err(ConfigError::Validation(
                "cloud.plain_dir and cloud.encrypted_dir must differ".into(),
            ));
        }
        if self.encryption.enabled && self.encryption.password.is_empty() {
            return Err(ConfigError::Validation(
                "encryption.password must be set when encryption is enabled".into(),
            ));
        }
        Ok(())
    }
}

/// A language tag is a dot followed by exactly two ASCII letters.
fn is_language_tag(tag: &str) -> bool {
    tag.len() == 3 && tag.starts_with('.') && tag[1..].chars().all(|c| c.is_ascii_alphabetic())
}

/// Which files are accepted and how their names are split.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesConfig {
    /// Accepted extensions, lower-case with leading dot.
    pub whitelist: Vec<String>,
    /// Case-insensitive substrings that disqualify a file name.
    pub blacklist: Vec<String>,
    pub subtitle_extensions: Vec<String>,
    /// Recognized subtitle language tags (`.he`, `.en`).
    pub language_tags: Vec<String>,
    /// Tag assumed for subtitles without one.
    pub default_language: String,
    /// Extension fed to the guesser in place of a subtitle extension.
    pub default_video_extension: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            whitelist: [".srt", ".mkv", ".avi", ".mp4", ".m4v", ".wmv", ".mpg", ".mov"]
                .map(String::from)
                .to_vec(),
            blacklist: vec!["sample".to_string()],
            subtitle_extensions: vec![".srt".to_string()],
            language_tags: vec![".he".to_string(), ".en".to_string()],
            default_language: ".en".to_string(),
            default_video_extension: ".mkv".to_string(),
        }
    }
}

/// Names of the staging subtrees and the cloud library roots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CloudConfig {
    pub plain_dir: String,
    pub encrypted_dir: String,
    pub tv_root: String,
    pub movies_root: String,
    pub ufc_root: String,
    pub videos_root: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            plain_dir: "Media".to_string(),
            encrypted_dir: "Encrypted".to_string(),
            tv_root: "TV".to_string(),
            movies_root: "Movies".to_string(),
            ufc_root: "UFC".to_string(),
            videos_root: "Videos".to_string(),
        }
    }
}

/// External sync/upload tool selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadBackend {
    #[default]
    Rclone,
    AcdCli,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    pub backend: UploadBackend,
    pub rclone_path: PathBuf,
    pub rclone_config: PathBuf,
    /// rclone remote name, without the trailing colon.
    pub remote: String,
    pub acd_cli_path: PathBuf,
    /// Total upload attempts per job, including the first.
    pub max_tries: u32,
    /// Per-attempt timeout. Unset waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            backend: UploadBackend::Rclone,
            rclone_path: PathBuf::from("/usr/bin/rclone"),
            rclone_config: PathBuf::from("/mnt/vdb/rclone.conf"),
            remote: "GDrive".to_string(),
            acd_cli_path: PathBuf::from("/usr/bin/acd_cli"),
            max_tries: 3,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncryptionConfig {
    pub enabled: bool,
    pub encfs_path: PathBuf,
    pub fusermount_path: PathBuf,
    /// Environment variable encfs reads its config location from.
    pub env_var: String,
    /// Value used for `env_var` when the environment doesn't define it.
    pub config_path: PathBuf,
    pub password: String,
    pub timeout_secs: Option<u64>,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            encfs_path: PathBuf::from("/usr/bin/encfs"),
            fusermount_path: PathBuf::from("/usr/bin/fusermount"),
            env_var: "ENCFS6_CONFIG".to_string(),
            config_path: PathBuf::from("/mnt/vdb/encfs6.xml"),
            password: String::new(),
            timeout_secs: Some(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuessitConfig {
    pub path: PathBuf,
    pub timeout_secs: Option<u64>,
}

impl Default for GuessitConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("guessit"),
            timeout_secs: Some(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/mnt/vdb/original_names.log"),
        }
    }
}

/// Convert an optional seconds value into a timeout.
pub fn timeout(secs: Option<u64>) -> Option<Duration> {
    secs.map(Duration::from_secs)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(UploaderConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<UploaderConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: UploaderConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the uploader config.
///
/// `None` yields the validated stock defaults. A given path must exist.
pub fn load_config(path: Option<&Path>) -> Result<UploaderConfig, ConfigError> {
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Cloud Uploader Configuration
# ============================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Move the source file into the staging area (true) or copy it (false).
# With move semantics a failed upload moves the file back where it was.
move_files = true

# Append every log line to this file as well as stderr.
# log_file = "/var/log/cloud_uploader.log"

# The log file is rotated once it reaches log_max_bytes; log_backups rotated
# files are kept (cloud_uploader.log.1, ...).
log_max_bytes = 5242880
log_backups = 1

# ---------------------------------------------------------------------------
# Accepted files
# ---------------------------------------------------------------------------
[files]
whitelist = [".srt", ".mkv", ".avi", ".mp4", ".m4v", ".wmv", ".mpg", ".mov"]
# Case-insensitive substrings that cause a file to be skipped.
blacklist = ["sample"]
subtitle_extensions = [".srt"]
# Subtitle language tags, e.g. Show.S01E02.he.srt
language_tags = [".he", ".en"]
default_language = ".en"
# Subtitle names are guessed as if they had this extension.
default_video_extension = ".mkv"

# ---------------------------------------------------------------------------
# Cloud layout
# ---------------------------------------------------------------------------
[cloud]
plain_dir = "Media"
encrypted_dir = "Encrypted"
tv_root = "TV"
movies_root = "Movies"
ufc_root = "UFC"
videos_root = "Videos"

# ---------------------------------------------------------------------------
# Upload tool
# ---------------------------------------------------------------------------
[upload]
# "rclone" or "acd_cli"
backend = "rclone"
rclone_path = "/usr/bin/rclone"
rclone_config = "/mnt/vdb/rclone.conf"
remote = "GDrive"
acd_cli_path = "/usr/bin/acd_cli"
# Total attempts, including the first one.
max_tries = 3
# Kill an attempt that runs longer than this. Omit to wait forever.
# timeout_secs = 7200

# ---------------------------------------------------------------------------
# encfs encryption
# ---------------------------------------------------------------------------
[encryption]
enabled = false
encfs_path = "/usr/bin/encfs"
fusermount_path = "/usr/bin/fusermount"
# encfs reads its config location from this variable. When the environment
# doesn't define it, config_path is passed to encfs instead.
env_var = "ENCFS6_CONFIG"
config_path = "/mnt/vdb/encfs6.xml"
# Written to encfs on stdin. Required when enabled.
password = ""
timeout_secs = 60

# ---------------------------------------------------------------------------
# Metadata guesser (guessit CLI, JSON output)
# ---------------------------------------------------------------------------
[guessit]
path = "guessit"
timeout_secs = 60

# ---------------------------------------------------------------------------
# Ledger of uploaded originals (read later by subtitle discovery)
# ---------------------------------------------------------------------------
[ledger]
path = "/mnt/vdb/original_names.log"

# ---------------------------------------------------------------------------
# Show name normalization: guessed title = canonical title
# ---------------------------------------------------------------------------
[show_names]
"##
}
