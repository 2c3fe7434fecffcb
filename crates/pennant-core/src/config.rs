// Configuration loading and parsing (league.toml).

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to seed {path} from defaults: {source}")]
    SeedError {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

/// Club names a roster entry (or an adjustment) may use.
pub const MLB_CLUBS: [&str; 30] = [
    "Angels",
    "Astros",
    "Athletics",
    "Blue Jays",
    "Braves",
    "Brewers",
    "Cardinals",
    "Cubs",
    "Diamondbacks",
    "Dodgers",
    "Giants",
    "Guardians",
    "Mariners",
    "Marlins",
    "Mets",
    "Nationals",
    "Orioles",
    "Padres",
    "Phillies",
    "Pirates",
    "Rangers",
    "Rays",
    "Red Sox",
    "Reds",
    "Rockies",
    "Royals",
    "Tigers",
    "Twins",
    "White Sox",
    "Yankees",
];

/// Whether `team` names one of the clubs in [`MLB_CLUBS`] (exact match).
pub fn is_known_club(team: &str) -> bool {
    MLB_CLUBS.contains(&team)
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueSettings,
    pub source: SourceConfig,
    pub today: TodayConfig,
    pub cache: CacheConfig,
    /// Ordered (identity, team) pairs. Duplicates are kept as written.
    pub roster: Vec<RosterEntry>,
    /// Display aliases keyed by lowercased identity.
    pub aliases: HashMap<String, String>,
    pub adjustments: Adjustments,
}

impl Config {
    /// Display name for an identity: its alias when one is configured,
    /// otherwise the identity itself.
    pub fn display_name<'a>(&'a self, identity: &'a str) -> &'a str {
        self.aliases
            .get(&identity.trim().to_lowercase())
            .map(String::as_str)
            .unwrap_or(identity)
    }
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire league.toml file.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueSettings,
    source: SourceConfig,
    #[serde(default)]
    today: TodayFile,
    #[serde(default)]
    cache: CacheConfig,
    roster: Vec<RosterEntry>,
    #[serde(default)]
    aliases: HashMap<String, String>,
    #[serde(default)]
    adjustments: Adjustments,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueSettings {
    pub name: String,
    /// Competition mode tag a match must carry to count (compared uppercase).
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Matches played before midnight (UTC) of this date are ignored.
    pub since: NaiveDate,
    #[serde(default = "default_scheduled_games")]
    pub scheduled_games: u32,
    #[serde(default = "default_points_per_win")]
    pub points_per_win: i32,
    #[serde(default = "default_points_per_loss")]
    pub points_per_loss: i32,
    /// Participant names treated as the automated opponent.
    #[serde(default = "default_automated_opponents")]
    pub automated_opponents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_pages")]
    pub pages: Vec<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total tries per page, including the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Key granularity for collapsing the same match reported twice in the
/// today-feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupGranularity {
    #[default]
    Day,
    Minute,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct TodayFile {
    time_zone: String,
    zone_label: String,
    dedup_granularity: DedupGranularity,
    numbered: bool,
}

impl Default for TodayFile {
    fn default() -> Self {
        Self {
            time_zone: "America/Santiago".into(),
            zone_label: "hora Chile".into(),
            dedup_granularity: DedupGranularity::Day,
            numbered: false,
        }
    }
}

/// The public today-feed config assembled from the `[today]` table.
#[derive(Debug, Clone)]
pub struct TodayConfig {
    pub time_zone: Tz,
    pub zone_label: String,
    pub dedup_granularity: DedupGranularity,
    pub numbered: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub standings_ttl_secs: u64,
    pub today_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            standings_ttl_secs: 60,
            today_ttl_secs: 30,
        }
    }
}

impl CacheConfig {
    pub fn standings_ttl(&self) -> Duration {
        Duration::from_secs(self.standings_ttl_secs)
    }

    pub fn today_ttl(&self) -> Duration {
        Duration::from_secs(self.today_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RosterEntry {
    /// Exact, case-sensitive username on the statistics service.
    pub identity: String,
    pub team: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RecordAdjustment {
    #[serde(default)]
    pub wins: i32,
    #[serde(default)]
    pub losses: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PointAdjustment {
    pub points: i32,
    #[serde(default)]
    pub reason: String,
}

/// Manual corrections keyed by team name (exact match).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Adjustments {
    #[serde(default)]
    pub record: HashMap<String, RecordAdjustment>,
    #[serde(default)]
    pub points: HashMap<String, PointAdjustment>,
}

impl Adjustments {
    pub fn record_for(&self, team: &str) -> RecordAdjustment {
        self.record.get(team).copied().unwrap_or_default()
    }

    pub fn points_for(&self, team: &str) -> Option<&PointAdjustment> {
        self.points.get(team)
    }
}

fn default_mode() -> String {
    "LEAGUE".into()
}
fn default_scheduled_games() -> u32 {
    13
}
fn default_points_per_win() -> i32 {
    3
}
fn default_points_per_loss() -> i32 {
    2
}
fn default_automated_opponents() -> Vec<String> {
    vec!["CPU".into()]
}
fn default_platform() -> String {
    "psn".into()
}
fn default_pages() -> Vec<u32> {
    vec![1, 2]
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_attempts() -> u32 {
    2
}
fn default_retry_delay_ms() -> u64 {
    400
}
fn default_max_concurrent_fetches() -> usize {
    4
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Parse and validate league.toml contents. `path` is only used for error
/// messages.
pub fn parse_league_toml(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let file: LeagueFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let time_zone: Tz = file
        .today
        .time_zone
        .parse()
        .map_err(|e| invalid("today.time_zone", format!("{e}")))?;

    let config = Config {
        league: file.league,
        source: file.source,
        today: TodayConfig {
            time_zone,
            zone_label: file.today.zone_label,
            dedup_granularity: file.today.dedup_granularity,
            numbered: file.today.numbered,
        },
        cache: file.cache,
        roster: file.roster,
        aliases: file
            .aliases
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect(),
        adjustments: file.adjustments,
    };

    validate(&config)?;

    Ok(config)
}

/// Where the editable league file lives under `base_dir`.
pub fn league_toml_path(base_dir: &Path) -> PathBuf {
    base_dir.join("config").join("league.toml")
}

/// Load and validate `config/league.toml` relative to `base_dir`.
/// Does not seed from defaults; see [`load_config`].
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = league_toml_path(base_dir);
    let text = read_file(&path)?;
    parse_league_toml(&text, &path)
}

/// Seed `config/league.toml` from the shipped `defaults/league.toml` when
/// the league has no file of its own yet. Returns the seeded path, or
/// `None` when nothing was written. An existing league file is never touched.
pub fn seed_league_toml(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = league_toml_path(base_dir);
    let shipped = base_dir.join("defaults").join("league.toml");
    if target.exists() || !shipped.is_file() {
        return Ok(None);
    }

    let seed_err = |source: std::io::Error| ConfigError::SeedError {
        path: target.clone(),
        source,
    };
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(seed_err)?;
    }
    let mut dest = match OpenOptions::new().write(true).create_new(true).open(&target) {
        Ok(file) => file,
        // Lost a race with another process seeding the same file.
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => return Err(seed_err(e)),
    };
    let mut src = File::open(&shipped).map_err(seed_err)?;
    io::copy(&mut src, &mut dest).map_err(seed_err)?;

    info!(path = %target.display(), "seeded league file from defaults");
    Ok(Some(target))
}

/// Load the league file relative to the current working directory, seeding
/// it from defaults on first run.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    seed_league_toml(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.league.mode.trim().is_empty() {
        return Err(invalid("league.mode", "must not be empty"));
    }
    if config.league.scheduled_games == 0 {
        return Err(invalid("league.scheduled_games", "must be greater than 0"));
    }

    let source = &config.source;
    if source.url.trim().is_empty() {
        return Err(invalid("source.url", "must not be empty"));
    }
    if source.pages.is_empty() {
        return Err(invalid("source.pages", "must list at least one page"));
    }
    if let Some(page) = source.pages.iter().find(|&&p| p == 0) {
        return Err(invalid("source.pages", format!("pages start at 1, got {page}")));
    }
    let positive: &[(&str, u64)] = &[
        ("source.attempts", u64::from(source.attempts)),
        ("source.timeout_secs", source.timeout_secs),
        (
            "source.max_concurrent_fetches",
            source.max_concurrent_fetches as u64,
        ),
    ];
    for (name, val) in positive {
        if *val == 0 {
            return Err(invalid(*name, "must be > 0"));
        }
    }

    for (i, entry) in config.roster.iter().enumerate() {
        if entry.identity.trim().is_empty() {
            return Err(invalid(format!("roster[{i}].identity"), "must not be empty"));
        }
        if !is_known_club(&entry.team) {
            return Err(invalid(
                format!("roster[{i}].team"),
                format!("unknown club `{}`", entry.team),
            ));
        }
    }

    let adjusted = config
        .adjustments
        .record
        .keys()
        .map(|t| ("adjustments.record", t))
        .chain(config.adjustments.points.keys().map(|t| ("adjustments.points", t)));
    for (table, team) in adjusted {
        if !is_known_club(team) {
            return Err(invalid(
                format!("{table}.{team}"),
                format!("unknown club `{team}`"),
            ));
        }
        if !config.roster.iter().any(|e| &e.team == team) {
            warn!(team = %team, "{table} names a team that is not on the roster");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
