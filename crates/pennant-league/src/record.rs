// Raw match records as served by the statistics service, and the filter/
// normalizer that turns them into the fixed `NormalizedMatchRecord` schema.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use pennant_core::config::Config;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

/// One element of the service's `game_history` list, unmodified. Every field
/// is optional on the wire; the normalizer decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawMatchRecord {
    /// String or number upstream.
    pub id: Option<Value>,
    pub game_mode: Option<String>,
    pub display_date: Option<String>,
    pub home_full_name: Option<String>,
    pub away_full_name: Option<String>,
    pub home_name: Option<String>,
    pub away_name: Option<String>,
    pub home_display_result: Option<String>,
    pub away_display_result: Option<String>,
    /// String or number upstream.
    pub home_runs: Option<Value>,
    pub away_runs: Option<Value>,
}

// ---------------------------------------------------------------------------
// Normalized shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResultTag {
    Win,
    Loss,
    Unknown,
}

impl ResultTag {
    pub fn from_tag(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "W" | "WIN" => ResultTag::Win,
            "L" | "LOSS" => ResultTag::Loss,
            _ => ResultTag::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

/// Match record after filtering. Absent optional fields map to fixed
/// defaults: empty id, empty participant name, `ResultTag::Unknown`, zero runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedMatchRecord {
    pub id: String,
    /// Zone-less on the wire; always interpreted as UTC.
    pub played_at: NaiveDateTime,
    pub home_team: String,
    pub away_team: String,
    pub home_result: ResultTag,
    pub away_result: ResultTag,
    pub home_runs: u32,
    pub away_runs: u32,
    pub home_participant: String,
    pub away_participant: String,
}

impl NormalizedMatchRecord {
    pub fn played_at_utc(&self) -> DateTime<Utc> {
        self.played_at.and_utc()
    }

    /// Which side `team` played on, comparing trimmed names case-insensitively.
    pub fn side_of(&self, team: &str) -> Option<Side> {
        let key = team_key(team);
        if team_key(&self.home_team) == key {
            Some(Side::Home)
        } else if team_key(&self.away_team) == key {
            Some(Side::Away)
        } else {
            None
        }
    }

    /// Result tags as (own, opponent) for the given side.
    pub fn results_for(&self, side: Side) -> (ResultTag, ResultTag) {
        match side {
            Side::Home => (self.home_result, self.away_result),
            Side::Away => (self.away_result, self.home_result),
        }
    }
}

fn team_key(name: &str) -> String {
    name.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Date parsing
// ---------------------------------------------------------------------------

const US_FORMATS: [&str; 2] = ["%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M"];
const ISO_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a service display date. Accepts `month/day/year hour:minute[:second]`
/// and ISO-8601 with an optional trailing `Z` or explicit offset. Offsets are
/// folded into UTC; zone-less values are taken as UTC already.
pub fn parse_display_date(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in US_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    let bare = s
        .strip_suffix('Z')
        .or_else(|| s.strip_suffix('z'))
        .unwrap_or(s);
    ISO_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(bare, fmt).ok())
}

// ---------------------------------------------------------------------------
// Filter / normalizer
// ---------------------------------------------------------------------------

/// Why a raw record did not make it into the normalized set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("mode `{found}` does not match `{expected}`")]
    ModeMismatch { found: String, expected: String },

    #[error("unparseable display date `{0}`")]
    UnparseableDate(String),

    #[error("played at {played_at}, before floor {floor}")]
    BeforeFloor {
        played_at: NaiveDateTime,
        floor: NaiveDateTime,
    },
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    mode: String,
    floor: NaiveDateTime,
}

impl Normalizer {
    pub fn new(mode: &str, since: NaiveDate) -> Self {
        Self {
            mode: mode.trim().to_uppercase(),
            floor: since.and_time(NaiveTime::default()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.league.mode, config.league.since)
    }

    pub fn normalize(&self, raw: &RawMatchRecord) -> Result<NormalizedMatchRecord, Rejection> {
        let mode = required(&raw.game_mode, "game_mode")?.to_uppercase();
        if mode != self.mode {
            return Err(Rejection::ModeMismatch {
                found: mode,
                expected: self.mode.clone(),
            });
        }

        let date = required(&raw.display_date, "display_date")?;
        let played_at =
            parse_display_date(date).ok_or_else(|| Rejection::UnparseableDate(date.to_string()))?;
        if played_at < self.floor {
            return Err(Rejection::BeforeFloor {
                played_at,
                floor: self.floor,
            });
        }

        Ok(NormalizedMatchRecord {
            id: id_string(raw.id.as_ref()),
            played_at,
            home_team: required(&raw.home_full_name, "home_full_name")?.to_string(),
            away_team: required(&raw.away_full_name, "away_full_name")?.to_string(),
            home_result: tag(&raw.home_display_result),
            away_result: tag(&raw.away_display_result),
            home_runs: runs(raw.home_runs.as_ref(), "home_runs"),
            away_runs: runs(raw.away_runs.as_ref(), "away_runs"),
            home_participant: optional(&raw.home_name),
            away_participant: optional(&raw.away_name),
        })
    }

    /// Normalize a batch, silently dropping rejected records (logged at
    /// debug level). Input order is preserved.
    pub fn normalize_all<'a, I>(&self, raws: I) -> Vec<NormalizedMatchRecord>
    where
        I: IntoIterator<Item = &'a RawMatchRecord>,
    {
        raws.into_iter()
            .filter_map(|raw| match self.normalize(raw) {
                Ok(record) => Some(record),
                Err(reason) => {
                    debug!(id = %id_string(raw.id.as_ref()), %reason, "dropping match record");
                    None
                }
            })
            .collect()
    }
}

fn required<'a>(field: &'a Option<String>, name: &'static str) -> Result<&'a str, Rejection> {
    match field.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(Rejection::MissingField(name)),
    }
}

fn optional(field: &Option<String>) -> String {
    field.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn tag(field: &Option<String>) -> ResultTag {
    field
        .as_deref()
        .map(ResultTag::from_tag)
        .unwrap_or(ResultTag::Unknown)
}

fn id_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    }
}

/// Run counts are display-only. Anything that is not a non-negative integer
/// (numeric or textual) reads as 0 instead of costing the record.
fn runs(value: Option<&Value>, field: &'static str) -> u32 {
    let parsed = match value {
        None | Some(Value::Null) => Some(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) if s.trim().is_empty() => Some(0),
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(_) => None,
    };
    parsed.unwrap_or_else(|| {
        debug!(field, value = ?value, "unreadable run count, using 0");
        0
    })
}
