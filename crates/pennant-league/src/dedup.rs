// Duplicate removal.
//
// Standings only use identifier dedup. The today-feed runs identifier dedup
// first and then collapses records that share a canonical content key, since
// the service sometimes lists one finished match twice under different ids.

use std::collections::HashSet;

use chrono::{NaiveDate, Timelike};
use chrono_tz::Tz;
use pennant_core::config::DedupGranularity;

use crate::record::NormalizedMatchRecord;

/// Keep the first record for each non-empty id; records without an id are
/// always kept. Order is preserved, so the function is idempotent.
pub fn dedup_by_id(records: Vec<NormalizedMatchRecord>) -> Vec<NormalizedMatchRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| r.id.is_empty() || seen.insert(r.id.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySlot {
    Day(NaiveDate),
    Minute { date: NaiveDate, hour: u32, minute: u32 },
}

/// Observable attributes identifying one real-world match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalKey {
    pub home: String,
    pub away: String,
    pub home_runs: u32,
    pub away_runs: u32,
    pub slot: KeySlot,
}

impl CanonicalKey {
    /// Key for `record` with its time slot taken in `zone`.
    pub fn of(record: &NormalizedMatchRecord, zone: Tz, granularity: DedupGranularity) -> Self {
        let local = record.played_at_utc().with_timezone(&zone);
        let date = local.date_naive();
        let slot = match granularity {
            DedupGranularity::Day => KeySlot::Day(date),
            DedupGranularity::Minute => KeySlot::Minute {
                date,
                hour: local.hour(),
                minute: local.minute(),
            },
        };
        Self {
            home: record.home_team.clone(),
            away: record.away_team.clone(),
            home_runs: record.home_runs,
            away_runs: record.away_runs,
            slot,
        }
    }
}

/// Keep the first record for each canonical key.
pub fn dedup_by_content(
    records: Vec<NormalizedMatchRecord>,
    zone: Tz,
    granularity: DedupGranularity,
) -> Vec<NormalizedMatchRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(CanonicalKey::of(r, zone, granularity)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ResultTag;
    use chrono::NaiveDateTime;

    const ZONE: Tz = chrono_tz::America::Santiago;

    fn rec(id: &str, when: &str, home_runs: u32, away_runs: u32) -> NormalizedMatchRecord {
        NormalizedMatchRecord {
            id: id.into(),
            played_at: NaiveDateTime::parse_from_str(when, "%Y-%m-%d %H:%M").unwrap(),
            home_team: "Mets".into(),
            away_team: "Cubs".into(),
            home_result: ResultTag::Win,
            away_result: ResultTag::Loss,
            home_runs,
            away_runs,
            home_participant: "alice".into(),
            away_participant: "bob".into(),
        }
    }

    fn ids(records: &[NormalizedMatchRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn id_dedup_keeps_first_and_all_empty_ids() {
        let input = vec![
            rec("a", "2025-09-01 18:00", 1, 0),
            rec("", "2025-09-01 18:00", 1, 0),
            rec("b", "2025-09-01 19:00", 2, 0),
            rec("a", "2025-09-01 20:00", 9, 9),
            rec("", "2025-09-01 18:00", 1, 0),
        ];
        let out = dedup_by_id(input);
        assert_eq!(ids(&out), vec!["a", "", "b", ""]);
        assert_eq!(out[0].home_runs, 1);
    }

    #[test]
    fn id_dedup_is_idempotent() {
        let input = vec![
            rec("a", "2025-09-01 18:00", 1, 0),
            rec("a", "2025-09-01 18:00", 1, 0),
            rec("", "2025-09-01 18:00", 1, 0),
            rec("c", "2025-09-01 18:00", 1, 0),
        ];
        let once = dedup_by_id(input);
        let twice = dedup_by_id(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn content_dedup_collapses_same_match_on_same_local_day() {
        // 18:00Z and 22:30Z are both 2025-09-01 in Santiago (UTC-4).
        let input = vec![
            rec("x1", "2025-09-01 18:00", 3, 2),
            rec("x2", "2025-09-01 22:30", 3, 2),
            rec("x3", "2025-09-01 22:30", 4, 2),
        ];
        let out = dedup_by_content(input.clone(), ZONE, DedupGranularity::Day);
        assert_eq!(ids(&out), vec!["x1", "x3"]);
        assert!(out.len() <= input.len());
    }

    #[test]
    fn content_dedup_uses_local_date_not_utc_date() {
        // 02:00Z on the 2nd is still the 1st in Santiago.
        let input = vec![
            rec("x1", "2025-09-01 18:00", 3, 2),
            rec("x2", "2025-09-02 02:00", 3, 2),
        ];
        let out = dedup_by_content(input, ZONE, DedupGranularity::Day);
        assert_eq!(ids(&out), vec!["x1"]);
    }

    #[test]
    fn minute_granularity_keeps_same_day_different_minutes() {
        let input = vec![
            rec("x1", "2025-09-01 18:00", 3, 2),
            rec("x2", "2025-09-01 18:01", 3, 2),
            rec("x3", "2025-09-01 18:01", 3, 2),
        ];
        let out = dedup_by_content(input, ZONE, DedupGranularity::Minute);
        assert_eq!(ids(&out), vec!["x1", "x2"]);
    }

    #[test]
    fn swapped_home_and_away_are_distinct_matches() {
        let mut other = rec("y", "2025-09-01 18:00", 3, 2);
        std::mem::swap(&mut other.home_team, &mut other.away_team);
        let out = dedup_by_content(
            vec![rec("x", "2025-09-01 18:00", 3, 2), other],
            ZONE,
            DedupGranularity::Day,
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(dedup_by_id(Vec::new()).is_empty());
        assert!(dedup_by_content(Vec::new(), ZONE, DedupGranularity::Day).is_empty());
    }
}
