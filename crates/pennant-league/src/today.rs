// "Played today" feed in a fixed target zone.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use pennant_core::config::{Config, DedupGranularity};

use crate::dedup::{dedup_by_content, dedup_by_id};
use crate::identity::LeagueMembers;
use crate::record::NormalizedMatchRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodayFeedEntry {
    pub home: String,
    pub away: String,
    pub home_runs: u32,
    pub away_runs: u32,
    /// Ordering key and source of the displayed local time.
    pub played_at: DateTime<Tz>,
}

impl TodayFeedEntry {
    /// `dd-mm-yyyy - h:mm am/pm` in the entry's zone.
    pub fn local_time(&self) -> String {
        self.played_at.format("%d-%m-%Y - %-I:%M %P").to_string()
    }

    /// `<home> <runs> - <away> <runs> - <local time> (<label>)`
    pub fn display(&self, zone_label: &str) -> String {
        format!(
            "{} {} - {} {} - {} ({zone_label})",
            self.home,
            self.home_runs,
            self.away,
            self.away_runs,
            self.local_time()
        )
    }
}

#[derive(Debug, Clone)]
pub struct TodayFeed {
    members: LeagueMembers,
    zone: Tz,
    zone_label: String,
    granularity: DedupGranularity,
    numbered: bool,
}

impl TodayFeed {
    pub fn new(
        members: LeagueMembers,
        zone: Tz,
        zone_label: impl Into<String>,
        granularity: DedupGranularity,
        numbered: bool,
    ) -> Self {
        Self {
            members,
            zone,
            zone_label: zone_label.into(),
            granularity,
            numbered,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            LeagueMembers::from_config(config),
            config.today.time_zone,
            config.today.zone_label.clone(),
            config.today.dedup_granularity,
            config.today.numbered,
        )
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Calendar date of `now` in the target zone.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.zone).date_naive()
    }

    /// Matches whose local date is `today`, played between two members,
    /// deduplicated by id and then by content, in ascending local time.
    pub fn entries(
        &self,
        records: &[NormalizedMatchRecord],
        today: NaiveDate,
    ) -> Vec<TodayFeedEntry> {
        let selected: Vec<NormalizedMatchRecord> = records
            .iter()
            .filter(|r| r.played_at_utc().with_timezone(&self.zone).date_naive() == today)
            .filter(|r| {
                self.members
                    .admits_for_feed(&r.home_participant, &r.away_participant)
            })
            .cloned()
            .collect();

        let unique = dedup_by_content(dedup_by_id(selected), self.zone, self.granularity);

        let mut entries: Vec<TodayFeedEntry> = unique
            .into_iter()
            .map(|r| TodayFeedEntry {
                played_at: r.played_at_utc().with_timezone(&self.zone),
                home: r.home_team,
                away: r.away_team,
                home_runs: r.home_runs,
                away_runs: r.away_runs,
            })
            .collect();
        entries.sort_by(|a, b| a.played_at.cmp(&b.played_at));
        entries
    }

    /// Display lines for the matches played today as of `now`.
    pub fn lines(&self, records: &[NormalizedMatchRecord], now: DateTime<Utc>) -> Vec<String> {
        self.entries(records, self.today(now))
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let line = e.display(&self.zone_label);
                if self.numbered {
                    format!("{}. {line}", i + 1)
                } else {
                    line
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ResultTag;
    use chrono::{NaiveDateTime, TimeZone};

    fn rec(
        id: &str,
        when_utc: &str,
        teams: (&str, &str),
        runs: (u32, u32),
    ) -> NormalizedMatchRecord {
        rec_users(id, when_utc, teams, runs, ("alice", "bob"))
    }

    fn rec_users(
        id: &str,
        when_utc: &str,
        teams: (&str, &str),
        runs: (u32, u32),
        users: (&str, &str),
    ) -> NormalizedMatchRecord {
        NormalizedMatchRecord {
            id: id.into(),
            played_at: NaiveDateTime::parse_from_str(when_utc, "%Y-%m-%d %H:%M").unwrap(),
            home_team: teams.0.into(),
            away_team: teams.1.into(),
            home_result: ResultTag::Win,
            away_result: ResultTag::Loss,
            home_runs: runs.0,
            away_runs: runs.1,
            home_participant: users.0.into(),
            away_participant: users.1.into(),
        }
    }

    fn feed(zone: Tz, numbered: bool) -> TodayFeed {
        TodayFeed::new(
            LeagueMembers::new(["alice", "bob", "carol"], ["CPU"]),
            zone,
            "hora Chile",
            DedupGranularity::Day,
            numbered,
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn selection_uses_the_converted_date() {
        let records = vec![rec("1", "2025-08-30 23:00", ("Mets", "Cubs"), (1, 0))];

        // UTC-3: still the 30th.
        let west = feed(chrono_tz::America::Sao_Paulo, false);
        assert_eq!(west.entries(&records, date(2025, 8, 30)).len(), 1);
        assert!(west.entries(&records, date(2025, 8, 31)).is_empty());

        // UTC+2: already the 31st.
        let east = feed(chrono_tz::Europe::Berlin, false);
        assert!(east.entries(&records, date(2025, 8, 30)).is_empty());
        assert_eq!(east.entries(&records, date(2025, 8, 31)).len(), 1);
    }

    #[test]
    fn formats_lines_in_local_time() {
        // 19:28Z is 15:28 in Santiago (UTC-4 before September DST).
        let records = vec![rec("1", "2025-08-30 19:28", ("Yankees", "Brewers"), (1, 2))];
        let now = Utc.with_ymd_and_hms(2025, 8, 30, 22, 0, 0).unwrap();
        let lines = feed(chrono_tz::America::Santiago, false).lines(&records, now);
        assert_eq!(
            lines,
            vec!["Yankees 1 - Brewers 2 - 30-08-2025 - 3:28 pm (hora Chile)".to_string()]
        );
    }

    #[test]
    fn numbered_lines_are_sorted_by_local_time() {
        let records = vec![
            rec("late", "2025-09-01 23:05", ("Reds", "Cubs"), (2, 2)),
            rec("early", "2025-09-01 13:00", ("Mets", "Cubs"), (5, 1)),
        ];
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 23, 30, 0).unwrap();
        let lines = feed(chrono_tz::America::Santiago, true).lines(&records, now);
        assert_eq!(
            lines,
            vec![
                "1. Mets 5 - Cubs 1 - 01-09-2025 - 9:00 am (hora Chile)".to_string(),
                "2. Reds 2 - Cubs 2 - 01-09-2025 - 7:05 pm (hora Chile)".to_string(),
            ]
        );
    }

    #[test]
    fn same_match_under_two_ids_is_listed_once() {
        let records = vec![
            rec("a1", "2025-09-01 15:00", ("Mets", "Cubs"), (3, 1)),
            rec("a1", "2025-09-01 15:00", ("Mets", "Cubs"), (3, 1)),
            rec("b7", "2025-09-01 16:10", ("Mets", "Cubs"), (3, 1)),
        ];
        let entries = feed(chrono_tz::America::Santiago, false).entries(&records, date(2025, 9, 1));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].local_time(), "01-09-2025 - 11:00 am");
    }

    #[test]
    fn requires_both_participants_to_be_members() {
        let records = vec![
            rec_users("1", "2025-09-01 15:00", ("Mets", "Cubs"), (3, 1), ("alice", "CPU")),
            rec_users("2", "2025-09-01 15:00", ("Reds", "Cubs"), (3, 1), ("carol", "mallory")),
            rec_users("3", "2025-09-01 15:00", ("Padres", "Cubs"), (3, 1), ("^b2^Carol", "BOB")),
        ];
        let entries = feed(chrono_tz::America::Santiago, false).entries(&records, date(2025, 9, 1));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].home, "Padres");
    }

    #[test]
    fn nothing_today_is_an_empty_feed() {
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();
        assert!(feed(chrono_tz::America::Santiago, false).lines(&[], now).is_empty());
    }
}
