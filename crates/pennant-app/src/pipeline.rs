// Fetch once, then derive standings and the today-feed from the snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use pennant_core::config::{Config, RosterEntry};
use pennant_league::dedup::dedup_by_id;
use pennant_league::record::{Normalizer, RawMatchRecord};
use pennant_league::standings::{Standings, StandingsBuilder};
use pennant_league::today::TodayFeed;
use serde::Serialize;
use tracing::info;

use crate::fetcher::{fetch_with_retry, FetchFailure, MatchSource, PageFetch, RetryPolicy};

/// Raw records fetched for one roster entry, across all configured pages.
#[derive(Debug, Clone)]
pub struct IdentityMatches {
    pub entry: RosterEntry,
    pub records: Vec<RawMatchRecord>,
}

/// Everything one fetch round produced, in roster order.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub per_identity: Vec<IdentityMatches>,
    pub failures: Vec<FetchFailure>,
}

impl Snapshot {
    pub fn all_records(&self) -> impl Iterator<Item = &RawMatchRecord> {
        self.per_identity.iter().flat_map(|m| m.records.iter())
    }
}

/// Standings plus the pages that could not be fetched for them.
#[derive(Debug, Clone, Serialize)]
pub struct StandingsReport {
    #[serde(flatten)]
    pub standings: Standings,
    pub failures: Vec<FetchFailure>,
}

/// Today-feed lines plus the pages that could not be fetched for them.
#[derive(Debug, Clone, Serialize)]
pub struct TodayReport {
    pub today: Vec<String>,
    pub failures: Vec<FetchFailure>,
}

/// Full output of one run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub league: String,
    pub generated_at: DateTime<Utc>,
    pub standings: Standings,
    pub today: Vec<String>,
    pub failures: Vec<FetchFailure>,
}

/// Fetcher plus the pure stages, configured once from `Config`.
pub struct Pipeline {
    config: Config,
    source: Arc<dyn MatchSource>,
    normalizer: Normalizer,
    standings: StandingsBuilder,
    feed: TodayFeed,
}

impl Pipeline {
    pub fn new(config: Config, source: Arc<dyn MatchSource>) -> Self {
        Self {
            normalizer: Normalizer::from_config(&config),
            standings: StandingsBuilder::from_config(&config),
            feed: TodayFeed::from_config(&config),
            config,
            source,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch every (identity, page) pair with at most
    /// `max_concurrent_fetches` requests in flight. Results come back in
    /// roster and page order regardless of completion order.
    pub async fn fetch_snapshot(&self) -> Snapshot {
        let policy = RetryPolicy::from_config(&self.config.source);
        let limit = self.config.source.max_concurrent_fetches.max(1);
        let pages = &self.config.source.pages;
        let source = self.source.as_ref();

        let jobs: Vec<(usize, &RosterEntry, u32)> = self
            .config
            .roster
            .iter()
            .enumerate()
            .flat_map(|(i, entry)| pages.iter().map(move |&page| (i, entry, page)))
            .collect();
        let job_count = jobs.len();

        let fetched: Vec<(usize, PageFetch)> = stream::iter(jobs)
            .map(move |(i, entry, page)| async move {
                (i, fetch_with_retry(source, &entry.identity, page, policy).await)
            })
            .buffered(limit)
            .collect()
            .await;

        let mut snapshot = Snapshot {
            per_identity: self
                .config
                .roster
                .iter()
                .map(|entry| IdentityMatches {
                    entry: entry.clone(),
                    records: Vec::new(),
                })
                .collect(),
            failures: Vec::new(),
        };
        for (i, page) in fetched {
            snapshot.per_identity[i].records.extend(page.records);
            snapshot.failures.extend(page.failure);
        }

        info!(
            pages = job_count,
            records = snapshot.all_records().count(),
            failures = snapshot.failures.len(),
            "fetch round complete"
        );
        snapshot
    }

    /// Each roster entry is scored from its own identity's records only, so
    /// a match between two members counts once for each side.
    pub fn compute_standings(&self, snapshot: &Snapshot) -> Standings {
        let rows = snapshot
            .per_identity
            .iter()
            .map(|m| {
                let records = dedup_by_id(self.normalizer.normalize_all(&m.records));
                self.standings.row(
                    &m.entry,
                    self.config.display_name(&m.entry.identity),
                    &records,
                )
            })
            .collect();
        let standings = self.standings.finish(rows);
        info!(
            rows = standings.rows.len(),
            notes = standings.notes.len(),
            "standings computed"
        );
        standings
    }

    /// The feed pools every identity's records. A match between two members
    /// shows up in both histories; the dedup passes collapse it.
    pub fn compute_today_feed(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<String> {
        let records = dedup_by_id(self.normalizer.normalize_all(snapshot.all_records()));
        let lines = self.feed.lines(&records, now);
        info!(
            date = %self.feed.today(now),
            matches = lines.len(),
            "today feed computed"
        );
        lines
    }

    pub async fn standings_report(&self) -> StandingsReport {
        let snapshot = self.fetch_snapshot().await;
        StandingsReport {
            standings: self.compute_standings(&snapshot),
            failures: snapshot.failures,
        }
    }

    pub async fn today_report(&self, now: DateTime<Utc>) -> TodayReport {
        let snapshot = self.fetch_snapshot().await;
        TodayReport {
            today: self.compute_today_feed(&snapshot, now),
            failures: snapshot.failures,
        }
    }

    /// One fetch round feeding both outputs.
    pub async fn run(&self, now: DateTime<Utc>) -> Report {
        let snapshot = self.fetch_snapshot().await;
        Report {
            league: self.config.league.name.clone(),
            generated_at: now,
            standings: self.compute_standings(&snapshot),
            today: self.compute_today_feed(&snapshot, now),
            failures: snapshot.failures,
        }
    }
}
