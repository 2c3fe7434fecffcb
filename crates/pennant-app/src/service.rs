// Cached facade over the pipeline for long-running hosts.

use std::sync::Arc;

use pennant_core::cache::{Clock, TtlCache};
use tracing::debug;

use crate::fetcher::FetchFailure;
use crate::pipeline::{Pipeline, Report, StandingsReport, TodayReport};

/// Standings and today-feed, each recomputed at most once per TTL window.
pub struct LeagueService {
    pipeline: Pipeline,
    clock: Arc<dyn Clock>,
    standings: TtlCache<(), StandingsReport>,
    today: TtlCache<(), TodayReport>,
}

impl LeagueService {
    pub fn new(pipeline: Pipeline, clock: Arc<dyn Clock>) -> Self {
        let cache = &pipeline.config().cache;
        let standings = TtlCache::new(cache.standings_ttl(), Arc::clone(&clock));
        let today = TtlCache::new(cache.today_ttl(), Arc::clone(&clock));
        Self {
            pipeline,
            clock,
            standings,
            today,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub async fn standings(&self) -> StandingsReport {
        self.standings
            .get_or_compute((), || self.pipeline.standings_report())
            .await
    }

    pub async fn today_report(&self) -> TodayReport {
        let now = self.clock.now();
        self.today
            .get_or_compute((), || self.pipeline.today_report(now))
            .await
    }

    pub async fn today(&self) -> Vec<String> {
        self.today_report().await.today
    }

    /// Drop both cached values so the next call recomputes.
    pub fn refresh(&self) {
        debug!("invalidating cached standings and today feed");
        self.standings.invalidate(&());
        self.today.invalidate(&());
    }

    /// Both cached outputs. Failures from the two fetch rounds are merged,
    /// one entry per (identity, page).
    pub async fn report(&self) -> Report {
        let standings = self.standings().await;
        let today = self.today_report().await;
        Report {
            league: self.pipeline.config().league.name.clone(),
            generated_at: self.clock.now(),
            standings: standings.standings,
            today: today.today,
            failures: merge_failures(standings.failures, today.failures),
        }
    }
}

fn merge_failures(mut first: Vec<FetchFailure>, second: Vec<FetchFailure>) -> Vec<FetchFailure> {
    for failure in second {
        let seen = first
            .iter()
            .any(|f| f.identity == failure.identity && f.page == failure.page);
        if !seen {
            first.push(failure);
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(identity: &str, page: u32, message: &str) -> FetchFailure {
        FetchFailure {
            identity: identity.into(),
            page,
            attempts: 2,
            message: message.into(),
        }
    }

    #[test]
    fn merged_failures_keep_one_entry_per_page() {
        let merged = merge_failures(
            vec![failure("bob", 1, "first round")],
            vec![failure("bob", 1, "second round"), failure("carol", 2, "timeout")],
        );
        assert_eq!(
            merged,
            vec![failure("bob", 1, "first round"), failure("carol", 2, "timeout")]
        );
    }
}
