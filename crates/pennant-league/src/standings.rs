// Record aggregation, scoring and table assembly.

use std::cmp::Ordering;

use pennant_core::config::{Adjustments, Config, RosterEntry};
use serde::Serialize;
use tracing::debug;

use crate::identity::LeagueMembers;
use crate::record::{NormalizedMatchRecord, ResultTag};

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Win/loss counts. Signed because manual adjustments are added as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WinLoss {
    pub wins: i32,
    pub losses: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Win,
    Loss,
}

/// Outcome from the team's own result tag. A missing or unrecognized tag
/// counts as neither a win nor a loss, whatever the opponent's tag says.
fn outcome(own: ResultTag) -> Option<Outcome> {
    match own {
        ResultTag::Win => Some(Outcome::Win),
        ResultTag::Loss => Some(Outcome::Loss),
        ResultTag::Unknown => None,
    }
}

/// Count wins and losses for `team` over one identity's records, then add
/// the team's manual record adjustment. Adjusted counts are not clamped.
pub fn aggregate(
    identity: &str,
    team: &str,
    records: &[NormalizedMatchRecord],
    members: &LeagueMembers,
    adjustments: &Adjustments,
) -> WinLoss {
    let mut counted = WinLoss::default();
    for record in records {
        let Some(side) = record.side_of(team) else {
            continue;
        };
        if !members.admits_for_standings(&record.home_participant, &record.away_participant) {
            continue;
        }
        let (own, _) = record.results_for(side);
        match outcome(own) {
            Some(Outcome::Win) => counted.wins += 1,
            Some(Outcome::Loss) => counted.losses += 1,
            None => {}
        }
    }

    let adj = adjustments.record_for(team);
    let adjusted = WinLoss {
        wins: counted.wins.saturating_add(adj.wins),
        losses: counted.losses.saturating_add(adj.losses),
    };
    debug!(
        identity,
        team,
        wins = counted.wins,
        losses = counted.losses,
        adj_wins = adj.wins,
        adj_losses = adj.losses,
        "aggregated record"
    );
    adjusted
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Points awarded per win and per loss. The league default is 3 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsRule {
    pub per_win: i32,
    pub per_loss: i32,
}

impl Default for PointsRule {
    fn default() -> Self {
        Self {
            per_win: 3,
            per_loss: 2,
        }
    }
}

impl PointsRule {
    pub fn from_config(config: &Config) -> Self {
        Self {
            per_win: config.league.points_per_win,
            per_loss: config.league.points_per_loss,
        }
    }

    pub fn base(&self, record: WinLoss) -> i32 {
        self.per_win
            .saturating_mul(record.wins)
            .saturating_add(self.per_loss.saturating_mul(record.losses))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Points {
    pub total: i32,
    pub base: i32,
    pub extra: i32,
    pub reason: String,
}

pub fn score(record: WinLoss, team: &str, rule: PointsRule, adjustments: &Adjustments) -> Points {
    let base = rule.base(record);
    let (extra, reason) = adjustments
        .points_for(team)
        .map(|p| (p.points, p.reason.clone()))
        .unwrap_or_default();
    Points {
        total: base.saturating_add(extra),
        base,
        extra,
        reason,
    }
}

// ---------------------------------------------------------------------------
// Rows and table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandingsRow {
    pub team: String,
    pub identity: String,
    pub display_name: String,
    pub scheduled: u32,
    pub played: i32,
    pub wins: i32,
    pub losses: i32,
    pub remaining: u32,
    pub points: Points,
}

impl StandingsRow {
    pub fn new(
        entry: &RosterEntry,
        display_name: &str,
        record: WinLoss,
        scheduled: u32,
        points: Points,
    ) -> Self {
        let played = record.wins.saturating_add(record.losses);
        let remaining = (i64::from(scheduled) - i64::from(played)).max(0);
        let remaining = u32::try_from(remaining).unwrap_or(u32::MAX);
        Self {
            team: entry.team.clone(),
            identity: entry.identity.clone(),
            display_name: display_name.to_string(),
            scheduled,
            played,
            wins: record.wins,
            losses: record.losses,
            remaining,
            points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedRow {
    pub rank: usize,
    #[serde(flatten)]
    pub row: StandingsRow,
}

/// Points descending, wins descending, losses ascending, team name ascending.
pub fn table_order(a: &StandingsRow, b: &StandingsRow) -> Ordering {
    b.points
        .total
        .cmp(&a.points.total)
        .then_with(|| b.wins.cmp(&a.wins))
        .then_with(|| a.losses.cmp(&b.losses))
        .then_with(|| a.team.cmp(&b.team))
}

/// Sort (stably) and number rows from 1.
pub fn assemble(mut rows: Vec<StandingsRow>) -> Vec<RankedRow> {
    rows.sort_by(table_order);
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| RankedRow { rank: i + 1, row })
        .collect()
}

/// A manual point correction shown beneath the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointsNote {
    pub team: String,
    pub points_extra: i32,
    pub reason: String,
}

/// Notes for every row with a non-zero point adjustment, in table order.
pub fn point_notes(rows: &[RankedRow]) -> Vec<PointsNote> {
    rows.iter()
        .filter(|r| r.row.points.extra != 0)
        .map(|r| PointsNote {
            team: r.row.team.clone(),
            points_extra: r.row.points.extra,
            reason: r.row.points.reason.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Standings {
    pub rows: Vec<RankedRow>,
    pub notes: Vec<PointsNote>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Single entry point that turns per-identity normalized records into a
/// ranked table.
#[derive(Debug, Clone)]
pub struct StandingsBuilder {
    members: LeagueMembers,
    adjustments: Adjustments,
    rule: PointsRule,
    scheduled_games: u32,
}

impl StandingsBuilder {
    pub fn new(
        members: LeagueMembers,
        adjustments: Adjustments,
        rule: PointsRule,
        scheduled_games: u32,
    ) -> Self {
        Self {
            members,
            adjustments,
            rule,
            scheduled_games,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            LeagueMembers::from_config(config),
            config.adjustments.clone(),
            PointsRule::from_config(config),
            config.league.scheduled_games,
        )
    }

    /// Unranked row for one roster entry. `records` must already be
    /// normalized and deduplicated for that entry's identity.
    pub fn row(
        &self,
        entry: &RosterEntry,
        display_name: &str,
        records: &[NormalizedMatchRecord],
    ) -> StandingsRow {
        let record = aggregate(
            &entry.identity,
            &entry.team,
            records,
            &self.members,
            &self.adjustments,
        );
        let points = score(record, &entry.team, self.rule, &self.adjustments);
        StandingsRow::new(entry, display_name, record, self.scheduled_games, points)
    }

    pub fn finish(&self, rows: Vec<StandingsRow>) -> Standings {
        let rows = assemble(rows);
        let notes = point_notes(&rows);
        Standings { rows, notes }
    }
}
