// Participant-name normalization and league membership rules.
//
// The statistics service decorates usernames with badge markup such as
// `^b12^`. Every comparison between a participant name and the roster goes
// through `normalize_participant` so the standings and the today-feed agree
// on who is a member.

use std::collections::HashSet;
use std::sync::LazyLock;

use pennant_core::config::Config;
use regex::Regex;

static BADGE_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\^b\d+\^").expect("badge markup pattern compiles"));

/// Strip badge markup (`^b<digits>^`, any case), trim and lowercase.
pub fn normalize_participant(raw: &str) -> String {
    BADGE_MARKUP.replace_all(raw, "").trim().to_lowercase()
}

/// Membership index for one scoring period.
#[derive(Debug, Clone, Default)]
pub struct LeagueMembers {
    members: HashSet<String>,
    automated: HashSet<String>,
}

impl LeagueMembers {
    pub fn new<I, A, S, T>(identities: I, automated_opponents: A) -> Self
    where
        I: IntoIterator<Item = S>,
        A: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let collect = |names: Vec<String>| -> HashSet<String> {
            names.into_iter().filter(|n| !n.is_empty()).collect()
        };
        Self {
            members: collect(
                identities
                    .into_iter()
                    .map(|s| normalize_participant(s.as_ref()))
                    .collect(),
            ),
            automated: collect(
                automated_opponents
                    .into_iter()
                    .map(|s| normalize_participant(s.as_ref()))
                    .collect(),
            ),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.roster.iter().map(|e| e.identity.as_str()),
            config.league.automated_opponents.iter(),
        )
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_member(&self, raw_name: &str) -> bool {
        self.members.contains(&normalize_participant(raw_name))
    }

    pub fn is_automated(&self, raw_name: &str) -> bool {
        self.automated.contains(&normalize_participant(raw_name))
    }

    /// Standings rule: both sides are members, or one side is the automated
    /// opponent and the other is a member.
    pub fn admits_for_standings(&self, home: &str, away: &str) -> bool {
        let (home_member, away_member) = (self.is_member(home), self.is_member(away));
        (home_member && away_member)
            || (self.is_automated(home) && away_member)
            || (self.is_automated(away) && home_member)
    }

    /// Today-feed rule: both sides must be members. Stricter than
    /// [`admits_for_standings`](Self::admits_for_standings) on purpose.
    pub fn admits_for_feed(&self, home: &str, away: &str) -> bool {
        self.is_member(home) && self.is_member(away)
    }
}
