//! Match and tournament outcomes.

use crate::rules::GameResult;

/// Outcome of a best-of-N series between two players.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub winner: String,
    pub loser: String,
    /// The series ended because the loser broke a rule (now or retroactively).
    pub rule_broken: bool,
    /// Every game played, in order. Empty when decoded from the wire.
    pub games: Vec<GameResult>,
}

impl MatchResult {
    pub fn new(
        winner: impl Into<String>,
        loser: impl Into<String>,
        rule_broken: bool,
        games: Vec<GameResult>,
    ) -> Self {
        Self {
            winner: winner.into(),
            loser: loser.into(),
            rule_broken,
            games,
        }
    }

    /// Summarize a series by its final game.
    ///
    /// Returns `None` for an empty series.
    pub fn from_games(games: Vec<GameResult>) -> Option<Self> {
        let last = games.last()?;
        Some(Self::new(
            last.winner.clone(),
            last.loser.clone(),
            last.broken_rule,
            games,
        ))
    }

    /// This match as it must read once `cheater` is excluded.
    ///
    /// A win by `cheater` becomes a rule-broken loss for them; a loss by `cheater` is flagged
    /// rule-broken. Matches not involving `cheater` are unchanged.
    pub fn penalize(self, cheater: &str) -> Self {
        if self.winner == cheater {
            Self {
                winner: self.loser,
                loser: self.winner,
                rule_broken: true,
                games: self.games,
            }
        } else if self.loser == cheater {
            Self {
                rule_broken: true,
                ..self
            }
        } else {
            self
        }
    }
}

/// Everything a tournament produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TournamentResult {
    pub matches: Vec<MatchResult>,
    /// Players excluded for breaking rules, in exclusion order.
    pub kicked: Vec<String>,
}
