//! Match result and ranking system
//!
//! Builds the record a finished game hands to the persistence sink.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::host::PlayerId;

/// Why a match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Exactly one participant left alive
    LastPlayerStanding,
    /// Nobody left alive
    AllEliminated,
    /// Stopped before a winner emerged
    Stopped,
}

/// Final line for one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantResult {
    pub player_id: PlayerId,
    pub name: String,
    pub final_score: u32,
    pub survival_ms: u64,
    pub walls_dodged: u32,
    /// 1-based, filled by [`assign_placements`]
    pub placement: u32,
    pub eliminated_round: Option<u32>,
    pub survived: bool,
}

/// Record emitted once per finished match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub game_id: Uuid,
    pub arena_name: String,
    pub mode: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub winner: Option<PlayerId>,
    pub winner_name: Option<String>,
    pub player_count: usize,
    pub walls_spawned: u32,
    pub max_round: u32,
    pub end_reason: EndReason,
    pub participants: Vec<ParticipantResult>,
}

impl MatchRecord {
    pub fn winner_result(&self) -> Option<&ParticipantResult> {
        let winner = self.winner?;
        self.participants.iter().find(|p| p.player_id == winner)
    }
}

/// Placement order: survivors, then later elimination, then score, then survival time
fn compare(a: &ParticipantResult, b: &ParticipantResult) -> Ordering {
    b.survived
        .cmp(&a.survived)
        .then_with(|| b.eliminated_round.cmp(&a.eliminated_round))
        .then_with(|| b.final_score.cmp(&a.final_score))
        .then_with(|| b.survival_ms.cmp(&a.survival_ms))
        .then_with(|| a.name.cmp(&b.name))
}

/// Sort participants into finishing order and number them from 1
pub fn assign_placements(results: &mut [ParticipantResult]) {
    results.sort_by(compare);
    for (i, result) in results.iter_mut().enumerate() {
        result.placement = (i + 1) as u32;
    }
}

/// Whether a running match is over given its alive count
pub fn check_match_end(alive_count: usize) -> Option<EndReason> {
    match alive_count {
        0 => Some(EndReason::AllEliminated),
        1 => Some(EndReason::LastPlayerStanding),
        _ => None,
    }
}

/// The sole survivor of a ranked field, if there is exactly one
pub fn sole_survivor(results: &[ParticipantResult]) -> Option<&ParticipantResult> {
    let mut survivors = results.iter().filter(|r| r.survived);
    match (survivors.next(), survivors.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}
