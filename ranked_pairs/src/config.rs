// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

use chrono::{DateTime, Utc};

/// A registered candidate in the election.
///
/// Candidates with `active` set to false are kept in the registry for
/// display purposes but take no part in the tabulation: ballot entries
/// that name them are dropped during normalization.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Candidate {
    /// Candidate identifiers start at 1. An id of 0 is a configuration error.
    pub id: u32,
    pub name: String,
    pub description: String,
    pub active: bool,
}

/// One position in a voter's ranking.
///
/// An entry with `tied_with_previous` joins the rank group of the entry
/// just before it; otherwise it opens a new, strictly lower group. The
/// first entry of a ballot can never be tied with a previous one.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct RankingEntry {
    pub candidate_id: u32,
    pub tied_with_previous: bool,
}

/// One voter's submission, with a weight attached to it.
///
/// A plain single-voter ballot has `count = 1`. Identical ballots may be
/// aggregated upstream into a single `Ballot` with a higher count; all the
/// pairwise tallies are weighted sums. A ballot may rank any subset of the
/// candidates: omitted candidates are simply never compared by this voter.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Ballot {
    pub entries: Vec<RankingEntry>,
    pub count: u64,
}

impl Ballot {
    /// A ballot for a single voter (weight 1).
    pub fn new(entries: Vec<RankingEntry>) -> Ballot {
        Ballot { entries, count: 1 }
    }
}

// ******** Output data structures *********

/// The name of the tabulation method, as reported to callers.
pub const ALGORITHM_NAME: &str = "Tideman Method (Ranked Pairs)";

/// A directed pairwise majority: `winner` is preferred to `loser` on
/// strictly more ballots than the reverse.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RankedPair {
    pub winner: u32,
    pub loser: u32,
    /// `winner_votes - loser_votes`, always strictly positive.
    pub margin: u64,
    pub winner_votes: u64,
    pub loser_votes: u64,
}

/// One line of the final ranking.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RankingLine {
    /// 1-based: the winner has rank 1.
    pub rank: u32,
    pub candidate: Candidate,
    /// Net pairwise wins (pairwise wins minus pairwise losses), for
    /// diagnostic display only. Not used by the resolution itself.
    pub score: i64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReportMetadata {
    /// Weighted count of the valid ballots that entered the tabulation.
    pub total_voters: u64,
    /// Number of active candidates.
    pub candidate_count: usize,
    pub timestamp: DateTime<Utc>,
    pub calculation_time_ms: u64,
}

/// The complete outcome of one tabulation run.
///
/// A run over zero valid ballots is not an error: it yields a report with
/// `winner: None`, `total_voters: 0` and the active candidates listed in
/// id order, so that callers can still render a candidate table.
///
/// When the aggregate majorities are cyclic there is no Condorcet winner;
/// the `winner` field is then simply the top of the resolved order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectionReport {
    /// Always [ALGORITHM_NAME].
    pub algorithm: String,
    pub winner: Option<Candidate>,
    pub final_ranking: Vec<RankingLine>,
    /// Complete tally: for every ordered pair of distinct active
    /// candidates `(a, b)`, the weighted number of ballots ranking `a`
    /// strictly above `b`. Keyed by candidate id.
    pub pairwise_tallies: BTreeMap<(u32, u32), u64>,
    /// All strict pairwise majorities, sorted by descending margin, then
    /// by ascending (winner, loser) id.
    pub ranked_pairs: Vec<RankedPair>,
    /// The edges accepted into the acyclic locked graph, in lock order.
    pub locked_pairs: Vec<(u32, u32)>,
    /// The pairs that were skipped because locking them would have closed
    /// a cycle, in processing order.
    pub skipped_pairs: Vec<(u32, u32)>,
    /// Ballots rejected by the normalizer (malformed structure). These are
    /// skipped, not fatal.
    pub invalid_ballots: u64,
    pub metadata: ReportMetadata,
}

/// Errors that prevent a tabulation run from starting.
///
/// Malformed individual ballots are deliberately not represented here:
/// the engine is lenient per voter and skips them (see
/// [ElectionReport::invalid_ballots]).
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum VotingErrors {
    /// Two candidates share the same id in the configuration.
    DuplicateCandidate { id: u32 },
    /// A candidate id of 0 (ids start at 1).
    InvalidCandidateId { id: u32 },
}

impl Error for VotingErrors {}

impl Display for VotingErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VotingErrors::DuplicateCandidate { id } => {
                write!(f, "duplicate candidate id {} in configuration", id)
            }
            VotingErrors::InvalidCandidateId { id } => {
                write!(f, "invalid candidate id {} (ids start at 1)", id)
            }
        }
    }
}
