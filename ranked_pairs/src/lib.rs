//! Ranked-pairs (Tideman) election tabulation.
//!
//! The engine is a pure function from a candidate registry and a ballot
//! snapshot to an [ElectionReport]. Each run rebuilds every structure from
//! scratch; nothing persists between invocations, so concurrent runs over
//! different snapshots need no coordination.
//!
//! The pipeline has five stages:
//! 1. normalize each ballot into ordered groups of tied candidates,
//! 2. tally, for every ordered candidate pair, how many ballots strictly
//!    prefer the first over the second,
//! 3. turn the tallies into majority pairs sorted by descending margin,
//! 4. lock pairs greedily into a directed graph, skipping any pair that
//!    would close a cycle,
//! 5. topologically sort the locked graph into the final ranking.
//!
//! Both sorts have latent ties (equal margins, simultaneously eligible
//! candidates). They are broken by ascending candidate id so that the same
//! snapshot resolves to the same ranking on every platform.
mod config;
pub mod builder;

use log::{debug, info, warn};

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::Utc;

pub use crate::config::*;

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
struct CandidateId(u32);

// A ballot reduced to its ordered rank groups, with the ballot's weight.
// Invariant: no group is empty. Every candidate in groups[i] is preferred by
// this voter over every candidate in groups[j] for j > i; candidates within
// one group are mutually unranked.
#[derive(Eq, PartialEq, Debug, Clone)]
struct RankGroups {
    groups: Vec<Vec<CandidateId>>,
    count: u64,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum BallotError {
    // The first entry of a ballot has no previous entry to tie with.
    FirstEntryTied,
}

// tally[(a, b)] = weighted number of ballots ranking a strictly above b.
type Tally = HashMap<(CandidateId, CandidateId), u64>;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
struct PairInternal {
    winner: CandidateId,
    loser: CandidateId,
    margin: u64,
    winner_votes: u64,
    loser_votes: u64,
}

/// Runs the full ranked-pairs tabulation over one ballot snapshot.
///
/// Arguments:
/// * `candidates` the registered candidates. Inactive candidates are kept
///   out of the tabulation entirely.
/// * `ballots` the snapshot of ballots to process.
///
/// Configuration problems (duplicate or zero candidate ids) fail the run.
/// Malformed individual ballots do not: they are skipped with a warning and
/// counted in the report, so one bad record never blocks an election.
pub fn run_ranked_pairs(
    candidates: &[Candidate],
    ballots: &[Ballot],
) -> Result<ElectionReport, VotingErrors> {
    let start = Instant::now();
    info!(
        "run_ranked_pairs: processing {} ballots, {} registered candidates",
        ballots.len(),
        candidates.len()
    );

    // Configuration checks cover the whole registry, active or not.
    let mut ids: HashSet<u32> = HashSet::new();
    for c in candidates.iter() {
        if c.id == 0 {
            return Err(VotingErrors::InvalidCandidateId { id: c.id });
        }
        if !ids.insert(c.id) {
            return Err(VotingErrors::DuplicateCandidate { id: c.id });
        }
    }

    let mut active: Vec<&Candidate> = candidates.iter().filter(|c| c.active).collect();
    active.sort_by_key(|c| c.id);
    for c in active.iter() {
        info!("Candidate: {}: {}", c.id, c.name);
    }
    let active_ids: Vec<CandidateId> = active.iter().map(|c| CandidateId(c.id)).collect();
    let active_set: HashSet<CandidateId> = active_ids.iter().copied().collect();

    let mut normalized: Vec<RankGroups> = Vec::new();
    let mut invalid_ballots: u64 = 0;
    for (idx, ballot) in ballots.iter().enumerate() {
        match normalize_ballot(ballot, &active_set) {
            Ok(groups) => normalized.push(groups),
            Err(e) => {
                warn!("run_ranked_pairs: skipping malformed ballot #{}: {:?}", idx, e);
                invalid_ballots += ballot.count;
            }
        }
    }
    let total_voters: u64 = normalized.iter().map(|b| b.count).sum();
    debug!(
        "run_ranked_pairs: {} valid ballots ({} voters), {} invalid",
        normalized.len(),
        total_voters,
        invalid_ballots
    );

    let tally = build_tally(&normalized, &active_ids);
    let pairs = rank_pairs(&tally, &active_ids);
    debug!("run_ranked_pairs: {} strict pairwise majorities", pairs.len());
    let (locked, skipped) = lock_pairs(&pairs);
    let order = resolve_order(&locked, &active_ids);

    let by_id: HashMap<CandidateId, &Candidate> =
        active.iter().map(|c| (CandidateId(c.id), *c)).collect();
    let mut final_ranking: Vec<RankingLine> = Vec::with_capacity(order.len());
    for (idx, cid) in order.iter().enumerate() {
        if let Some(c) = by_id.get(cid) {
            final_ranking.push(RankingLine {
                rank: idx as u32 + 1,
                candidate: (*c).clone(),
                score: net_wins(&tally, *cid, &active_ids),
            });
        }
    }

    // With zero valid ballots the resolved order is just the id order of
    // the active candidates: report "no votes yet" instead of a winner.
    let winner = if total_voters == 0 {
        None
    } else {
        final_ranking.first().map(|line| line.candidate.clone())
    };

    let report = ElectionReport {
        algorithm: ALGORITHM_NAME.to_string(),
        winner,
        final_ranking,
        pairwise_tallies: tally.iter().map(|(&(a, b), &c)| ((a.0, b.0), c)).collect(),
        ranked_pairs: pairs
            .iter()
            .map(|p| RankedPair {
                winner: p.winner.0,
                loser: p.loser.0,
                margin: p.margin,
                winner_votes: p.winner_votes,
                loser_votes: p.loser_votes,
            })
            .collect(),
        locked_pairs: locked.iter().map(|&(w, l)| (w.0, l.0)).collect(),
        skipped_pairs: skipped.iter().map(|&(w, l)| (w.0, l.0)).collect(),
        invalid_ballots,
        metadata: ReportMetadata {
            total_voters,
            candidate_count: active_ids.len(),
            timestamp: Utc::now(),
            calculation_time_ms: start.elapsed().as_millis() as u64,
        },
    };
    info!(
        "run_ranked_pairs: resolved order {:?} in {} ms",
        report
            .final_ranking
            .iter()
            .map(|line| line.candidate.id)
            .collect::<Vec<u32>>(),
        report.metadata.calculation_time_ms
    );
    Ok(report)
}

/// Partitions a ballot's entries into rank groups.
///
/// Group boundaries come from the tie flags alone: an entry with
/// `tied_with_previous = false` opens a new group even if the entry itself
/// is filtered out afterwards. Entries naming unknown or inactive
/// candidates are dropped, as are repeated entries for a candidate already
/// ranked by this ballot (first occurrence wins). Groups left empty by the
/// filtering are removed.
fn normalize_ballot(
    ballot: &Ballot,
    active: &HashSet<CandidateId>,
) -> Result<RankGroups, BallotError> {
    if let Some(first) = ballot.entries.first() {
        if first.tied_with_previous {
            return Err(BallotError::FirstEntryTied);
        }
    }
    let mut groups: Vec<Vec<CandidateId>> = Vec::new();
    let mut seen: HashSet<CandidateId> = HashSet::new();
    for entry in ballot.entries.iter() {
        if !entry.tied_with_previous || groups.is_empty() {
            groups.push(Vec::new());
        }
        let cid = CandidateId(entry.candidate_id);
        if !active.contains(&cid) {
            debug!(
                "normalize_ballot: dropping entry for unknown or inactive candidate {}",
                entry.candidate_id
            );
            continue;
        }
        if !seen.insert(cid) {
            debug!(
                "normalize_ballot: dropping repeated entry for candidate {}",
                entry.candidate_id
            );
            continue;
        }
        if let Some(group) = groups.last_mut() {
            group.push(cid);
        }
    }
    groups.retain(|g| !g.is_empty());
    Ok(RankGroups {
        groups,
        count: ballot.count,
    })
}

/// Builds the complete pairwise tally matrix, zero-initialized for every
/// ordered pair of distinct active candidates.
///
/// For each ballot, every candidate in an earlier group scores against
/// every candidate in a later group, weighted by the ballot's count.
/// Candidates within the same group never compare; candidates absent from
/// the ballot never compare either.
fn build_tally(ballots: &[RankGroups], candidates: &[CandidateId]) -> Tally {
    let mut tally: Tally = HashMap::new();
    for &a in candidates.iter() {
        for &b in candidates.iter() {
            if a != b {
                tally.insert((a, b), 0);
            }
        }
    }
    for ballot in ballots.iter() {
        for (i, gi) in ballot.groups.iter().enumerate() {
            for gj in ballot.groups[i + 1..].iter() {
                for &a in gi.iter() {
                    for &b in gj.iter() {
                        if let Some(cell) = tally.get_mut(&(a, b)) {
                            *cell += ballot.count;
                        }
                    }
                }
            }
        }
    }
    tally
}

/// Extracts the strict pairwise majorities, sorted by descending margin.
///
/// A pair with equal tallies in both directions is a genuine aggregate tie
/// and is not emitted for either side. Equal margins fall back to
/// ascending (winner, loser) id so that the lock order is reproducible.
fn rank_pairs(tally: &Tally, candidates: &[CandidateId]) -> Vec<PairInternal> {
    let mut pairs: Vec<PairInternal> = Vec::new();
    for (i, &a) in candidates.iter().enumerate() {
        for &b in candidates[i + 1..].iter() {
            let ab = *tally.get(&(a, b)).unwrap_or(&0);
            let ba = *tally.get(&(b, a)).unwrap_or(&0);
            if ab == ba {
                continue;
            }
            let (winner, loser, winner_votes, loser_votes) = if ab > ba {
                (a, b, ab, ba)
            } else {
                (b, a, ba, ab)
            };
            pairs.push(PairInternal {
                winner,
                loser,
                margin: winner_votes - loser_votes,
                winner_votes,
                loser_votes,
            });
        }
    }
    pairs.sort_by(|p, q| {
        q.margin
            .cmp(&p.margin)
            .then(p.winner.cmp(&q.winner))
            .then(p.loser.cmp(&q.loser))
    });
    pairs
}

/// Locks pairs greedily in sorted order, keeping the graph acyclic.
///
/// A pair is accepted unless its loser already reaches its winner through
/// the locked edges; a skipped pair is excluded permanently, never
/// retried. This greedy rule is what makes the method Condorcet-consistent:
/// a candidate that beats everyone pairwise can never acquire an in-edge.
fn lock_pairs(
    pairs: &[PairInternal],
) -> (
    Vec<(CandidateId, CandidateId)>,
    Vec<(CandidateId, CandidateId)>,
) {
    let mut edges: HashMap<CandidateId, Vec<CandidateId>> = HashMap::new();
    let mut locked: Vec<(CandidateId, CandidateId)> = Vec::new();
    let mut skipped: Vec<(CandidateId, CandidateId)> = Vec::new();
    for p in pairs.iter() {
        if reaches(&edges, p.loser, p.winner) {
            debug!(
                "lock_pairs: skipping {:?} -> {:?}, would close a cycle",
                p.winner, p.loser
            );
            skipped.push((p.winner, p.loser));
        } else {
            edges.entry(p.winner).or_default().push(p.loser);
            locked.push((p.winner, p.loser));
        }
    }
    (locked, skipped)
}

// Depth-first reachability over the locked edges.
fn reaches(
    edges: &HashMap<CandidateId, Vec<CandidateId>>,
    from: CandidateId,
    to: CandidateId,
) -> bool {
    let mut stack: Vec<CandidateId> = vec![from];
    let mut visited: HashSet<CandidateId> = HashSet::new();
    while let Some(cur) = stack.pop() {
        if cur == to {
            return true;
        }
        if !visited.insert(cur) {
            continue;
        }
        if let Some(nexts) = edges.get(&cur) {
            stack.extend(nexts.iter().copied());
        }
    }
    false
}

/// Kahn's topological sort of the locked graph.
///
/// The locked graph is acyclic by construction, so a valid order always
/// exists. Among simultaneously eligible zero-in-degree candidates the
/// lowest id goes first.
fn resolve_order(
    locked: &[(CandidateId, CandidateId)],
    candidates: &[CandidateId],
) -> Vec<CandidateId> {
    let mut in_degree: HashMap<CandidateId, usize> =
        candidates.iter().map(|&c| (c, 0)).collect();
    for &(_, loser) in locked.iter() {
        if let Some(d) = in_degree.get_mut(&loser) {
            *d += 1;
        }
    }
    // `candidates` is sorted ascending, so scanning it front to back is the
    // id tie-break.
    let mut order: Vec<CandidateId> = Vec::with_capacity(candidates.len());
    let mut placed: HashSet<CandidateId> = HashSet::new();
    while order.len() < candidates.len() {
        let next = candidates
            .iter()
            .copied()
            .find(|c| !placed.contains(c) && in_degree.get(c) == Some(&0));
        let cur = match next {
            Some(c) => c,
            // Unreachable for an acyclic graph; bail out rather than spin.
            None => break,
        };
        placed.insert(cur);
        order.push(cur);
        for &(winner, loser) in locked.iter() {
            if winner == cur {
                if let Some(d) = in_degree.get_mut(&loser) {
                    *d -= 1;
                }
            }
        }
    }
    order
}

// Net pairwise wins (wins minus losses), for diagnostic display.
fn net_wins(tally: &Tally, c: CandidateId, candidates: &[CandidateId]) -> i64 {
    let mut score: i64 = 0;
    for &other in candidates.iter() {
        if other == c {
            continue;
        }
        let win = *tally.get(&(c, other)).unwrap_or(&0);
        let loss = *tally.get(&(other, c)).unwrap_or(&0);
        if win > loss {
            score += 1;
        } else if loss > win {
            score -= 1;
        }
    }
    score
}
