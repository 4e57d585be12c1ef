//! End-to-end tabulation scenarios: majority outcomes, cyclic majorities,
//! tie handling, partial and malformed ballots, and determinism of the
//! resolved order.

use ranked_pairs::{run_ranked_pairs, Ballot, Candidate, ElectionReport, RankingEntry};

fn candidate(id: u32, name: &str) -> Candidate {
    Candidate {
        id,
        name: name.to_string(),
        description: format!("Candidate {}", name),
        active: true,
    }
}

fn entry(candidate_id: u32, tied_with_previous: bool) -> RankingEntry {
    RankingEntry {
        candidate_id,
        tied_with_previous,
    }
}

// A strict ranking, most preferred first.
fn strict(ids: &[u32]) -> Ballot {
    Ballot {
        entries: ids.iter().map(|&id| entry(id, false)).collect(),
        count: 1,
    }
}

fn abc() -> Vec<Candidate> {
    vec![candidate(1, "A"), candidate(2, "B"), candidate(3, "C")]
}

fn final_ids(report: &ElectionReport) -> Vec<u32> {
    report
        .final_ranking
        .iter()
        .map(|line| line.candidate.id)
        .collect()
}

#[test]
fn simple_majority() {
    let ballots = vec![
        strict(&[1, 2, 3]),
        strict(&[1, 2, 3]),
        strict(&[2, 3, 1]),
    ];
    let report = run_ranked_pairs(&abc(), &ballots).unwrap();

    assert_eq!(report.pairwise_tallies[&(1, 2)], 2);
    assert_eq!(report.pairwise_tallies[&(2, 1)], 1);
    assert_eq!(report.pairwise_tallies[&(2, 3)], 3);
    assert_eq!(report.pairwise_tallies[&(3, 2)], 0);

    assert_eq!(final_ids(&report), vec![1, 2, 3]);
    assert_eq!(report.winner.as_ref().map(|c| c.id), Some(1));
    assert_eq!(report.metadata.total_voters, 3);
    assert_eq!(report.metadata.candidate_count, 3);
    assert!(report.skipped_pairs.is_empty());
}

#[test]
fn perfect_three_cycle_falls_back_to_id_order() {
    // Every pairwise tally is 1-1: no pair is emitted for either side, no
    // edge is locked, and the ranking is the candidate-id tie-break alone.
    let ballots = vec![
        strict(&[1, 2, 3]),
        strict(&[2, 3, 1]),
        strict(&[3, 1, 2]),
    ];
    let report = run_ranked_pairs(&abc(), &ballots).unwrap();

    assert!(report.ranked_pairs.is_empty());
    assert!(report.locked_pairs.is_empty());
    assert_eq!(final_ids(&report), vec![1, 2, 3]);
    for line in report.final_ranking.iter() {
        assert_eq!(line.score, 0);
    }
}

#[test]
fn tied_entries_do_not_compare() {
    // A and B tied, then C: contributes A>C and B>C but no A/B comparison.
    let ballots = vec![Ballot {
        entries: vec![entry(1, false), entry(2, true), entry(3, false)],
        count: 1,
    }];
    let report = run_ranked_pairs(&abc(), &ballots).unwrap();

    assert_eq!(report.pairwise_tallies[&(1, 3)], 1);
    assert_eq!(report.pairwise_tallies[&(2, 3)], 1);
    assert_eq!(report.pairwise_tallies[&(1, 2)], 0);
    assert_eq!(report.pairwise_tallies[&(2, 1)], 0);
}

#[test]
fn condorcet_winner_ranks_first() {
    // Candidate 3 beats both others pairwise and must rank first even
    // though the id tie-breaks would favor 1.
    let candidates = abc();
    let ballots = vec![
        strict(&[3, 1, 2]),
        strict(&[3, 1, 2]),
        strict(&[2, 3, 1]),
    ];
    let report = run_ranked_pairs(&candidates, &ballots).unwrap();

    assert!(report.pairwise_tallies[&(3, 1)] > report.pairwise_tallies[&(1, 3)]);
    assert!(report.pairwise_tallies[&(3, 2)] > report.pairwise_tallies[&(2, 3)]);
    assert_eq!(report.winner.as_ref().map(|c| c.id), Some(3));
    assert_eq!(report.final_ranking[0].score, 2);
}

#[test]
fn four_candidate_near_cycle_is_deterministic() {
    // Alice, Bob and Carol form a 2-1 cycle; Dave loses to everyone. The
    // Carol -> Alice majority is the one that would close the cycle and
    // must be skipped, leaving Alice on top. Every run must agree.
    let candidates = vec![
        candidate(1, "Alice"),
        candidate(2, "Bob"),
        candidate(3, "Carol"),
        candidate(4, "Dave"),
    ];
    let ballots = vec![
        strict(&[1, 2, 3, 4]),
        strict(&[2, 3, 4, 1]),
        strict(&[3, 1, 2, 4]),
    ];

    let report = run_ranked_pairs(&candidates, &ballots).unwrap();
    assert_eq!(
        report.locked_pairs,
        vec![(2, 4), (3, 4), (1, 2), (1, 4), (2, 3)]
    );
    assert_eq!(report.skipped_pairs, vec![(3, 1)]);
    assert_eq!(final_ids(&report), vec![1, 2, 3, 4]);
    assert_eq!(report.winner.as_ref().map(|c| c.name.clone()), Some("Alice".to_string()));

    for _ in 0..10 {
        let again = run_ranked_pairs(&candidates, &ballots).unwrap();
        assert_eq!(final_ids(&again), final_ids(&report));
        assert_eq!(again.locked_pairs, report.locked_pairs);
        assert_eq!(again.ranked_pairs, report.ranked_pairs);
    }
}

#[test]
fn no_ballots_is_a_distinct_no_votes_result() {
    let report = run_ranked_pairs(&abc(), &[]).unwrap();

    assert_eq!(report.winner, None);
    assert_eq!(report.metadata.total_voters, 0);
    // The candidate table is still rendered, in id order.
    assert_eq!(final_ids(&report), vec![1, 2, 3]);
    assert!(report.ranked_pairs.is_empty());
    assert!(report.locked_pairs.is_empty());
}

#[test]
fn malformed_ballot_is_skipped_not_fatal() {
    // The first ballot ties its first entry, which is structurally
    // impossible; the run continues on the remaining ballots.
    let bad = Ballot {
        entries: vec![entry(1, true), entry(2, false)],
        count: 1,
    };
    let ballots = vec![bad, strict(&[2, 1, 3]), strict(&[2, 3, 1])];
    let report = run_ranked_pairs(&abc(), &ballots).unwrap();

    assert_eq!(report.invalid_ballots, 1);
    assert_eq!(report.metadata.total_voters, 2);
    assert_eq!(report.winner.as_ref().map(|c| c.id), Some(2));
}

#[test]
fn unknown_and_inactive_candidates_are_excluded() {
    let mut candidates = abc();
    candidates.push(Candidate {
        id: 4,
        name: "Retired".to_string(),
        description: String::new(),
        active: false,
    });
    // 4 is inactive and 99 is unknown; both entries are dropped.
    let ballots = vec![strict(&[4, 99, 2, 1])];
    let report = run_ranked_pairs(&candidates, &ballots).unwrap();

    assert_eq!(report.metadata.candidate_count, 3);
    assert!(report.pairwise_tallies.keys().all(|&(a, b)| a != 4 && b != 4));
    assert_eq!(report.pairwise_tallies[&(2, 1)], 1);
    assert_eq!(report.winner.as_ref().map(|c| c.id), Some(2));
}

#[test]
fn weighted_ballots_count_as_many_voters() {
    let ballots = vec![
        Ballot {
            entries: vec![entry(1, false), entry(2, false)],
            count: 4,
        },
        Ballot {
            entries: vec![entry(2, false), entry(1, false)],
            count: 3,
        },
    ];
    let report = run_ranked_pairs(&abc(), &ballots).unwrap();

    assert_eq!(report.metadata.total_voters, 7);
    assert_eq!(report.pairwise_tallies[&(1, 2)], 4);
    assert_eq!(report.pairwise_tallies[&(2, 1)], 3);
    assert_eq!(report.ranked_pairs[0].margin, 1);
    assert_eq!(report.winner.as_ref().map(|c| c.id), Some(1));
}

#[test]
fn duplicate_candidate_id_is_a_configuration_error() {
    let candidates = vec![candidate(1, "A"), candidate(1, "B")];
    let res = run_ranked_pairs(&candidates, &[]);
    assert_eq!(
        res,
        Err(ranked_pairs::VotingErrors::DuplicateCandidate { id: 1 })
    );
}

#[test]
fn zero_candidate_id_is_a_configuration_error() {
    let candidates = vec![candidate(0, "Zero")];
    let res = run_ranked_pairs(&candidates, &[]);
    assert_eq!(
        res,
        Err(ranked_pairs::VotingErrors::InvalidCandidateId { id: 0 })
    );
}

#[test]
fn identical_snapshots_resolve_identically() {
    let ballots = vec![
        strict(&[2, 1, 3]),
        strict(&[3, 2, 1]),
        strict(&[1, 3, 2]),
        strict(&[2, 3, 1]),
    ];
    let a = run_ranked_pairs(&abc(), &ballots).unwrap();
    let b = run_ranked_pairs(&abc(), &ballots).unwrap();

    // Everything but the wall-clock metadata must match exactly.
    assert_eq!(a.final_ranking, b.final_ranking);
    assert_eq!(a.pairwise_tallies, b.pairwise_tallies);
    assert_eq!(a.ranked_pairs, b.ranked_pairs);
    assert_eq!(a.locked_pairs, b.locked_pairs);
    assert_eq!(a.skipped_pairs, b.skipped_pairs);
}
