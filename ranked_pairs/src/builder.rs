pub use crate::config::*;

use crate::run_ranked_pairs;

/// A builder for assembling an election programmatically.
///
/// It is the simplest way to use the library when the ballots do not come
/// from an external store.
///
/// ```
/// pub use ranked_pairs::builder::Builder;
/// # use ranked_pairs::VotingErrors;
///
/// let mut builder = Builder::new().candidates(&[(1, "Anna"), (2, "Bob"), (3, "Clara")])?;
///
/// builder.add_ballot_simple(&[1, 2, 3])?;
/// // Bob first, then Anna and Clara tied.
/// builder.add_ballot(&[&[2], &[1, 3]], 1)?;
///
/// let report = builder.tabulate()?;
/// assert_eq!(report.winner.map(|c| c.name), Some("Anna".to_string()));
/// # Ok::<(), VotingErrors>(())
/// ```
#[derive(Default)]
pub struct Builder {
    pub(crate) _candidates: Vec<Candidate>,
    pub(crate) _ballots: Vec<Ballot>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            _candidates: Vec::new(),
            _ballots: Vec::new(),
        }
    }

    /// Registers the candidates as (id, name) pairs. All of them are active.
    pub fn candidates(self, cands: &[(u32, &str)]) -> Result<Builder, VotingErrors> {
        Ok(Builder {
            _candidates: cands
                .iter()
                .map(|(id, name)| Candidate {
                    id: *id,
                    name: name.to_string(),
                    description: String::new(),
                    active: true,
                })
                .collect(),
            _ballots: self._ballots,
        })
    }

    /// Adds one voter's ballot as a strict ranking, most preferred first.
    pub fn add_ballot_simple(&mut self, ranking: &[u32]) -> Result<(), VotingErrors> {
        let groups: Vec<&[u32]> = ranking.iter().map(std::slice::from_ref).collect();
        self.add_ballot(&groups, 1)
    }

    /// Adds a ballot given as rank groups, with a weight attached to it.
    ///
    /// Each inner slice is one group of mutually tied candidates; earlier
    /// groups are strictly preferred. Groups may be empty and candidates
    /// may be omitted entirely (partial ballots are valid).
    pub fn add_ballot(&mut self, groups: &[&[u32]], count: u64) -> Result<(), VotingErrors> {
        let mut entries: Vec<RankingEntry> = Vec::new();
        for group in groups.iter() {
            for (idx, &candidate_id) in group.iter().enumerate() {
                entries.push(RankingEntry {
                    candidate_id,
                    tied_with_previous: idx > 0,
                });
            }
        }
        self._ballots.push(Ballot { entries, count });
        Ok(())
    }

    /// Runs the tabulation over everything added so far.
    pub fn tabulate(&self) -> Result<ElectionReport, VotingErrors> {
        run_ranked_pairs(&self._candidates, &self._ballots)
    }
}
