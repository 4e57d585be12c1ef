use log::{info, warn};

use ranked_pairs::*;
use snafu::{prelude::*, Snafu};

use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::tideman::election_file::*;

#[derive(Debug, Snafu)]
pub enum TallyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON in {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing report to {path}"))]
    WritingReport {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error rendering the report to JSON"))]
    RenderingReport { source: serde_json::Error },
    #[snafu(display("Tabulation failed: {source}"))]
    Tabulation { source: VotingErrors },
}

pub type TallyResult<T> = Result<T, TallyError>;

pub mod election_file {
    use crate::tideman::*;

    // The election file is the JSON handed over by the ballot-storage
    // collaborator: the candidate registry plus one entry list per voter.

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct FileCandidate {
        pub id: u32,
        pub name: String,
        pub description: Option<String>,
        /// Missing means active.
        pub active: Option<bool>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct FileRankingEntry {
        #[serde(rename = "candidateId")]
        pub candidate_id: u32,
        #[serde(rename = "tiedWithPrevious")]
        pub tied_with_previous: Option<bool>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct FileBallot {
        pub entries: Vec<FileRankingEntry>,
        /// Weight of this ballot; missing means a single voter.
        pub count: Option<u64>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ElectionFile {
        pub name: Option<String>,
        pub candidates: Vec<FileCandidate>,
        pub ballots: Vec<FileBallot>,
    }

    pub fn read_election(path: &str) -> TallyResult<ElectionFile> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
        let election: ElectionFile =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
        Ok(election)
    }

    pub fn read_json(path: &str) -> TallyResult<JSValue> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
        let js: JSValue =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
        Ok(js)
    }
}

fn to_candidates(cands: &[FileCandidate]) -> Vec<Candidate> {
    cands
        .iter()
        .map(|c| Candidate {
            id: c.id,
            name: c.name.clone(),
            description: c.description.clone().unwrap_or_default(),
            active: c.active.unwrap_or(true),
        })
        .collect()
}

fn to_ballots(ballots: &[FileBallot]) -> Vec<Ballot> {
    ballots
        .iter()
        .map(|b| Ballot {
            entries: b
                .entries
                .iter()
                .map(|e| RankingEntry {
                    candidate_id: e.candidate_id,
                    tied_with_previous: e.tied_with_previous.unwrap_or(false),
                })
                .collect(),
            count: b.count.unwrap_or(1),
        })
        .collect()
}

fn candidate_to_json(c: &Candidate) -> JSValue {
    json!({
        "id": c.id,
        "name": c.name,
        "description": c.description,
        "active": c.active,
    })
}

pub fn report_to_json(report: &ElectionReport) -> JSValue {
    let mut tallies: JSMap<String, JSValue> = JSMap::new();
    for (&(a, b), &count) in report.pairwise_tallies.iter() {
        tallies.insert(format!("{}-{}", a, b), json!(count));
    }

    let ranking: Vec<JSValue> = report
        .final_ranking
        .iter()
        .map(|line| {
            json!({
                "rank": line.rank,
                "candidate": candidate_to_json(&line.candidate),
                "score": line.score,
            })
        })
        .collect();

    let pairs: Vec<JSValue> = report
        .ranked_pairs
        .iter()
        .map(|p| {
            json!({
                "winner": p.winner,
                "loser": p.loser,
                "margin": p.margin,
                "winnerVotes": p.winner_votes,
                "loserVotes": p.loser_votes,
            })
        })
        .collect();

    let locked: Vec<JSValue> = report
        .locked_pairs
        .iter()
        .map(|(w, l)| json!(format!("{}-{}", w, l)))
        .collect();
    let skipped: Vec<JSValue> = report
        .skipped_pairs
        .iter()
        .map(|(w, l)| json!(format!("{}-{}", w, l)))
        .collect();

    json!({
        "algorithm": report.algorithm,
        "winner": report.winner.as_ref().map(candidate_to_json),
        "finalRanking": ranking,
        "pairwiseTallies": tallies,
        "rankedPairs": pairs,
        "lockedPairs": locked,
        "skippedPairs": skipped,
        "invalidBallots": report.invalid_ballots,
        "metadata": {
            "totalVoters": report.metadata.total_voters,
            "candidateCount": report.metadata.candidate_count,
            "timestamp": report.metadata.timestamp.to_rfc3339(),
            "calculationTimeMs": report.metadata.calculation_time_ms,
        },
    })
}

// The metadata block carries wall-clock fields that never compare equal
// across runs, so it is excluded from the comparison.
fn strip_metadata(v: &JSValue) -> JSValue {
    let mut v2 = v.clone();
    if let Some(obj) = v2.as_object_mut() {
        obj.remove("metadata");
    }
    v2
}

fn compare_with_reference(reference: &JSValue, computed: &JSValue) -> TallyResult<()> {
    let ref_pretty =
        serde_json::to_string_pretty(&strip_metadata(reference)).context(RenderingReportSnafu {})?;
    let out_pretty =
        serde_json::to_string_pretty(&strip_metadata(computed)).context(RenderingReportSnafu {})?;
    if ref_pretty != out_pretty {
        warn!("Found differences with the reference report");
        print_diff(ref_pretty.as_str(), out_pretty.as_str(), "\n");
    } else {
        info!("Computed report matches the reference");
    }
    Ok(())
}

pub fn run_election(args: &Args) -> TallyResult<()> {
    let election = election_file::read_election(args.input.as_str())?;
    info!(
        "run_election: contest {:?}: {} candidates, {} ballots",
        election.name.clone().unwrap_or_default(),
        election.candidates.len(),
        election.ballots.len()
    );

    let candidates = to_candidates(&election.candidates);
    let ballots = to_ballots(&election.ballots);

    let report = run_ranked_pairs(&candidates, &ballots).context(TabulationSnafu {})?;
    let report_js = report_to_json(&report);
    let pretty = serde_json::to_string_pretty(&report_js).context(RenderingReportSnafu {})?;

    match args.out.as_deref() {
        None | Some("stdout") => println!("{}", pretty),
        Some(path) => {
            fs::write(path, pretty.as_str()).context(WritingReportSnafu { path })?;
            info!("run_election: report written to {}", path);
        }
    }

    if let Some(ref_path) = &args.reference {
        let reference = election_file::read_json(ref_path.as_str())?;
        compare_with_reference(&reference, &report_js)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn election_file_defaults() {
        let raw = r#"{
            "name": "board election",
            "candidates": [
                {"id": 1, "name": "Alice"},
                {"id": 2, "name": "Bob", "description": "incumbent", "active": false}
            ],
            "ballots": [
                {"entries": [{"candidateId": 1}, {"candidateId": 2, "tiedWithPrevious": true}]},
                {"entries": [{"candidateId": 2}], "count": 3}
            ]
        }"#;
        let election: ElectionFile = serde_json::from_str(raw).unwrap();

        let candidates = to_candidates(&election.candidates);
        assert!(candidates[0].active);
        assert!(!candidates[1].active);
        assert_eq!(candidates[1].description, "incumbent");

        let ballots = to_ballots(&election.ballots);
        assert_eq!(ballots[0].count, 1);
        assert!(ballots[0].entries[1].tied_with_previous);
        assert_eq!(ballots[1].count, 3);
    }

    #[test]
    fn report_json_shape() {
        let candidates = vec![
            Candidate {
                id: 1,
                name: "Alice".to_string(),
                description: String::new(),
                active: true,
            },
            Candidate {
                id: 2,
                name: "Bob".to_string(),
                description: String::new(),
                active: true,
            },
        ];
        let ballots = vec![Ballot {
            entries: vec![
                RankingEntry {
                    candidate_id: 1,
                    tied_with_previous: false,
                },
                RankingEntry {
                    candidate_id: 2,
                    tied_with_previous: false,
                },
            ],
            count: 2,
        }];
        let report = run_ranked_pairs(&candidates, &ballots).unwrap();
        let js = report_to_json(&report);

        assert_eq!(js["algorithm"], json!("Tideman Method (Ranked Pairs)"));
        assert_eq!(js["winner"]["name"], json!("Alice"));
        assert_eq!(js["pairwiseTallies"]["1-2"], json!(2));
        assert_eq!(js["pairwiseTallies"]["2-1"], json!(0));
        assert_eq!(js["lockedPairs"], json!(["1-2"]));
        assert_eq!(js["finalRanking"][0]["rank"], json!(1));
        assert_eq!(js["metadata"]["totalVoters"], json!(2));
    }

    #[test]
    fn reference_comparison_ignores_metadata() {
        let a = json!({"algorithm": "x", "metadata": {"calculationTimeMs": 1}});
        let b = json!({"algorithm": "x", "metadata": {"calculationTimeMs": 99}});
        assert_eq!(strip_metadata(&a), strip_metadata(&b));
    }
}
