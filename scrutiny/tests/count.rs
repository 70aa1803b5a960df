// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! Whole counts driven through the engine: the classic boundary scenarios
//! and the behavioural laws (replay, relabelling, conservation, the
//! transfer value cap).

use num::{BigInt, BigRational};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use scrutiny::engine::{CountEngine, CountInput, CountPolicy};
use scrutiny::metadata::{Candidate, CandidateId, NumberOfCandidates};
use scrutiny::tie_resolution::LowestCandidateId;
use scrutiny::transcript::{CountResult, ElectionReason};
use scrutiny::transfer_value::TransferValue;

fn candidates(n:u32) -> Vec<Candidate> {
    (0..n).map(|i|Candidate{ id: CandidateId(i+1), name: format!("Candidate {}",i+1), party: None }).collect()
}

fn ballots(spec:&[(&[u32],usize)]) -> Vec<(Vec<CandidateId>,usize)> {
    spec.iter().map(|(prefs,n)|(prefs.iter().map(|&id|CandidateId(id)).collect(),*n)).collect()
}

fn input(num_candidates:u32,vacancies:usize,votes:&[(&[u32],usize)]) -> CountInput {
    CountInput{
        candidates: candidates(num_candidates),
        vacancies: NumberOfCandidates(vacancies),
        ballots: ballots(votes),
        policy: CountPolicy::default(),
    }
}

fn count(input:CountInput) -> CountResult {
    let mut oracle = LowestCandidateId;
    CountEngine::new(input,&mut oracle).unwrap().run().unwrap()
}

fn elected_ids(result:&CountResult) -> Vec<u32> {
    result.summary.elected.iter().map(|c|c.0).collect()
}

fn tally(result:&CountResult,round:usize,candidate:u32) -> String {
    result.rounds[round-1].tallies_after[&CandidateId(candidate)].0.to_string()
}

/// Every round must conserve the total formal weight exactly.
fn assert_conserved(result:&CountResult) {
    let total = BigRational::from_integer(BigInt::from(result.summary.total_formal.0));
    for round in &result.rounds {
        let mut sum = round.exhausted_after.weight.0.clone();
        for tally in round.tallies_after.values() { sum+=&tally.0; }
        assert_eq!(total,sum,"weight drifted in round {}",round.number);
    }
}

#[test]
fn one_vacancy_decided_on_first_preferences() {
    let result = count(input(2,1,&[(&[1,2],60),(&[2,1],40)]));
    assert_eq!(51,result.summary.quota);
    assert_eq!(vec![1],elected_ids(&result));
    // no transfers: the count ends the round the quota is reached
    assert_eq!(1,result.rounds.len());
    assert!(result.rounds[0].transfers.is_empty());
    assert_eq!("60",tally(&result,1,1));
    assert_conserved(&result);
}

#[test]
fn surplus_transfer_elects_the_second_winner() {
    let result = count(input(3,2,&[(&[1,2],70),(&[3,1],20),(&[2,3],10)]));
    assert_eq!(34,result.summary.quota);
    assert_eq!(vec![1,2],elected_ids(&result));
    assert_eq!(2,result.rounds.len());
    let transfer = &result.rounds[1].transfers[0];
    assert_eq!(TransferValue::new(BigInt::from(18),BigInt::from(35)),transfer.transfer_value); // 36/70 reduced
    assert_eq!(1,transfer.parcels_moved.len());
    assert_eq!(CandidateId(2),transfer.parcels_moved[0].to);
    assert_eq!(70,transfer.parcels_moved[0].ballots.0);
    assert_eq!("36",transfer.parcels_moved[0].weighted.0.to_string());
    assert_eq!("34",tally(&result,2,1));
    assert_eq!("46",tally(&result,2,2));
    assert_conserved(&result);
}

#[test]
fn exclusion_tie_settled_by_an_earlier_round() {
    // A and B are tied on 6 when the round 3 exclusion is chosen, but in
    // round 1 A had 6 and B had 5, so B stands lower and is excluded with no
    // oracle involved. The first of B's parcels then elects D, and the
    // second parcel is never moved.
    struct Refuses;
    impl scrutiny::tie_resolution::TieBreakOracle for Refuses {
        fn resolve(&mut self,_q:&scrutiny::tie_resolution::TieQuestion) -> Option<CandidateId> { None }
    }
    let mut oracle = Refuses;
    let input = input(4,1,&[(&[1],6),(&[2,4],5),(&[3,2],1),(&[4],10)]);
    let result = CountEngine::new(input,&mut oracle).unwrap().run().unwrap();
    assert_eq!(12,result.summary.quota);
    let third = &result.rounds[2];
    assert_eq!(1,third.excluded.len());
    assert_eq!(CandidateId(2),third.excluded[0].candidate);
    assert!(third.tie_breaks.is_empty());
    assert!(third.note.iter().any(|n|n.contains("resolved on the round 1 tallies")));
    // mid-exclusion checkpoint: D reached quota on the first parcel, so the
    // round 2 parcel stayed put and B keeps that vote
    assert!(third.note.iter().any(|n|n.contains("all vacancies filled")));
    assert_eq!(1,third.transfers.len());
    assert_eq!("1",tally(&result,3,2));
    assert_eq!("15",tally(&result,3,4));
    assert_eq!(vec![4],elected_ids(&result));
    assert_conserved(&result);
}

#[test]
fn bulk_exclusion_takes_the_bottom_candidates_in_one_round() {
    let mut spec = input(5,1,&[(&[1,5],1),(&[2,5],1),(&[3,5],1),(&[4,5],10),(&[5],9)]);
    spec.policy = CountPolicy{ bulk_exclusion: true, ..CountPolicy::default() };
    let result = count(spec);
    assert_eq!(12,result.summary.quota);
    assert_eq!(2,result.rounds.len());
    let second = &result.rounds[1];
    // the bottom three hold 3 votes between them, fewer than the fourth's 9
    assert_eq!(3,second.excluded.len());
    let excluded : Vec<u32> = second.excluded.iter().map(|e|(e.candidate.0,e.order)).map(|(c,_)|c).collect();
    assert_eq!(vec![1,2,3],excluded);
    assert_eq!(vec![1,2,3],second.excluded.iter().map(|e|e.order).collect::<Vec<_>>());
    assert!(second.note.iter().any(|n|n.contains("bulk exclusion")));
    // the three-way tie at 1 had no earlier round to settle it
    assert!(!second.tie_breaks.is_empty());
    assert_eq!(vec![5],elected_ids(&result));
    assert_eq!("12",tally(&result,2,5));
    assert_conserved(&result);
}

#[test]
fn bulk_exclusion_trim_resolves_a_tie_across_the_cut() {
    // Candidate 6 is elected on first preferences and its surplus exhausts,
    // leaving candidates 1-4 tied on 1 vote each with candidate 5 on 6. The
    // bottom four qualify for bulk exclusion (4 < 6), but excluding all
    // four would leave too few continuing candidates for the two unfilled
    // vacancies, so the 13B trim cuts through the four-way tie and the
    // oracle decides which candidate is spared.
    let mut spec = input(6,3,&[(&[1],1),(&[2],1),(&[3],1),(&[4],1),(&[5],6),(&[6],14)]);
    spec.policy = CountPolicy{ bulk_exclusion: true, ..CountPolicy::default() };
    let result = count(spec);
    assert_eq!(7,result.summary.quota);
    let third = &result.rounds[2];
    assert_eq!(vec![1,2,3],third.excluded.iter().map(|e|e.candidate.0).collect::<Vec<_>>());
    assert_eq!(vec![1,2,3],third.excluded.iter().map(|e|e.order).collect::<Vec<_>>());
    assert!(third.note.iter().any(|n|n.contains("bulk exclusion: the 4 lowest candidates")));
    assert!(third.note.iter().any(|n|n.contains("reduced to the 3 lowest")));
    // the four-way tie had no earlier round to settle it, so the cut was
    // put to the oracle
    assert!(third.tie_breaks.iter().any(|t|t.context==scrutiny::tie_resolution::TieContext::BulkExclusionOrderTie));
    // candidate 4 survives the trim and takes the final vacancy
    assert_eq!("1",tally(&result,3,4));
    assert_eq!(vec![6,5,4],elected_ids(&result));
    assert_conserved(&result);
}

#[test]
fn last_vacancy_goes_to_the_higher_of_the_final_two() {
    let result = count(input(3,1,&[(&[1],50),(&[2],40),(&[3],30)]));
    assert_eq!(61,result.summary.quota);
    assert_eq!(3,result.rounds.len());
    // round 2 excluded C and exhausted its papers
    assert_eq!(30,result.rounds[1].exhausted_after.ballots.0);
    assert_eq!("30",result.rounds[1].exhausted_after.weight.0.to_string());
    let last = &result.rounds[2];
    assert!(last.note.iter().any(|n|n.contains("last vacancy")));
    assert!(last.transfers.is_empty());
    assert_eq!(ElectionReason::HighestOfLastTwo,last.elected[0].reason);
    assert_eq!(vec![1],elected_ids(&result));
    assert_conserved(&result);
}

#[test]
fn surplus_papers_with_no_later_preference_exhaust() {
    let result = count(input(3,2,&[(&[1],70),(&[2,1],20),(&[3],10)]));
    assert_eq!(34,result.summary.quota);
    let second = &result.rounds[1];
    let transfer = &second.transfers[0];
    assert!(transfer.parcels_moved.is_empty());
    assert_eq!(70,transfer.exhausted.ballots.0);
    assert_eq!("36",transfer.exhausted.weighted.0.to_string());
    assert_eq!("34",tally(&result,2,1));
    // the last vacancy then falls to B over C
    assert_eq!(vec![1,2],elected_ids(&result));
    assert_conserved(&result);
}

#[test]
fn transfer_value_is_capped_at_the_incoming_value() {
    // Candidate 1 is elected on first preferences and its surplus of 14
    // carries all 40 papers to candidate 2 at 7/20. When candidate 2's
    // surplus of 8 is distributed, only 20 of the last parcel's papers have
    // a continuing preference, so 8/20 would exceed the incoming 7/20.
    let result = count(input(4,3,&[(&[1,2,3],20),(&[1,2],20),(&[2,3],20),(&[3],20),(&[4],20)]));
    assert_eq!(26,result.summary.quota);
    assert_eq!(3,result.rounds.len());
    let third = &result.rounds[2];
    let creation = third.transfer_value_creation.as_ref().unwrap();
    assert!(creation.capped);
    assert_eq!(TransferValue::new(BigInt::from(7),BigInt::from(20)),creation.transfer_value);
    assert_eq!(Some(TransferValue::new(BigInt::from(7),BigInt::from(20))),creation.original_transfer_value);
    assert_eq!("8",creation.surplus.0.to_string());
    assert_eq!(40,creation.ballots_considered.0);
    assert_eq!(20,creation.transferable_ballots.0);
    assert!(third.note.iter().any(|n|n.contains("capped")));
    // the capped remainder stays with the elected candidate, above quota;
    // the exhausting papers leave at no value
    assert_eq!("27",tally(&result,3,2));
    assert_eq!("27",tally(&result,3,3));
    assert_eq!(20,third.transfers[0].exhausted.ballots.0);
    assert_eq!("0",third.transfers[0].exhausted.weighted.0.to_string());
    assert_eq!(vec![1,2,3],elected_ids(&result));
    assert_conserved(&result);
}

#[test]
fn last_vacancy_policy_flag_changes_who_wins() {
    // With surpluses distributed first (the default), A's surplus lifts B
    // over quota. Applying rule 17 immediately instead elects C, the higher
    // of the final two before the surplus moves.
    let votes : &[(&[u32],usize)] = &[(&[1,2],70),(&[3,1],20),(&[2,3],10)];
    let default_run = count(input(3,2,votes));
    assert_eq!(vec![1,2],elected_ids(&default_run));
    let mut eager = input(3,2,votes);
    eager.policy = CountPolicy{ surpluses_before_terminal_rules: false, ..CountPolicy::default() };
    let eager_run = count(eager);
    assert_eq!(vec![1,3],elected_ids(&eager_run));
}

#[test]
fn replay_is_byte_identical() {
    let make = ||{
        let mut spec = input(5,2,&[(&[1,5],11),(&[2,5],11),(&[3,5],11),(&[4,5],10),(&[5,4],9)]);
        spec.policy = CountPolicy{ bulk_exclusion: true, ..CountPolicy::default() };
        spec
    };
    let first = serde_json::to_string(&count(make())).unwrap();
    let second = serde_json::to_string(&count(make())).unwrap();
    assert_eq!(first,second);
}

#[test]
fn relabelling_candidate_ids_does_not_change_the_outcome() {
    let relabel = |id:u32| id*7+2;
    let votes : &[(&[u32],usize)] = &[(&[1,2],70),(&[3,1],20),(&[2,3],10)];
    let plain = count(input(3,2,votes));
    let renamed_candidates : Vec<Candidate> = candidates(3).into_iter().map(|mut c|{ c.id = CandidateId(relabel(c.id.0)); c }).collect();
    let renamed_votes : Vec<(Vec<CandidateId>,usize)> = ballots(votes).into_iter().map(|(prefs,n)|(prefs.into_iter().map(|c|CandidateId(relabel(c.0))).collect(),n)).collect();
    let renamed = count(CountInput{
        candidates: renamed_candidates,
        vacancies: NumberOfCandidates(2),
        ballots: renamed_votes,
        policy: CountPolicy::default(),
    });
    let mapped : Vec<u32> = elected_ids(&plain).into_iter().map(relabel).collect();
    assert_eq!(mapped,elected_ids(&renamed));
    assert_eq!(plain.summary.quota,renamed.summary.quota);
}

#[test]
fn random_counts_fill_the_vacancies_and_conserve_weight() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    for trial in 0..100 {
        let num_candidates = rng.gen_range(2..8usize);
        let vacancies = rng.gen_range(1..num_candidates);
        let mut votes : Vec<(Vec<CandidateId>,usize)> = vec![];
        for _ in 0..rng.gen_range(3..25) {
            let mut prefs : Vec<u32> = (1..=num_candidates as u32).collect();
            prefs.shuffle(&mut rng);
            prefs.truncate(rng.gen_range(1..=num_candidates));
            votes.push((prefs.into_iter().map(CandidateId).collect(),rng.gen_range(1..60)));
        }
        let bulk = rng.gen_bool(0.5);
        let spec = CountInput{
            candidates: candidates(num_candidates as u32),
            vacancies: NumberOfCandidates(vacancies),
            ballots: votes,
            policy: CountPolicy{ bulk_exclusion: bulk, ..CountPolicy::default() },
        };
        let mut oracle = LowestCandidateId;
        let result = CountEngine::new(spec,&mut oracle).unwrap().run().unwrap_or_else(|e|panic!("trial {} abandoned: {}",trial,e.error));
        assert_eq!(vacancies,result.summary.elected.len(),"trial {}",trial);
        assert_conserved(&result);
    }
}
