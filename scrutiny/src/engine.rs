// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! The round engine: the s273 distribution of preferences as a state
//! machine. Each `step()` executes one count round and appends exactly one
//! round record; the count is a pure function of its input plus the
//! tie-break oracle's answers.

use std::collections::{BTreeMap, HashSet};
use num::{BigInt, BigRational, Zero};
use serde::{Serialize,Deserialize};
use tracing::{debug, info};
use crate::ballot_index::{BallotIndex, BallotPaperCount};
use crate::errors::{AbandonedCount, CountError};
use crate::metadata::{Candidate, CandidateId, CandidateIndex, NumberOfCandidates, RoundNumber};
use crate::parcel::{Parcel, ParcelLedger};
use crate::tie_resolution::{statutory_order, TieBreakOracle, TieContext, TieQuestion};
use crate::transcript::{CandidateElected, CandidateExcluded, CountResult, CountSummary, ElectionReason, ExhaustedInTransfer, ExhaustedPile, ParcelMoved, RoundRecord, TieBreakRecord, TransferRecord, TransferValueCreation};
use crate::transfer_value::{RationalString, TransferValue};

/// Points where s273 admits more than one reading; fixed for a whole count.
#[derive(Copy, Clone,Debug,Serialize,Deserialize)]
pub struct CountPolicy {
    /// apply the s273(13A) bulk exclusion when its conditions hold
    pub bulk_exclusion : bool,
    /// distribute undistributed surpluses before the last-vacancy and
    /// elect-all-remaining rules may fire
    pub surpluses_before_terminal_rules : bool,
}

impl Default for CountPolicy {
    fn default() -> Self {
        CountPolicy{ bulk_exclusion: false, surpluses_before_terminal_rules: true }
    }
}

/// Where the count is up to. `InRound(n)` means round n has been executed.
#[derive(Copy, Clone,Debug,Eq, PartialEq,Serialize,Deserialize)]
pub enum CountPhase {
    AwaitingStart,
    InRound(RoundNumber),
    Completed,
}

/// What has happened to a candidate. Once not hopeful, never changes.
#[derive(Copy, Clone,Debug,Eq, PartialEq)]
pub enum CandidateStatus {
    Hopeful,
    Elected { order : usize, round : RoundNumber },
    Excluded { order : usize, round : RoundNumber },
}

/// Everything the engine needs to start a count.
pub struct CountInput {
    pub candidates : Vec<Candidate>,
    pub vacancies : NumberOfCandidates,
    /// preference sequences by external candidate id, with multiplicities
    pub ballots : Vec<(Vec<CandidateId>,usize)>,
    pub policy : CountPolicy,
}

/// A round being assembled; becomes a [RoundRecord] at the end of the step.
struct RoundInProgress {
    number : RoundNumber,
    note : Vec<String>,
    elected : Vec<CandidateElected>,
    excluded : Vec<CandidateExcluded>,
    transfers : Vec<TransferRecord>,
    transfer_value_creation : Option<TransferValueCreation>,
    tie_breaks : Vec<TieBreakRecord>,
}

impl RoundInProgress {
    fn new(number:RoundNumber) -> Self {
        RoundInProgress{ number, note: vec![], elected: vec![], excluded: vec![], transfers: vec![], transfer_value_creation: None, tie_breaks: vec![] }
    }
}

/// The main workhorse that executes the count, one round per [CountEngine::step].
pub struct CountEngine<'o> {
    candidates : Vec<Candidate>,
    /// dense candidate position -> stable external id
    id_of : Vec<CandidateId>,
    vacancies : NumberOfCandidates,
    policy : CountPolicy,
    oracle : &'o mut dyn TieBreakOracle,
    index : BallotIndex,
    total_formal : BallotPaperCount,
    quota : usize,
    quota_votes : BigRational,
    phase : CountPhase,
    status : Vec<CandidateStatus>,
    /// exact vote tally, by candidate
    tallies : Vec<BigRational>,
    /// physical papers held, by candidate
    papers : Vec<BallotPaperCount>,
    ledgers : Vec<ParcelLedger>,
    continuing : HashSet<CandidateIndex>,
    exhausted_papers : BallotPaperCount,
    exhausted_weight : BigRational,
    /// elected candidates whose surplus has not yet been dealt with
    pending_surpluses : Vec<CandidateIndex>,
    elected_on_first_preferences : Vec<bool>,
    /// in order of election
    elected : Vec<CandidateIndex>,
    /// in order of exclusion
    excluded : Vec<CandidateIndex>,
    rounds : Vec<RoundRecord>,
}

impl <'o> CountEngine<'o> {
    pub fn new(input:CountInput,oracle:&'o mut dyn TieBreakOracle) -> Result<Self,CountError> {
        let CountInput{ candidates, vacancies, ballots, policy } = input;
        if candidates.is_empty() { return Err(CountError::rejected("no candidates")); }
        if vacancies.0==0 { return Err(CountError::rejected("no vacancies to fill")); }
        if vacancies.0>=candidates.len() { return Err(CountError::rejected(format!("{} vacancies is not fewer than {} candidates",vacancies,candidates.len()))); }
        let mut ids = HashSet::new();
        for candidate in &candidates {
            if !ids.insert(candidate.id) { return Err(CountError::rejected(format!("candidate id {} appears twice",candidate.id))); }
        }
        let index = BallotIndex::build(ballots,&candidates)?;
        let total_formal = index.total_papers();
        if total_formal.0==0 { return Err(CountError::rejected("no formal ballots")); }
        // s273(8): quota = round_down(total formal/(1+vacancies))+1, fixed for the count
        let quota = total_formal.0/(vacancies.0+1)+1;
        let num = candidates.len();
        Ok(CountEngine{
            id_of: candidates.iter().map(|c|c.id).collect(),
            candidates,
            vacancies,
            policy,
            oracle,
            index,
            total_formal,
            quota,
            quota_votes: BigRational::from_integer(BigInt::from(quota)),
            phase: CountPhase::AwaitingStart,
            status: vec![CandidateStatus::Hopeful;num],
            tallies: vec![BigRational::zero();num],
            papers: vec![BallotPaperCount(0);num],
            ledgers: (0..num).map(|_|ParcelLedger::default()).collect(),
            continuing: (0..num).map(CandidateIndex).collect(),
            exhausted_papers: BallotPaperCount(0),
            exhausted_weight: BigRational::zero(),
            pending_surpluses: vec![],
            elected_on_first_preferences: vec![false;num],
            elected: vec![],
            excluded: vec![],
            rounds: vec![],
        })
    }

    pub fn phase(&self) -> CountPhase { self.phase }
    pub fn quota(&self) -> usize { self.quota }
    pub fn total_formal(&self) -> BallotPaperCount { self.total_formal }
    pub fn rounds(&self) -> &[RoundRecord] { &self.rounds }
    pub fn status(&self,candidate:CandidateIndex) -> CandidateStatus { self.status[candidate.0] }

    /// Execute one count round, appending exactly one round record. A no-op
    /// once the count has completed.
    pub fn step(&mut self) -> Result<CountPhase,CountError> {
        match self.phase {
            CountPhase::Completed => {}
            CountPhase::AwaitingStart => self.first_preference_round()?,
            CountPhase::InRound(_) => self.transfer_round()?,
        }
        Ok(self.phase)
    }

    /// Run the count to completion. On failure, the error carries every
    /// round record the count produced first.
    pub fn run(mut self) -> Result<CountResult,AbandonedCount> {
        loop {
            match self.step() {
                Ok(CountPhase::Completed) => return Ok(self.into_result()),
                Ok(_) => {}
                Err(error) => return Err(AbandonedCount{ error, rounds: self.rounds }),
            }
        }
    }

    pub fn into_result(self) -> CountResult {
        CountResult{
            summary: CountSummary{
                total_formal: self.total_formal,
                quota: self.quota,
                vacancies: self.vacancies,
                elected: self.elected.iter().map(|c|self.id_of[c.0]).collect(),
            },
            rounds: self.rounds,
        }
    }

    fn remaining_to_elect(&self) -> NumberOfCandidates { self.vacancies-NumberOfCandidates(self.elected.len()) }

    /// continuing candidates in a deterministic base order
    fn hopefuls(&self) -> Vec<CandidateIndex> {
        let mut hopefuls : Vec<CandidateIndex> = self.continuing.iter().cloned().collect();
        hopefuls.sort_by_key(|c|c.0);
        hopefuls
    }

    fn id_list(&self,candidates:&[CandidateIndex]) -> String {
        candidates.iter().map(|c|self.id_of[c.0].to_string()).collect::<Vec<_>>().join(", ")
    }

    /// Put a group of candidates with equal current tallies into standing
    /// order, lowest first, by the statute and then the oracle. With
    /// `first_only` the oracle is asked for just the one candidate the
    /// context singles out; the relative order of the rest is not needed
    /// and no further questions are put.
    fn resolve_tie(&mut self,tied:&mut Vec<CandidateIndex>,context:TieContext,round:&mut RoundInProgress,first_only:bool) -> Result<(),CountError> {
        if tied.len()<2 { return Ok(()); }
        if let Some(settled_by) = statutory_order(tied,&self.rounds,&self.id_of) {
            round.note.push(format!("tie between candidates {} resolved on the round {} tallies",self.id_list(tied),settled_by));
            return Ok(());
        }
        // The oracle answers one candidate at a time: the candidate the
        // context singles out. For exclusion contexts that candidate stands
        // lowest; for election and surplus contexts it stands highest.
        let picks_lowest = matches!(context,TieContext::ExclusionTie|TieContext::BulkExclusionOrderTie);
        let mut remaining : Vec<CandidateIndex> = tied.clone();
        let mut picked : Vec<CandidateIndex> = vec![];
        while remaining.len()>1 && (picked.is_empty() || !first_only) {
            let ids : Vec<CandidateId> = remaining.iter().map(|c|self.id_of[c.0]).collect();
            let question = TieQuestion{ round: round.number, context, candidates: &ids };
            let answer = self.oracle.resolve(&question);
            let position = match answer.and_then(|chosen|ids.iter().position(|&c|c==chosen)) {
                Some(position) => position,
                None => return Err(CountError::TieUnresolved{ context, candidates: ids }),
            };
            round.tie_breaks.push(TieBreakRecord{ context, candidates: ids.clone(), chose: ids[position] });
            picked.push(remaining.remove(position));
        }
        if picks_lowest {
            picked.append(&mut remaining);
            *tied = picked;
        } else {
            picked.reverse();
            remaining.append(&mut picked);
            *tied = remaining;
        }
        Ok(())
    }

    /// The given candidates sorted into standing order, lowest first, with
    /// runs of equal tallies put into order by the statute then the oracle.
    fn standing_order(&mut self,mut candidates:Vec<CandidateIndex>,context:TieContext,round:&mut RoundInProgress) -> Result<Vec<CandidateIndex>,CountError> {
        candidates.sort_by(|a,b|self.tallies[a.0].cmp(&self.tallies[b.0]).then(a.0.cmp(&b.0)));
        let mut i = 0;
        while i<candidates.len() {
            let mut j = i+1;
            while j<candidates.len() && self.tallies[candidates[i].0]==self.tallies[candidates[j].0] { j+=1; }
            if j-i>1 {
                let mut run : Vec<CandidateIndex> = candidates[i..j].to_vec();
                self.resolve_tie(&mut run,context,round,false)?;
                candidates[i..j].copy_from_slice(&run);
            }
            i = j;
        }
        Ok(candidates)
    }

    fn declare_elected(&mut self,candidate:CandidateIndex,reason:ElectionReason,round:&mut RoundInProgress) {
        let order = self.elected.len()+1;
        self.status[candidate.0] = CandidateStatus::Elected{ order, round: round.number };
        self.continuing.remove(&candidate);
        self.elected.push(candidate);
        if round.number.0==1 { self.elected_on_first_preferences[candidate.0] = true; }
        if reason==ElectionReason::ReachedQuota && self.tallies[candidate.0]>self.quota_votes {
            self.pending_surpluses.push(candidate);
        }
        round.elected.push(CandidateElected{ candidate: self.id_of[candidate.0], order, reason });
        info!(candidate=%self.candidates[candidate.0].name,order,"elected");
    }

    /// s273(8)-(10): any continuing candidate whose tally reaches the quota
    /// is elected. Order of election amongst candidates reaching quota in
    /// the same round is by tally, then rule 20(b), then the oracle.
    fn declare_quota_reached(&mut self,round:&mut RoundInProgress) -> Result<(),CountError> {
        let over : Vec<CandidateIndex> = self.hopefuls().into_iter().filter(|c|self.tallies[c.0]>=self.quota_votes).collect();
        if over.is_empty() { return Ok(()); }
        let ordered = self.standing_order(over,TieContext::ElectionOrderTie,round)?;
        for &candidate in ordered.iter().rev() {
            self.declare_elected(candidate,ElectionReason::ReachedQuota,round);
        }
        Ok(())
    }

    fn first_preference_round(&mut self) -> Result<(),CountError> {
        let number = RoundNumber(1);
        let mut round = RoundInProgress::new(number);
        let distributed = self.index.initial_distribution();
        for (i,bucket) in distributed.by_candidate.into_iter().enumerate() {
            if bucket.papers.0==0 { continue; }
            self.tallies[i] = BigRational::from_integer(BigInt::from(bucket.papers.0));
            self.papers[i] = bucket.papers;
            self.ledgers[i].append(Parcel{ ballots: bucket.ballots, papers: bucket.papers, transfer_value: TransferValue::one(), received: number });
        }
        round.note.push(format!("first preferences distributed; quota {} = ({} formal papers)/({} vacancies+1)+1",self.quota,self.total_formal,self.vacancies));
        debug!(quota=self.quota,"first preferences distributed");
        self.declare_quota_reached(&mut round)?;
        self.finish_round(round)
    }

    fn transfer_round(&mut self) -> Result<(),CountError> {
        let number = RoundNumber(self.rounds.len()+1);
        let mut round = RoundInProgress::new(number);
        let remaining = self.remaining_to_elect();
        let hopeful_count = self.continuing.len();
        if hopeful_count<remaining.0 {
            return Err(CountError::invariant("continuing_candidates",format!("{} continuing candidates for {} remaining vacancies",hopeful_count,remaining)));
        }
        let terminal_allowed = self.pending_surpluses.is_empty() || !self.policy.surpluses_before_terminal_rules;
        if terminal_allowed && hopeful_count==remaining.0 {
            self.elect_all_remaining(&mut round)?;
            return self.finish_round(round);
        }
        if terminal_allowed && remaining.0==1 && hopeful_count==2 {
            self.elect_highest_of_last_two(&mut round)?;
            return self.finish_round(round);
        }
        if let Some(candidate) = self.next_surplus(&mut round)? {
            self.distribute_surplus(candidate,&mut round)?;
            self.declare_quota_reached(&mut round)?;
            return self.finish_round(round);
        }
        let bulk = if self.policy.bulk_exclusion { self.bulk_exclusion_targets(&mut round)? } else { None };
        let targets = match bulk {
            Some(bulk) => bulk,
            None => vec![self.lowest_candidate(&mut round)?],
        };
        self.exclude(targets,&mut round)?;
        self.finish_round(round)
    }

    /// > (18) Notwithstanding any other provision of this section, where the
    /// > number of continuing candidates is equal to the number of
    /// > remaining unfilled vacancies, those candidates shall be elected.
    fn elect_all_remaining(&mut self,round:&mut RoundInProgress) -> Result<(),CountError> {
        round.note.push("all remaining continuing candidates elected to fill the remaining vacancies".to_string());
        let ordered = self.standing_order(self.hopefuls(),TieContext::ElectionOrderTie,round)?;
        for &candidate in ordered.iter().rev() {
            self.declare_elected(candidate,ElectionReason::AllRemainingMustBeElected,round);
        }
        Ok(())
    }

    /// > (17) In respect of the last vacancy for which two continuing candidates
    /// > remain, the continuing candidate who has the larger number of
    /// > votes shall be elected notwithstanding that that number is below
    /// > the quota, and if those candidates have an equal number of votes
    /// > the Australian Electoral Officer for the State shall have a casting
    /// > vote but shall not otherwise vote at the election.
    fn elect_highest_of_last_two(&mut self,round:&mut RoundInProgress) -> Result<(),CountError> {
        round.note.push("last vacancy: the higher of the two remaining continuing candidates is elected".to_string());
        let ordered = self.standing_order(self.hopefuls(),TieContext::LastVacancyTie,round)?;
        let winner = ordered[ordered.len()-1];
        self.declare_elected(winner,ElectionReason::HighestOfLastTwo,round);
        Ok(())
    }

    /// s273(22): the largest surplus is dealt with first; equal surpluses in
    /// the order of the candidates' votes at the last count at which they
    /// differed, else the Electoral Officer decides.
    fn next_surplus(&mut self,round:&mut RoundInProgress) -> Result<Option<CandidateIndex>,CountError> {
        let largest = match self.pending_surpluses.iter().map(|c|self.tallies[c.0].clone()).max() {
            Some(largest) => largest,
            None => return Ok(None),
        };
        let mut tied : Vec<CandidateIndex> = self.pending_surpluses.iter().cloned().filter(|c|self.tallies[c.0]==largest).collect();
        let chosen = if tied.len()==1 { tied[0] } else {
            self.resolve_tie(&mut tied,TieContext::SurplusOrderTie,round,true)?;
            tied[tied.len()-1]
        };
        self.pending_surpluses.retain(|&c|c!=chosen);
        Ok(Some(chosen))
    }

    /// Surplus distribution.
    /// ```text
    /// Commonwealth Electoral Act 1918, Section 273, (9)(a) extract:
    /// the number of surplus votes of the elected candidate shall be
    /// divided by the number of first preference votes received by
    /// the candidate and the resulting fraction shall be the transfer
    /// value;
    /// ```
    /// For a candidate elected on transfers, (14) instead takes only the
    /// last parcel received, divides the surplus by its transferable papers,
    /// and never lets the new value exceed the value the parcel arrived at.
    /// Weight the cap (or non-transferable papers) withholds stays on the
    /// elected candidate's tally, so conservation is exact.
    fn distribute_surplus(&mut self,candidate:CandidateIndex,round:&mut RoundInProgress) -> Result<(),CountError> {
        let tally_before = self.tallies[candidate.0].clone();
        let surplus = &tally_before-&self.quota_votes;
        if surplus<BigRational::zero() {
            return Err(CountError::invariant("negative_surplus",format!("candidate {} has tally {} below the quota",self.id_of[candidate.0],tally_before)));
        }
        let first_preferences = self.elected_on_first_preferences[candidate.0];
        let (ballots,papers,incoming) = if first_preferences {
            let mut ballots = vec![];
            let mut papers = BallotPaperCount(0);
            for mut parcel in self.ledgers[candidate.0].drain_all() {
                papers+=parcel.papers;
                ballots.append(&mut parcel.ballots);
            }
            (ballots,papers,TransferValue::one())
        } else {
            match self.ledgers[candidate.0].drain_last() {
                Some(parcel) => (parcel.ballots,parcel.papers,parcel.transfer_value),
                None => return Err(CountError::invariant("surplus_without_parcels",format!("candidate {} has a surplus but no parcels",self.id_of[candidate.0]))),
            }
        };
        // any earlier parcels are spent; an elected candidate keeps the
        // votes but no live parcels
        self.ledgers[candidate.0].clear();
        self.papers[candidate.0]-=papers;
        let distributed = self.index.advance(&ballots,&self.continuing);
        let transferable = papers-distributed.exhausted.papers;
        let denominator = if first_preferences { papers } else { transferable };
        if denominator.0==0 {
            self.exhausted_papers+=distributed.exhausted.papers;
            round.transfers.push(TransferRecord{
                from: self.id_of[candidate.0],
                transfer_value: incoming,
                parcels_moved: vec![],
                exhausted: ExhaustedInTransfer{ ballots: distributed.exhausted.papers, weighted: RationalString(BigRational::zero()) },
            });
            round.note.push(format!("no transferable papers for the surplus of candidate {}; surplus not transferred",self.id_of[candidate.0]));
            return Ok(());
        }
        let uncapped = TransferValue::from_surplus(&surplus,denominator);
        let capped = !first_preferences && uncapped>incoming;
        let transfer_value = if capped { incoming.clone() } else { uncapped };
        if capped {
            round.note.push(format!("transfer value for candidate {} capped at the incoming parcel's value {}",self.id_of[candidate.0],incoming));
        }
        let mut moved : Vec<ParcelMoved> = vec![];
        let mut leaving = BigRational::zero();
        for (i,bucket) in distributed.by_candidate.into_iter().enumerate() {
            if bucket.papers.0==0 { continue; }
            let worth = transfer_value.weight(bucket.papers);
            self.tallies[i]+=&worth;
            self.papers[i]+=bucket.papers;
            leaving+=&worth;
            self.ledgers[i].append(Parcel{ ballots: bucket.ballots, papers: bucket.papers, transfer_value: transfer_value.clone(), received: round.number });
            moved.push(ParcelMoved{ to: self.id_of[i], ballots: bucket.papers, weighted: RationalString(worth) });
        }
        // papers exhausting out of a first-preference surplus carry their
        // transfer value; out of a last parcel they carry nothing (the votes
        // never left the elected candidate)
        let exhausted_worth = if first_preferences { transfer_value.weight(distributed.exhausted.papers) } else { BigRational::zero() };
        self.exhausted_papers+=distributed.exhausted.papers;
        self.exhausted_weight+=&exhausted_worth;
        leaving+=&exhausted_worth;
        self.tallies[candidate.0] = &tally_before-&leaving;
        debug!(candidate=%self.candidates[candidate.0].name,transfer_value=%transfer_value,"surplus distributed");
        round.transfers.push(TransferRecord{
            from: self.id_of[candidate.0],
            transfer_value: transfer_value.clone(),
            parcels_moved: moved,
            exhausted: ExhaustedInTransfer{ ballots: distributed.exhausted.papers, weighted: RationalString(exhausted_worth) },
        });
        round.transfer_value_creation = Some(TransferValueCreation{
            surplus: RationalString(surplus),
            ballots_considered: papers,
            transferable_ballots: transferable,
            original_transfer_value: if first_preferences { None } else { Some(incoming) },
            capped,
            transfer_value,
        });
        Ok(())
    }

    /// > (13)(a) the candidate who stands lowest in the poll must be excluded
    fn lowest_candidate(&mut self,round:&mut RoundInProgress) -> Result<CandidateIndex,CountError> {
        let hopefuls = self.hopefuls();
        let lowest = match hopefuls.iter().map(|c|self.tallies[c.0].clone()).min() {
            Some(lowest) => lowest,
            None => return Err(CountError::invariant("no_continuing_candidates","no continuing candidate to exclude")),
        };
        let mut tied : Vec<CandidateIndex> = hopefuls.into_iter().filter(|c|self.tallies[c.0]==lowest).collect();
        self.resolve_tie(&mut tied,TieContext::ExclusionTie,round,true)?;
        Ok(tied[0])
    }

    /// The s273(13A) bulk exclusion, in the simplified reading this engine
    /// adopts (and records in the round note): the largest k >= 2 whose
    /// bottom-k tallies sum strictly below the (k+1)-th candidate's tally
    /// and strictly below every undistributed surplus.
    /// ```text
    /// Commonwealth Electoral Act 1918, Section 273, subsection 13B:
    /// Where, apart from this subsection, the number of continuing
    /// candidates after a bulk exclusion under subsection (13A) would be
    /// fewer than the number of remaining unfilled vacancies,
    /// subsection (13A) shall operate to exclude only the number of
    /// candidates, beginning with the candidate who stands lowest in the
    /// poll, that would leave sufficient continuing candidates to fill the
    /// remaining unfilled vacancies.
    /// ```
    /// A 13B trim can cut through candidates on equal tallies (the 13A cut
    /// itself cannot, as the summed group is never outweighed by a candidate
    /// it ties with); the tie then decides who stays in the exclusion.
    fn bulk_exclusion_targets(&mut self,round:&mut RoundInProgress) -> Result<Option<Vec<CandidateIndex>>,CountError> {
        let remaining = self.remaining_to_elect().0;
        let mut standing = self.hopefuls();
        standing.sort_by(|a,b|self.tallies[a.0].cmp(&self.tallies[b.0]).then(a.0.cmp(&b.0)));
        let max_k = standing.len()-remaining;
        if max_k<2 { return Ok(None); }
        let surpluses : Vec<BigRational> = self.pending_surpluses.iter().map(|c|&self.tallies[c.0]-&self.quota_votes).collect();
        let mut prefix : Vec<BigRational> = Vec::with_capacity(standing.len()+1);
        prefix.push(BigRational::zero());
        for c in &standing {
            let sum = prefix[prefix.len()-1].clone()+&self.tallies[c.0];
            prefix.push(sum);
        }
        let mut identified = None;
        for k in (2..standing.len()).rev() {
            if prefix[k]<self.tallies[standing[k].0] && surpluses.iter().all(|s|&prefix[k]<s) {
                identified = Some(k);
                break;
            }
        }
        let identified = match identified {
            Some(k) => k,
            None => return Ok(None),
        };
        let sum = prefix[identified].clone();
        let next = self.tallies[standing[identified].0].clone();
        // 13B spares the excess from the top of the identified group
        let k = identified.min(max_k);
        round.note.push(format!("bulk exclusion: the {} lowest candidates hold {} votes between them, fewer than the next candidate's {} and every undistributed surplus",identified,sum,next));
        if k<identified {
            round.note.push(format!("bulk exclusion reduced to the {} lowest candidates, leaving sufficient continuing candidates for the remaining vacancies",k));
        }
        // a tie straddling the cut decides who is in the bulk exclusion
        let boundary = self.tallies[standing[k-1].0].clone();
        let mut tie_start = k-1;
        while tie_start>0 && self.tallies[standing[tie_start-1].0]==boundary { tie_start-=1; }
        let mut tie_end = k;
        while tie_end<standing.len() && self.tallies[standing[tie_end].0]==boundary { tie_end+=1; }
        if tie_end>k {
            let mut run = standing[tie_start..tie_end].to_vec();
            self.resolve_tie(&mut run,TieContext::BulkExclusionOrderTie,round,false)?;
            standing[tie_start..tie_end].copy_from_slice(&run);
        }
        let targets = self.standing_order(standing[0..k].to_vec(),TieContext::BulkExclusionOrderTie,round)?;
        Ok(Some(targets))
    }

    /// Exclusion.
    /// ```text
    /// Commonwealth Electoral Act 1918, Section 273, (13AA)(b) extract:
    /// the total number of ballot papers received by the
    /// excluded candidate or candidates, as the case may be, at
    /// a particular transfer value and expressing the next
    /// available preference for a particular continuing
    /// candidate must be multiplied by that transfer value;
    /// ```
    /// Each parcel is a sub-transfer of the one round. After every parcel
    /// the quota is checked and any candidate reaching it is elected before
    /// later parcels move, so never receives them; once all vacancies are
    /// filled the remaining parcels stay where they are.
    fn exclude(&mut self,targets:Vec<CandidateIndex>,round:&mut RoundInProgress) -> Result<(),CountError> {
        for &candidate in &targets {
            let order = self.excluded.len()+1;
            self.status[candidate.0] = CandidateStatus::Excluded{ order, round: round.number };
            self.continuing.remove(&candidate);
            self.excluded.push(candidate);
            round.excluded.push(CandidateExcluded{ candidate: self.id_of[candidate.0], order });
            info!(candidate=%self.candidates[candidate.0].name,order,"excluded");
        }
        let mut pending : Vec<(CandidateIndex,Parcel)> = vec![];
        for &candidate in &targets {
            for parcel in self.ledgers[candidate.0].drain_all() {
                pending.push((candidate,parcel));
            }
        }
        // ascending transfer value over all the excluded candidates; the
        // sort is stable so receipt order breaks ties
        pending.sort_by(|a,b|a.1.transfer_value.cmp(&b.1.transfer_value));
        if pending.is_empty() {
            round.note.push("no ballot papers to transfer".to_string());
            return Ok(());
        }
        let total_parcels = pending.len();
        for (done,(owner,parcel)) in pending.into_iter().enumerate() {
            if self.remaining_to_elect().0==0 {
                round.note.push(format!("{} parcels left untransferred; all vacancies filled",total_parcels-done));
                break;
            }
            let distributed = self.index.advance(&parcel.ballots,&self.continuing);
            let mut moved : Vec<ParcelMoved> = vec![];
            let mut leaving = BigRational::zero();
            for (i,bucket) in distributed.by_candidate.into_iter().enumerate() {
                if bucket.papers.0==0 { continue; }
                let worth = parcel.transfer_value.weight(bucket.papers);
                self.tallies[i]+=&worth;
                self.papers[i]+=bucket.papers;
                leaving+=&worth;
                self.ledgers[i].append(Parcel{ ballots: bucket.ballots, papers: bucket.papers, transfer_value: parcel.transfer_value.clone(), received: round.number });
                moved.push(ParcelMoved{ to: self.id_of[i], ballots: bucket.papers, weighted: RationalString(worth) });
            }
            let exhausted_worth = parcel.transfer_value.weight(distributed.exhausted.papers);
            self.exhausted_papers+=distributed.exhausted.papers;
            self.exhausted_weight+=&exhausted_worth;
            leaving+=&exhausted_worth;
            self.tallies[owner.0]-=&leaving;
            self.papers[owner.0]-=parcel.papers;
            round.transfers.push(TransferRecord{
                from: self.id_of[owner.0],
                transfer_value: parcel.transfer_value.clone(),
                parcels_moved: moved,
                exhausted: ExhaustedInTransfer{ ballots: distributed.exhausted.papers, weighted: RationalString(exhausted_worth) },
            });
            // the mandatory mid-exclusion checkpoint
            self.declare_quota_reached(round)?;
        }
        Ok(())
    }

    fn finish_round(&mut self,round:RoundInProgress) -> Result<(),CountError> {
        let number = round.number;
        let tallies_after : BTreeMap<CandidateId,RationalString> = (0..self.candidates.len()).map(|i|(self.id_of[i],RationalString(self.tallies[i].clone()))).collect();
        let papers_after : BTreeMap<CandidateId,BallotPaperCount> = (0..self.candidates.len()).map(|i|(self.id_of[i],self.papers[i])).collect();
        let record = RoundRecord{
            number,
            note: round.note,
            elected: round.elected,
            excluded: round.excluded,
            transfers: round.transfers,
            transfer_value_creation: round.transfer_value_creation,
            tie_breaks: round.tie_breaks,
            tallies_after,
            papers_after,
            exhausted_after: ExhaustedPile{ ballots: self.exhausted_papers, weight: RationalString(self.exhausted_weight.clone()) },
        };
        self.check_invariants()?;
        debug!(round=number.0,"round complete");
        self.rounds.push(record);
        self.phase = if self.elected.len()==self.vacancies.0 { CountPhase::Completed } else { CountPhase::InRound(number) };
        Ok(())
    }

    /// The between-round guarantees of the count. Any failure is fatal.
    fn check_invariants(&self) -> Result<(),CountError> {
        let mut total = self.exhausted_weight.clone();
        for tally in &self.tallies { total+=tally; }
        if total!=BigRational::from_integer(BigInt::from(self.total_formal.0)) {
            return Err(CountError::invariant("weight_conservation",format!("tallies and exhausted pile sum to {} of {} formal votes",total,self.total_formal)));
        }
        for i in 0..self.candidates.len() {
            if self.tallies[i]<BigRational::zero() {
                return Err(CountError::invariant("negative_tally",format!("candidate {} has tally {}",self.id_of[i],self.tallies[i])));
            }
            if matches!(self.status[i],CandidateStatus::Excluded{..}) && !self.ledgers[i].is_empty() {
                return Err(CountError::invariant("excluded_holds_parcels",format!("excluded candidate {} still holds parcels",self.id_of[i])));
            }
        }
        if self.elected.len()>self.vacancies.0 {
            return Err(CountError::invariant("too_many_elected",format!("{} candidates elected for {} vacancies",self.elected.len(),self.vacancies)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tie_resolution::LowestCandidateId;

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

    /// An oracle that never answers, to prove the statute alone sufficed.
    struct DeclinesEverything;
    impl TieBreakOracle for DeclinesEverything {
        fn resolve(&mut self,_question:&TieQuestion) -> Option<CandidateId> { None }
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        let mut oracle = LowestCandidateId;
        let reject = |input:CountInput| matches!(CountEngine::new(input,&mut LowestCandidateId),Err(CountError::InputRejected{..}));
        assert!(reject(CountInput{ candidates: vec![], vacancies: NumberOfCandidates(1), ballots: vec![], policy: CountPolicy::default() }));
        assert!(reject(input(3,0,&[(&[1],1)])));
        assert!(reject(input(3,3,&[(&[1],1)])));
        assert!(reject(input(3,1,&[])));
        assert!(reject(input(3,1,&[(&[7],1)])));
        assert!(reject(input(3,1,&[(&[1,1],1)])));
        // a sound input passes
        assert!(CountEngine::new(input(3,1,&[(&[1],5),(&[2],3),(&[3],1)]),&mut oracle).is_ok());
    }

    #[test]
    fn quota_is_droop() {
        let mut oracle = LowestCandidateId;
        let engine = CountEngine::new(input(3,2,&[(&[1],70),(&[2],20),(&[3],10)]),&mut oracle).unwrap();
        assert_eq!(34,engine.quota()); // 100/3+1
    }

    #[test]
    fn phases_advance_one_round_per_step() {
        let mut oracle = LowestCandidateId;
        let mut engine = CountEngine::new(input(2,1,&[(&[1],60),(&[2],40)]),&mut oracle).unwrap();
        assert_eq!(CountPhase::AwaitingStart,engine.phase());
        assert_eq!(CountPhase::Completed,engine.step().unwrap());
        assert_eq!(1,engine.rounds().len());
        // stepping a completed count is a no-op
        assert_eq!(CountPhase::Completed,engine.step().unwrap());
        assert_eq!(1,engine.rounds().len());
    }

    #[test]
    fn unresolvable_tie_aborts_with_partial_transcript() {
        let mut oracle = DeclinesEverything;
        let engine = CountEngine::new(input(3,1,&[(&[1],5),(&[2],5),(&[3],8)]),&mut oracle).unwrap();
        let abandoned = engine.run().unwrap_err();
        assert!(matches!(abandoned.error,CountError::TieUnresolved{ context: TieContext::ExclusionTie, .. }));
        // round 1 completed before the round 2 exclusion tie was hit
        assert_eq!(1,abandoned.rounds.len());
    }

    #[test]
    fn statuses_are_reported() {
        let mut oracle = LowestCandidateId;
        let mut engine = CountEngine::new(input(2,1,&[(&[1],60),(&[2],40)]),&mut oracle).unwrap();
        engine.step().unwrap();
        assert_eq!(CandidateStatus::Elected{ order: 1, round: RoundNumber(1) },engine.status(CandidateIndex(0)));
        assert_eq!(CandidateStatus::Hopeful,engine.status(CandidateIndex(1)));
    }
}
