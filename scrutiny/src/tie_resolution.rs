// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! Tie resolution. The statute settles most ties from earlier rounds:
//! ```text
//! Commonwealth Electoral Act 1918, Section 273, 31(b) extract:
//! if 2 or more continuing candidates have the same number of
//! votes, those candidates shall stand in the poll in the order of
//! the relative number of votes of each of those candidates at the
//! last count at which each of them had a different number of
//! votes ... but if there has been no such count the Australian Electoral
//! Officer for the State shall determine the order of standing of
//! those candidates in the poll.
//! ```
//! The Electoral Officer's determination is the injected [TieBreakOracle];
//! an automation table reproduces a known count, and an interactive
//! implementation can live in the application layer.

use serde::{Serialize,Deserialize};
use crate::metadata::{CandidateId, CandidateIndex, RoundNumber};
use crate::transcript::RoundRecord;

/// The question a tie-break answers.
#[derive(Copy, Clone,Serialize,Deserialize,Eq, PartialEq,Debug,Hash)]
pub enum TieContext {
    /// which of the lowest-tallied candidates is excluded
    ExclusionTie,
    /// relative order of election of candidates reaching quota together
    ElectionOrderTie,
    /// which of the final two takes the last vacancy (the s273(17) casting vote)
    LastVacancyTie,
    /// which of several equal surpluses is distributed first
    SurplusOrderTie,
    /// relative order of exclusion within a bulk exclusion
    BulkExclusionOrderTie,
}

/// A tie the statute could not resolve, put to the oracle.
#[derive(Debug)]
pub struct TieQuestion<'a> {
    pub round : RoundNumber,
    pub context : TieContext,
    /// the tied candidates, by external id
    pub candidates : &'a [CandidateId],
}

/// An injected decision maker, consulted only after the statutory rule
/// fails. `resolve` must name one of the tied candidates: the one the
/// context asks for (the candidate excluded, elected, or dealt with first).
/// Returning `None`, or a candidate not in the tie, aborts the count.
pub trait TieBreakOracle {
    fn resolve(&mut self,question:&TieQuestion) -> Option<CandidateId>;
}

/// Answers every question with the lowest candidate id. Deterministic;
/// useful where no official decision is being reproduced.
pub struct LowestCandidateId;

impl TieBreakOracle for LowestCandidateId {
    fn resolve(&mut self,question:&TieQuestion) -> Option<CandidateId> {
        question.candidates.iter().min().copied()
    }
}

/// One pre-made decision for reproducing a known count.
#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct TieBreakEntry {
    /// restrict this entry to a specific round
    #[serde(skip_serializing_if = "Option::is_none",default)]
    pub round : Option<RoundNumber>,
    /// restrict this entry to one kind of tie
    #[serde(skip_serializing_if = "Option::is_none",default)]
    pub context : Option<TieContext>,
    /// the tied candidates this entry answers for, in any order
    pub candidates : Vec<CandidateId>,
    pub choose : CandidateId,
}

impl TieBreakEntry {
    fn matches(&self,question:&TieQuestion) -> bool {
        if let Some(round) = self.round { if round!=question.round { return false; } }
        if let Some(context) = self.context { if context!=question.context { return false; } }
        if self.candidates.len()!=question.candidates.len() { return false; }
        let mut mine = self.candidates.clone();
        let mut theirs = question.candidates.to_vec();
        mine.sort();
        theirs.sort();
        mine==theirs && self.candidates.contains(&self.choose)
    }
}

/// A lookup table of pre-made decisions keyed by round, context and the
/// tied candidate set. The first matching entry answers.
#[derive(Clone,Debug,Default,Serialize,Deserialize)]
pub struct TieBreakTable {
    #[serde(skip_serializing_if = "Vec::is_empty",default)]
    pub entries : Vec<TieBreakEntry>,
}

impl TieBreakOracle for TieBreakTable {
    fn resolve(&mut self,question:&TieQuestion) -> Option<CandidateId> {
        self.entries.iter().find(|e|e.matches(question)).map(|e|e.choose)
    }
}

/// The s273(31)(b) rule: sort `tied` ascending by their tallies at the most
/// recent prior round at which they all had mutually different tallies.
/// Returns the round that settled it, or `None` if no such round exists.
pub fn statutory_order(tied:&mut [CandidateIndex],rounds:&[RoundRecord],id_of:&[CandidateId]) -> Option<RoundNumber> {
    for record in rounds.iter().rev() {
        let mut all_different = true;
        'outer: for i in 0..tied.len() {
            for j in i+1..tied.len() {
                let a = &record.tallies_after[&id_of[tied[i].0]];
                let b = &record.tallies_after[&id_of[tied[j].0]];
                if a==b { all_different=false; break 'outer; }
            }
        }
        if all_different {
            tied.sort_by(|a,b|record.tallies_after[&id_of[a.0]].0.cmp(&record.tallies_after[&id_of[b.0]].0));
            return Some(record.number);
        }
    }
    None
}
