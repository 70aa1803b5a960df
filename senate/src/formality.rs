// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! Interpreting what a voter wrote on a paper: formality and the savings
//! provisions. Only formal votes ever reach the counting engine; the engine
//! itself knows nothing of any of this.

use scrutiny::metadata::CandidateIndex;
use crate::CountingEra;
use crate::election::PartyIndex;

/// A marking on a particular square of the ballot. This may or may not be a number.
#[derive(Copy,Clone,Debug,Eq, PartialEq)]
pub enum RawMarking {
    Number(u16),
    /// a marking legislatively treated the same as a 1, such as a tick or cross
    OneEquivalent,
    Blank,
    Other,
}

pub fn parse_marking(marking:&str) -> RawMarking {
    if marking.is_empty() { RawMarking::Blank }
    else if marking=="X" || marking=="*" || marking=="/" { RawMarking::OneEquivalent }
    else if let Ok(num) = marking.parse::<u16>() { RawMarking::Number(num) }
    else { RawMarking::Other }
}

/// The markings written on one paper: party squares above the line,
/// candidate squares below, both in ballot paper order.
pub struct RawBallot<'a> {
    pub atl : &'a [RawMarking],
    pub btl : &'a [RawMarking],
}

/// A formal vote as interpreted from the markings, in ballot paper positions.
#[derive(Clone,Debug,Eq, PartialEq)]
pub enum FormalVote {
    Atl(Vec<PartyIndex>),
    Btl(Vec<CandidateIndex>),
}

/// The longest unambiguous run of preferences starting at 1.
/// * Ignore all repeated numbers. E.g. 1 2 2 ignores the 2s.
/// * Ignore all numbers after a gap. E.g. 1 3 4 ignores the 3 and 4.
/// * Treat a tick or cross as a 1 iff cross_counts_as_one.
fn continuous_prefs(markings:&[RawMarking],cross_counts_as_one:bool) -> Vec<usize> {
    let mut times_seen = vec![0usize;markings.len()];
    let mut prefs = vec![0usize;markings.len()];
    for (square,marking) in markings.iter().enumerate() {
        match *marking {
            RawMarking::Number(n) if n>0 && (n as usize)<=markings.len() => {
                prefs[n as usize-1]=square;
                times_seen[n as usize-1]+=1;
            }
            RawMarking::OneEquivalent if cross_counts_as_one => {
                prefs[0]=square;
                times_seen[0]+=1;
            }
            _ => {}
        }
    }
    let mut num_good = 0;
    while num_good<times_seen.len() && times_seen[num_good]==1 { num_good+=1; }
    prefs.truncate(num_good);
    prefs
}

impl <'a> RawBallot<'a> {
    /// Interpret the markings under the given era's formality rules. A
    /// formal below the line vote always takes precedence over the above
    /// the line squares.
    ///
    /// 2016+ savings provisions: a below the line vote is formal with at
    /// least 6 preferences, an above the line vote with at least 1. Under
    /// the ticket era a below the line vote had to number every square, and
    /// an above the line vote follows the first-preferenced party only.
    pub fn interpret(&self,era:CountingEra) -> Option<FormalVote> {
        let min_btl = match era {
            CountingEra::GroupVotingTickets => self.btl.len(),
            CountingEra::OptionalPreferential => 6.min(self.btl.len()),
        };
        let btl = continuous_prefs(self.btl,true);
        if !btl.is_empty() && btl.len()>=min_btl {
            return Some(FormalVote::Btl(btl.into_iter().map(CandidateIndex).collect()));
        }
        let atl = continuous_prefs(self.atl,true);
        if atl.is_empty() { return None; }
        match era {
            CountingEra::GroupVotingTickets => Some(FormalVote::Atl(vec![PartyIndex(atl[0])])),
            CountingEra::OptionalPreferential => Some(FormalVote::Atl(atl.into_iter().map(PartyIndex).collect())),
        }
    }
}
