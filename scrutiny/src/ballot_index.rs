// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! The immutable ballot store. Every formal ballot is a preference vector
//! with a multiplicity; identical vectors are merged into one group, which
//! is what makes ticket votes (hundreds of thousands of identical papers)
//! cheap to move around. Parcels refer to groups by index and never copy
//! preference lists.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use serde::{Serialize,Deserialize};
use crate::errors::CountError;
use crate::metadata::{Candidate, CandidateId, CandidateIndex};

/// A number representing a count of pieces of paper.
/// This is distinct from votes, which are fractional in the presence of transfer values.
#[derive(Copy,Clone,Eq, PartialEq,Serialize,Deserialize,Ord, PartialOrd,Hash,Default)]
pub struct BallotPaperCount(pub usize);

impl AddAssign for BallotPaperCount {
    fn add_assign(&mut self, rhs: Self) { self.0+=rhs.0; }
}
impl SubAssign for BallotPaperCount {
    fn sub_assign(&mut self, rhs: Self) { self.0-=rhs.0; }
}
impl Add for BallotPaperCount {
    type Output = BallotPaperCount;
    fn add(self, rhs: Self) -> Self::Output { BallotPaperCount(self.0+rhs.0) }
}
impl Sub for BallotPaperCount {
    type Output = BallotPaperCount;
    fn sub(self, rhs: Self) -> Self::Output { BallotPaperCount(self.0-rhs.0) }
}
impl Sum for BallotPaperCount {
    fn sum<I: Iterator<Item=Self>>(iter: I) -> Self {
        BallotPaperCount(usize::sum(iter.map(|b|b.0)))
    }
}
// type alias really, don't want long display
impl fmt::Display for BallotPaperCount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}
// type alias really, don't want long display
impl fmt::Debug for BallotPaperCount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}

/// a ballot group, referred to by position in the index
#[derive(Clone, Copy, PartialEq, Eq, Hash,Serialize,Deserialize)]
pub struct GroupIndex(pub usize);
// type alias really, don't want long display
impl fmt::Display for GroupIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}
// type alias really, don't want long display
impl fmt::Debug for GroupIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// Identical preference sequences merged together. A group voting ticket is
/// simply a group with a large multiplicity.
#[derive(Clone,Debug,Serialize,Deserialize)]
pub struct BallotGroup {
    /// Preferred candidates, with index 0 being the most favoured candidate.
    pub prefs : Vec<CandidateIndex>,
    /// The number of identical ballot papers in this group.
    pub n : BallotPaperCount,
}

/// A ballot group somewhere through being distributed. The preference at
/// `upto` is the candidate currently holding the papers.
#[derive(Copy, Clone,Debug)]
pub struct BallotPosition {
    pub group : GroupIndex,
    pub upto : usize,
}

/// A slab of ballot positions headed for one destination, with their paper count.
#[derive(Clone,Debug,Default)]
pub struct BallotBucket {
    pub ballots : Vec<BallotPosition>,
    pub papers : BallotPaperCount,
}

impl BallotBucket {
    fn add(&mut self,position:BallotPosition,n:BallotPaperCount) {
        self.ballots.push(position);
        self.papers+=n;
    }
}

/// Ballots distributed amongst continuing candidates, with the exhausted residue.
pub struct DistributedBallots {
    pub by_candidate : Vec<BallotBucket>,
    pub exhausted : BallotBucket,
}

/// Every formal ballot of the election, immutable once built.
pub struct BallotIndex {
    groups : Vec<BallotGroup>,
    num_candidates : usize,
    total : BallotPaperCount,
}

impl BallotIndex {
    /// Build the index, validating each ballot and merging identical
    /// preference sequences. Preferences arrive as external candidate ids;
    /// the index stores dense candidate positions.
    pub fn build(ballots:impl IntoIterator<Item=(Vec<CandidateId>,usize)>,candidates:&[Candidate]) -> Result<Self,CountError> {
        let index_of : HashMap<CandidateId,CandidateIndex> = candidates.iter().enumerate().map(|(i,c)|(c.id,CandidateIndex(i))).collect();
        let mut groups : Vec<BallotGroup> = vec![];
        let mut group_of : HashMap<Vec<CandidateIndex>,usize> = HashMap::new();
        for (prefs,n) in ballots {
            if n==0 { continue; }
            if prefs.is_empty() { return Err(CountError::rejected("ballot with no preferences")); }
            let mut seen : HashSet<CandidateIndex> = HashSet::new();
            let mut resolved : Vec<CandidateIndex> = Vec::with_capacity(prefs.len());
            for id in prefs {
                let index = *index_of.get(&id).ok_or_else(||CountError::rejected(format!("ballot preference for unknown candidate id {}",id)))?;
                if !seen.insert(index) { return Err(CountError::rejected(format!("ballot lists candidate id {} more than once",id))); }
                resolved.push(index);
            }
            match group_of.get(&resolved) {
                Some(&g) => { groups[g].n+=BallotPaperCount(n); }
                None => {
                    group_of.insert(resolved.clone(),groups.len());
                    groups.push(BallotGroup{ prefs: resolved, n: BallotPaperCount(n) });
                }
            }
        }
        let total : BallotPaperCount = groups.iter().map(|g|g.n).sum();
        Ok(BallotIndex{ groups, num_candidates: candidates.len(), total })
    }

    pub fn group(&self,group:GroupIndex) -> &BallotGroup { &self.groups[group.0] }
    pub fn num_groups(&self) -> usize { self.groups.len() }
    pub fn total_papers(&self) -> BallotPaperCount { self.total }

    /// Place every ballot on its first preference. Round 1 only.
    pub fn initial_distribution(&self) -> DistributedBallots {
        let all : HashSet<CandidateIndex> = (0..self.num_candidates).map(CandidateIndex).collect();
        let positions : Vec<BallotPosition> = (0..self.groups.len()).map(|g|BallotPosition{ group: GroupIndex(g), upto: 0 }).collect();
        self.advance(&positions,&all)
    }

    /// Move each ballot to its next continuing preference, or to the
    /// exhausted pile if none remains. The candidate currently holding the
    /// papers must already be out of the continuing set.
    pub fn advance(&self,ballots:&[BallotPosition],continuing:&HashSet<CandidateIndex>) -> DistributedBallots {
        let mut by_candidate = vec![BallotBucket::default();self.num_candidates];
        let mut exhausted = BallotBucket::default();
        for &b in ballots {
            let group = &self.groups[b.group.0];
            match (b.upto..group.prefs.len()).find(|&i|continuing.contains(&group.prefs[i])) {
                Some(i) => by_candidate[group.prefs[i].0].add(BallotPosition{ group: b.group, upto: i },group.n),
                None => exhausted.add(b,group.n),
            }
        }
        DistributedBallots{ by_candidate, exhausted }
    }
}
