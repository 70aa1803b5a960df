// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! Identity of the contest: candidates and the small counting newtypes.

use serde::{Serialize,Deserialize};
use std::fmt;
use std::ops::Sub;

/// The stable external identifier of a candidate, as used in election
/// specification files, ballots, automation tables and persisted transcripts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CandidateId(pub u32);
// type alias really, don't want long display
impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}
// type alias really, don't want long display
impl fmt::Debug for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}

/// a candidate, referred to by position in the candidate list, 0 being first
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateIndex(pub usize);
// type alias really, don't want long display
impl fmt::Display for CandidateIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}
// type alias really, don't want long display
impl fmt::Debug for CandidateIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// Represent a number of candidates. E.g. number of vacancies, number of remaining vacancies.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct NumberOfCandidates(pub usize);

// type alias really, don't want long display
impl fmt::Display for NumberOfCandidates {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}
// type alias really, don't want long display
impl fmt::Debug for NumberOfCandidates {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "#{}", self.0) }
}

impl Sub for NumberOfCandidates {
    type Output = NumberOfCandidates;
    fn sub(self, rhs: Self) -> Self::Output { NumberOfCandidates(self.0-rhs.0) }
}

/// The number of a count round, 1 based as in the published transcripts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct RoundNumber(pub usize);

// type alias really, don't want long display
impl fmt::Display for RoundNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}
// type alias really, don't want long display
impl fmt::Debug for RoundNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}

/// A candidate in the contest. Immutable for the duration of a count.
#[derive(Debug,Serialize,Deserialize,Clone)]
pub struct Candidate {
    pub id : CandidateId,
    pub name : String,
    #[serde(skip_serializing_if = "Option::is_none",default)]
    pub party : Option<String>,
}
