// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! Election specification files: everything needed to start a count, as one
//! JSON document. Formal votes arrive grouped (above the line by party,
//! below the line by candidate); this module resolves them into the
//! candidate preference sequences the engine counts.

use std::fmt;
use std::fs::File;
use std::path::Path;
use serde::{Serialize,Deserialize};
use scrutiny::engine::{CountInput, CountPolicy};
use scrutiny::metadata::{Candidate, CandidateId, NumberOfCandidates};
use scrutiny::tie_resolution::TieBreakTable;
use crate::CountingEra;
use crate::ticket;

/// a party, referred to by position in the specification's party list, 0 being first
#[derive(Clone, Copy, PartialEq, Eq, Hash,Serialize,Deserialize)]
pub struct PartyIndex(pub usize);
// type alias really, don't want long display
impl fmt::Display for PartyIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}
// type alias really, don't want long display
impl fmt::Debug for PartyIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// A party (or pseudo-party such as "ungrouped") on the ballot paper.
#[derive(Debug,Serialize,Deserialize,Clone)]
pub struct PartySpecification {
    /// the column on the ballot paper, typically a letter
    pub column : String,
    pub name : String,
    /// the party's candidates, in printed order
    pub candidates : Vec<CandidateId>,
    /// registered group voting tickets; ticket era only
    #[serde(skip_serializing_if = "Vec::is_empty",default)]
    pub tickets : Vec<Vec<CandidateId>>,
}

/// Identical above the line votes: party preferences in order, with the
/// number of people who voted that way.
#[derive(Debug,Serialize,Deserialize,Clone)]
pub struct AtlVotes {
    pub parties : Vec<PartyIndex>,
    pub n : usize,
}

/// Identical below the line votes: candidate preferences in order, with the
/// number of people who voted that way.
#[derive(Debug,Serialize,Deserialize,Clone)]
pub struct BtlVotes {
    pub candidates : Vec<CandidateId>,
    pub n : usize,
}

#[derive(thiserror::Error, Debug)]
pub enum SpecificationError {
    #[error("could not read specification: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse specification: {0}")]
    Json(#[from] serde_json::Error),
    #[error("above the line vote lists no parties")]
    EmptyAtl,
    #[error("above the line vote references party {0} which does not exist")]
    UnknownParty(PartyIndex),
    #[error("party {0} has no registered group voting ticket")]
    MissingTicket(String),
}

/// One election, ready to count.
#[derive(Debug,Serialize,Deserialize,Clone)]
pub struct ElectionSpecification {
    /// e.g. "2013 Senate election for Tas"
    pub name : String,
    pub era : CountingEra,
    pub vacancies : NumberOfCandidates,
    pub candidates : Vec<Candidate>,
    #[serde(skip_serializing_if = "Vec::is_empty",default)]
    pub parties : Vec<PartySpecification>,
    #[serde(skip_serializing_if = "Vec::is_empty",default)]
    pub atl : Vec<AtlVotes>,
    #[serde(skip_serializing_if = "Vec::is_empty",default)]
    pub btl : Vec<BtlVotes>,
    /// pre-made tie-break decisions, for reproducing a known count
    #[serde(default)]
    pub automation : TieBreakTable,
    /// overrides of the era's default counting policy
    #[serde(skip_serializing_if = "Option::is_none",default)]
    pub policy : Option<CountPolicy>,
}

impl ElectionSpecification {
    pub fn load(path:&Path) -> Result<Self,SpecificationError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn policy(&self) -> CountPolicy {
        self.policy.unwrap_or_else(||self.era.default_policy())
    }

    fn party(&self,index:PartyIndex) -> Result<&PartySpecification,SpecificationError> {
        self.parties.get(index.0).ok_or(SpecificationError::UnknownParty(index))
    }

    /// Resolve every vote to a candidate preference sequence. Under the
    /// ticket era an above the line vote follows the first-preferenced
    /// party's ticket(s); under optional preferential voting it runs down
    /// the preferenced parties' candidates in party order.
    pub fn ballots(&self) -> Result<Vec<(Vec<CandidateId>,usize)>,SpecificationError> {
        let mut ballots : Vec<(Vec<CandidateId>,usize)> = vec![];
        for vote in &self.atl {
            match self.era {
                CountingEra::GroupVotingTickets => {
                    let first = *vote.parties.first().ok_or(SpecificationError::EmptyAtl)?;
                    let party = self.party(first)?;
                    if party.tickets.is_empty() { return Err(SpecificationError::MissingTicket(party.name.clone())); }
                    ballots.extend(ticket::expand(&party.tickets,vote.n));
                }
                CountingEra::OptionalPreferential => {
                    if vote.parties.is_empty() { return Err(SpecificationError::EmptyAtl); }
                    let mut prefs : Vec<CandidateId> = vec![];
                    for &party in &vote.parties {
                        prefs.extend(self.party(party)?.candidates.iter().cloned());
                    }
                    ballots.push((prefs,vote.n));
                }
            }
        }
        for vote in &self.btl {
            ballots.push((vote.candidates.clone(),vote.n));
        }
        Ok(ballots)
    }

    /// The engine input for this specification.
    pub fn count_input(&self) -> Result<CountInput,SpecificationError> {
        Ok(CountInput{
            candidates: self.candidates.clone(),
            vacancies: self.vacancies,
            ballots: self.ballots()?,
            policy: self.policy(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(era:CountingEra) -> ElectionSpecification {
        ElectionSpecification{
            name: "test election".to_string(),
            era,
            vacancies: NumberOfCandidates(1),
            candidates: (0..4).map(|i|Candidate{ id: CandidateId(i+1), name: format!("Candidate {}",i+1), party: None }).collect(),
            parties: vec![
                PartySpecification{ column: "A".to_string(), name: "Alpha".to_string(), candidates: vec![CandidateId(1),CandidateId(2)], tickets: vec![vec![CandidateId(1),CandidateId(2),CandidateId(3)]] },
                PartySpecification{ column: "B".to_string(), name: "Beta".to_string(), candidates: vec![CandidateId(3),CandidateId(4)], tickets: vec![] },
            ],
            atl: vec![AtlVotes{ parties: vec![PartyIndex(0),PartyIndex(1)], n: 5 }],
            btl: vec![BtlVotes{ candidates: vec![CandidateId(4),CandidateId(1)], n: 2 }],
            automation: TieBreakTable::default(),
            policy: None,
        }
    }

    #[test]
    fn optional_preferential_atl_runs_down_the_party_columns() {
        let ballots = spec(CountingEra::OptionalPreferential).ballots().unwrap();
        assert_eq!(2,ballots.len());
        assert_eq!((vec![CandidateId(1),CandidateId(2),CandidateId(3),CandidateId(4)],5),ballots[0]);
        assert_eq!((vec![CandidateId(4),CandidateId(1)],2),ballots[1]);
    }

    #[test]
    fn ticket_era_atl_follows_the_first_party_ticket() {
        let ballots = spec(CountingEra::GroupVotingTickets).ballots().unwrap();
        assert_eq!((vec![CandidateId(1),CandidateId(2),CandidateId(3)],5),ballots[0]);
    }

    #[test]
    fn ticket_era_requires_a_ticket() {
        let mut spec = spec(CountingEra::GroupVotingTickets);
        spec.atl[0].parties = vec![PartyIndex(1)];
        assert!(matches!(spec.ballots(),Err(SpecificationError::MissingTicket(_))));
    }

    #[test]
    fn era_policy_defaults_can_be_overridden() {
        let mut ticket_era = spec(CountingEra::GroupVotingTickets);
        assert!(ticket_era.policy().bulk_exclusion);
        ticket_era.policy = Some(CountPolicy{ bulk_exclusion: false, surpluses_before_terminal_rules: true });
        assert!(!ticket_era.policy().bulk_exclusion);
        assert!(!spec(CountingEra::OptionalPreferential).policy().bulk_exclusion);
    }
}
