// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! The persisted history of the count: one append-only record per round,
//! plus the headline summary. All rationals serialise as "p/q" strings;
//! maps are ordered by candidate id so two identical counts produce
//! byte-identical transcripts.

use std::collections::BTreeMap;
use serde::{Serialize,Deserialize};
use crate::ballot_index::BallotPaperCount;
use crate::metadata::{CandidateId, NumberOfCandidates, RoundNumber};
use crate::tie_resolution::TieContext;
use crate::transfer_value::{RationalString, TransferValue};

/// Why a candidate was elected.
#[derive(Copy, Clone,Serialize,Deserialize,Eq, PartialEq,Debug)]
pub enum ElectionReason {
    ReachedQuota,
    /// s273(17): the higher of the final two continuing candidates takes the last vacancy
    HighestOfLastTwo,
    /// s273(18): as many continuing candidates as unfilled vacancies
    AllRemainingMustBeElected,
}

#[derive(Copy, Clone,Serialize,Deserialize,Eq, PartialEq,Debug)]
pub struct CandidateElected {
    pub candidate : CandidateId,
    /// order of election over the whole count, starting at 1
    pub order : usize,
    pub reason : ElectionReason,
}

#[derive(Copy, Clone,Serialize,Deserialize,Eq, PartialEq,Debug)]
pub struct CandidateExcluded {
    pub candidate : CandidateId,
    /// order of exclusion over the whole count, starting at 1
    pub order : usize,
}

/// Papers moved to one recipient in a transfer.
#[derive(Clone,Serialize,Deserialize,Debug,PartialEq)]
pub struct ParcelMoved {
    pub to : CandidateId,
    pub ballots : BallotPaperCount,
    /// the exact vote value those papers carried
    pub weighted : RationalString,
}

/// The part of a transfer that reached no continuing candidate.
#[derive(Clone,Serialize,Deserialize,Debug,PartialEq)]
pub struct ExhaustedInTransfer {
    pub ballots : BallotPaperCount,
    pub weighted : RationalString,
}

/// One transfer of papers out of a candidate, at a single transfer value.
/// An exclusion produces one of these per parcel.
#[derive(Clone,Serialize,Deserialize,Debug)]
pub struct TransferRecord {
    pub from : CandidateId,
    pub transfer_value : TransferValue,
    pub parcels_moved : Vec<ParcelMoved>,
    pub exhausted : ExhaustedInTransfer,
}

/// How a surplus transfer value was computed, shown as exact fractions.
#[derive(Clone,Serialize,Deserialize,Debug)]
pub struct TransferValueCreation {
    pub surplus : RationalString,
    /// papers taken up for distribution: the whole first-preference pile, or the last parcel
    pub ballots_considered : BallotPaperCount,
    /// of those, the papers with a continuing next preference
    pub transferable_ballots : BallotPaperCount,
    /// the value the distributed parcel arrived at, where the cap applies
    #[serde(skip_serializing_if = "Option::is_none",default)]
    pub original_transfer_value : Option<TransferValue>,
    /// true if surplus/ballots exceeded the incoming value and was capped to it
    pub capped : bool,
    pub transfer_value : TransferValue,
}

/// A tie put to the oracle, and its answer.
#[derive(Clone,Serialize,Deserialize,Debug,PartialEq)]
pub struct TieBreakRecord {
    pub context : TieContext,
    pub candidates : Vec<CandidateId>,
    pub chose : CandidateId,
}

/// The running exhausted pile at the end of a round.
#[derive(Clone,Serialize,Deserialize,Debug,PartialEq)]
pub struct ExhaustedPile {
    pub ballots : BallotPaperCount,
    pub weight : RationalString,
}

/// The append-only log entry for one count round.
#[derive(Clone,Serialize,Deserialize,Debug)]
pub struct RoundRecord {
    /// 1-based round index
    pub number : RoundNumber,
    /// human-readable statutory notes
    #[serde(skip_serializing_if = "Vec::is_empty",default)]
    pub note : Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty",default)]
    pub elected : Vec<CandidateElected>,
    /// more than one entry only for a bulk exclusion
    #[serde(skip_serializing_if = "Vec::is_empty",default)]
    pub excluded : Vec<CandidateExcluded>,
    #[serde(skip_serializing_if = "Vec::is_empty",default)]
    pub transfers : Vec<TransferRecord>,
    #[serde(skip_serializing_if = "Option::is_none",default)]
    pub transfer_value_creation : Option<TransferValueCreation>,
    #[serde(skip_serializing_if = "Vec::is_empty",default)]
    pub tie_breaks : Vec<TieBreakRecord>,
    /// exact tally of every candidate at the end of the round
    pub tallies_after : BTreeMap<CandidateId,RationalString>,
    /// physical papers held by every candidate at the end of the round
    pub papers_after : BTreeMap<CandidateId,BallotPaperCount>,
    pub exhausted_after : ExhaustedPile,
}

/// The headline result of the count.
#[derive(Clone,Serialize,Deserialize,Debug)]
pub struct CountSummary {
    pub total_formal : BallotPaperCount,
    pub quota : usize,
    pub vacancies : NumberOfCandidates,
    /// elected candidates in order of election
    pub elected : Vec<CandidateId>,
}

/// Everything the count produces: the summary plus the full round-by-round
/// transcript. This is the only persisted artefact.
#[derive(Clone,Serialize,Deserialize,Debug)]
pub struct CountResult {
    pub summary : CountSummary,
    pub rounds : Vec<RoundRecord>,
}
