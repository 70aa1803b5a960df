// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! What can go wrong in a count. Nothing is retried: any of these abandons
//! the whole count, and whatever transcript had accumulated is handed back
//! for post-mortem inspection.

use crate::metadata::CandidateId;
use crate::tie_resolution::TieContext;
use crate::transcript::RoundRecord;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CountError {
    /// The arithmetic of the count broke one of its own guarantees.
    #[error("invariant {invariant} violated: {detail}")]
    InvariantViolation {
        invariant : &'static str,
        detail : String,
    },
    /// The input failed validation before round 1.
    #[error("input rejected: {reason}")]
    InputRejected {
        reason : String,
    },
    /// The statutory tie-break failed and the oracle declined to answer.
    #[error("unresolved {context:?} between candidates {candidates:?}")]
    TieUnresolved {
        context : TieContext,
        candidates : Vec<CandidateId>,
    },
}

impl CountError {
    pub(crate) fn rejected(reason:impl Into<String>) -> Self {
        CountError::InputRejected{ reason: reason.into() }
    }
    pub(crate) fn invariant(invariant:&'static str,detail:impl Into<String>) -> Self {
        CountError::InvariantViolation{ invariant, detail: detail.into() }
    }
}

/// A count that failed part way through: the error, plus every round record
/// completed before it.
#[derive(thiserror::Error, Debug)]
#[error("count abandoned after {} completed rounds", rounds.len())]
pub struct AbandonedCount {
    #[source]
    pub error : CountError,
    pub rounds : Vec<RoundRecord>,
}
