// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! The Senate-specific side of the count: election specification files, the
//! two forms the ballot paper has taken, and formality adjudication. The
//! scrutiny engine itself is era-agnostic; what differs is how above the
//! line votes resolve to candidate preferences and which counting policies
//! the AEC applied.

pub mod election;
pub mod formality;
pub mod ticket;

use serde::{Serialize,Deserialize};
use scrutiny::engine::CountPolicy;

/// Which form of the Senate ballot paper the election used.
#[derive(Copy, Clone,Debug,Eq, PartialEq,Serialize,Deserialize)]
pub enum CountingEra {
    /// pre-2016: a single square above the line, following the party's
    /// registered group voting ticket(s)
    GroupVotingTickets,
    /// 2016 onwards: voters number party squares above the line or
    /// candidate squares below it
    OptionalPreferential,
}

impl CountingEra {
    /// The counting behaviour the AEC applied in each era: bulk exclusions
    /// were used under the ticket-era counts but not by the 2016+ software.
    pub fn default_policy(self) -> CountPolicy {
        match self {
            CountingEra::GroupVotingTickets => CountPolicy{ bulk_exclusion: true, surpluses_before_terminal_rules: true },
            CountingEra::OptionalPreferential => CountPolicy{ bulk_exclusion: false, surpluses_before_terminal_rules: true },
        }
    }
}
