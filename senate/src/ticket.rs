// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! Group voting tickets: how ticket-era above the line votes become
//! candidate preference sequences.

use scrutiny::metadata::CandidateId;

/// s272(2): where a party has registered more than one ticket, its above
/// the line votes are divided equally between the tickets. When the
/// division is inexact, the earlier lodged tickets each take one of the
/// leftover votes.
pub fn expand(tickets:&[Vec<CandidateId>],votes:usize) -> Vec<(Vec<CandidateId>,usize)> {
    if tickets.is_empty() || votes==0 { return vec![]; }
    let each = votes/tickets.len();
    let leftover = votes%tickets.len();
    tickets.iter().enumerate().filter_map(|(i,ticket)|{
        let n = each + if i<leftover {1} else {0};
        if n>0 { Some((ticket.clone(),n)) } else { None }
    }).collect()
}
