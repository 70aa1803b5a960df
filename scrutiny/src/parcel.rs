// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! Parcels of ballot papers and the per-candidate ledger of them. The order
//! of receipt is first-class: surplus distributions take the most recent
//! parcel, and exclusions hand parcels back in ascending transfer value with
//! ties broken by receipt order.

use num::BigRational;
use crate::ballot_index::{BallotPaperCount, BallotPosition};
use crate::metadata::RoundNumber;
use crate::transfer_value::TransferValue;

/// A bundle of ballot papers received by a candidate in one transfer, all at
/// one transfer value.
#[derive(Clone,Debug)]
pub struct Parcel {
    pub ballots : Vec<BallotPosition>,
    pub papers : BallotPaperCount,
    pub transfer_value : TransferValue,
    /// the round in which the candidate received this parcel
    pub received : RoundNumber,
}

impl Parcel {
    /// The exact vote value this parcel carries.
    pub fn weight(&self) -> BigRational { self.transfer_value.weight(self.papers) }
}

/// The parcels currently credited to one candidate, in order of receipt.
#[derive(Default)]
pub struct ParcelLedger {
    parcels : Vec<Parcel>,
}

impl ParcelLedger {
    pub fn append(&mut self,parcel:Parcel) {
        if parcel.papers.0>0 { self.parcels.push(parcel); }
    }

    pub fn is_empty(&self) -> bool { self.parcels.is_empty() }

    pub fn papers(&self) -> BallotPaperCount { self.parcels.iter().map(|p|p.papers).sum() }

    /// The most recently received parcel, for a surplus distribution under
    /// the last-parcel rule of s273(14).
    pub fn drain_last(&mut self) -> Option<Parcel> { self.parcels.pop() }

    /// Every parcel, in ascending transfer value; ties keep the order of
    /// receipt. Empties the ledger.
    pub fn drain_all(&mut self) -> Vec<Parcel> {
        let mut parcels = std::mem::take(&mut self.parcels);
        // stable sort, so equal transfer values stay in receipt order
        parcels.sort_by(|a,b|a.transfer_value.cmp(&b.transfer_value));
        parcels
    }

    pub fn clear(&mut self) { self.parcels.clear(); }
}
