// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! The Senate counting engine: the distribution of preferences of
//! Section 273 of the Commonwealth Electoral Act 1918 as a deterministic,
//! exact-arithmetic state machine.

pub mod metadata;
pub mod transfer_value;
pub mod ballot_index;
pub mod parcel;
pub mod transcript;
pub mod tie_resolution;
pub mod errors;
pub mod engine;
