// Copyright 2025 Andrew Conway.
// This file is part of Scrutineer.
// Scrutineer is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// Scrutineer is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License along with Scrutineer.  If not, see <https://www.gnu.org/licenses/>.


//! Exact transfer values, and the "p/q" serialisation used for every
//! rational that leaves the engine. The count itself never sees a floating
//! point number.

use num::{BigInt, BigRational, One};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use crate::ballot_index::BallotPaperCount;

/// The fraction of a vote that a ballot paper carries after a transfer.
/// Always in [0,1]. `BigRational` keeps it exact and canonically reduced.
#[derive(Clone,Debug,Ord, PartialOrd, Eq, PartialEq,Hash)]
pub struct TransferValue(pub BigRational);

impl TransferValue {
    pub fn one() -> Self { TransferValue(BigRational::one()) }

    pub fn new(numerator:BigInt,denominator:BigInt) -> Self {
        TransferValue(BigRational::new(numerator,denominator))
    }

    /// s273 transfer value: a surplus divided by a number of ballot papers.
    pub fn from_surplus(surplus:&BigRational,ballots:BallotPaperCount) -> Self {
        TransferValue(surplus/BigRational::from_integer(BigInt::from(ballots.0)))
    }

    /// The exact number of votes a pile of papers carries at this value.
    pub fn weight(&self,ballots:BallotPaperCount) -> BigRational {
        &self.0*BigRational::from_integer(BigInt::from(ballots.0))
    }

    /// Decimal rendering truncated (never rounded) to the given number of
    /// digits. For display only; the count must never depend on this.
    pub fn decimal(&self,digits:usize) -> String {
        decimal_truncated(&self.0,digits)
    }
}

impl fmt::Display for TransferValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}

impl Serialize for TransferValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl <'de> Deserialize<'de> for TransferValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
        let buf = String::deserialize(deserializer)?;
        Ok(TransferValue(BigRational::from_str(&buf).map_err(serde::de::Error::custom)?))
    }
}

/// A rational serialised as its canonical "p/q" string (just "p" when the
/// denominator is one). Persisted transcripts use this for every tally and
/// weight so that nothing is lost to a binary representation.
#[derive(Clone,Debug,Eq, PartialEq)]
pub struct RationalString(pub BigRational);

impl fmt::Display for RationalString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.0) }
}

impl Serialize for RationalString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl <'de> Deserialize<'de> for RationalString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
        let buf = String::deserialize(deserializer)?;
        Ok(RationalString(BigRational::from_str(&buf).map_err(serde::de::Error::custom)?))
    }
}

/// Truncate a non-negative rational to a fixed number of decimal digits.
pub fn decimal_truncated(value:&BigRational,digits:usize) -> String {
    let scale : BigInt = num::pow(BigInt::from(10u8),digits);
    let scaled = (value*BigRational::from_integer(scale.clone())).floor().to_integer();
    let int_part = &scaled/&scale;
    let frac_part = &scaled%&scale;
    if digits==0 { format!("{}",int_part) }
    else { format!("{}.{:0>width$}",int_part,frac_part.to_string(),width=digits) }
}
