// Copyright (c) 2024 SIGMA ENGINE

use crate::ModelsError;
use nom::error::{context, ContextError, ParseError};
use nom::sequence::tuple;
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use sigma_serialization::{
    Deserializer, SerializeError, Serializer, U32VarIntDeserializer, U32VarIntSerializer,
};
use sigma_time::{SigmaTime, SigmaTimeDeserializer, SigmaTimeSerializer};
use std::fmt;
use std::ops::Bound::Included;
use std::str::FromStr;

const HARDFORK_MASK: u32 = 0xFFFF_0000;

/// Protocol version `major.hardfork.release`, packed as
/// `major << 24 | hardfork << 16 | release` so that integer order is version order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version(u32);

impl Version {
    /// Packs a version
    pub const fn new(major: u8, hardfork: u8, release: u16) -> Self {
        Version((major as u32) << 24 | (hardfork as u32) << 16 | release as u32)
    }

    /// Packed form
    pub const fn to_raw(&self) -> u32 {
        self.0
    }

    /// From packed form
    pub const fn from_raw(raw: u32) -> Self {
        Version(raw)
    }

    /// major number
    pub const fn major(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// hardfork number
    pub const fn hardfork(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// release number
    pub const fn release(&self) -> u16 {
        self.0 as u16
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.hardfork(), self.release())
    }
}

/// ```
/// # use sigma_models::Version;
/// # use std::str::FromStr;
/// assert_eq!(Version::from_str("0.1.0").unwrap(), Version::new(0, 1, 0));
/// assert!(Version::from_str("0.1").is_err());
/// assert!(Version::from_str("0.256.0").is_err());
/// ```
impl FromStr for Version {
    type Err = ModelsError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ModelsError::InvalidVersion(s.to_string());
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [major, hardfork, release] => Ok(Version::new(
                major.parse().map_err(|_| err())?,
                hardfork.parse().map_err(|_| err())?,
                release.parse().map_err(|_| err())?,
            )),
            _ => Err(err()),
        }
    }
}

/// A `Version` with its release part cleared
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HardforkVersion(u32);

impl HardforkVersion {
    /// `major.hardfork`
    pub const fn new(major: u8, hardfork: u8) -> Self {
        HardforkVersion(Version::new(major, hardfork, 0).to_raw())
    }

    /// Drops the release part of a version
    pub const fn from_version(version: Version) -> Self {
        HardforkVersion(version.to_raw() & HARDFORK_MASK)
    }

    /// Packed form
    pub const fn to_raw(&self) -> u32 {
        self.0
    }

    /// From packed form, masking the release bits
    pub const fn from_raw(raw: u32) -> Self {
        HardforkVersion(raw & HARDFORK_MASK)
    }

    /// As a full version with release 0
    pub const fn to_version(&self) -> Version {
        Version(self.0)
    }
}

impl From<Version> for HardforkVersion {
    fn from(version: Version) -> Self {
        HardforkVersion::from_version(version)
    }
}

impl fmt::Display for HardforkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = self.to_version();
        write!(f, "{}.{}", version.major(), version.hardfork())
    }
}

impl FromStr for HardforkVersion {
    type Err = ModelsError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Version::from_str(s) {
            Ok(version) => Ok(version.into()),
            Err(_) => Version::from_str(&format!("{}.0", s)).map(HardforkVersion::from),
        }
    }
}

macro_rules! version_serde {
    ($type:ident) => {
        impl Serialize for $type {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $type {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<$type, D::Error> {
                let text = String::deserialize(d)?;
                $type::from_str(&text).map_err(serde::de::Error::custom)
            }
        }
    };
}

version_serde!(Version);
version_serde!(HardforkVersion);

/// A producer's vote for a hardfork to activate at a given time
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct HardforkVersionVote {
    /// voted version
    pub hf_version: HardforkVersion,
    /// proposed activation time
    pub hf_time: SigmaTime,
}

/// Serializer for `Version`
#[derive(Default, Clone, Copy)]
pub struct VersionSerializer {
    u32_serializer: U32VarIntSerializer,
}

impl VersionSerializer {
    /// Creates a `VersionSerializer`
    pub const fn new() -> Self {
        Self {
            u32_serializer: U32VarIntSerializer::new(),
        }
    }
}

impl Serializer<Version> for VersionSerializer {
    fn serialize(&self, value: &Version, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u32_serializer.serialize(&value.0, buffer)
    }
}

/// Deserializer for `Version`
#[derive(Clone, Copy)]
pub struct VersionDeserializer {
    u32_deserializer: U32VarIntDeserializer,
}

impl VersionDeserializer {
    /// Creates a `VersionDeserializer`
    pub const fn new() -> Self {
        Self {
            u32_deserializer: U32VarIntDeserializer::new(Included(0), Included(u32::MAX)),
        }
    }
}

impl Default for VersionDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Version> for VersionDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Version, E> {
        context("Failed Version deserialization", |input| {
            self.u32_deserializer.deserialize(input)
        })
        .map(Version)
        .parse(buffer)
    }
}

/// Serializer for `HardforkVersionVote`
#[derive(Default, Clone, Copy)]
pub struct HardforkVersionVoteSerializer {
    u32_serializer: U32VarIntSerializer,
    time_serializer: SigmaTimeSerializer,
}

impl HardforkVersionVoteSerializer {
    /// Creates a `HardforkVersionVoteSerializer`
    pub const fn new() -> Self {
        Self {
            u32_serializer: U32VarIntSerializer::new(),
            time_serializer: SigmaTimeSerializer::new(),
        }
    }
}

impl Serializer<HardforkVersionVote> for HardforkVersionVoteSerializer {
    fn serialize(
        &self,
        value: &HardforkVersionVote,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.u32_serializer
            .serialize(&value.hf_version.to_raw(), buffer)?;
        self.time_serializer.serialize(&value.hf_time, buffer)
    }
}

/// Deserializer for `HardforkVersionVote`
#[derive(Clone, Copy, Default)]
pub struct HardforkVersionVoteDeserializer {
    version_deserializer: VersionDeserializer,
    time_deserializer: SigmaTimeDeserializer,
}

impl HardforkVersionVoteDeserializer {
    /// Creates a `HardforkVersionVoteDeserializer`
    pub fn new() -> Self {
        Self::default()
    }
}

impl Deserializer<HardforkVersionVote> for HardforkVersionVoteDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], HardforkVersionVote, E> {
        context(
            "Failed HardforkVersionVote deserialization",
            tuple((
                |input| self.version_deserializer.deserialize(input),
                |input| self.time_deserializer.deserialize(input),
            )),
        )
        .map(|(version, hf_time)| HardforkVersionVote {
            hf_version: HardforkVersion::from_version(version),
            hf_time,
        })
        .parse(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardfork_masks_release() {
        let version = Version::new(0, 1, 258);
        assert_eq!(version.to_string(), "0.1.258");
        assert_eq!(HardforkVersion::from(version), HardforkVersion::new(0, 1));
        assert!(HardforkVersion::new(0, 1) > HardforkVersion::from(Version::new(0, 0, 999)));
        assert_eq!(HardforkVersion::from_str("0.1").unwrap(), HardforkVersion::new(0, 1));
    }
}
