// Copyright (c) 2024 SIGMA ENGINE
//! Second-resolution timestamps used for block times, expirations and maturities.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod error;
pub use error::TimeError;
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use serde::{Deserialize, Serialize};
use sigma_serialization::{Deserializer, Serializer, U32VarIntDeserializer, U32VarIntSerializer};
use std::fmt;
use std::ops::Bound;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Seconds since 01/01/1970 UTC.
///
/// Every timestamp that enters consensus state has a one second resolution,
/// so that all nodes agree on slot arithmetic.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SigmaTime(u32);

/// Serializer for `SigmaTime`
#[derive(Default, Clone, Copy)]
pub struct SigmaTimeSerializer {
    u32_serializer: U32VarIntSerializer,
}

impl SigmaTimeSerializer {
    /// Creates a `SigmaTimeSerializer`
    pub const fn new() -> Self {
        Self {
            u32_serializer: U32VarIntSerializer::new(),
        }
    }
}

impl Serializer<SigmaTime> for SigmaTimeSerializer {
    fn serialize(
        &self,
        value: &SigmaTime,
        buffer: &mut Vec<u8>,
    ) -> Result<(), sigma_serialization::SerializeError> {
        self.u32_serializer.serialize(&value.to_secs(), buffer)
    }
}

/// Deserializer for `SigmaTime`
#[derive(Clone, Copy)]
pub struct SigmaTimeDeserializer {
    u32_deserializer: U32VarIntDeserializer,
}

impl SigmaTimeDeserializer {
    /// Creates a `SigmaTimeDeserializer` accepting times within `range`
    pub fn new(range: (Bound<SigmaTime>, Bound<SigmaTime>)) -> Self {
        Self {
            u32_deserializer: U32VarIntDeserializer::new(
                range.0.map(|time| time.to_secs()),
                range.1.map(|time| time.to_secs()),
            ),
        }
    }
}

impl Default for SigmaTimeDeserializer {
    fn default() -> Self {
        Self::new((Bound::Unbounded, Bound::Unbounded))
    }
}

impl Deserializer<SigmaTime> for SigmaTimeDeserializer {
    /// ```
    /// use std::ops::Bound::Included;
    /// use sigma_serialization::{Serializer, Deserializer, DeserializeError};
    /// use sigma_time::{SigmaTime, SigmaTimeSerializer, SigmaTimeDeserializer};
    ///
    /// let time = SigmaTime::from_secs(30);
    /// let mut serialized = Vec::new();
    /// SigmaTimeSerializer::new().serialize(&time, &mut serialized).unwrap();
    /// let deserializer = SigmaTimeDeserializer::new((Included(SigmaTime::from_secs(0)), Included(SigmaTime::max())));
    /// let (rest, time_deser) = deserializer.deserialize::<DeserializeError>(&serialized).unwrap();
    /// assert!(rest.is_empty());
    /// assert_eq!(time, time_deser);
    /// ```
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], SigmaTime, E> {
        context("Failed SigmaTime deserialization", |input| {
            self.u32_deserializer
                .deserialize(input)
                .map(|(rest, res)| (rest, SigmaTime::from_secs(res)))
        })(buffer)
    }
}

impl fmt::Display for SigmaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_instant())
    }
}

impl FromStr for SigmaTime {
    type Err = TimeError;

    /// Accepts either a number of seconds or an RFC 3339 instant.
    ///
    /// ```
    /// # use sigma_time::*;
    /// # use std::str::FromStr;
    /// assert_eq!(SigmaTime::from_str("42").unwrap(), SigmaTime::from_secs(42));
    /// assert_eq!(
    ///     SigmaTime::from_str("2019-10-15T05:14:04Z").unwrap(),
    ///     SigmaTime::from_secs(1_571_116_444)
    /// );
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(secs) = u32::from_str(s) {
            return Ok(SigmaTime(secs));
        }
        let instant = OffsetDateTime::parse(s, &Rfc3339)
            .map_err(|_| TimeError::ParsingError(s.to_string()))?;
        u32::try_from(instant.unix_timestamp())
            .map(SigmaTime)
            .map_err(|_| TimeError::TimeOverflowError)
    }
}

impl From<SigmaTime> for Duration {
    fn from(value: SigmaTime) -> Self {
        Duration::from_secs(value.0 as u64)
    }
}

impl SigmaTime {
    /// Conversion from seconds
    pub const fn from_secs(value: u32) -> Self {
        SigmaTime(value)
    }

    /// Latest representable time
    pub const fn max() -> SigmaTime {
        SigmaTime(u32::MAX)
    }

    /// Conversion to seconds
    pub const fn to_secs(&self) -> u32 {
        self.0
    }

    /// Current UNIX time, truncated to the second
    pub fn now() -> Result<Self, TimeError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TimeError::TimeOverflowError)?
            .as_secs();
        u32::try_from(now)
            .map(SigmaTime)
            .map_err(|_| TimeError::TimeOverflowError)
    }

    /// ```
    /// # use sigma_time::*;
    /// let t = SigmaTime::from_secs(10);
    /// assert_eq!(t.saturating_sub(SigmaTime::from_secs(20)), SigmaTime::from_secs(0));
    /// ```
    pub fn saturating_sub(self, t: SigmaTime) -> Self {
        SigmaTime(self.0.saturating_sub(t.0))
    }

    /// Adds two times, saturating at `SigmaTime::max()`
    pub fn saturating_add(self, t: SigmaTime) -> Self {
        SigmaTime(self.0.saturating_add(t.0))
    }

    /// Adds a number of seconds, saturating
    pub fn saturating_add_secs(self, secs: u32) -> Self {
        SigmaTime(self.0.saturating_add(secs))
    }

    /// Subtracts a number of seconds, saturating at zero
    pub fn saturating_sub_secs(self, secs: u32) -> Self {
        SigmaTime(self.0.saturating_sub(secs))
    }

    /// ```
    /// # use sigma_time::*;
    /// let t = SigmaTime::from_secs(10);
    /// assert!(t.checked_sub(SigmaTime::from_secs(20)).is_err());
    /// ```
    pub fn checked_sub(self, t: SigmaTime) -> Result<Self, TimeError> {
        self.0
            .checked_sub(t.0)
            .ok_or(TimeError::TimeOverflowError)
            .map(SigmaTime)
    }

    /// Checked addition
    pub fn checked_add(self, t: SigmaTime) -> Result<Self, TimeError> {
        self.0
            .checked_add(t.0)
            .ok_or(TimeError::TimeOverflowError)
            .map(SigmaTime)
    }

    /// Checked addition of a number of seconds
    pub fn checked_add_secs(self, secs: u32) -> Result<Self, TimeError> {
        self.0
            .checked_add(secs)
            .ok_or(TimeError::TimeOverflowError)
            .map(SigmaTime)
    }

    /// RFC 3339 rendering, `1970-01-01T00:00:00Z` style
    pub fn format_instant(&self) -> String {
        OffsetDateTime::from_unix_timestamp(self.0 as i64)
            .ok()
            .and_then(|instant| instant.format(&Rfc3339).ok())
            .unwrap_or_else(|| self.0.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse_agree() {
        let genesis = SigmaTime::from_secs(1_571_116_444);
        assert_eq!(genesis.to_string(), "2019-10-15T05:14:04Z");
        assert_eq!(SigmaTime::from_str(&genesis.to_string()).unwrap(), genesis);
        assert!(SigmaTime::from_str("yesterday").is_err());
    }

    #[test]
    fn test_saturation() {
        assert_eq!(SigmaTime::max().saturating_add_secs(5), SigmaTime::max());
        assert!(SigmaTime::max().checked_add_secs(1).is_err());
        assert_eq!(
            SigmaTime::from_secs(3).saturating_sub_secs(5),
            SigmaTime::from_secs(0)
        );
    }

    #[test]
    fn test_serde_is_numeric() {
        let json = serde_json::to_string(&SigmaTime::from_secs(7)).unwrap();
        assert_eq!(json, "7");
    }
}
