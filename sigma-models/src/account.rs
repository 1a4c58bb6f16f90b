// Copyright (c) 2024 SIGMA ENGINE

use crate::constants::{MAX_ACCOUNT_NAME_LENGTH, MIN_ACCOUNT_NAME_LENGTH};
use crate::ModelsError;
use nom::error::{context, ContextError, ParseError};
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use sigma_serialization::{
    Deserializer, SerializeError, Serializer, StringDeserializer, StringSerializer,
};
use std::fmt;
use std::str::FromStr;

/// Name of an account.
///
/// Construction does not validate: names coming from the wire are checked by
/// the `validate` step of the operation carrying them.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountName(String);

impl AccountName {
    /// Wraps a name
    pub fn new(name: impl Into<String>) -> Self {
        AccountName(name.into())
    }

    /// Borrowed form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for the empty name, used as "no account"
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the name follows the naming rules.
    ///
    /// A name is made of dot-separated labels. Each label is at least three
    /// characters of `a-z`, `0-9` and `-`, starts with a letter and ends with
    /// a letter or a digit.
    ///
    /// ```
    /// # use sigma_models::AccountName;
    /// assert!(AccountName::new("alice").is_valid());
    /// assert!(AccountName::new("alice.bob-2").is_valid());
    /// assert!(!AccountName::new("al").is_valid());
    /// assert!(!AccountName::new("alice.b").is_valid());
    /// assert!(!AccountName::new("2alice").is_valid());
    /// assert!(!AccountName::new("alice-").is_valid());
    /// ```
    pub fn is_valid(&self) -> bool {
        let len = self.0.len();
        if !(MIN_ACCOUNT_NAME_LENGTH..=MAX_ACCOUNT_NAME_LENGTH).contains(&len) {
            return false;
        }
        self.0.split('.').all(|label| {
            let bytes = label.as_bytes();
            match (bytes.first(), bytes.last()) {
                (Some(first), Some(last)) => {
                    bytes.len() >= MIN_ACCOUNT_NAME_LENGTH
                        && first.is_ascii_lowercase()
                        && (last.is_ascii_lowercase() || last.is_ascii_digit())
                        && bytes.iter().all(|c| {
                            c.is_ascii_lowercase() || c.is_ascii_digit() || *c == b'-'
                        })
                }
                _ => false,
            }
        })
    }

    /// Fails with `InvalidAccountName` if the name breaks the naming rules
    pub fn validate(&self) -> Result<(), ModelsError> {
        if !self.is_valid() {
            return Err(ModelsError::InvalidAccountName(self.0.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountName {
    type Err = ModelsError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = AccountName::new(s);
        name.validate()?;
        Ok(name)
    }
}

impl From<&str> for AccountName {
    fn from(name: &str) -> Self {
        AccountName::new(name)
    }
}

impl AsRef<str> for AccountName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Serializer for `AccountName`
#[derive(Clone, Copy)]
pub struct AccountNameSerializer {
    string_serializer: StringSerializer,
}

impl AccountNameSerializer {
    /// Creates an `AccountNameSerializer`
    pub const fn new() -> Self {
        Self {
            string_serializer: StringSerializer::new(MAX_ACCOUNT_NAME_LENGTH),
        }
    }
}

impl Default for AccountNameSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<AccountName> for AccountNameSerializer {
    fn serialize(&self, value: &AccountName, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.string_serializer.serialize(&value.0, buffer)
    }
}

/// Deserializer for `AccountName`
#[derive(Clone, Copy)]
pub struct AccountNameDeserializer {
    string_deserializer: StringDeserializer,
}

impl AccountNameDeserializer {
    /// Creates an `AccountNameDeserializer`
    pub const fn new() -> Self {
        Self {
            string_deserializer: StringDeserializer::new(MAX_ACCOUNT_NAME_LENGTH as u32),
        }
    }
}

impl Default for AccountNameDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<AccountName> for AccountNameDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], AccountName, E> {
        context("Failed account name deserialization", |input| {
            self.string_deserializer.deserialize(input)
        })
        .map(AccountName)
        .parse(buffer)
    }
}
