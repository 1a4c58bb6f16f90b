// Copyright (c) 2024 SIGMA ENGINE

use crate::account::{AccountName, AccountNameDeserializer, AccountNameSerializer};
use crate::ModelsError;
use nom::error::{context, ContextError, ParseError};
use nom::multi::length_count;
use nom::sequence::tuple;
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use sigma_serialization::{
    Deserializer, SerializeError, Serializer, U16VarIntDeserializer, U16VarIntSerializer,
    U32VarIntDeserializer, U32VarIntSerializer,
};
use sigma_signature::{PublicKey, PublicKeyDeserializer, PublicKeySerializer};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound::Included;

/// Maximal number of atoms of each kind in an authority
pub const MAX_AUTHORITY_MEMBERSHIP: u32 = 40;

/// Weighted threshold over keys and accounts.
///
/// The authority is satisfied when the summed weight of the approving atoms
/// reaches `weight_threshold`.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Authority {
    /// weight needed to approve
    pub weight_threshold: u32,
    /// accounts whose active authority counts as an approval
    pub account_auths: BTreeMap<AccountName, u16>,
    /// keys whose signature counts as an approval
    pub key_auths: BTreeMap<PublicKey, u16>,
}

impl Authority {
    /// An authority with no atom
    pub fn new(weight_threshold: u32) -> Self {
        Authority {
            weight_threshold,
            ..Default::default()
        }
    }

    /// Single key authority of threshold 1
    pub fn from_key(key: PublicKey) -> Self {
        Authority::new(1).with_key(key, 1)
    }

    /// Adds a key atom
    #[must_use]
    pub fn with_key(mut self, key: PublicKey, weight: u16) -> Self {
        self.key_auths.insert(key, weight);
        self
    }

    /// Adds an account atom
    #[must_use]
    pub fn with_account(mut self, account: AccountName, weight: u16) -> Self {
        self.account_auths.insert(account, weight);
        self
    }

    /// Number of atoms
    pub fn num_auths(&self) -> usize {
        self.account_auths.len() + self.key_auths.len()
    }

    /// An authority that no combination of its atoms can satisfy
    pub fn is_impossible(&self) -> bool {
        let total: u64 = self
            .account_auths
            .values()
            .chain(self.key_auths.values())
            .map(|weight| *weight as u64)
            .sum();
        total < self.weight_threshold as u64
    }

    /// Checks the account atoms
    pub fn validate(&self) -> Result<(), ModelsError> {
        for account in self.account_auths.keys() {
            account
                .validate()
                .map_err(|_| ModelsError::InvalidAuthority(format!("invalid account {}", account)))?;
        }
        if self.num_auths() > 2 * MAX_AUTHORITY_MEMBERSHIP as usize {
            return Err(ModelsError::InvalidAuthority(format!(
                "{} atoms",
                self.num_auths()
            )));
        }
        Ok(())
    }
}

/// The three account permission tiers, strongest first
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityLevel {
    /// controls everything, including the other tiers
    Owner,
    /// controls funds
    Active,
    /// social actions only
    Posting,
}

impl std::fmt::Display for AuthorityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorityLevel::Owner => write!(f, "owner"),
            AuthorityLevel::Active => write!(f, "active"),
            AuthorityLevel::Posting => write!(f, "posting"),
        }
    }
}

/// Authorities an operation or a transaction needs
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct RequiredAuthorities {
    /// accounts whose owner authority must approve
    pub owner: BTreeSet<AccountName>,
    /// accounts whose active (or owner) authority must approve
    pub active: BTreeSet<AccountName>,
    /// accounts whose posting (or stronger) authority must approve
    pub posting: BTreeSet<AccountName>,
    /// raw authorities that must be satisfied, in declaration order
    pub other: Vec<Authority>,
}

impl RequiredAuthorities {
    /// No requirement at all
    pub fn is_empty(&self) -> bool {
        self.owner.is_empty()
            && self.active.is_empty()
            && self.posting.is_empty()
            && self.other.is_empty()
    }

    /// Union of two requirement sets, raw authorities appended in order
    pub fn extend(&mut self, other: RequiredAuthorities) {
        self.owner.extend(other.owner);
        self.active.extend(other.active);
        self.posting.extend(other.posting);
        self.other.extend(other.other);
    }
}

/// Serializer for `Authority`
#[derive(Default, Clone, Copy)]
pub struct AuthoritySerializer {
    u32_serializer: U32VarIntSerializer,
    u16_serializer: U16VarIntSerializer,
    name_serializer: AccountNameSerializer,
    key_serializer: PublicKeySerializer,
}

impl AuthoritySerializer {
    /// Creates an `AuthoritySerializer`
    pub const fn new() -> Self {
        Self {
            u32_serializer: U32VarIntSerializer::new(),
            u16_serializer: U16VarIntSerializer::new(),
            name_serializer: AccountNameSerializer::new(),
            key_serializer: PublicKeySerializer::new(),
        }
    }
}

impl Serializer<Authority> for AuthoritySerializer {
    fn serialize(&self, value: &Authority, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u32_serializer
            .serialize(&value.weight_threshold, buffer)?;
        let count = |len: usize| {
            u32::try_from(len)
                .map_err(|_| SerializeError::NumberTooBig(format!("{} authority atoms", len)))
        };
        self.u32_serializer
            .serialize(&count(value.account_auths.len())?, buffer)?;
        for (account, weight) in &value.account_auths {
            self.name_serializer.serialize(account, buffer)?;
            self.u16_serializer.serialize(weight, buffer)?;
        }
        self.u32_serializer
            .serialize(&count(value.key_auths.len())?, buffer)?;
        for (key, weight) in &value.key_auths {
            self.key_serializer.serialize(key, buffer)?;
            self.u16_serializer.serialize(weight, buffer)?;
        }
        Ok(())
    }
}

/// Deserializer for `Authority`
#[derive(Clone, Copy)]
pub struct AuthorityDeserializer {
    threshold_deserializer: U32VarIntDeserializer,
    count_deserializer: U32VarIntDeserializer,
    weight_deserializer: U16VarIntDeserializer,
    name_deserializer: AccountNameDeserializer,
    key_deserializer: PublicKeyDeserializer,
}

impl AuthorityDeserializer {
    /// Creates an `AuthorityDeserializer`
    pub const fn new() -> Self {
        Self {
            threshold_deserializer: U32VarIntDeserializer::new(Included(0), Included(u32::MAX)),
            count_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(MAX_AUTHORITY_MEMBERSHIP),
            ),
            weight_deserializer: U16VarIntDeserializer::new(Included(0), Included(u16::MAX)),
            name_deserializer: AccountNameDeserializer::new(),
            key_deserializer: PublicKeyDeserializer::new(),
        }
    }
}

impl Default for AuthorityDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Authority> for AuthorityDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Authority, E> {
        context(
            "Failed authority deserialization",
            tuple((
                context("Failed weight_threshold deserialization", |input| {
                    self.threshold_deserializer.deserialize(input)
                }),
                context(
                    "Failed account_auths deserialization",
                    length_count(
                        |input| self.count_deserializer.deserialize(input),
                        tuple((
                            |input| self.name_deserializer.deserialize(input),
                            |input| self.weight_deserializer.deserialize(input),
                        )),
                    ),
                ),
                context(
                    "Failed key_auths deserialization",
                    length_count(
                        |input| self.count_deserializer.deserialize(input),
                        tuple((
                            |input| self.key_deserializer.deserialize(input),
                            |input| self.weight_deserializer.deserialize(input),
                        )),
                    ),
                ),
            )),
        )
        .map(|(weight_threshold, account_auths, key_auths)| Authority {
            weight_threshold,
            account_auths: account_auths.into_iter().collect(),
            key_auths: key_auths.into_iter().collect(),
        })
        .parse(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_serialization::deserialize_exact;
    use sigma_signature::PrivateKey;

    #[test]
    fn test_impossible_and_validate() {
        let key = PrivateKey::from_seed("alice").public_key();
        let authority = Authority::new(3)
            .with_key(key, 1)
            .with_account(AccountName::new("bob-account"), 1);
        assert!(authority.is_impossible());
        assert!(!Authority::new(2).with_key(key, 2).is_impossible());
        authority.validate().unwrap();
        assert!(Authority::new(1)
            .with_account(AccountName::new("B"), 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_codec_keeps_atoms() {
        let authority = Authority::new(2)
            .with_key(PrivateKey::from_seed("alice").public_key(), 1)
            .with_key(PrivateKey::from_seed("bob").public_key(), 1)
            .with_account(AccountName::new("carol"), 2);
        let mut buffer = Vec::new();
        AuthoritySerializer::new()
            .serialize(&authority, &mut buffer)
            .unwrap();
        assert_eq!(
            deserialize_exact(&AuthorityDeserializer::new(), &buffer).unwrap(),
            authority
        );
    }
}
