// Copyright (c) 2024 SIGMA ENGINE

use super::CustomOperation;
use crate::evaluator::ApplyContext;
use nom::error::{context, ContextError, ErrorKind, ParseError};
use nom::sequence::tuple;
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use sigma_chain_exports::objects::BobserverVoteObject;
use sigma_chain_exports::{ChainError, ChainResult};
use sigma_models::account::{AccountNameDeserializer, AccountNameSerializer};
use sigma_models::{AccountName, RequiredAuthorities};
use sigma_serialization::{
    BoolDeserializer, BoolSerializer, Deserializer, SerializeError, Serializer,
    U32VarIntDeserializer, U32VarIntSerializer,
};
use std::ops::Bound::Included;

/// Maximal number of producers an account votes for
pub const MAX_ACCOUNT_BOBSERVER_VOTES: u16 = 30;

/// Producer votes carried by custom operations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ProducerVoteOperation {
    /// Casts or withdraws the vote of `account` for `bobserver`
    AccountBobserverVote {
        /// voter
        account: AccountName,
        /// producer
        bobserver: AccountName,
        /// `true` casts the vote, `false` withdraws it
        approve: bool,
    },
}

impl ProducerVoteOperation {
    /// Id under which the interpreter is registered
    pub const ID: &'static str = "bobserver";
}

impl CustomOperation for ProducerVoteOperation {
    type Deserializer = ProducerVoteDeserializer;

    fn deserializer() -> Self::Deserializer {
        ProducerVoteDeserializer::new()
    }

    fn validate(&self) -> ChainResult<()> {
        match self {
            ProducerVoteOperation::AccountBobserverVote {
                account, bobserver, ..
            } => {
                account.validate()?;
                bobserver.validate()?;
                Ok(())
            }
        }
    }

    fn required_authorities(&self) -> RequiredAuthorities {
        let mut required = RequiredAuthorities::default();
        match self {
            ProducerVoteOperation::AccountBobserverVote { account, .. } => {
                required.active.insert(account.clone());
            }
        }
        required
    }

    fn evaluate(&self, ctx: &mut ApplyContext<'_>) -> ChainResult<()> {
        match self {
            ProducerVoteOperation::AccountBobserverVote {
                account,
                bobserver,
                approve,
            } => vote(ctx, account, bobserver, *approve),
        }
    }
}

fn vote(
    ctx: &mut ApplyContext<'_>,
    account: &AccountName,
    bobserver: &AccountName,
    approve: bool,
) -> ChainResult<()> {
    let (_, voter) = ctx.state.get_account(account)?;
    if !voter.can_vote {
        return Err(ChainError::InvalidOperation(format!(
            "{} declined its voting rights",
            account
        )));
    }
    let voted_for = voter.bobservers_voted_for;
    ctx.state.get_bobserver(bobserver)?;
    let existing = ctx
        .state
        .bobserver_votes
        .find_by(
            BobserverVoteObject::BY_ACCOUNT_BOBSERVER,
            &BobserverVoteObject::key(account, bobserver),
        )
        .map(|(id, _)| id);

    match (approve, existing) {
        (true, None) => {
            if voted_for >= MAX_ACCOUNT_BOBSERVER_VOTES {
                return Err(ChainError::InvalidOperation(format!(
                    "{} already votes for {} bobservers",
                    account, voted_for
                )));
            }
            ctx.state.bobserver_votes.create(BobserverVoteObject {
                account: account.clone(),
                bobserver: bobserver.clone(),
            })?;
            ctx.state.adjust_bobserver_vote(bobserver, 1)?;
            ctx.state
                .modify_account(account, |voter| voter.bobservers_voted_for += 1)
        }
        (false, Some(id)) => {
            ctx.state.bobserver_votes.remove(id)?;
            ctx.state.adjust_bobserver_vote(bobserver, -1)?;
            ctx.state.modify_account(account, |voter| {
                voter.bobservers_voted_for = voter.bobservers_voted_for.saturating_sub(1)
            })
        }
        (true, Some(_)) => Err(ChainError::InvalidOperation(format!(
            "{} already votes for {}",
            account, bobserver
        ))),
        (false, None) => Err(ChainError::InvalidOperation(format!(
            "{} does not vote for {}",
            account, bobserver
        ))),
    }
}

/// Serializer for `ProducerVoteOperation`: a varint tag followed by the fields
#[derive(Default)]
pub struct ProducerVoteSerializer {
    tag_serializer: U32VarIntSerializer,
    name_serializer: AccountNameSerializer,
    bool_serializer: BoolSerializer,
}

impl ProducerVoteSerializer {
    /// Creates a `ProducerVoteSerializer`
    pub fn new() -> Self {
        Self::default()
    }
}

impl Serializer<ProducerVoteOperation> for ProducerVoteSerializer {
    fn serialize(
        &self,
        value: &ProducerVoteOperation,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        match value {
            ProducerVoteOperation::AccountBobserverVote {
                account,
                bobserver,
                approve,
            } => {
                self.tag_serializer.serialize(&0, buffer)?;
                self.name_serializer.serialize(account, buffer)?;
                self.name_serializer.serialize(bobserver, buffer)?;
                self.bool_serializer.serialize(approve, buffer)
            }
        }
    }
}

/// Deserializer for `ProducerVoteOperation`
pub struct ProducerVoteDeserializer {
    tag_deserializer: U32VarIntDeserializer,
    name_deserializer: AccountNameDeserializer,
    bool_deserializer: BoolDeserializer,
}

impl ProducerVoteDeserializer {
    /// Creates a `ProducerVoteDeserializer`
    pub const fn new() -> Self {
        Self {
            tag_deserializer: U32VarIntDeserializer::new(Included(0), Included(0)),
            name_deserializer: AccountNameDeserializer::new(),
            bool_deserializer: BoolDeserializer::new(),
        }
    }
}

impl Default for ProducerVoteDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<ProducerVoteOperation> for ProducerVoteDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], ProducerVoteOperation, E> {
        context("Failed ProducerVoteOperation deserialization", |input: &'a [u8]| {
            let (rest, tag) = self.tag_deserializer.deserialize(input)?;
            if tag != 0 {
                return Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Switch)));
            }
            tuple((
                context("Failed account deserialization", |i| {
                    self.name_deserializer.deserialize(i)
                }),
                context("Failed bobserver deserialization", |i| {
                    self.name_deserializer.deserialize(i)
                }),
                context("Failed approve deserialization", |i| {
                    self.bool_deserializer.deserialize(i)
                }),
            ))
            .map(|(account, bobserver, approve)| ProducerVoteOperation::AccountBobserverVote {
                account,
                bobserver,
                approve,
            })
            .parse(rest)
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_serialization::{deserialize_exact, VecSerializer};

    fn vote(account: &str, bobserver: &str) -> ProducerVoteOperation {
        ProducerVoteOperation::AccountBobserverVote {
            account: AccountName::new(account),
            bobserver: AccountName::new(bobserver),
            approve: true,
        }
    }

    #[test]
    fn test_json_form_is_adjacently_tagged() {
        let json = r#"{"type":"account_bobserver_vote","value":{"account":"alice","bobserver":"bp1","approve":true}}"#;
        let op: ProducerVoteOperation = serde_json::from_str(json).unwrap();
        assert_eq!(op, vote("alice", "bp1"));
        assert_eq!(
            op.required_authorities().active.into_iter().collect::<Vec<_>>(),
            vec![AccountName::new("alice")]
        );
    }

    #[test]
    fn test_binary_list_decodes() {
        let ops = vec![vote("alice", "bp1"), vote("alice", "bp2")];
        let mut buffer = Vec::new();
        VecSerializer::new(ProducerVoteSerializer::new())
            .serialize(&ops, &mut buffer)
            .unwrap();
        let list = sigma_serialization::VecDeserializer::new(ProducerVoteDeserializer::new(), 8);
        assert_eq!(deserialize_exact(&list, &buffer).unwrap(), ops);

        let mut bad_tag = Vec::new();
        U32VarIntSerializer::new().serialize(&3, &mut bad_tag).unwrap();
        assert!(deserialize_exact(&ProducerVoteDeserializer::new(), &bad_tag).is_err());
    }
}
