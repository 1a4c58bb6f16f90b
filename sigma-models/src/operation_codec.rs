// Copyright (c) 2024 SIGMA ENGINE

use crate::account::{AccountName, AccountNameDeserializer, AccountNameSerializer};
use crate::amount::{Asset, AssetDeserializer, AssetSerializer};
use crate::authority::{Authority, AuthorityDeserializer, AuthoritySerializer};
use crate::constants::{MAX_BOBSERVER_URL_LENGTH, MAX_MEMO_SIZE, MAX_TRANSACTION_SIZE};
use crate::operation::*;
use nom::error::{context, ContextError, ErrorKind, ParseError};
use nom::sequence::tuple;
use nom::{IResult, Parser};
use sigma_serialization::{
    BoolDeserializer, BoolSerializer, Deserializer, OptionDeserializer, OptionSerializer,
    SerializeError, Serializer, StringDeserializer, StringSerializer, U16VarIntDeserializer,
    U16VarIntSerializer, U32VarIntDeserializer, U32VarIntSerializer, U8Deserializer,
    U8Serializer, VecDeserializer, VecSerializer, VecU8Deserializer, VecU8Serializer,
};
use sigma_signature::{PublicKey, PublicKeyDeserializer, PublicKeySerializer};
use sigma_time::{SigmaTime, SigmaTimeDeserializer, SigmaTimeSerializer};
use std::collections::BTreeSet;
use std::ops::Bound::Included;

/// Maximal number of accounts in an authority set of a custom operation
pub const MAX_CUSTOM_AUTHS: u32 = 64;

/// Serializer for `Operation`: a varint tag followed by the fields in declaration order
pub struct OperationSerializer {
    u32_serializer: U32VarIntSerializer,
    u16_serializer: U16VarIntSerializer,
    u8_serializer: U8Serializer,
    bool_serializer: BoolSerializer,
    name_serializer: AccountNameSerializer,
    asset_serializer: AssetSerializer,
    authority_serializer: AuthoritySerializer,
    key_serializer: PublicKeySerializer,
    time_serializer: SigmaTimeSerializer,
    memo_serializer: StringSerializer,
    text_serializer: StringSerializer,
    bytes_serializer: VecU8Serializer,
    names_serializer: VecSerializer<AccountName, AccountNameSerializer>,
    authorities_serializer: VecSerializer<Authority, AuthoritySerializer>,
    option_authority_serializer: OptionSerializer<Authority, AuthoritySerializer>,
}

impl OperationSerializer {
    /// Creates an `OperationSerializer`
    pub fn new() -> Self {
        Self {
            u32_serializer: U32VarIntSerializer::new(),
            u16_serializer: U16VarIntSerializer::new(),
            u8_serializer: U8Serializer::new(),
            bool_serializer: BoolSerializer::new(),
            name_serializer: AccountNameSerializer::new(),
            asset_serializer: AssetSerializer::new(),
            authority_serializer: AuthoritySerializer::new(),
            key_serializer: PublicKeySerializer::new(),
            time_serializer: SigmaTimeSerializer::new(),
            memo_serializer: StringSerializer::new(MAX_MEMO_SIZE),
            text_serializer: StringSerializer::new(MAX_TRANSACTION_SIZE as usize),
            bytes_serializer: VecU8Serializer::new(),
            names_serializer: VecSerializer::new(AccountNameSerializer::new()),
            authorities_serializer: VecSerializer::new(AuthoritySerializer::new()),
            option_authority_serializer: OptionSerializer::new(AuthoritySerializer::new()),
        }
    }

    fn names(&self, names: &BTreeSet<AccountName>, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.names_serializer.serialize_iter(names.iter(), buffer)
    }
}

impl Default for OperationSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<Operation> for OperationSerializer {
    fn serialize(&self, value: &Operation, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u32_serializer
            .serialize(&u32::from(value.op_type()), buffer)?;
        let name = |v: &AccountName, b: &mut Vec<u8>| self.name_serializer.serialize(v, b);
        let asset = |v: &Asset, b: &mut Vec<u8>| self.asset_serializer.serialize(v, b);
        let authority = |v: &Authority, b: &mut Vec<u8>| self.authority_serializer.serialize(v, b);
        let key = |v: &PublicKey, b: &mut Vec<u8>| self.key_serializer.serialize(v, b);
        let memo = |v: &String, b: &mut Vec<u8>| self.memo_serializer.serialize(v, b);
        let text = |v: &String, b: &mut Vec<u8>| self.text_serializer.serialize(v, b);
        let u32v = |v: &u32, b: &mut Vec<u8>| self.u32_serializer.serialize(v, b);
        let u8v = |v: &u8, b: &mut Vec<u8>| self.u8_serializer.serialize(v, b);
        match value {
            Operation::Transfer(op) => {
                name(&op.from, buffer)?;
                name(&op.to, buffer)?;
                asset(&op.amount, buffer)?;
                memo(&op.memo, buffer)
            }
            Operation::AccountCreate(op) => {
                name(&op.creator, buffer)?;
                name(&op.new_account_name, buffer)?;
                authority(&op.owner, buffer)?;
                authority(&op.active, buffer)?;
                authority(&op.posting, buffer)?;
                key(&op.memo_key, buffer)?;
                text(&op.json_metadata, buffer)
            }
            Operation::AccountUpdate(op) => {
                name(&op.account, buffer)?;
                self.option_authority_serializer.serialize(&op.owner, buffer)?;
                self.option_authority_serializer.serialize(&op.active, buffer)?;
                self.option_authority_serializer.serialize(&op.posting, buffer)?;
                key(&op.memo_key, buffer)?;
                text(&op.json_metadata, buffer)
            }
            Operation::BobserverUpdate(op) => {
                name(&op.root, buffer)?;
                name(&op.owner, buffer)?;
                text(&op.url, buffer)?;
                key(&op.block_signing_key, buffer)
            }
            Operation::Custom(op) => {
                self.names(&op.required_auths, buffer)?;
                self.u16_serializer.serialize(&op.id, buffer)?;
                self.bytes_serializer.serialize(&op.data, buffer)
            }
            Operation::CustomJson(op) => {
                self.names(&op.required_auths, buffer)?;
                self.names(&op.required_posting_auths, buffer)?;
                text(&op.id, buffer)?;
                text(&op.json, buffer)
            }
            Operation::RequestAccountRecovery(op) => {
                name(&op.recovery_account, buffer)?;
                name(&op.account_to_recover, buffer)?;
                authority(&op.new_owner_authority, buffer)
            }
            Operation::RecoverAccount(op) => {
                name(&op.account_to_recover, buffer)?;
                authority(&op.new_owner_authority, buffer)?;
                authority(&op.recent_owner_authority, buffer)
            }
            Operation::ChangeRecoveryAccount(op) => {
                name(&op.account_to_recover, buffer)?;
                name(&op.new_recovery_account, buffer)
            }
            Operation::CustomBinary(op) => {
                self.names(&op.required_owner_auths, buffer)?;
                self.names(&op.required_active_auths, buffer)?;
                self.names(&op.required_posting_auths, buffer)?;
                self.authorities_serializer
                    .serialize(&op.required_auths, buffer)?;
                text(&op.id, buffer)?;
                self.bytes_serializer.serialize(&op.data, buffer)
            }
            Operation::DeclineVotingRights(op) => {
                name(&op.account, buffer)?;
                self.bool_serializer.serialize(&op.decline, buffer)
            }
            Operation::ResetAccount(op) => {
                name(&op.reset_account, buffer)?;
                name(&op.account_to_reset, buffer)?;
                authority(&op.new_owner_authority, buffer)
            }
            Operation::SetResetAccount(op) => {
                name(&op.account, buffer)?;
                name(&op.current_reset_account, buffer)?;
                name(&op.reset_account, buffer)
            }
            Operation::UpdateBproducer(op) => {
                name(&op.root, buffer)?;
                name(&op.bobserver, buffer)?;
                self.bool_serializer.serialize(&op.approve, buffer)
            }
            Operation::ExceptBobserver(op) => {
                name(&op.root, buffer)?;
                name(&op.bobserver, buffer)
            }
            Operation::AccountAuth(op) => {
                name(&op.account, buffer)?;
                text(&op.auth_type, buffer)?;
                text(&op.auth_token, buffer)
            }
            Operation::Print(PrintOperation {
                root,
                account,
                amount,
            })
            | Operation::Burn(BurnOperation {
                root,
                account,
                amount,
            }) => {
                name(root, buffer)?;
                name(account, buffer)?;
                asset(amount, buffer)
            }
            Operation::TransferSavings(op) => {
                name(&op.from, buffer)?;
                u32v(&op.request_id, buffer)?;
                name(&op.to, buffer)?;
                asset(&op.amount, buffer)?;
                asset(&op.total_amount, buffer)?;
                u8v(&op.split_pay_order, buffer)?;
                u8v(&op.split_pay_month, buffer)?;
                memo(&op.memo, buffer)?;
                self.time_serializer.serialize(&op.complete, buffer)
            }
            Operation::CancelTransferSavings(op) => {
                name(&op.from, buffer)?;
                name(&op.to, buffer)?;
                asset(&op.amount, buffer)?;
                u32v(&op.request_id, buffer)
            }
            Operation::ConclusionTransferSavings(op) => {
                name(&op.from, buffer)?;
                name(&op.to, buffer)?;
                u32v(&op.request_id, buffer)
            }
            Operation::StakingFund(op) => {
                name(&op.from, buffer)?;
                text(&op.fund_name, buffer)?;
                u32v(&op.request_id, buffer)?;
                asset(&op.amount, buffer)?;
                memo(&op.memo, buffer)?;
                u8v(&op.usertype, buffer)?;
                u8v(&op.month, buffer)
            }
            Operation::ConclusionStaking(op) => {
                name(&op.root, buffer)?;
                name(&op.from, buffer)?;
                text(&op.fund_name, buffer)?;
                u32v(&op.request_id, buffer)
            }
            Operation::TransferFund(op) => {
                name(&op.from, buffer)?;
                text(&op.fund_name, buffer)?;
                asset(&op.amount, buffer)?;
                memo(&op.memo, buffer)
            }
            Operation::SetFundInterest(op) => {
                name(&op.root, buffer)?;
                text(&op.fund_name, buffer)?;
                u8v(&op.usertype, buffer)?;
                u8v(&op.month, buffer)?;
                text(&op.percent_interest, buffer)
            }
            Operation::ReturnStakingFund(op) => {
                name(&op.root, buffer)?;
                text(&op.fund_name, buffer)?;
                u32v(&op.request_id, buffer)?;
                name(&op.to, buffer)
            }
            Operation::CustomJsonDapp(op) => {
                self.names(&op.required_owner_auths, buffer)?;
                self.names(&op.required_active_auths, buffer)?;
                self.names(&op.required_posting_auths, buffer)?;
                self.authorities_serializer
                    .serialize(&op.required_auths, buffer)?;
                text(&op.id, buffer)?;
                text(&op.json, buffer)
            }
            Operation::ShutdownBobserver(op) => name(&op.owner, buffer),
            Operation::Hardfork(op) => u32v(&op.hardfork_id, buffer),
            Operation::FillStakingFund(op) => {
                name(&op.from, buffer)?;
                text(&op.fund_name, buffer)?;
                asset(&op.amount, buffer)?;
                u32v(&op.request_id, buffer)?;
                memo(&op.memo, buffer)
            }
            Operation::FillTransferSavings(op) => {
                name(&op.from, buffer)?;
                name(&op.to, buffer)?;
                asset(&op.amount, buffer)?;
                asset(&op.total_amount, buffer)?;
                u8v(&op.split_pay_order, buffer)?;
                u8v(&op.split_pay_month, buffer)?;
                u32v(&op.request_id, buffer)?;
                memo(&op.memo, buffer)
            }
        }
    }
}

/// Deserializer for `Operation`
pub struct OperationDeserializer {
    tag_deserializer: U32VarIntDeserializer,
    u32_deserializer: U32VarIntDeserializer,
    u16_deserializer: U16VarIntDeserializer,
    u8_deserializer: U8Deserializer,
    bool_deserializer: BoolDeserializer,
    name_deserializer: AccountNameDeserializer,
    asset_deserializer: AssetDeserializer,
    authority_deserializer: AuthorityDeserializer,
    key_deserializer: PublicKeyDeserializer,
    time_deserializer: SigmaTimeDeserializer,
    memo_deserializer: StringDeserializer,
    short_text_deserializer: StringDeserializer,
    text_deserializer: StringDeserializer,
    bytes_deserializer: VecU8Deserializer,
    names_deserializer: VecDeserializer<AccountName, AccountNameDeserializer>,
    authorities_deserializer: VecDeserializer<Authority, AuthorityDeserializer>,
    option_authority_deserializer: OptionDeserializer<Authority, AuthorityDeserializer>,
}

impl OperationDeserializer {
    /// Creates an `OperationDeserializer`
    pub fn new() -> Self {
        Self {
            tag_deserializer: U32VarIntDeserializer::new(
                Included(0),
                Included(OperationType::VARIANT_COUNT as u32 - 1),
            ),
            u32_deserializer: U32VarIntDeserializer::new(Included(0), Included(u32::MAX)),
            u16_deserializer: U16VarIntDeserializer::new(Included(0), Included(u16::MAX)),
            u8_deserializer: U8Deserializer::new(u8::MAX),
            bool_deserializer: BoolDeserializer::new(),
            name_deserializer: AccountNameDeserializer::new(),
            asset_deserializer: AssetDeserializer::new(),
            authority_deserializer: AuthorityDeserializer::new(),
            key_deserializer: PublicKeyDeserializer::new(),
            time_deserializer: SigmaTimeDeserializer::default(),
            memo_deserializer: StringDeserializer::new(MAX_MEMO_SIZE as u32),
            short_text_deserializer: StringDeserializer::new(MAX_BOBSERVER_URL_LENGTH as u32),
            text_deserializer: StringDeserializer::new(MAX_TRANSACTION_SIZE),
            bytes_deserializer: VecU8Deserializer::new(MAX_TRANSACTION_SIZE),
            names_deserializer: VecDeserializer::new(
                AccountNameDeserializer::new(),
                MAX_CUSTOM_AUTHS,
            ),
            authorities_deserializer: VecDeserializer::new(
                AuthorityDeserializer::new(),
                MAX_CUSTOM_AUTHS,
            ),
            option_authority_deserializer: OptionDeserializer::new(AuthorityDeserializer::new()),
        }
    }

    fn name<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], AccountName, E> {
        self.name_deserializer.deserialize(input)
    }

    fn asset<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], Asset, E> {
        self.asset_deserializer.deserialize(input)
    }

    fn authority<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], Authority, E> {
        self.authority_deserializer.deserialize(input)
    }

    fn key<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], PublicKey, E> {
        self.key_deserializer.deserialize(input)
    }

    fn memo<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], String, E> {
        self.memo_deserializer.deserialize(input)
    }

    fn short_text<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], String, E> {
        self.short_text_deserializer.deserialize(input)
    }

    fn text<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], String, E> {
        self.text_deserializer.deserialize(input)
    }

    fn u32v<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], u32, E> {
        self.u32_deserializer.deserialize(input)
    }

    fn u8v<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], u8, E> {
        self.u8_deserializer.deserialize(input)
    }

    fn flag<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], bool, E> {
        self.bool_deserializer.deserialize(input)
    }

    fn time<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], SigmaTime, E> {
        self.time_deserializer.deserialize(input)
    }

    fn names<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], BTreeSet<AccountName>, E> {
        self.names_deserializer
            .deserialize(input)
            .map(|(rest, names)| (rest, names.into_iter().collect()))
    }

    fn authorities<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], Vec<Authority>, E> {
        self.authorities_deserializer.deserialize(input)
    }

    fn option_authority<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        input: &'a [u8],
    ) -> IResult<&'a [u8], Option<Authority>, E> {
        self.option_authority_deserializer.deserialize(input)
    }

    fn body<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        op_type: OperationType,
        input: &'a [u8],
    ) -> IResult<&'a [u8], Operation, E> {
        match op_type {
            OperationType::Transfer => context(
                "Failed transfer deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.name(i),
                    |i| self.asset(i),
                    |i| self.memo(i),
                )),
            )
            .map(|(from, to, amount, memo)| {
                Operation::Transfer(TransferOperation {
                    from,
                    to,
                    amount,
                    memo,
                })
            })
            .parse(input),
            OperationType::AccountCreate => context(
                "Failed account_create deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.name(i),
                    |i| self.authority(i),
                    |i| self.authority(i),
                    |i| self.authority(i),
                    |i| self.key(i),
                    |i| self.text(i),
                )),
            )
            .map(
                |(creator, new_account_name, owner, active, posting, memo_key, json_metadata)| {
                    Operation::AccountCreate(AccountCreateOperation {
                        creator,
                        new_account_name,
                        owner,
                        active,
                        posting,
                        memo_key,
                        json_metadata,
                    })
                },
            )
            .parse(input),
            OperationType::AccountUpdate => context(
                "Failed account_update deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.option_authority(i),
                    |i| self.option_authority(i),
                    |i| self.option_authority(i),
                    |i| self.key(i),
                    |i| self.text(i),
                )),
            )
            .map(|(account, owner, active, posting, memo_key, json_metadata)| {
                Operation::AccountUpdate(AccountUpdateOperation {
                    account,
                    owner,
                    active,
                    posting,
                    memo_key,
                    json_metadata,
                })
            })
            .parse(input),
            OperationType::BobserverUpdate => context(
                "Failed bobserver_update deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.name(i),
                    |i| self.short_text(i),
                    |i| self.key(i),
                )),
            )
            .map(|(root, owner, url, block_signing_key)| {
                Operation::BobserverUpdate(BobserverUpdateOperation {
                    root,
                    owner,
                    url,
                    block_signing_key,
                })
            })
            .parse(input),
            OperationType::Custom => context(
                "Failed custom deserialization",
                tuple((
                    |i| self.names(i),
                    |i| self.u16_deserializer.deserialize(i),
                    |i| self.bytes_deserializer.deserialize(i),
                )),
            )
            .map(|(required_auths, id, data)| {
                Operation::Custom(CustomOperation {
                    required_auths,
                    id,
                    data,
                })
            })
            .parse(input),
            OperationType::CustomJson => context(
                "Failed custom_json deserialization",
                tuple((
                    |i| self.names(i),
                    |i| self.names(i),
                    |i| self.short_text(i),
                    |i| self.text(i),
                )),
            )
            .map(|(required_auths, required_posting_auths, id, json)| {
                Operation::CustomJson(CustomJsonOperation {
                    required_auths,
                    required_posting_auths,
                    id,
                    json,
                })
            })
            .parse(input),
            OperationType::RequestAccountRecovery => context(
                "Failed request_account_recovery deserialization",
                tuple((|i| self.name(i), |i| self.name(i), |i| self.authority(i))),
            )
            .map(|(recovery_account, account_to_recover, new_owner_authority)| {
                Operation::RequestAccountRecovery(RequestAccountRecoveryOperation {
                    recovery_account,
                    account_to_recover,
                    new_owner_authority,
                })
            })
            .parse(input),
            OperationType::RecoverAccount => context(
                "Failed recover_account deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.authority(i),
                    |i| self.authority(i),
                )),
            )
            .map(
                |(account_to_recover, new_owner_authority, recent_owner_authority)| {
                    Operation::RecoverAccount(RecoverAccountOperation {
                        account_to_recover,
                        new_owner_authority,
                        recent_owner_authority,
                    })
                },
            )
            .parse(input),
            OperationType::ChangeRecoveryAccount => context(
                "Failed change_recovery_account deserialization",
                tuple((|i| self.name(i), |i| self.name(i))),
            )
            .map(|(account_to_recover, new_recovery_account)| {
                Operation::ChangeRecoveryAccount(ChangeRecoveryAccountOperation {
                    account_to_recover,
                    new_recovery_account,
                })
            })
            .parse(input),
            OperationType::CustomBinary => context(
                "Failed custom_binary deserialization",
                tuple((
                    |i| self.names(i),
                    |i| self.names(i),
                    |i| self.names(i),
                    |i| self.authorities(i),
                    |i| self.short_text(i),
                    |i| self.bytes_deserializer.deserialize(i),
                )),
            )
            .map(
                |(
                    required_owner_auths,
                    required_active_auths,
                    required_posting_auths,
                    required_auths,
                    id,
                    data,
                )| {
                    Operation::CustomBinary(CustomBinaryOperation {
                        required_owner_auths,
                        required_active_auths,
                        required_posting_auths,
                        required_auths,
                        id,
                        data,
                    })
                },
            )
            .parse(input),
            OperationType::DeclineVotingRights => context(
                "Failed decline_voting_rights deserialization",
                tuple((|i| self.name(i), |i| self.flag(i))),
            )
            .map(|(account, decline)| {
                Operation::DeclineVotingRights(DeclineVotingRightsOperation { account, decline })
            })
            .parse(input),
            OperationType::ResetAccount => context(
                "Failed reset_account deserialization",
                tuple((|i| self.name(i), |i| self.name(i), |i| self.authority(i))),
            )
            .map(|(reset_account, account_to_reset, new_owner_authority)| {
                Operation::ResetAccount(ResetAccountOperation {
                    reset_account,
                    account_to_reset,
                    new_owner_authority,
                })
            })
            .parse(input),
            OperationType::SetResetAccount => context(
                "Failed set_reset_account deserialization",
                tuple((|i| self.name(i), |i| self.name(i), |i| self.name(i))),
            )
            .map(|(account, current_reset_account, reset_account)| {
                Operation::SetResetAccount(SetResetAccountOperation {
                    account,
                    current_reset_account,
                    reset_account,
                })
            })
            .parse(input),
            OperationType::UpdateBproducer => context(
                "Failed update_bproducer deserialization",
                tuple((|i| self.name(i), |i| self.name(i), |i| self.flag(i))),
            )
            .map(|(root, bobserver, approve)| {
                Operation::UpdateBproducer(UpdateBproducerOperation {
                    root,
                    bobserver,
                    approve,
                })
            })
            .parse(input),
            OperationType::ExceptBobserver => context(
                "Failed except_bobserver deserialization",
                tuple((|i| self.name(i), |i| self.name(i))),
            )
            .map(|(root, bobserver)| {
                Operation::ExceptBobserver(ExceptBobserverOperation { root, bobserver })
            })
            .parse(input),
            OperationType::AccountAuth => context(
                "Failed account_auth deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.short_text(i),
                    |i| self.short_text(i),
                )),
            )
            .map(|(account, auth_type, auth_token)| {
                Operation::AccountAuth(AccountAuthOperation {
                    account,
                    auth_type,
                    auth_token,
                })
            })
            .parse(input),
            OperationType::Print => context(
                "Failed print deserialization",
                tuple((|i| self.name(i), |i| self.name(i), |i| self.asset(i))),
            )
            .map(|(root, account, amount)| {
                Operation::Print(PrintOperation {
                    root,
                    account,
                    amount,
                })
            })
            .parse(input),
            OperationType::Burn => context(
                "Failed burn deserialization",
                tuple((|i| self.name(i), |i| self.name(i), |i| self.asset(i))),
            )
            .map(|(root, account, amount)| {
                Operation::Burn(BurnOperation {
                    root,
                    account,
                    amount,
                })
            })
            .parse(input),
            OperationType::TransferSavings => context(
                "Failed transfer_savings deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.u32v(i),
                    |i| self.name(i),
                    |i| self.asset(i),
                    |i| self.asset(i),
                    |i| self.u8v(i),
                    |i| self.u8v(i),
                    |i| self.memo(i),
                    |i| self.time(i),
                )),
            )
            .map(
                |(
                    from,
                    request_id,
                    to,
                    amount,
                    total_amount,
                    split_pay_order,
                    split_pay_month,
                    memo,
                    complete,
                )| {
                    Operation::TransferSavings(TransferSavingsOperation {
                        from,
                        request_id,
                        to,
                        amount,
                        total_amount,
                        split_pay_order,
                        split_pay_month,
                        memo,
                        complete,
                    })
                },
            )
            .parse(input),
            OperationType::CancelTransferSavings => context(
                "Failed cancel_transfer_savings deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.name(i),
                    |i| self.asset(i),
                    |i| self.u32v(i),
                )),
            )
            .map(|(from, to, amount, request_id)| {
                Operation::CancelTransferSavings(CancelTransferSavingsOperation {
                    from,
                    to,
                    amount,
                    request_id,
                })
            })
            .parse(input),
            OperationType::ConclusionTransferSavings => context(
                "Failed conclusion_transfer_savings deserialization",
                tuple((|i| self.name(i), |i| self.name(i), |i| self.u32v(i))),
            )
            .map(|(from, to, request_id)| {
                Operation::ConclusionTransferSavings(ConclusionTransferSavingsOperation {
                    from,
                    to,
                    request_id,
                })
            })
            .parse(input),
            OperationType::StakingFund => context(
                "Failed staking_fund deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.short_text(i),
                    |i| self.u32v(i),
                    |i| self.asset(i),
                    |i| self.memo(i),
                    |i| self.u8v(i),
                    |i| self.u8v(i),
                )),
            )
            .map(|(from, fund_name, request_id, amount, memo, usertype, month)| {
                Operation::StakingFund(StakingFundOperation {
                    from,
                    fund_name,
                    request_id,
                    amount,
                    memo,
                    usertype,
                    month,
                })
            })
            .parse(input),
            OperationType::ConclusionStaking => context(
                "Failed conclusion_staking deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.name(i),
                    |i| self.short_text(i),
                    |i| self.u32v(i),
                )),
            )
            .map(|(root, from, fund_name, request_id)| {
                Operation::ConclusionStaking(ConclusionStakingOperation {
                    root,
                    from,
                    fund_name,
                    request_id,
                })
            })
            .parse(input),
            OperationType::TransferFund => context(
                "Failed transfer_fund deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.short_text(i),
                    |i| self.asset(i),
                    |i| self.memo(i),
                )),
            )
            .map(|(from, fund_name, amount, memo)| {
                Operation::TransferFund(TransferFundOperation {
                    from,
                    fund_name,
                    amount,
                    memo,
                })
            })
            .parse(input),
            OperationType::SetFundInterest => context(
                "Failed set_fund_interest deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.short_text(i),
                    |i| self.u8v(i),
                    |i| self.u8v(i),
                    |i| self.short_text(i),
                )),
            )
            .map(|(root, fund_name, usertype, month, percent_interest)| {
                Operation::SetFundInterest(SetFundInterestOperation {
                    root,
                    fund_name,
                    usertype,
                    month,
                    percent_interest,
                })
            })
            .parse(input),
            OperationType::ReturnStakingFund => context(
                "Failed return_staking_fund deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.short_text(i),
                    |i| self.u32v(i),
                    |i| self.name(i),
                )),
            )
            .map(|(root, fund_name, request_id, to)| {
                Operation::ReturnStakingFund(ReturnStakingFundOperation {
                    root,
                    fund_name,
                    request_id,
                    to,
                })
            })
            .parse(input),
            OperationType::CustomJsonDapp => context(
                "Failed custom_json_dapp deserialization",
                tuple((
                    |i| self.names(i),
                    |i| self.names(i),
                    |i| self.names(i),
                    |i| self.authorities(i),
                    |i| self.short_text(i),
                    |i| self.text(i),
                )),
            )
            .map(
                |(
                    required_owner_auths,
                    required_active_auths,
                    required_posting_auths,
                    required_auths,
                    id,
                    json,
                )| {
                    Operation::CustomJsonDapp(CustomJsonDappOperation {
                        required_owner_auths,
                        required_active_auths,
                        required_posting_auths,
                        required_auths,
                        id,
                        json,
                    })
                },
            )
            .parse(input),
            OperationType::ShutdownBobserver => context(
                "Failed shutdown_bobserver deserialization",
                |i| self.name(i),
            )
            .map(|owner| Operation::ShutdownBobserver(ShutdownBobserverOperation { owner }))
            .parse(input),
            OperationType::Hardfork => context("Failed hardfork deserialization", |i| self.u32v(i))
                .map(|hardfork_id| Operation::Hardfork(HardforkOperation { hardfork_id }))
                .parse(input),
            OperationType::FillStakingFund => context(
                "Failed fill_staking_fund deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.short_text(i),
                    |i| self.asset(i),
                    |i| self.u32v(i),
                    |i| self.memo(i),
                )),
            )
            .map(|(from, fund_name, amount, request_id, memo)| {
                Operation::FillStakingFund(FillStakingFundOperation {
                    from,
                    fund_name,
                    amount,
                    request_id,
                    memo,
                })
            })
            .parse(input),
            OperationType::FillTransferSavings => context(
                "Failed fill_transfer_savings deserialization",
                tuple((
                    |i| self.name(i),
                    |i| self.name(i),
                    |i| self.asset(i),
                    |i| self.asset(i),
                    |i| self.u8v(i),
                    |i| self.u8v(i),
                    |i| self.u32v(i),
                    |i| self.memo(i),
                )),
            )
            .map(
                |(
                    from,
                    to,
                    amount,
                    total_amount,
                    split_pay_order,
                    split_pay_month,
                    request_id,
                    memo,
                )| {
                    Operation::FillTransferSavings(FillTransferSavingsOperation {
                        from,
                        to,
                        amount,
                        total_amount,
                        split_pay_order,
                        split_pay_month,
                        request_id,
                        memo,
                    })
                },
            )
            .parse(input),
        }
    }
}

impl Default for OperationDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Operation> for OperationDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Operation, E> {
        context("Failed Operation deserialization", |input: &'a [u8]| {
            let (rest, tag) = context("Failed operation tag deserialization", |i| {
                self.tag_deserializer.deserialize(i)
            })(input)?;
            let op_type = OperationType::try_from(tag)
                .map_err(|_| nom::Err::Error(E::from_error_kind(input, ErrorKind::Switch)))?;
            self.body(op_type, rest)
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use sigma_serialization::deserialize_exact;
    use sigma_signature::PrivateKey;
    use std::str::FromStr;

    fn check(op: Operation) {
        let mut buffer = Vec::new();
        OperationSerializer::new().serialize(&op, &mut buffer).unwrap();
        assert_eq!(
            deserialize_exact(&OperationDeserializer::new(), &buffer).unwrap(),
            op
        );
    }

    #[test]
    fn test_representative_operations() {
        let key = PrivateKey::from_seed("alice").public_key();
        check(Operation::AccountUpdate(AccountUpdateOperation {
            account: AccountName::new("alice"),
            owner: Some(Authority::from_key(key)),
            active: None,
            posting: Some(Authority::new(1).with_account(AccountName::new("bob"), 1)),
            memo_key: key,
            json_metadata: "{}".to_string(),
        }));
        check(Operation::TransferSavings(TransferSavingsOperation {
            from: AccountName::new("alice"),
            request_id: 7,
            to: AccountName::new("bob"),
            amount: Asset::base(Amount::from_str("1.5").unwrap()),
            total_amount: Asset::base(Amount::from_str("3").unwrap()),
            split_pay_order: 1,
            split_pay_month: 2,
            memo: "rent".to_string(),
            complete: SigmaTime::from_secs(1_600_000_000),
        }));
        check(Operation::CustomBinary(CustomBinaryOperation {
            required_owner_auths: BTreeSet::new(),
            required_active_auths: BTreeSet::from([AccountName::new("alice")]),
            required_posting_auths: BTreeSet::new(),
            required_auths: vec![Authority::from_key(key)],
            id: "bobserver".to_string(),
            data: vec![1, 2, 3],
        }));
        check(Operation::Hardfork(HardforkOperation { hardfork_id: 1 }));
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let mut buffer = Vec::new();
        U32VarIntSerializer::new()
            .serialize(&(OperationType::VARIANT_COUNT as u32), &mut buffer)
            .unwrap();
        assert!(deserialize_exact(&OperationDeserializer::new(), &buffer).is_err());
    }
}
