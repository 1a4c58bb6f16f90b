// Copyright (c) 2024 SIGMA ENGINE

//! Operations carried by transactions, and the virtual operations the chain
//! emits while applying them.

use crate::account::AccountName;
use crate::amount::Asset;
use crate::authority::{Authority, RequiredAuthorities};
use crate::constants::{
    BASE_SYMBOL, MAX_BOBSERVER_URL_LENGTH, MAX_CUSTOM_ID_LENGTH, MAX_MEMO_SIZE, MAX_STAKING_MONTH,
    MAX_USER_TYPE,
};
use crate::ModelsError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use sigma_signature::PublicKey;
use sigma_time::SigmaTime;
use std::collections::BTreeSet;
use variant_count::VariantCount;

/// Transfers an asset between two liquid balances
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOperation {
    /// payer
    pub from: AccountName,
    /// payee
    pub to: AccountName,
    /// moved asset
    pub amount: Asset,
    /// plain-text memo
    pub memo: String,
}

/// Creates a new account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreateOperation {
    /// creator, also the initial recovery account
    pub creator: AccountName,
    /// name of the new account
    pub new_account_name: AccountName,
    /// owner authority
    pub owner: Authority,
    /// active authority
    pub active: Authority,
    /// posting authority
    pub posting: Authority,
    /// key used to encrypt memos
    pub memo_key: PublicKey,
    /// free JSON, empty or valid
    pub json_metadata: String,
}

/// Updates the authorities and metadata of an account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdateOperation {
    /// updated account
    pub account: AccountName,
    /// new owner authority, requires the owner authority
    pub owner: Option<Authority>,
    /// new active authority
    pub active: Option<Authority>,
    /// new posting authority
    pub posting: Option<Authority>,
    /// new memo key
    pub memo_key: PublicKey,
    /// new metadata, kept when empty
    pub json_metadata: String,
}

/// Registers or updates a producer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BobserverUpdateOperation {
    /// root account
    pub root: AccountName,
    /// producer account
    pub owner: AccountName,
    /// public url of the producer
    pub url: String,
    /// key signing the blocks, null to stop producing
    pub block_signing_key: PublicKey,
}

/// Opaque payload with a numeric id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomOperation {
    /// accounts approving with their active authority
    pub required_auths: BTreeSet<AccountName>,
    /// protocol id
    pub id: u16,
    /// payload
    pub data: Vec<u8>,
}

/// JSON payload dispatched to the interpreter registered under `id`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomJsonOperation {
    /// accounts approving with their active authority
    pub required_auths: BTreeSet<AccountName>,
    /// accounts approving with their posting authority
    pub required_posting_auths: BTreeSet<AccountName>,
    /// interpreter id
    pub id: String,
    /// payload
    pub json: String,
}

/// Asks for an account to be recovered to a new owner authority
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccountRecoveryOperation {
    /// recovery account of `account_to_recover`
    pub recovery_account: AccountName,
    /// account to recover
    pub account_to_recover: AccountName,
    /// proposed owner authority, threshold 0 cancels the request
    pub new_owner_authority: Authority,
}

/// Recovers an account, proving both the new and a recent owner authority
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverAccountOperation {
    /// account to recover
    pub account_to_recover: AccountName,
    /// authority from the pending request
    pub new_owner_authority: Authority,
    /// owner authority valid within the recovery window
    pub recent_owner_authority: Authority,
}

/// Changes the recovery account, effective after a delay
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecoveryAccountOperation {
    /// account whose recovery account changes
    pub account_to_recover: AccountName,
    /// new recovery account
    pub new_recovery_account: AccountName,
}

/// Binary payload with full authority declarations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomBinaryOperation {
    /// accounts approving with their owner authority
    pub required_owner_auths: BTreeSet<AccountName>,
    /// accounts approving with their active authority
    pub required_active_auths: BTreeSet<AccountName>,
    /// accounts approving with their posting authority
    pub required_posting_auths: BTreeSet<AccountName>,
    /// raw authorities
    pub required_auths: Vec<Authority>,
    /// interpreter id
    pub id: String,
    /// payload
    pub data: Vec<u8>,
}

/// Declines, or cancels declining, voting rights
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclineVotingRightsOperation {
    /// account
    pub account: AccountName,
    /// `true` declines, `false` cancels a pending decline
    pub decline: bool,
}

/// Disabled on this chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetAccountOperation {
    /// reset account
    pub reset_account: AccountName,
    /// account to reset
    pub account_to_reset: AccountName,
    /// new owner authority
    pub new_owner_authority: Authority,
}

/// Disabled on this chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetResetAccountOperation {
    /// account
    pub account: AccountName,
    /// current reset account, may be empty
    pub current_reset_account: AccountName,
    /// new reset account
    pub reset_account: AccountName,
}

/// Flags a producer as block producer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBproducerOperation {
    /// root account
    pub root: AccountName,
    /// producer
    pub bobserver: AccountName,
    /// flag value
    pub approve: bool,
}

/// Excludes a producer from the next schedule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptBobserverOperation {
    /// root account
    pub root: AccountName,
    /// producer
    pub bobserver: AccountName,
}

/// Stores an external authentication token for an account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAuthOperation {
    /// account
    pub account: AccountName,
    /// kind of token
    pub auth_type: String,
    /// token
    pub auth_token: String,
}

/// Mints into an account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintOperation {
    /// root account
    pub root: AccountName,
    /// credited account
    pub account: AccountName,
    /// minted asset
    pub amount: Asset,
}

/// Destroys from an account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnOperation {
    /// root account
    pub root: AccountName,
    /// debited account
    pub account: AccountName,
    /// destroyed asset
    pub amount: Asset,
}

/// Moves liquid funds into someone's savings until `complete`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSavingsOperation {
    /// payer
    pub from: AccountName,
    /// request id, unique per payer
    pub request_id: u32,
    /// beneficiary
    pub to: AccountName,
    /// amount of this installment
    pub amount: Asset,
    /// amount of the whole plan
    pub total_amount: Asset,
    /// installment number
    pub split_pay_order: u8,
    /// number of installments
    pub split_pay_month: u8,
    /// memo
    pub memo: String,
    /// maturity
    pub complete: SigmaTime,
}

/// Cancels a savings transfer before it matures
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTransferSavingsOperation {
    /// payer
    pub from: AccountName,
    /// beneficiary
    pub to: AccountName,
    /// refunded amount, at least the pending amount
    pub amount: Asset,
    /// request id
    pub request_id: u32,
}

/// Releases a matured savings transfer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConclusionTransferSavingsOperation {
    /// payer
    pub from: AccountName,
    /// beneficiary
    pub to: AccountName,
    /// request id
    pub request_id: u32,
}

/// Stakes liquid funds into a common fund for a number of months
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingFundOperation {
    /// staker
    pub from: AccountName,
    /// fund
    pub fund_name: String,
    /// request id
    pub request_id: u32,
    /// staked amount
    pub amount: Asset,
    /// memo
    pub memo: String,
    /// user type selecting the interest row
    pub usertype: u8,
    /// staking duration in months
    pub month: u8,
}

/// Pays out a matured stake
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConclusionStakingOperation {
    /// root account
    pub root: AccountName,
    /// staker
    pub from: AccountName,
    /// fund
    pub fund_name: String,
    /// request id
    pub request_id: u32,
}

/// Moves liquid funds into a common fund
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFundOperation {
    /// payer
    pub from: AccountName,
    /// fund
    pub fund_name: String,
    /// amount
    pub amount: Asset,
    /// memo
    pub memo: String,
}

/// Sets one interest cell of a fund
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetFundInterestOperation {
    /// root account
    pub root: AccountName,
    /// fund
    pub fund_name: String,
    /// user type row
    pub usertype: u8,
    /// month column
    pub month: u8,
    /// decimal percentage
    pub percent_interest: String,
}

/// Returns a stake to its owner regardless of maturity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnStakingFundOperation {
    /// root account
    pub root: AccountName,
    /// fund
    pub fund_name: String,
    /// request id
    pub request_id: u32,
    /// staker
    pub to: AccountName,
}

/// JSON payload with full authority declarations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomJsonDappOperation {
    /// accounts approving with their owner authority
    pub required_owner_auths: BTreeSet<AccountName>,
    /// accounts approving with their active authority
    pub required_active_auths: BTreeSet<AccountName>,
    /// accounts approving with their posting authority
    pub required_posting_auths: BTreeSet<AccountName>,
    /// raw authorities
    pub required_auths: Vec<Authority>,
    /// interpreter id
    pub id: String,
    /// payload
    pub json: String,
}

/// Emitted when an excepted producer loses its signing key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownBobserverOperation {
    /// producer
    pub owner: AccountName,
}

/// Emitted when a hardfork activates
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardforkOperation {
    /// index of the hardfork
    pub hardfork_id: u32,
}

/// Emitted when a stake is paid out
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillStakingFundOperation {
    /// staker
    pub from: AccountName,
    /// fund
    pub fund_name: String,
    /// paid amount, principal and interest
    pub amount: Asset,
    /// request id
    pub request_id: u32,
    /// memo of the stake
    pub memo: String,
}

/// Emitted when a savings transfer matures
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillTransferSavingsOperation {
    /// payer
    pub from: AccountName,
    /// beneficiary
    pub to: AccountName,
    /// released amount
    pub amount: Asset,
    /// amount of the whole plan
    pub total_amount: Asset,
    /// installment number
    pub split_pay_order: u8,
    /// number of installments
    pub split_pay_month: u8,
    /// request id
    pub request_id: u32,
    /// memo
    pub memo: String,
}

/// Binary tag of each operation
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, VariantCount,
)]
#[repr(u32)]
#[allow(missing_docs)]
pub enum OperationType {
    Transfer = 0,
    AccountCreate = 1,
    AccountUpdate = 2,
    BobserverUpdate = 3,
    Custom = 4,
    CustomJson = 5,
    RequestAccountRecovery = 6,
    RecoverAccount = 7,
    ChangeRecoveryAccount = 8,
    CustomBinary = 9,
    DeclineVotingRights = 10,
    ResetAccount = 11,
    SetResetAccount = 12,
    UpdateBproducer = 13,
    ExceptBobserver = 14,
    AccountAuth = 15,
    Print = 16,
    Burn = 17,
    TransferSavings = 18,
    CancelTransferSavings = 19,
    ConclusionTransferSavings = 20,
    StakingFund = 21,
    ConclusionStaking = 22,
    TransferFund = 23,
    SetFundInterest = 24,
    ReturnStakingFund = 25,
    CustomJsonDapp = 26,
    ShutdownBobserver = 27,
    Hardfork = 28,
    FillStakingFund = 29,
    FillTransferSavings = 30,
}

/// Every operation, submitted or virtual
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Operation {
    Transfer(TransferOperation),
    AccountCreate(AccountCreateOperation),
    AccountUpdate(AccountUpdateOperation),
    BobserverUpdate(BobserverUpdateOperation),
    Custom(CustomOperation),
    CustomJson(CustomJsonOperation),
    RequestAccountRecovery(RequestAccountRecoveryOperation),
    RecoverAccount(RecoverAccountOperation),
    ChangeRecoveryAccount(ChangeRecoveryAccountOperation),
    CustomBinary(CustomBinaryOperation),
    DeclineVotingRights(DeclineVotingRightsOperation),
    ResetAccount(ResetAccountOperation),
    SetResetAccount(SetResetAccountOperation),
    UpdateBproducer(UpdateBproducerOperation),
    ExceptBobserver(ExceptBobserverOperation),
    AccountAuth(AccountAuthOperation),
    Print(PrintOperation),
    Burn(BurnOperation),
    TransferSavings(TransferSavingsOperation),
    CancelTransferSavings(CancelTransferSavingsOperation),
    ConclusionTransferSavings(ConclusionTransferSavingsOperation),
    StakingFund(StakingFundOperation),
    ConclusionStaking(ConclusionStakingOperation),
    TransferFund(TransferFundOperation),
    SetFundInterest(SetFundInterestOperation),
    ReturnStakingFund(ReturnStakingFundOperation),
    CustomJsonDapp(CustomJsonDappOperation),
    ShutdownBobserver(ShutdownBobserverOperation),
    Hardfork(HardforkOperation),
    FillStakingFund(FillStakingFundOperation),
    FillTransferSavings(FillTransferSavingsOperation),
}

fn ensure(condition: bool, message: &str) -> Result<(), ModelsError> {
    if condition {
        Ok(())
    } else {
        Err(ModelsError::InvalidOperation(message.to_string()))
    }
}

fn validate_memo(memo: &str) -> Result<(), ModelsError> {
    ensure(memo.len() < MAX_MEMO_SIZE, "memo is too large")
}

fn validate_json(json: &str) -> Result<(), ModelsError> {
    serde_json::from_str::<serde_json::Value>(json)
        .map(|_| ())
        .map_err(|err| ModelsError::InvalidOperation(format!("invalid JSON: {}", err)))
}

fn validate_base_amount(asset: &Asset) -> Result<(), ModelsError> {
    ensure(!asset.amount.is_zero(), "amount must be positive")?;
    ensure(asset.symbol == BASE_SYMBOL, "only the base asset is accepted")
}

fn validate_custom_auths(
    owner: &BTreeSet<AccountName>,
    active: &BTreeSet<AccountName>,
    posting: &BTreeSet<AccountName>,
    other: &[Authority],
    id: &str,
) -> Result<(), ModelsError> {
    ensure(
        owner.len() + active.len() + posting.len() + other.len() > 0,
        "at least one account must be specified",
    )?;
    ensure(id.len() <= MAX_CUSTOM_ID_LENGTH, "id is too long")?;
    other.iter().try_for_each(Authority::validate)
}

impl Operation {
    /// Binary tag
    pub fn op_type(&self) -> OperationType {
        match self {
            Operation::Transfer(_) => OperationType::Transfer,
            Operation::AccountCreate(_) => OperationType::AccountCreate,
            Operation::AccountUpdate(_) => OperationType::AccountUpdate,
            Operation::BobserverUpdate(_) => OperationType::BobserverUpdate,
            Operation::Custom(_) => OperationType::Custom,
            Operation::CustomJson(_) => OperationType::CustomJson,
            Operation::RequestAccountRecovery(_) => OperationType::RequestAccountRecovery,
            Operation::RecoverAccount(_) => OperationType::RecoverAccount,
            Operation::ChangeRecoveryAccount(_) => OperationType::ChangeRecoveryAccount,
            Operation::CustomBinary(_) => OperationType::CustomBinary,
            Operation::DeclineVotingRights(_) => OperationType::DeclineVotingRights,
            Operation::ResetAccount(_) => OperationType::ResetAccount,
            Operation::SetResetAccount(_) => OperationType::SetResetAccount,
            Operation::UpdateBproducer(_) => OperationType::UpdateBproducer,
            Operation::ExceptBobserver(_) => OperationType::ExceptBobserver,
            Operation::AccountAuth(_) => OperationType::AccountAuth,
            Operation::Print(_) => OperationType::Print,
            Operation::Burn(_) => OperationType::Burn,
            Operation::TransferSavings(_) => OperationType::TransferSavings,
            Operation::CancelTransferSavings(_) => OperationType::CancelTransferSavings,
            Operation::ConclusionTransferSavings(_) => OperationType::ConclusionTransferSavings,
            Operation::StakingFund(_) => OperationType::StakingFund,
            Operation::ConclusionStaking(_) => OperationType::ConclusionStaking,
            Operation::TransferFund(_) => OperationType::TransferFund,
            Operation::SetFundInterest(_) => OperationType::SetFundInterest,
            Operation::ReturnStakingFund(_) => OperationType::ReturnStakingFund,
            Operation::CustomJsonDapp(_) => OperationType::CustomJsonDapp,
            Operation::ShutdownBobserver(_) => OperationType::ShutdownBobserver,
            Operation::Hardfork(_) => OperationType::Hardfork,
            Operation::FillStakingFund(_) => OperationType::FillStakingFund,
            Operation::FillTransferSavings(_) => OperationType::FillTransferSavings,
        }
    }

    /// Operations produced by the chain itself, never accepted in a transaction
    pub fn is_virtual(&self) -> bool {
        matches!(
            self,
            Operation::ShutdownBobserver(_)
                | Operation::Hardfork(_)
                | Operation::FillStakingFund(_)
                | Operation::FillTransferSavings(_)
        )
    }

    /// Stateless checks
    pub fn validate(&self) -> Result<(), ModelsError> {
        match self {
            Operation::Transfer(op) => {
                op.from.validate()?;
                op.to.validate()?;
                ensure(!op.amount.amount.is_zero(), "cannot transfer a zero amount")?;
                op.amount.symbol.validate()?;
                validate_memo(&op.memo)
            }
            Operation::AccountCreate(op) => {
                op.creator.validate()?;
                op.new_account_name.validate()?;
                op.owner.validate()?;
                op.active.validate()?;
                op.posting.validate()?;
                if !op.json_metadata.is_empty() {
                    validate_json(&op.json_metadata)?;
                }
                Ok(())
            }
            Operation::AccountUpdate(op) => {
                op.account.validate()?;
                for authority in [&op.owner, &op.active, &op.posting].into_iter().flatten() {
                    authority.validate()?;
                }
                if !op.json_metadata.is_empty() {
                    validate_json(&op.json_metadata)?;
                }
                Ok(())
            }
            Operation::BobserverUpdate(op) => {
                op.root.validate()?;
                op.owner.validate()?;
                ensure(op.url.len() <= MAX_BOBSERVER_URL_LENGTH, "url is too long")
            }
            Operation::Custom(op) => ensure(
                !op.required_auths.is_empty(),
                "at least one account must be specified",
            ),
            Operation::CustomJson(op) => {
                ensure(
                    op.required_auths.len() + op.required_posting_auths.len() > 0,
                    "at least one account must be specified",
                )?;
                ensure(op.id.len() <= MAX_CUSTOM_ID_LENGTH, "id is too long")?;
                validate_json(&op.json)
            }
            Operation::CustomJsonDapp(op) => {
                validate_custom_auths(
                    &op.required_owner_auths,
                    &op.required_active_auths,
                    &op.required_posting_auths,
                    &op.required_auths,
                    &op.id,
                )?;
                validate_json(&op.json)
            }
            Operation::CustomBinary(op) => validate_custom_auths(
                &op.required_owner_auths,
                &op.required_active_auths,
                &op.required_posting_auths,
                &op.required_auths,
                &op.id,
            ),
            Operation::RequestAccountRecovery(op) => {
                op.recovery_account.validate()?;
                op.account_to_recover.validate()?;
                op.new_owner_authority.validate()
            }
            Operation::RecoverAccount(op) => {
                op.account_to_recover.validate()?;
                ensure(
                    op.new_owner_authority != op.recent_owner_authority,
                    "cannot set new owner authority to the recent owner authority",
                )?;
                ensure(
                    !op.new_owner_authority.is_impossible(),
                    "new owner authority cannot be impossible",
                )?;
                ensure(
                    !op.recent_owner_authority.is_impossible(),
                    "recent owner authority cannot be impossible",
                )?;
                ensure(
                    op.new_owner_authority.weight_threshold > 0,
                    "new owner authority cannot be trivial",
                )?;
                op.new_owner_authority.validate()?;
                op.recent_owner_authority.validate()
            }
            Operation::ChangeRecoveryAccount(op) => {
                op.account_to_recover.validate()?;
                op.new_recovery_account.validate()
            }
            Operation::DeclineVotingRights(op) => op.account.validate(),
            Operation::ResetAccount(op) => {
                op.reset_account.validate()?;
                op.account_to_reset.validate()?;
                ensure(
                    !op.new_owner_authority.is_impossible(),
                    "new owner authority cannot be impossible",
                )?;
                ensure(
                    op.new_owner_authority.weight_threshold > 0,
                    "new owner authority cannot be trivial",
                )?;
                op.new_owner_authority.validate()
            }
            Operation::SetResetAccount(op) => {
                op.account.validate()?;
                if !op.current_reset_account.is_empty() {
                    op.current_reset_account.validate()?;
                }
                op.reset_account.validate()?;
                ensure(
                    op.current_reset_account != op.reset_account,
                    "new reset account cannot be current reset account",
                )
            }
            Operation::UpdateBproducer(op) => {
                op.root.validate()?;
                op.bobserver.validate()
            }
            Operation::ExceptBobserver(op) => {
                op.root.validate()?;
                op.bobserver.validate()
            }
            Operation::AccountAuth(op) => op.account.validate(),
            Operation::Print(op) => {
                op.account.validate()?;
                ensure(!op.amount.amount.is_zero(), "amount must be positive")?;
                op.amount.symbol.validate()
            }
            Operation::Burn(op) => {
                op.account.validate()?;
                ensure(!op.amount.amount.is_zero(), "amount must be positive")?;
                op.amount.symbol.validate()
            }
            Operation::TransferSavings(op) => {
                op.from.validate()?;
                op.to.validate()?;
                validate_base_amount(&op.amount)?;
                validate_memo(&op.memo)
            }
            Operation::CancelTransferSavings(op) => op.from.validate(),
            Operation::ConclusionTransferSavings(op) => op.from.validate(),
            Operation::StakingFund(op) => {
                op.from.validate()?;
                ensure(!op.fund_name.is_empty(), "fund name is empty")?;
                validate_base_amount(&op.amount)?;
                ensure((op.usertype as usize) < MAX_USER_TYPE, "invalid user type")?;
                ensure(
                    op.month >= 1 && op.month as usize <= MAX_STAKING_MONTH,
                    "invalid staking month",
                )?;
                validate_memo(&op.memo)
            }
            Operation::ConclusionStaking(op) => {
                op.from.validate()?;
                ensure(!op.fund_name.is_empty(), "fund name is empty")
            }
            Operation::ReturnStakingFund(op) => {
                op.to.validate()?;
                ensure(!op.fund_name.is_empty(), "fund name is empty")
            }
            Operation::TransferFund(op) => {
                op.from.validate()?;
                ensure(!op.fund_name.is_empty(), "fund name is empty")?;
                validate_base_amount(&op.amount)?;
                validate_memo(&op.memo)
            }
            Operation::SetFundInterest(op) => {
                op.root.validate()?;
                ensure(!op.fund_name.is_empty(), "fund name is empty")?;
                ensure((op.usertype as usize) < MAX_USER_TYPE, "invalid user type")?;
                ensure(
                    op.month >= 1 && op.month as usize <= MAX_STAKING_MONTH,
                    "invalid staking month",
                )?;
                ensure(!op.percent_interest.is_empty(), "percent interest is empty")
            }
            Operation::ShutdownBobserver(_)
            | Operation::Hardfork(_)
            | Operation::FillStakingFund(_)
            | Operation::FillTransferSavings(_) => Err(ModelsError::InvalidOperation(
                "virtual operations cannot be submitted".to_string(),
            )),
        }
    }

    /// Authorities that must approve the operation
    pub fn required_authorities(&self) -> RequiredAuthorities {
        let mut required = RequiredAuthorities::default();
        match self {
            Operation::Transfer(op) => {
                required.active.insert(op.from.clone());
            }
            Operation::AccountCreate(op) => {
                required.active.insert(op.creator.clone());
            }
            Operation::AccountUpdate(op) => {
                if op.owner.is_some() {
                    required.owner.insert(op.account.clone());
                } else {
                    required.active.insert(op.account.clone());
                }
            }
            Operation::BobserverUpdate(op) => {
                required.active.insert(op.root.clone());
            }
            Operation::Custom(op) => {
                required.active.extend(op.required_auths.iter().cloned());
            }
            Operation::CustomJson(op) => {
                required.active.extend(op.required_auths.iter().cloned());
                required
                    .posting
                    .extend(op.required_posting_auths.iter().cloned());
            }
            Operation::CustomBinary(CustomBinaryOperation {
                required_owner_auths,
                required_active_auths,
                required_posting_auths,
                required_auths,
                ..
            })
            | Operation::CustomJsonDapp(CustomJsonDappOperation {
                required_owner_auths,
                required_active_auths,
                required_posting_auths,
                required_auths,
                ..
            }) => {
                required.owner.extend(required_owner_auths.iter().cloned());
                required.active.extend(required_active_auths.iter().cloned());
                required
                    .posting
                    .extend(required_posting_auths.iter().cloned());
                required.other.extend(required_auths.iter().cloned());
            }
            Operation::RequestAccountRecovery(op) => {
                required.active.insert(op.recovery_account.clone());
            }
            Operation::RecoverAccount(op) => {
                required.other.push(op.new_owner_authority.clone());
                required.other.push(op.recent_owner_authority.clone());
            }
            Operation::ChangeRecoveryAccount(op) => {
                required.owner.insert(op.account_to_recover.clone());
            }
            Operation::DeclineVotingRights(op) => {
                required.owner.insert(op.account.clone());
            }
            Operation::ResetAccount(op) => {
                required.active.insert(op.reset_account.clone());
            }
            Operation::SetResetAccount(op) => {
                if op.current_reset_account.is_empty() {
                    required.posting.insert(op.account.clone());
                } else {
                    required.owner.insert(op.account.clone());
                }
            }
            Operation::UpdateBproducer(UpdateBproducerOperation { root, .. })
            | Operation::ExceptBobserver(ExceptBobserverOperation { root, .. })
            | Operation::Print(PrintOperation { root, .. })
            | Operation::Burn(BurnOperation { root, .. })
            | Operation::ConclusionStaking(ConclusionStakingOperation { root, .. })
            | Operation::SetFundInterest(SetFundInterestOperation { root, .. })
            | Operation::ReturnStakingFund(ReturnStakingFundOperation { root, .. }) => {
                required.active.insert(root.clone());
            }
            Operation::AccountAuth(op) => {
                required.active.insert(op.account.clone());
            }
            Operation::TransferSavings(TransferSavingsOperation { from, .. })
            | Operation::CancelTransferSavings(CancelTransferSavingsOperation { from, .. })
            | Operation::ConclusionTransferSavings(ConclusionTransferSavingsOperation {
                from,
                ..
            })
            | Operation::StakingFund(StakingFundOperation { from, .. })
            | Operation::TransferFund(TransferFundOperation { from, .. }) => {
                required.active.insert(from.clone());
            }
            Operation::ShutdownBobserver(_)
            | Operation::Hardfork(_)
            | Operation::FillStakingFund(_)
            | Operation::FillTransferSavings(_) => {}
        }
        required
    }

    /// Accounts whose history records this operation
    pub fn impacted_accounts(&self) -> BTreeSet<AccountName> {
        let required = self.required_authorities();
        let mut impacted: BTreeSet<AccountName> = required
            .owner
            .into_iter()
            .chain(required.active)
            .chain(required.posting)
            .collect();
        let mut add = |name: &AccountName| {
            if !name.is_empty() {
                impacted.insert(name.clone());
            }
        };
        match self {
            Operation::Transfer(op) => add(&op.to),
            Operation::AccountCreate(op) => add(&op.new_account_name),
            Operation::BobserverUpdate(op) => add(&op.owner),
            Operation::RequestAccountRecovery(op) => add(&op.account_to_recover),
            Operation::RecoverAccount(op) => add(&op.account_to_recover),
            Operation::ShutdownBobserver(op) => add(&op.owner),
            Operation::UpdateBproducer(op) => add(&op.bobserver),
            Operation::ExceptBobserver(op) => add(&op.bobserver),
            Operation::Print(op) => add(&op.account),
            Operation::Burn(op) => add(&op.account),
            Operation::TransferSavings(op) => add(&op.to),
            Operation::CancelTransferSavings(op) => add(&op.to),
            Operation::ConclusionTransferSavings(op) => add(&op.to),
            Operation::FillTransferSavings(op) => {
                add(&op.from);
                add(&op.to);
            }
            Operation::ConclusionStaking(op) => add(&op.from),
            Operation::FillStakingFund(op) => add(&op.from),
            Operation::ReturnStakingFund(op) => add(&op.to),
            _ => {}
        }
        impacted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use assert_matches::assert_matches;
    use std::str::FromStr;

    fn transfer(amount: &str) -> Operation {
        Operation::Transfer(TransferOperation {
            from: AccountName::new("alice"),
            to: AccountName::new("bob"),
            amount: Asset::base(Amount::from_str(amount).unwrap()),
            memo: String::new(),
        })
    }

    #[test]
    fn test_tags_are_dense() {
        assert_eq!(OperationType::VARIANT_COUNT, 31);
        assert_eq!(u32::from(OperationType::CustomJsonDapp), 26);
        assert_eq!(transfer("1").op_type(), OperationType::Transfer);
    }

    #[test]
    fn test_transfer_validation() {
        transfer("1").validate().unwrap();
        assert_matches!(
            transfer("0").validate(),
            Err(ModelsError::InvalidOperation(_))
        );
        assert_eq!(
            transfer("1").required_authorities().active,
            BTreeSet::from([AccountName::new("alice")])
        );
    }

    #[test]
    fn test_account_update_tier() {
        let mut op = AccountUpdateOperation {
            account: AccountName::new("alice"),
            owner: None,
            active: None,
            posting: None,
            memo_key: PublicKey::default(),
            json_metadata: String::new(),
        };
        let required = Operation::AccountUpdate(op.clone()).required_authorities();
        assert!(required.owner.is_empty());
        assert_eq!(required.active.len(), 1);
        op.owner = Some(Authority::new(1));
        let required = Operation::AccountUpdate(op).required_authorities();
        assert_eq!(required.owner.len(), 1);
        assert!(required.active.is_empty());
    }

    #[test]
    fn test_virtual_operations_are_rejected() {
        let op = Operation::Hardfork(HardforkOperation { hardfork_id: 1 });
        assert!(op.is_virtual());
        assert!(op.validate().is_err());
        assert!(op.required_authorities().is_empty());
    }

    #[test]
    fn test_staking_bounds() {
        let mut op = StakingFundOperation {
            from: AccountName::new("alice"),
            fund_name: "deposit".to_string(),
            request_id: 0,
            amount: Asset::base(Amount::from_str("10").unwrap()),
            memo: String::new(),
            usertype: 0,
            month: 12,
        };
        Operation::StakingFund(op.clone()).validate().unwrap();
        op.month = 13;
        assert!(Operation::StakingFund(op.clone()).validate().is_err());
        op.month = 1;
        op.usertype = 2;
        assert!(Operation::StakingFund(op).validate().is_err());
    }
}
