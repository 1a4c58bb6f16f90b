// Copyright (c) 2024 SIGMA ENGINE

use crate::account::AccountName;
use crate::amount::{Amount, Asset};
use crate::authority::Authority;
use crate::operation::{Operation, TransferOperation};
use crate::transaction::{SignedTransaction, Transaction};
use sigma_hash::Hash;
use sigma_signature::PrivateKey;
use sigma_time::SigmaTime;
use std::str::FromStr;

/// Deterministic key of a test account, derived from its name
pub fn account_key(name: &str) -> PrivateKey {
    PrivateKey::from_seed(name)
}

/// Single-key authority of a test account
pub fn account_authority(name: &str) -> Authority {
    Authority::from_key(account_key(name).public_key())
}

/// Base asset parsed from a decimal string
pub fn base(amount: &str) -> Asset {
    Asset::base(Amount::from_str(amount).unwrap_or_default())
}

/// Transfer operation in the base asset
pub fn transfer(from: &str, to: &str, amount: &str) -> Operation {
    Operation::Transfer(TransferOperation {
        from: AccountName::new(from),
        to: AccountName::new(to),
        amount: base(amount),
        memo: String::new(),
    })
}

/// Transaction holding `operations`, signed by every key in `signers`
pub fn signed_transaction(
    operations: Vec<Operation>,
    expiration: SigmaTime,
    signers: &[&PrivateKey],
    chain_id: &Hash,
) -> SignedTransaction {
    let mut trx = SignedTransaction::new(Transaction {
        expiration,
        operations,
    });
    for key in signers {
        trx.sign(key, chain_id).expect("signing a test transaction");
    }
    trx
}
