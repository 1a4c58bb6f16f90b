// Copyright (c) 2024 SIGMA ENGINE

use crate::authority::RequiredAuthorities;
use crate::constants::MAX_TRANSACTION_SIZE;
use crate::error::{ModelsError, ModelsResult};
use crate::operation::Operation;
use crate::operation_codec::{OperationDeserializer, OperationSerializer};
use nom::error::{context, ContextError, ParseError};
use nom::sequence::tuple;
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use sigma_hash::Hash;
use sigma_serialization::{
    Deserializer, SerializeError, Serializer, VecDeserializer, VecSerializer,
};
use sigma_signature::{
    PrivateKey, PublicKey, Signature, SignatureDeserializer, SignatureSerializer,
};
use sigma_time::{SigmaTime, SigmaTimeDeserializer, SigmaTimeSerializer};
use std::collections::BTreeSet;

/// Maximal number of operations in a transaction
pub const MAX_OPERATIONS_PER_TRANSACTION: u32 = 1024;
/// Maximal number of signatures attached to a transaction
pub const MAX_SIGNATURES_PER_TRANSACTION: u32 = 256;

/// Transaction identifier: hash of the unsigned transaction bytes
pub type TransactionId = Hash;

/// An ordered list of operations applied atomically
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// the transaction is rejected once the head block time reaches this point
    pub expiration: SigmaTime,
    /// operations, applied in order
    pub operations: Vec<Operation>,
}

impl Transaction {
    /// Canonical binary encoding
    pub fn to_bytes(&self) -> ModelsResult<Vec<u8>> {
        let mut buffer = Vec::new();
        TransactionSerializer::new().serialize(self, &mut buffer)?;
        Ok(buffer)
    }

    /// Hash of the encoded transaction
    pub fn id(&self) -> ModelsResult<TransactionId> {
        Ok(Hash::compute_from(&self.to_bytes()?))
    }

    /// Digest that signers sign: the chain id followed by the transaction bytes
    pub fn sig_digest(&self, chain_id: &Hash) -> ModelsResult<Hash> {
        let bytes = self.to_bytes()?;
        Ok(Hash::compute_from_tuple(&[chain_id.to_bytes().as_slice(), bytes.as_slice()]))
    }

    /// Structural checks that do not need any state
    pub fn validate(&self) -> ModelsResult<()> {
        if self.operations.is_empty() {
            return Err(ModelsError::InvalidTransaction(
                "a transaction must contain at least one operation".to_string(),
            ));
        }
        for op in &self.operations {
            op.validate()?;
        }
        Ok(())
    }

    /// Union of the authorities required by every operation
    pub fn required_authorities(&self) -> RequiredAuthorities {
        let mut required = RequiredAuthorities::default();
        for op in &self.operations {
            required.extend(op.required_authorities());
        }
        required
    }
}

/// A transaction with the signatures over its digest
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// signed content
    pub transaction: Transaction,
    /// signatures over `transaction.sig_digest(chain_id)`
    pub signatures: Vec<Signature>,
}

impl SignedTransaction {
    /// Wraps a transaction without any signature
    pub fn new(transaction: Transaction) -> Self {
        SignedTransaction {
            transaction,
            signatures: Vec::new(),
        }
    }

    /// Appends a signature made with `key`
    pub fn sign(&mut self, key: &PrivateKey, chain_id: &Hash) -> ModelsResult<&Signature> {
        let digest = self.transaction.sig_digest(chain_id)?;
        self.signatures.push(key.sign(&digest)?);
        self.signatures
            .last()
            .ok_or_else(|| ModelsError::InvalidTransaction("signature was not stored".to_string()))
    }

    /// Builder flavour of `sign`
    pub fn signed_by(mut self, key: &PrivateKey, chain_id: &Hash) -> ModelsResult<Self> {
        self.sign(key, chain_id)?;
        Ok(self)
    }

    /// Transaction identifier, signatures excluded
    pub fn id(&self) -> ModelsResult<TransactionId> {
        self.transaction.id()
    }

    /// Public keys recovered from the signatures.
    ///
    /// Two signatures resolving to the same key make the transaction invalid.
    pub fn signature_keys(&self, chain_id: &Hash) -> ModelsResult<BTreeSet<PublicKey>> {
        let digest = self.transaction.sig_digest(chain_id)?;
        let mut keys = BTreeSet::new();
        for signature in &self.signatures {
            let key = signature.recover(&digest)?;
            if !keys.insert(key) {
                return Err(ModelsError::InvalidTransaction(format!(
                    "duplicate signature from {}",
                    key
                )));
            }
        }
        Ok(keys)
    }

    /// Size of the canonical encoding, signatures included
    pub fn serialized_size(&self) -> ModelsResult<usize> {
        let mut buffer = Vec::new();
        SignedTransactionSerializer::new().serialize(self, &mut buffer)?;
        Ok(buffer.len())
    }
}

/// Serializer for `Transaction`
pub struct TransactionSerializer {
    time_serializer: SigmaTimeSerializer,
    operations_serializer: VecSerializer<Operation, OperationSerializer>,
}

impl TransactionSerializer {
    /// Creates a `TransactionSerializer`
    pub fn new() -> Self {
        Self {
            time_serializer: SigmaTimeSerializer::new(),
            operations_serializer: VecSerializer::new(OperationSerializer::new()),
        }
    }
}

impl Default for TransactionSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<Transaction> for TransactionSerializer {
    fn serialize(&self, value: &Transaction, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.time_serializer.serialize(&value.expiration, buffer)?;
        self.operations_serializer
            .serialize(&value.operations, buffer)
    }
}

/// Deserializer for `Transaction`
pub struct TransactionDeserializer {
    time_deserializer: SigmaTimeDeserializer,
    operations_deserializer: VecDeserializer<Operation, OperationDeserializer>,
}

impl TransactionDeserializer {
    /// Creates a `TransactionDeserializer`
    pub fn new() -> Self {
        Self {
            time_deserializer: SigmaTimeDeserializer::default(),
            operations_deserializer: VecDeserializer::new(
                OperationDeserializer::new(),
                MAX_OPERATIONS_PER_TRANSACTION,
            ),
        }
    }
}

impl Default for TransactionDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Transaction> for TransactionDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Transaction, E> {
        context(
            "Failed Transaction deserialization",
            tuple((
                context("Failed expiration deserialization", |input| {
                    self.time_deserializer.deserialize(input)
                }),
                context("Failed operations deserialization", |input| {
                    self.operations_deserializer.deserialize(input)
                }),
            )),
        )
        .map(|(expiration, operations)| Transaction {
            expiration,
            operations,
        })
        .parse(buffer)
    }
}

/// Serializer for `SignedTransaction`
pub struct SignedTransactionSerializer {
    transaction_serializer: TransactionSerializer,
    signatures_serializer: VecSerializer<Signature, SignatureSerializer>,
}

impl SignedTransactionSerializer {
    /// Creates a `SignedTransactionSerializer`
    pub fn new() -> Self {
        Self {
            transaction_serializer: TransactionSerializer::new(),
            signatures_serializer: VecSerializer::new(SignatureSerializer::new()),
        }
    }
}

impl Default for SignedTransactionSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<SignedTransaction> for SignedTransactionSerializer {
    fn serialize(
        &self,
        value: &SignedTransaction,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.transaction_serializer
            .serialize(&value.transaction, buffer)?;
        self.signatures_serializer
            .serialize(&value.signatures, buffer)?;
        if buffer.len() > MAX_TRANSACTION_SIZE as usize {
            return Err(SerializeError::GeneralError(format!(
                "transaction of {} bytes exceeds the maximal size",
                buffer.len()
            )));
        }
        Ok(())
    }
}

/// Deserializer for `SignedTransaction`
pub struct SignedTransactionDeserializer {
    transaction_deserializer: TransactionDeserializer,
    signatures_deserializer: VecDeserializer<Signature, SignatureDeserializer>,
}

impl SignedTransactionDeserializer {
    /// Creates a `SignedTransactionDeserializer`
    pub fn new() -> Self {
        Self {
            transaction_deserializer: TransactionDeserializer::new(),
            signatures_deserializer: VecDeserializer::new(
                SignatureDeserializer::new(),
                MAX_SIGNATURES_PER_TRANSACTION,
            ),
        }
    }
}

impl Default for SignedTransactionDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<SignedTransaction> for SignedTransactionDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], SignedTransaction, E> {
        context(
            "Failed SignedTransaction deserialization",
            tuple((
                |input| self.transaction_deserializer.deserialize(input),
                context("Failed signatures deserialization", |input| {
                    self.signatures_deserializer.deserialize(input)
                }),
            )),
        )
        .map(|(transaction, signatures)| SignedTransaction {
            transaction,
            signatures,
        })
        .parse(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountName;
    use crate::amount::{Amount, Asset};
    use crate::operation::TransferOperation;
    use assert_matches::assert_matches;
    use sigma_serialization::deserialize_exact;

    fn transfer() -> Transaction {
        Transaction {
            expiration: SigmaTime::from_secs(1_600_000_060),
            operations: vec![Operation::Transfer(TransferOperation {
                from: AccountName::new("alice"),
                to: AccountName::new("bob"),
                amount: Asset::base(Amount::from_raw(1_000_000)),
                memo: String::new(),
            })],
        }
    }

    #[test]
    fn test_signature_keys_match_signers() {
        let chain_id = Hash::compute_from(b"testnet");
        let alice = PrivateKey::from_seed("alice");
        let bob = PrivateKey::from_seed("bob");
        let trx = SignedTransaction::new(transfer())
            .signed_by(&alice, &chain_id)
            .unwrap()
            .signed_by(&bob, &chain_id)
            .unwrap();
        let keys = trx.signature_keys(&chain_id).unwrap();
        assert_eq!(
            keys,
            BTreeSet::from([alice.public_key(), bob.public_key()])
        );

        let other_chain = Hash::compute_from(b"mainnet");
        let foreign = trx
            .signature_keys(&other_chain)
            .map(|keys| keys.contains(&alice.public_key()))
            .unwrap_or(false);
        assert!(!foreign);
    }

    #[test]
    fn test_duplicate_signature_is_rejected() {
        let chain_id = Hash::compute_from(b"testnet");
        let alice = PrivateKey::from_seed("alice");
        let trx = SignedTransaction::new(transfer())
            .signed_by(&alice, &chain_id)
            .unwrap()
            .signed_by(&alice, &chain_id)
            .unwrap();
        assert_matches!(
            trx.signature_keys(&chain_id),
            Err(ModelsError::InvalidTransaction(_))
        );
    }

    #[test]
    fn test_id_ignores_signatures_and_codec_is_canonical() {
        let chain_id = Hash::compute_from(b"testnet");
        let unsigned = SignedTransaction::new(transfer());
        let signed = unsigned
            .clone()
            .signed_by(&PrivateKey::from_seed("alice"), &chain_id)
            .unwrap();
        assert_eq!(unsigned.id().unwrap(), signed.id().unwrap());

        let mut buffer = Vec::new();
        SignedTransactionSerializer::new()
            .serialize(&signed, &mut buffer)
            .unwrap();
        assert_eq!(buffer.len(), signed.serialized_size().unwrap());
        assert_eq!(
            deserialize_exact(&SignedTransactionDeserializer::new(), &buffer).unwrap(),
            signed
        );
    }

    #[test]
    fn test_empty_transaction_is_invalid() {
        let trx = Transaction {
            expiration: SigmaTime::from_secs(0),
            operations: vec![],
        };
        assert_matches!(trx.validate(), Err(ModelsError::InvalidTransaction(_)));
        assert!(transfer().validate().is_ok());
    }
}
