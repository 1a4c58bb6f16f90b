// Copyright (c) 2024 SIGMA ENGINE

use crate::account::{AccountName, AccountNameDeserializer, AccountNameSerializer};
use crate::constants::MAX_BLOCK_SIZE;
use crate::error::{ModelsError, ModelsResult};
use crate::transaction::{
    SignedTransaction, SignedTransactionDeserializer, SignedTransactionSerializer,
};
use crate::version::{
    HardforkVersionVote, HardforkVersionVoteDeserializer, HardforkVersionVoteSerializer, Version,
    VersionDeserializer, VersionSerializer,
};
use nom::error::{context, ContextError, ErrorKind, ParseError};
use nom::sequence::tuple;
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};
use sigma_hash::{Hash, HashDeserializer, HashSerializer};
use sigma_serialization::{
    Deserializer, SerializeError, Serializer, U32VarIntDeserializer, U32VarIntSerializer,
    VecDeserializer, VecSerializer,
};
use sigma_signature::{
    PrivateKey, PublicKey, Signature, SignatureDeserializer, SignatureSerializer,
    SIGNATURE_SIZE_BYTES,
};
use sigma_time::{SigmaTime, SigmaTimeDeserializer, SigmaTimeSerializer};
use std::fmt;
use std::ops::Bound::Included;

/// Maximal number of header extensions
pub const MAX_BLOCK_EXTENSIONS: u32 = 8;
/// Maximal number of transactions in a block
pub const MAX_TRANSACTIONS_PER_BLOCK: u32 = 100_000;

/// Block identifier.
///
/// The first four bytes hold the block number in big endian, the rest comes
/// from the hash of the signed header. Ids therefore sort by height first.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct BlockId(pub Hash);

impl BlockId {
    /// Id of the virtual block preceding the first block
    pub const fn zero() -> Self {
        BlockId(Hash::zero())
    }

    /// Builds an id by stamping `num` over the first bytes of `hash`
    pub fn from_hash_and_num(hash: Hash, num: u32) -> Self {
        let mut bytes = hash.into_bytes();
        bytes[..4].copy_from_slice(&num.to_be_bytes());
        BlockId(Hash::from_bytes(&bytes))
    }

    /// Block number encoded in the id
    pub fn num(&self) -> u32 {
        let bytes = self.0.to_bytes();
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Four bytes following the block number
    pub fn prefix(&self) -> u32 {
        let bytes = self.0.to_bytes();
        u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]])
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.num(), self.0)
    }
}

/// Optional data carried by a block header
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockHeaderExtension {
    /// running version of the producer
    Version(Version),
    /// hardfork the producer votes for
    HardforkVersionVote(HardforkVersionVote),
}

/// Unsigned block header
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// id of the parent block
    pub previous: BlockId,
    /// slot time of the block
    pub timestamp: SigmaTime,
    /// producer of the block
    pub bobserver: AccountName,
    /// merkle root of the transaction digests
    pub transaction_merkle_root: Hash,
    /// extensions
    pub extensions: Vec<BlockHeaderExtension>,
}

impl BlockHeader {
    /// Height of the block
    pub fn block_num(&self) -> u32 {
        self.previous.num().saturating_add(1)
    }

    /// Hash of the encoded header, the message signed by the producer
    pub fn digest(&self) -> ModelsResult<Hash> {
        let mut buffer = Vec::new();
        BlockHeaderSerializer::new().serialize(self, &mut buffer)?;
        Ok(Hash::compute_from(&buffer))
    }

    /// Version reported in the extensions, if any
    pub fn reported_version(&self) -> Option<Version> {
        self.extensions.iter().find_map(|ext| match ext {
            BlockHeaderExtension::Version(version) => Some(*version),
            _ => None,
        })
    }

    /// Hardfork vote carried in the extensions, if any
    pub fn hardfork_vote(&self) -> Option<HardforkVersionVote> {
        self.extensions.iter().find_map(|ext| match ext {
            BlockHeaderExtension::HardforkVersionVote(vote) => Some(*vote),
            _ => None,
        })
    }
}

/// Header with the producer signature
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlockHeader {
    /// signed content
    pub header: BlockHeader,
    /// signature over `header.digest()`
    pub bobserver_signature: Signature,
}

impl SignedBlockHeader {
    /// Signs `header` with the producer signing key
    pub fn new_signed(header: BlockHeader, key: &PrivateKey) -> ModelsResult<Self> {
        let bobserver_signature = key.sign(&header.digest()?)?;
        Ok(SignedBlockHeader {
            header,
            bobserver_signature,
        })
    }

    /// Header carrying an all-zero signature
    pub fn unsigned(header: BlockHeader) -> Self {
        SignedBlockHeader {
            header,
            bobserver_signature: Signature::from_bytes(&[0u8; SIGNATURE_SIZE_BYTES]),
        }
    }

    /// Id of the block
    pub fn id(&self) -> ModelsResult<BlockId> {
        let mut buffer = Vec::new();
        SignedBlockHeaderSerializer::new().serialize(self, &mut buffer)?;
        Ok(BlockId::from_hash_and_num(
            Hash::compute_from(&buffer),
            self.header.block_num(),
        ))
    }

    /// Key that produced the signature
    pub fn signee(&self) -> ModelsResult<PublicKey> {
        Ok(self.bobserver_signature.recover(&self.header.digest()?)?)
    }

    /// Checks that the header is signed by `expected`
    pub fn validate_signee(&self, expected: &PublicKey) -> ModelsResult<()> {
        let signee = self.signee()?;
        if &signee != expected {
            return Err(ModelsError::InvalidBlock(format!(
                "block signed by {} instead of {}",
                signee, expected
            )));
        }
        Ok(())
    }
}

/// A full block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlock {
    /// signed header
    pub header: SignedBlockHeader,
    /// included transactions, in application order
    pub transactions: Vec<SignedTransaction>,
}

impl SignedBlock {
    /// Id of the block
    pub fn id(&self) -> ModelsResult<BlockId> {
        self.header.id()
    }

    /// Height of the block
    pub fn block_num(&self) -> u32 {
        self.header.header.block_num()
    }

    /// Id of the parent block
    pub fn previous(&self) -> BlockId {
        self.header.header.previous
    }

    /// Slot time of the block
    pub fn timestamp(&self) -> SigmaTime {
        self.header.header.timestamp
    }

    /// Producer of the block
    pub fn bobserver(&self) -> &AccountName {
        &self.header.header.bobserver
    }

    /// Merkle root of the transaction ids.
    ///
    /// Leaves are hashed pairwise level by level, an odd leaf is carried up
    /// unchanged. An empty block has the zero root.
    pub fn calculate_merkle_root(&self) -> ModelsResult<Hash> {
        let mut level = self
            .transactions
            .iter()
            .map(|trx| trx.id())
            .collect::<ModelsResult<Vec<Hash>>>()?;
        if level.is_empty() {
            return Ok(Hash::zero());
        }
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => Hash::compute_from_tuple(&[
                        left.to_bytes().as_slice(),
                        right.to_bytes().as_slice(),
                    ]),
                    [single] => *single,
                    _ => Hash::zero(),
                })
                .collect();
        }
        Ok(level[0])
    }

    /// Size of the canonical encoding
    pub fn serialized_size(&self) -> ModelsResult<usize> {
        let mut buffer = Vec::new();
        SignedBlockSerializer::new().serialize(self, &mut buffer)?;
        Ok(buffer.len())
    }
}

/// Serializer for `BlockId`
#[derive(Default, Clone, Copy)]
pub struct BlockIdSerializer {
    hash_serializer: HashSerializer,
}

impl BlockIdSerializer {
    /// Creates a `BlockIdSerializer`
    pub const fn new() -> Self {
        Self {
            hash_serializer: HashSerializer::new(),
        }
    }
}

impl Serializer<BlockId> for BlockIdSerializer {
    fn serialize(&self, value: &BlockId, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.hash_serializer.serialize(&value.0, buffer)
    }
}

/// Deserializer for `BlockId`
#[derive(Default, Clone, Copy)]
pub struct BlockIdDeserializer {
    hash_deserializer: HashDeserializer,
}

impl BlockIdDeserializer {
    /// Creates a `BlockIdDeserializer`
    pub const fn new() -> Self {
        Self {
            hash_deserializer: HashDeserializer::new(),
        }
    }
}

impl Deserializer<BlockId> for BlockIdDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BlockId, E> {
        context("Failed BlockId deserialization", |input| {
            self.hash_deserializer.deserialize(input)
        })
        .map(BlockId)
        .parse(buffer)
    }
}

/// Serializer for `BlockHeader`
pub struct BlockHeaderSerializer {
    id_serializer: BlockIdSerializer,
    time_serializer: SigmaTimeSerializer,
    name_serializer: AccountNameSerializer,
    hash_serializer: HashSerializer,
    u32_serializer: U32VarIntSerializer,
    version_serializer: VersionSerializer,
    vote_serializer: HardforkVersionVoteSerializer,
}

impl BlockHeaderSerializer {
    /// Creates a `BlockHeaderSerializer`
    pub const fn new() -> Self {
        Self {
            id_serializer: BlockIdSerializer::new(),
            time_serializer: SigmaTimeSerializer::new(),
            name_serializer: AccountNameSerializer::new(),
            hash_serializer: HashSerializer::new(),
            u32_serializer: U32VarIntSerializer::new(),
            version_serializer: VersionSerializer::new(),
            vote_serializer: HardforkVersionVoteSerializer::new(),
        }
    }
}

impl Default for BlockHeaderSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<BlockHeader> for BlockHeaderSerializer {
    fn serialize(&self, value: &BlockHeader, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.id_serializer.serialize(&value.previous, buffer)?;
        self.time_serializer.serialize(&value.timestamp, buffer)?;
        self.name_serializer.serialize(&value.bobserver, buffer)?;
        self.hash_serializer
            .serialize(&value.transaction_merkle_root, buffer)?;
        let count: u32 = value.extensions.len().try_into().map_err(|_| {
            SerializeError::NumberTooBig(format!("{} extensions", value.extensions.len()))
        })?;
        self.u32_serializer.serialize(&count, buffer)?;
        for extension in &value.extensions {
            match extension {
                BlockHeaderExtension::Version(version) => {
                    self.u32_serializer.serialize(&0, buffer)?;
                    self.version_serializer.serialize(version, buffer)?;
                }
                BlockHeaderExtension::HardforkVersionVote(vote) => {
                    self.u32_serializer.serialize(&1, buffer)?;
                    self.vote_serializer.serialize(vote, buffer)?;
                }
            }
        }
        Ok(())
    }
}

/// Deserializer for `BlockHeaderExtension`
#[derive(Clone, Copy)]
pub struct BlockHeaderExtensionDeserializer {
    tag_deserializer: U32VarIntDeserializer,
    version_deserializer: VersionDeserializer,
    vote_deserializer: HardforkVersionVoteDeserializer,
}

impl BlockHeaderExtensionDeserializer {
    /// Creates a `BlockHeaderExtensionDeserializer`
    pub fn new() -> Self {
        Self {
            tag_deserializer: U32VarIntDeserializer::new(Included(0), Included(1)),
            version_deserializer: VersionDeserializer::new(),
            vote_deserializer: HardforkVersionVoteDeserializer::new(),
        }
    }
}

impl Default for BlockHeaderExtensionDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<BlockHeaderExtension> for BlockHeaderExtensionDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BlockHeaderExtension, E> {
        context("Failed block header extension deserialization", |input: &'a [u8]| {
            let (rest, tag) = self.tag_deserializer.deserialize(input)?;
            match tag {
                0 => self
                    .version_deserializer
                    .deserialize(rest)
                    .map(|(rest, version)| (rest, BlockHeaderExtension::Version(version))),
                1 => self
                    .vote_deserializer
                    .deserialize(rest)
                    .map(|(rest, vote)| (rest, BlockHeaderExtension::HardforkVersionVote(vote))),
                _ => Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Switch))),
            }
        })(buffer)
    }
}

/// Deserializer for `BlockHeader`
pub struct BlockHeaderDeserializer {
    id_deserializer: BlockIdDeserializer,
    time_deserializer: SigmaTimeDeserializer,
    name_deserializer: AccountNameDeserializer,
    hash_deserializer: HashDeserializer,
    extensions_deserializer: VecDeserializer<BlockHeaderExtension, BlockHeaderExtensionDeserializer>,
}

impl BlockHeaderDeserializer {
    /// Creates a `BlockHeaderDeserializer`
    pub fn new() -> Self {
        Self {
            id_deserializer: BlockIdDeserializer::new(),
            time_deserializer: SigmaTimeDeserializer::default(),
            name_deserializer: AccountNameDeserializer::new(),
            hash_deserializer: HashDeserializer::new(),
            extensions_deserializer: VecDeserializer::new(
                BlockHeaderExtensionDeserializer::new(),
                MAX_BLOCK_EXTENSIONS,
            ),
        }
    }
}

impl Default for BlockHeaderDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<BlockHeader> for BlockHeaderDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BlockHeader, E> {
        context(
            "Failed BlockHeader deserialization",
            tuple((
                context("Failed previous deserialization", |input| {
                    self.id_deserializer.deserialize(input)
                }),
                context("Failed timestamp deserialization", |input| {
                    self.time_deserializer.deserialize(input)
                }),
                context("Failed bobserver deserialization", |input| {
                    self.name_deserializer.deserialize(input)
                }),
                context("Failed merkle root deserialization", |input| {
                    self.hash_deserializer.deserialize(input)
                }),
                context("Failed extensions deserialization", |input| {
                    self.extensions_deserializer.deserialize(input)
                }),
            )),
        )
        .map(
            |(previous, timestamp, bobserver, transaction_merkle_root, extensions)| BlockHeader {
                previous,
                timestamp,
                bobserver,
                transaction_merkle_root,
                extensions,
            },
        )
        .parse(buffer)
    }
}

/// Serializer for `SignedBlockHeader`
pub struct SignedBlockHeaderSerializer {
    header_serializer: BlockHeaderSerializer,
    signature_serializer: SignatureSerializer,
}

impl SignedBlockHeaderSerializer {
    /// Creates a `SignedBlockHeaderSerializer`
    pub const fn new() -> Self {
        Self {
            header_serializer: BlockHeaderSerializer::new(),
            signature_serializer: SignatureSerializer::new(),
        }
    }
}

impl Default for SignedBlockHeaderSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<SignedBlockHeader> for SignedBlockHeaderSerializer {
    fn serialize(
        &self,
        value: &SignedBlockHeader,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.header_serializer.serialize(&value.header, buffer)?;
        self.signature_serializer
            .serialize(&value.bobserver_signature, buffer)
    }
}

/// Deserializer for `SignedBlockHeader`
pub struct SignedBlockHeaderDeserializer {
    header_deserializer: BlockHeaderDeserializer,
    signature_deserializer: SignatureDeserializer,
}

impl SignedBlockHeaderDeserializer {
    /// Creates a `SignedBlockHeaderDeserializer`
    pub fn new() -> Self {
        Self {
            header_deserializer: BlockHeaderDeserializer::new(),
            signature_deserializer: SignatureDeserializer::new(),
        }
    }
}

impl Default for SignedBlockHeaderDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<SignedBlockHeader> for SignedBlockHeaderDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], SignedBlockHeader, E> {
        context(
            "Failed SignedBlockHeader deserialization",
            tuple((
                |input| self.header_deserializer.deserialize(input),
                |input| self.signature_deserializer.deserialize(input),
            )),
        )
        .map(|(header, bobserver_signature)| SignedBlockHeader {
            header,
            bobserver_signature,
        })
        .parse(buffer)
    }
}

/// Serializer for `SignedBlock`
pub struct SignedBlockSerializer {
    header_serializer: SignedBlockHeaderSerializer,
    transactions_serializer: VecSerializer<SignedTransaction, SignedTransactionSerializer>,
}

impl SignedBlockSerializer {
    /// Creates a `SignedBlockSerializer`
    pub fn new() -> Self {
        Self {
            header_serializer: SignedBlockHeaderSerializer::new(),
            transactions_serializer: VecSerializer::new(SignedTransactionSerializer::new()),
        }
    }
}

impl Default for SignedBlockSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer<SignedBlock> for SignedBlockSerializer {
    fn serialize(&self, value: &SignedBlock, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let start = buffer.len();
        self.header_serializer.serialize(&value.header, buffer)?;
        self.transactions_serializer
            .serialize(&value.transactions, buffer)?;
        if (buffer.len() - start) as u64 > MAX_BLOCK_SIZE {
            return Err(SerializeError::GeneralError(
                "block exceeds the maximal size".to_string(),
            ));
        }
        Ok(())
    }
}

/// Deserializer for `SignedBlock`
pub struct SignedBlockDeserializer {
    header_deserializer: SignedBlockHeaderDeserializer,
    transactions_deserializer: VecDeserializer<SignedTransaction, SignedTransactionDeserializer>,
}

impl SignedBlockDeserializer {
    /// Creates a `SignedBlockDeserializer`
    pub fn new() -> Self {
        Self {
            header_deserializer: SignedBlockHeaderDeserializer::new(),
            transactions_deserializer: VecDeserializer::new(
                SignedTransactionDeserializer::new(),
                MAX_TRANSACTIONS_PER_BLOCK,
            ),
        }
    }
}

impl Default for SignedBlockDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<SignedBlock> for SignedBlockDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], SignedBlock, E> {
        context(
            "Failed SignedBlock deserialization",
            tuple((
                |input| self.header_deserializer.deserialize(input),
                context("Failed transactions deserialization", |input| {
                    self.transactions_deserializer.deserialize(input)
                }),
            )),
        )
        .map(|(header, transactions)| SignedBlock {
            header,
            transactions,
        })
        .parse(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BLOCKCHAIN_VERSION;
    use crate::transaction::Transaction;
    use crate::operation::{HardforkOperation, Operation};
    use sigma_serialization::deserialize_exact;

    fn header(previous: BlockId) -> BlockHeader {
        BlockHeader {
            previous,
            timestamp: SigmaTime::from_secs(1_600_000_003),
            bobserver: AccountName::new("chainmaker"),
            transaction_merkle_root: Hash::zero(),
            extensions: vec![BlockHeaderExtension::Version(BLOCKCHAIN_VERSION)],
        }
    }

    #[test]
    fn test_block_id_embeds_number() {
        let id = BlockId::from_hash_and_num(Hash::compute_from(b"block"), 258);
        assert_eq!(id.num(), 258);
        assert_eq!(BlockId::zero().num(), 0);

        let key = PrivateKey::from_seed("chainmaker");
        let first = SignedBlockHeader::new_signed(header(BlockId::zero()), &key).unwrap();
        let first_id = first.id().unwrap();
        assert_eq!(first_id.num(), 1);
        let second = SignedBlockHeader::new_signed(header(first_id), &key).unwrap();
        assert_eq!(second.id().unwrap().num(), 2);
        assert!(second.id().unwrap() > first_id);
    }

    #[test]
    fn test_signee_and_codec() {
        let key = PrivateKey::from_seed("chainmaker");
        let signed = SignedBlockHeader::new_signed(header(BlockId::zero()), &key).unwrap();
        assert_eq!(signed.signee().unwrap(), key.public_key());
        assert!(signed.validate_signee(&key.public_key()).is_ok());
        assert!(signed
            .validate_signee(&PrivateKey::from_seed("other").public_key())
            .is_err());
        assert_eq!(signed.header.reported_version(), Some(BLOCKCHAIN_VERSION));

        let block = SignedBlock {
            header: signed,
            transactions: vec![],
        };
        let mut buffer = Vec::new();
        SignedBlockSerializer::new()
            .serialize(&block, &mut buffer)
            .unwrap();
        assert_eq!(
            deserialize_exact(&SignedBlockDeserializer::new(), &buffer).unwrap(),
            block
        );
    }

    #[test]
    fn test_merkle_root() {
        let trx = |id: u32| {
            SignedTransaction::new(Transaction {
                expiration: SigmaTime::from_secs(id),
                operations: vec![Operation::Hardfork(HardforkOperation { hardfork_id: id })],
            })
        };
        let mut block = SignedBlock {
            header: SignedBlockHeader::unsigned(header(BlockId::zero())),
            transactions: vec![],
        };
        assert_eq!(block.calculate_merkle_root().unwrap(), Hash::zero());

        block.transactions = vec![trx(1)];
        assert_eq!(block.calculate_merkle_root().unwrap(), trx(1).id().unwrap());

        block.transactions = vec![trx(1), trx(2), trx(3)];
        let (a, b, c) = (
            trx(1).id().unwrap(),
            trx(2).id().unwrap(),
            trx(3).id().unwrap(),
        );
        let ab = Hash::compute_from_tuple(&[a.to_bytes().as_slice(), b.to_bytes().as_slice()]);
        let expected = Hash::compute_from_tuple(&[ab.to_bytes().as_slice(), c.to_bytes().as_slice()]);
        assert_eq!(block.calculate_merkle_root().unwrap(), expected);
    }
}
