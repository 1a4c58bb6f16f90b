// Copyright (c) 2024 SIGMA ENGINE

use crate::error::SignatureError;
use nom::{
    error::{context, ContextError, ParseError},
    IResult,
};
use sigma_hash::Hash;
use sigma_serialization::{Deserializer, SerializeError, Serializer};
use std::{convert::TryInto, str::FromStr};

/// Size of a compressed public key
pub const PUBLIC_KEY_SIZE_BYTES: usize = 33;
/// Size of a private key
pub const PRIVATE_KEY_SIZE_BYTES: usize = 32;
/// Size of a recoverable signature: `r || s || recovery id`
pub const SIGNATURE_SIZE_BYTES: usize = 65;
/// Text prefix of public keys
pub const PUBLIC_KEY_PREFIX: &str = "TNC";

fn decode_bs58_check<const N: usize>(data: &str) -> Result<[u8; N], SignatureError> {
    bs58::decode(data)
        .with_check(None)
        .into_vec()
        .map_err(|err| SignatureError::ParsingError(err.to_string()))?
        .as_slice()
        .try_into()
        .map_err(|_| SignatureError::ParsingError(format!("expected {} bytes", N)))
}

/// secp256k1 secret key, only ever used to produce recoverable signatures
#[derive(Clone, Eq, PartialEq)]
pub struct PrivateKey(libsecp256k1::SecretKey);

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "PrivateKey({})", self.public_key())
    }
}

impl PrivateKey {
    /// Deterministically derives a key from a seed string.
    ///
    /// The seed is hashed, and rehashed in the (astronomically unlikely) case
    /// where the digest is not a valid scalar.
    ///
    /// # Example
    /// ```
    /// # use sigma_signature::PrivateKey;
    /// let a = PrivateKey::from_seed("chainmaker");
    /// let b = PrivateKey::from_seed("chainmaker");
    /// assert_eq!(a.public_key(), b.public_key());
    /// ```
    pub fn from_seed(seed: &str) -> PrivateKey {
        let mut digest = Hash::compute_from(seed.as_bytes());
        loop {
            if let Ok(secret) = libsecp256k1::SecretKey::parse(digest.to_bytes()) {
                return PrivateKey(secret);
            }
            digest = Hash::compute_from(digest.to_bytes());
        }
    }

    /// Builds a key from raw bytes
    pub fn from_bytes(data: &[u8; PRIVATE_KEY_SIZE_BYTES]) -> Result<PrivateKey, SignatureError> {
        libsecp256k1::SecretKey::parse(data)
            .map(PrivateKey)
            .map_err(|err| SignatureError::ParsingError(format!("private key: {:?}", err)))
    }

    /// Raw bytes of the key
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE_BYTES] {
        self.0.serialize()
    }

    /// bs58-check text form
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.to_bytes()).with_check().into_string()
    }

    /// Parses the bs58-check text form
    pub fn from_bs58_check(data: &str) -> Result<PrivateKey, SignatureError> {
        PrivateKey::from_bytes(&decode_bs58_check(data)?)
    }

    /// Public counterpart, in compressed form
    pub fn public_key(&self) -> PublicKey {
        PublicKey(libsecp256k1::PublicKey::from_secret_key(&self.0).serialize_compressed())
    }

    /// Signs a digest. The produced signature is always canonical (low S).
    pub fn sign(&self, hash: &Hash) -> Result<Signature, SignatureError> {
        let message = libsecp256k1::Message::parse(hash.to_bytes());
        let (signature, recovery_id) = libsecp256k1::sign(&message, &self.0);
        let mut bytes = [0u8; SIGNATURE_SIZE_BYTES];
        bytes[..64].copy_from_slice(&signature.serialize());
        bytes[64] = recovery_id.serialize();
        Ok(Signature(bytes))
    }
}

impl FromStr for PrivateKey {
    type Err = SignatureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PrivateKey::from_bs58_check(s)
    }
}

/// Compressed secp256k1 public key.
///
/// The all-zero value is the null key: producers holding it are not scheduled
/// and no signature ever recovers to it.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE_BYTES]);

impl Default for PublicKey {
    fn default() -> Self {
        PublicKey::null()
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", PUBLIC_KEY_PREFIX, self.to_bs58_check())
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for PublicKey {
    type Err = SignatureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(PUBLIC_KEY_PREFIX) {
            Some(rest) => PublicKey::from_bs58_check(rest),
            None => Err(SignatureError::InvalidPrefix {
                expected: PUBLIC_KEY_PREFIX.to_string(),
                got: s.to_string(),
            }),
        }
    }
}

impl PublicKey {
    /// The null key
    pub const fn null() -> PublicKey {
        PublicKey([0u8; PUBLIC_KEY_SIZE_BYTES])
    }

    /// Whether this is the null key
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Checks that `signature` over `hash` was produced by this key
    pub fn verify_signature(&self, hash: &Hash, signature: &Signature) -> Result<(), SignatureError> {
        if signature.recover(hash)? != *self {
            return Err(SignatureError::SignatureError(format!(
                "signature does not match key {}",
                self
            )));
        }
        Ok(())
    }

    /// Raw compressed bytes
    pub fn to_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE_BYTES] {
        &self.0
    }

    /// bs58-check of the compressed bytes, without the prefix
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.0).with_check().into_string()
    }

    /// Parses the bs58-check form without the prefix
    pub fn from_bs58_check(data: &str) -> Result<PublicKey, SignatureError> {
        PublicKey::from_bytes(&decode_bs58_check(data)?)
    }

    /// Builds a key from compressed bytes. All zeros gives the null key,
    /// anything else must be a point of the curve.
    pub fn from_bytes(data: &[u8; PUBLIC_KEY_SIZE_BYTES]) -> Result<PublicKey, SignatureError> {
        let key = PublicKey(*data);
        if !key.is_null() {
            libsecp256k1::PublicKey::parse_compressed(data)
                .map_err(|err| SignatureError::ParsingError(format!("public key: {:?}", err)))?;
        }
        Ok(key)
    }
}

/// Serializer for `PublicKey`
#[derive(Default, Clone, Copy)]
pub struct PublicKeySerializer;

impl PublicKeySerializer {
    /// Creates a `PublicKeySerializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<PublicKey> for PublicKeySerializer {
    fn serialize(&self, value: &PublicKey, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `PublicKey`
#[derive(Default, Clone, Copy)]
pub struct PublicKeyDeserializer;

impl PublicKeyDeserializer {
    /// Creates a `PublicKeyDeserializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<PublicKey> for PublicKeyDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], PublicKey, E> {
        context("Failed public key deserialization", |input: &'a [u8]| {
            let fail = || nom::Err::Error(E::from_error_kind(input, nom::error::ErrorKind::LengthValue));
            let bytes: &[u8; PUBLIC_KEY_SIZE_BYTES] = input
                .get(..PUBLIC_KEY_SIZE_BYTES)
                .and_then(|slice| slice.try_into().ok())
                .ok_or_else(fail)?;
            let key = PublicKey::from_bytes(bytes).map_err(|_| fail())?;
            Ok((&input[PUBLIC_KEY_SIZE_BYTES..], key))
        })(buffer)
    }
}

/// Recoverable secp256k1 signature
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Signature([u8; SIGNATURE_SIZE_BYTES]);

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl FromStr for Signature {
    type Err = SignatureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signature::from_bs58_check(s)
    }
}

impl Signature {
    /// Recovers the public key that produced this signature over `hash`.
    ///
    /// Signatures whose `s` lies in the upper half of the curve order are
    /// malleable and rejected.
    pub fn recover(&self, hash: &Hash) -> Result<PublicKey, SignatureError> {
        let signature = libsecp256k1::Signature::parse_standard_slice(&self.0[..64])
            .map_err(|err| SignatureError::SignatureError(format!("{:?}", err)))?;
        if signature.s.is_high() {
            return Err(SignatureError::NonCanonical);
        }
        let recovery_id = libsecp256k1::RecoveryId::parse(self.0[64])
            .map_err(|err| SignatureError::SignatureError(format!("{:?}", err)))?;
        let message = libsecp256k1::Message::parse(hash.to_bytes());
        let key = libsecp256k1::recover(&message, &signature, &recovery_id)
            .map_err(|err| SignatureError::SignatureError(format!("{:?}", err)))?;
        Ok(PublicKey(key.serialize_compressed()))
    }

    /// Raw bytes
    pub fn to_bytes(&self) -> &[u8; SIGNATURE_SIZE_BYTES] {
        &self.0
    }

    /// Builds a signature from raw bytes. Validity is only checked on recovery.
    pub fn from_bytes(data: &[u8; SIGNATURE_SIZE_BYTES]) -> Signature {
        Signature(*data)
    }

    /// bs58-check text form
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.0).with_check().into_string()
    }

    /// Parses the bs58-check text form
    pub fn from_bs58_check(data: &str) -> Result<Signature, SignatureError> {
        Ok(Signature(decode_bs58_check(data)?))
    }
}

/// Serializer for `Signature`
#[derive(Default, Clone, Copy)]
pub struct SignatureSerializer;

impl SignatureSerializer {
    /// Creates a `SignatureSerializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<Signature> for SignatureSerializer {
    fn serialize(&self, value: &Signature, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `Signature`
#[derive(Default, Clone, Copy)]
pub struct SignatureDeserializer;

impl SignatureDeserializer {
    /// Creates a `SignatureDeserializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<Signature> for SignatureDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Signature, E> {
        context("Failed signature deserialization", |input: &'a [u8]| {
            let bytes: &[u8; SIGNATURE_SIZE_BYTES] = input
                .get(..SIGNATURE_SIZE_BYTES)
                .and_then(|slice| slice.try_into().ok())
                .ok_or_else(|| {
                    nom::Err::Error(E::from_error_kind(input, nom::error::ErrorKind::LengthValue))
                })?;
            Ok((&input[SIGNATURE_SIZE_BYTES..], Signature(*bytes)))
        })(buffer)
    }
}

macro_rules! string_serde {
    ($type:ident, $expecting:expr) => {
        impl ::serde::Serialize for $type {
            fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.collect_str(self)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $type {
            fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<$type, D::Error> {
                struct TextVisitor;

                impl<'de> ::serde::de::Visitor<'de> for TextVisitor {
                    type Value = $type;

                    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                        formatter.write_str($expecting)
                    }

                    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                    where
                        E: ::serde::de::Error,
                    {
                        $type::from_str(v).map_err(E::custom)
                    }
                }
                d.deserialize_str(TextVisitor)
            }
        }
    };
}

string_serde!(PublicKey, "a prefixed base58check public key");
string_serde!(Signature, "a base58check signature");
string_serde!(PrivateKey, "a base58check private key");

impl std::fmt::Display for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}
