// Copyright (c) 2024 SIGMA ENGINE

use crate::*;
use assert_matches::assert_matches;
use serial_test::serial;
use sigma_hash::Hash;
use sigma_serialization::{deserialize_exact, Serializer};
use std::str::FromStr;

#[test]
#[serial]
fn test_sign_and_recover() {
    let key = PrivateKey::from_seed("alice");
    let digest = Hash::compute_from(b"payload");
    let signature = key.sign(&digest).unwrap();
    assert_eq!(signature.recover(&digest).unwrap(), key.public_key());
    key.public_key().verify_signature(&digest, &signature).unwrap();

    let other = Hash::compute_from(b"other payload");
    assert_ne!(signature.recover(&other).ok(), Some(key.public_key()));
}

#[test]
#[serial]
fn test_high_s_is_rejected() {
    let key = PrivateKey::from_seed("alice");
    let digest = Hash::compute_from(b"payload");
    let signature = key.sign(&digest).unwrap();

    // s' = n - s flips the signature into the malleable upper half
    let mut raw = *signature.to_bytes();
    let mut parsed = libsecp256k1::Signature::parse_standard_slice(&raw[..64]).unwrap();
    parsed.s = -parsed.s;
    raw[..64].copy_from_slice(&parsed.serialize());
    raw[64] ^= 1;
    assert_matches!(
        Signature::from_bytes(&raw).recover(&digest),
        Err(SignatureError::NonCanonical)
    );
}

#[test]
#[serial]
fn test_text_forms() {
    let key = PrivateKey::from_seed("bob");
    let public = key.public_key();
    let text = public.to_string();
    assert!(text.starts_with(PUBLIC_KEY_PREFIX));
    assert_eq!(PublicKey::from_str(&text).unwrap(), public);
    assert_matches!(
        PublicKey::from_str(&public.to_bs58_check()),
        Err(SignatureError::InvalidPrefix { .. })
    );
    assert_eq!(
        PrivateKey::from_str(&key.to_bs58_check()).unwrap().public_key(),
        public
    );

    let json = serde_json::to_string(&public).unwrap();
    assert_eq!(serde_json::from_str::<PublicKey>(&json).unwrap(), public);
}

#[test]
#[serial]
fn test_null_key() {
    let null = PublicKey::default();
    assert!(null.is_null());
    assert!(!PrivateKey::from_seed("carol").public_key().is_null());
    assert_eq!(PublicKey::from_str(&null.to_string()).unwrap(), null);
}

#[test]
#[serial]
fn test_binary_codecs() {
    let key = PrivateKey::from_seed("dave");
    let mut buffer = Vec::new();
    PublicKeySerializer::new()
        .serialize(&key.public_key(), &mut buffer)
        .unwrap();
    assert_eq!(
        deserialize_exact(&PublicKeyDeserializer::new(), &buffer).unwrap(),
        key.public_key()
    );

    let signature = key.sign(&Hash::zero()).unwrap();
    let mut buffer = Vec::new();
    SignatureSerializer::new()
        .serialize(&signature, &mut buffer)
        .unwrap();
    assert_eq!(
        deserialize_exact(&SignatureDeserializer::new(), &buffer).unwrap(),
        signature
    );
    assert!(deserialize_exact(&SignatureDeserializer::new(), &buffer[..10]).is_err());
}
