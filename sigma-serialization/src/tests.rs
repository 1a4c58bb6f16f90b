// Copyright (c) 2024 SIGMA ENGINE

use crate::*;
use assert_matches::assert_matches;
use std::ops::Bound::{Excluded, Included};

#[test]
fn varint_respects_bounds() {
    let mut buffer = Vec::new();
    U64VarIntSerializer::new()
        .serialize(&300, &mut buffer)
        .unwrap();
    assert_eq!(buffer, vec![0xac, 0x02]);

    let accepting = U64VarIntDeserializer::new(Included(0), Included(300));
    let (rest, value) = accepting
        .deserialize::<DeserializeError>(&buffer)
        .unwrap();
    assert!(rest.is_empty());
    assert_eq!(value, 300);

    let refusing = U64VarIntDeserializer::new(Included(0), Excluded(300));
    assert_matches!(
        refusing.deserialize::<DeserializeError>(&buffer),
        Err(nom::Err::Error(_))
    );
}

#[test]
fn string_rejects_invalid_utf8_and_oversize() {
    let mut buffer = Vec::new();
    assert_matches!(
        StringSerializer::new(3).serialize(&"toolong".to_string(), &mut buffer),
        Err(SerializeError::StringTooBig(_))
    );

    let invalid = vec![2u8, 0xff, 0xfe];
    let err = deserialize_exact(&StringDeserializer::new(16), &invalid).unwrap_err();
    assert!(err.contains("String"), "{}", err);
}

#[test]
fn option_and_vec_compose() {
    let serializer = VecSerializer::new(OptionSerializer::new(U16VarIntSerializer::new()));
    let deserializer = VecDeserializer::new(
        OptionDeserializer::new(U16VarIntDeserializer::new(Included(0), Included(u16::MAX))),
        4,
    );
    let value = vec![Some(1u16), None, Some(u16::MAX)];
    let mut buffer = Vec::new();
    serializer.serialize(&value, &mut buffer).unwrap();
    assert_eq!(deserialize_exact(&deserializer, &buffer).unwrap(), value);

    let too_many = vec![None; 5];
    let mut buffer = Vec::new();
    serializer.serialize(&too_many, &mut buffer).unwrap();
    assert!(deserialize_exact(&deserializer, &buffer).is_err());
}

#[test]
fn trailing_bytes_are_an_error() {
    let buffer = vec![1u8, 0];
    assert!(deserialize_exact(&BoolDeserializer::new(), &buffer).is_err());
    assert_eq!(deserialize_exact(&BoolDeserializer::new(), &buffer[..1]), Ok(true));
}
