// Copyright (c) 2024 SIGMA ENGINE

use crate::{
    Deserializer, SerializeError, Serializer, U32VarIntDeserializer, U32VarIntSerializer,
};
use nom::bytes::complete::take;
use nom::error::{context, ContextError, ErrorKind, ParseError};
use nom::multi::length_count;
use nom::number::complete::{be_u128, u8 as nom_u8};
use nom::IResult;
use std::marker::PhantomData;
use std::ops::Bound::Included;

/// Single byte serializer
#[derive(Debug, Clone, Copy, Default)]
pub struct U8Serializer;

impl U8Serializer {
    /// Creates a `U8Serializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<u8> for U8Serializer {
    fn serialize(&self, value: &u8, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.push(*value);
        Ok(())
    }
}

/// Single byte deserializer with an inclusive upper bound
#[derive(Debug, Clone, Copy)]
pub struct U8Deserializer {
    max: u8,
}

impl U8Deserializer {
    /// Creates a `U8Deserializer` accepting `0..=max`
    pub const fn new(max: u8) -> Self {
        Self { max }
    }
}

impl Deserializer<u8> for U8Deserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], u8, E> {
        context("Failed u8 deserialization", |input: &'a [u8]| {
            let (rest, value) = nom_u8(input)?;
            if value > self.max {
                return Err(nom::Err::Error(E::from_error_kind(
                    input,
                    ErrorKind::Verify,
                )));
            }
            Ok((rest, value))
        })(buffer)
    }
}

/// Fixed-width big endian `u128`
#[derive(Debug, Clone, Copy, Default)]
pub struct U128Serializer;

impl U128Serializer {
    /// Creates a `U128Serializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<u128> for U128Serializer {
    fn serialize(&self, value: &u128, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }
}

/// Fixed-width big endian `u128`
#[derive(Debug, Clone, Copy, Default)]
pub struct U128Deserializer;

impl U128Deserializer {
    /// Creates a `U128Deserializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<u128> for U128Deserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], u128, E> {
        context("Failed u128 deserialization", be_u128)(buffer)
    }
}

/// Boolean as a single `0`/`1` byte
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolSerializer;

impl BoolSerializer {
    /// Creates a `BoolSerializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<bool> for BoolSerializer {
    fn serialize(&self, value: &bool, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.push(u8::from(*value));
        Ok(())
    }
}

/// Boolean as a single `0`/`1` byte, any other byte is rejected
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolDeserializer;

impl BoolDeserializer {
    /// Creates a `BoolDeserializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<bool> for BoolDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], bool, E> {
        context("Failed bool deserialization", |input: &'a [u8]| {
            let (rest, byte) = nom_u8(input)?;
            match byte {
                0 => Ok((rest, false)),
                1 => Ok((rest, true)),
                _ => Err(nom::Err::Error(E::from_error_kind(
                    input,
                    ErrorKind::Verify,
                ))),
            }
        })(buffer)
    }
}

/// Length-prefixed byte vector
#[derive(Debug, Clone, Copy, Default)]
pub struct VecU8Serializer {
    len_serializer: U32VarIntSerializer,
}

impl VecU8Serializer {
    /// Creates a `VecU8Serializer`
    pub const fn new() -> Self {
        Self {
            len_serializer: U32VarIntSerializer::new(),
        }
    }
}

impl Serializer<Vec<u8>> for VecU8Serializer {
    fn serialize(&self, value: &Vec<u8>, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let len: u32 = value.len().try_into().map_err(|_| {
            SerializeError::NumberTooBig(format!("byte vector of length {}", value.len()))
        })?;
        self.len_serializer.serialize(&len, buffer)?;
        buffer.extend_from_slice(value);
        Ok(())
    }
}

/// Length-prefixed byte vector with a maximum length
#[derive(Debug, Clone, Copy)]
pub struct VecU8Deserializer {
    len_deserializer: U32VarIntDeserializer,
}

impl VecU8Deserializer {
    /// Creates a `VecU8Deserializer` accepting at most `max_length` bytes
    pub const fn new(max_length: u32) -> Self {
        Self {
            len_deserializer: U32VarIntDeserializer::new(Included(0), Included(max_length)),
        }
    }
}

impl Deserializer<Vec<u8>> for VecU8Deserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Vec<u8>, E> {
        context("Failed Vec<u8> deserialization", |input: &'a [u8]| {
            let (rest, len) = self.len_deserializer.deserialize(input)?;
            let (rest, bytes) = take(len)(rest)?;
            Ok((rest, bytes.to_vec()))
        })(buffer)
    }
}

/// Length-prefixed UTF-8 string
#[derive(Debug, Clone, Copy)]
pub struct StringSerializer {
    bytes_serializer: VecU8Serializer,
    max_length: usize,
}

impl StringSerializer {
    /// Creates a `StringSerializer` refusing strings longer than `max_length` bytes
    pub const fn new(max_length: usize) -> Self {
        Self {
            bytes_serializer: VecU8Serializer::new(),
            max_length,
        }
    }
}

impl Serializer<String> for StringSerializer {
    fn serialize(&self, value: &String, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        if value.len() > self.max_length {
            return Err(SerializeError::StringTooBig(format!(
                "{} bytes for a maximum of {}",
                value.len(),
                self.max_length
            )));
        }
        let len: u32 = value
            .len()
            .try_into()
            .map_err(|_| SerializeError::StringTooBig(format!("{} bytes", value.len())))?;
        self.bytes_serializer
            .len_serializer
            .serialize(&len, buffer)?;
        buffer.extend_from_slice(value.as_bytes());
        Ok(())
    }
}

/// Length-prefixed UTF-8 string with a maximum length
#[derive(Debug, Clone, Copy)]
pub struct StringDeserializer {
    bytes_deserializer: VecU8Deserializer,
}

impl StringDeserializer {
    /// Creates a `StringDeserializer` accepting at most `max_length` bytes
    pub const fn new(max_length: u32) -> Self {
        Self {
            bytes_deserializer: VecU8Deserializer::new(max_length),
        }
    }
}

impl Deserializer<String> for StringDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], String, E> {
        context("Failed String deserialization", |input: &'a [u8]| {
            let (rest, bytes) = self.bytes_deserializer.deserialize(input)?;
            let value = String::from_utf8(bytes).map_err(|_| {
                nom::Err::Error(E::from_error_kind(input, ErrorKind::Verify))
            })?;
            Ok((rest, value))
        })(buffer)
    }
}

/// `Option<T>` as a presence byte followed by the value
#[derive(Debug, Clone)]
pub struct OptionSerializer<T, ST: Serializer<T>> {
    inner: ST,
    phantom: PhantomData<T>,
}

impl<T, ST: Serializer<T>> OptionSerializer<T, ST> {
    /// Creates an `OptionSerializer` around the value serializer
    pub fn new(inner: ST) -> Self {
        Self {
            inner,
            phantom: PhantomData,
        }
    }
}

impl<T, ST: Serializer<T>> Serializer<Option<T>> for OptionSerializer<T, ST> {
    fn serialize(&self, value: &Option<T>, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        match value {
            Some(inner) => {
                buffer.push(1);
                self.inner.serialize(inner, buffer)
            }
            None => {
                buffer.push(0);
                Ok(())
            }
        }
    }
}

/// `Option<T>` as a presence byte followed by the value
#[derive(Debug, Clone)]
pub struct OptionDeserializer<T, DT: Deserializer<T>> {
    inner: DT,
    phantom: PhantomData<T>,
}

impl<T, DT: Deserializer<T>> OptionDeserializer<T, DT> {
    /// Creates an `OptionDeserializer` around the value deserializer
    pub fn new(inner: DT) -> Self {
        Self {
            inner,
            phantom: PhantomData,
        }
    }
}

impl<T, DT: Deserializer<T>> Deserializer<Option<T>> for OptionDeserializer<T, DT> {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Option<T>, E> {
        context("Failed Option deserialization", |input: &'a [u8]| {
            let (rest, present) = BoolDeserializer::new().deserialize(input)?;
            if present {
                let (rest, value) = self.inner.deserialize(rest)?;
                Ok((rest, Some(value)))
            } else {
                Ok((rest, None))
            }
        })(buffer)
    }
}

/// Count-prefixed sequence of values
#[derive(Debug, Clone)]
pub struct VecSerializer<T, ST: Serializer<T>> {
    len_serializer: U32VarIntSerializer,
    inner: ST,
    phantom: PhantomData<T>,
}

impl<T, ST: Serializer<T>> VecSerializer<T, ST> {
    /// Creates a `VecSerializer` around the item serializer
    pub fn new(inner: ST) -> Self {
        Self {
            len_serializer: U32VarIntSerializer::new(),
            inner,
            phantom: PhantomData,
        }
    }

    /// Encodes any exact-size sequence of items, such as the items of a set
    pub fn serialize_iter<'v, I>(&self, items: I, buffer: &mut Vec<u8>) -> Result<(), SerializeError>
    where
        I: ExactSizeIterator<Item = &'v T>,
        T: 'v,
    {
        let len: u32 = items
            .len()
            .try_into()
            .map_err(|_| SerializeError::NumberTooBig(format!("{} items", items.len())))?;
        self.len_serializer.serialize(&len, buffer)?;
        for item in items {
            self.inner.serialize(item, buffer)?;
        }
        Ok(())
    }
}

impl<T, ST: Serializer<T>> Serializer<Vec<T>> for VecSerializer<T, ST> {
    fn serialize(&self, value: &Vec<T>, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.serialize_iter(value.iter(), buffer)
    }
}

/// Count-prefixed sequence of values with a maximum count
#[derive(Debug, Clone)]
pub struct VecDeserializer<T, DT: Deserializer<T>> {
    len_deserializer: U32VarIntDeserializer,
    inner: DT,
    phantom: PhantomData<T>,
}

impl<T, DT: Deserializer<T>> VecDeserializer<T, DT> {
    /// Creates a `VecDeserializer` accepting at most `max_count` items
    pub fn new(inner: DT, max_count: u32) -> Self {
        Self {
            len_deserializer: U32VarIntDeserializer::new(Included(0), Included(max_count)),
            inner,
            phantom: PhantomData,
        }
    }
}

impl<T, DT: Deserializer<T>> Deserializer<Vec<T>> for VecDeserializer<T, DT> {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Vec<T>, E> {
        context(
            "Failed Vec deserialization",
            length_count(
                |input| self.len_deserializer.deserialize(input),
                |input| self.inner.deserialize(input),
            ),
        )(buffer)
    }
}
