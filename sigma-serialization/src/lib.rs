// Copyright (c) 2024 SIGMA ENGINE
//! Deterministic binary encoding used for everything that is hashed or signed.
//!
//! Every encodable type gets a `Serializer` and a `Deserializer` structure.
//! Deserializers are `nom` parsers carrying their own bounds so that a
//! malformed or oversized input is rejected while parsing.
#![warn(missing_docs)]

mod basic;
mod varint;

pub use basic::*;
pub use varint::*;

use displaydoc::Display;
use nom::error::{ContextError, ErrorKind, ParseError};
use nom::IResult;
use std::fmt;
use thiserror::Error;

/// Errors raised while encoding
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializeError {
    /// Number {0} is too big to be serialized
    NumberTooBig(String),
    /// String too big: {0}
    StringTooBig(String),
    /// General error: {0}
    GeneralError(String),
}

/// Encodes values of type `T` into a byte buffer
pub trait Serializer<T> {
    /// Appends the encoding of `value` to `buffer`
    fn serialize(&self, value: &T, buffer: &mut Vec<u8>) -> Result<(), SerializeError>;
}

/// Decodes values of type `T` from a byte slice
pub trait Deserializer<T> {
    /// Parses a value from the beginning of `buffer` and returns the remaining bytes
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], T, E>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeserializeErrorKind {
    Nom(ErrorKind),
    Context(&'static str),
}

/// Error accumulated by the deserializers: the stack of contexts that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeserializeError<'a> {
    errors: Vec<(&'a [u8], DeserializeErrorKind)>,
}

impl<'a> ParseError<&'a [u8]> for DeserializeError<'a> {
    fn from_error_kind(input: &'a [u8], kind: ErrorKind) -> Self {
        Self {
            errors: vec![(input, DeserializeErrorKind::Nom(kind))],
        }
    }

    fn append(input: &'a [u8], kind: ErrorKind, mut other: Self) -> Self {
        other.errors.push((input, DeserializeErrorKind::Nom(kind)));
        other
    }
}

impl<'a> ContextError<&'a [u8]> for DeserializeError<'a> {
    fn add_context(input: &'a [u8], ctx: &'static str, mut other: Self) -> Self {
        other.errors.push((input, DeserializeErrorKind::Context(ctx)));
        other
    }
}

impl<'a> fmt::Display for DeserializeError<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut contexts = self
            .errors
            .iter()
            .rev()
            .filter_map(|(_, kind)| match kind {
                DeserializeErrorKind::Context(ctx) => Some(*ctx),
                DeserializeErrorKind::Nom(_) => None,
            })
            .peekable();
        if contexts.peek().is_none() {
            if let Some((input, DeserializeErrorKind::Nom(kind))) = self.errors.first() {
                return write!(f, "{:?} with {} bytes left", kind, input.len());
            }
            return write!(f, "unknown deserialization error");
        }
        let joined: Vec<&str> = contexts.collect();
        write!(f, "{}", joined.join(" / "))
    }
}

/// Runs `deserializer` over the whole `buffer`, failing if bytes are left over.
///
/// Returns the error rendered as a string so that callers can wrap it in
/// their own error type without borrowing the input.
pub fn deserialize_exact<T, D: Deserializer<T>>(
    deserializer: &D,
    buffer: &[u8],
) -> Result<T, String> {
    match deserializer.deserialize::<DeserializeError>(buffer) {
        Ok((rest, value)) if rest.is_empty() => Ok(value),
        Ok((rest, _)) => Err(format!("{} trailing bytes after value", rest.len())),
        Err(nom::Err::Incomplete(_)) => Err("unexpected end of input".to_string()),
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => Err(err.to_string()),
    }
}

#[cfg(test)]
mod tests;
