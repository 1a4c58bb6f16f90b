// Copyright (c) 2024 SIGMA ENGINE

use crate::{Deserializer, SerializeError, Serializer};
use nom::error::{context, ContextError, ErrorKind, ParseError};
use nom::IResult;
use std::ops::{Bound, RangeBounds};
use unsigned_varint::{decode, encode};

macro_rules! gen_varint {
    ($($type:ident, $ser:ident, $deser:ident, $buffer:ident, $ctx:expr);*) => {
        $(
            #[doc = concat!("Serializer for `", stringify!($type), "` as an unsigned LEB128 varint")]
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $ser;

            impl $ser {
                #[doc = concat!("Creates a `", stringify!($ser), "`")]
                pub const fn new() -> Self {
                    Self
                }
            }

            impl Serializer<$type> for $ser {
                fn serialize(&self, value: &$type, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
                    buffer.extend_from_slice(encode::$type(*value, &mut encode::$buffer()));
                    Ok(())
                }
            }

            #[doc = concat!("Bounded deserializer for varint `", stringify!($type), "`")]
            #[derive(Debug, Clone, Copy)]
            pub struct $deser {
                range: (Bound<$type>, Bound<$type>),
            }

            impl $deser {
                #[doc = concat!("Creates a `", stringify!($deser), "` accepting values within `(min, max)`")]
                pub const fn new(min: Bound<$type>, max: Bound<$type>) -> Self {
                    Self { range: (min, max) }
                }
            }

            impl Deserializer<$type> for $deser {
                fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
                    &self,
                    buffer: &'a [u8],
                ) -> IResult<&'a [u8], $type, E> {
                    context($ctx, |input: &'a [u8]| {
                        let (value, rest) = decode::$type(input).map_err(|_| {
                            nom::Err::Error(E::from_error_kind(input, ErrorKind::Fail))
                        })?;
                        if !self.range.contains(&value) {
                            return Err(nom::Err::Error(E::from_error_kind(
                                input,
                                ErrorKind::Verify,
                            )));
                        }
                        Ok((rest, value))
                    })(buffer)
                }
            }
        )*
    };
}

gen_varint!(
    u16, U16VarIntSerializer, U16VarIntDeserializer, u16_buffer, "Failed u16 varint deserialization";
    u32, U32VarIntSerializer, U32VarIntDeserializer, u32_buffer, "Failed u32 varint deserialization";
    u64, U64VarIntSerializer, U64VarIntDeserializer, u64_buffer, "Failed u64 varint deserialization"
);
