// Copyright (c) 2024 SIGMA ENGINE

use crate::constants::{AMOUNT_DECIMAL_FACTOR, BASE_SYMBOL, STAKING_INTEREST_PRECISION_DIGITS};
use crate::ModelsError;
use nom::error::{context, ContextError, ParseError};
use nom::sequence::tuple;
use nom::{IResult, Parser};
use rust_decimal::prelude::*;
use serde::de::Unexpected;
use sigma_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use std::fmt;
use std::ops::Bound::Included;
use std::str::FromStr;

/// A non-negative fixed-point quantity of an asset.
///
/// The raw `u64` is the amount multiplied by `AMOUNT_DECIMAL_FACTOR`; every
/// arithmetic operation is checked so that balances never wrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ord, PartialOrd, Default, Hash)]
pub struct Amount(u64);

impl Amount {
    /// Create a zero Amount
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Obtains the underlying raw `u64` representation
    pub const fn to_raw(&self) -> u64 {
        self.0
    }

    /// constructs an `Amount` from the underlying raw `u64` representation.
    /// In most cases, you should be using `Amount::from_str("11.23")`
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// `true` when zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// safely add self to another amount, returning None on overflow
    /// ```
    /// # use sigma_models::Amount;
    /// # use std::str::FromStr;
    /// let amount_1 : Amount = Amount::from_str("42").unwrap();
    /// let amount_2 : Amount = Amount::from_str("7").unwrap();
    /// let res : Amount = amount_1.checked_add(amount_2).unwrap();
    /// assert_eq!(res, Amount::from_str("49").unwrap())
    /// ```
    pub fn checked_add(self, amount: Amount) -> Option<Self> {
        self.0.checked_add(amount.0).map(Amount)
    }

    /// safely subtract another amount from self, returning None on underflow
    pub fn checked_sub(self, amount: Amount) -> Option<Self> {
        self.0.checked_sub(amount.0).map(Amount)
    }

    /// safely add, saturating the result on overflow
    #[must_use]
    pub fn saturating_add(self, amount: Amount) -> Self {
        Amount(self.0.saturating_add(amount.0))
    }

    /// safely subtract, saturating the result on underflow
    #[must_use]
    pub fn saturating_sub(self, amount: Amount) -> Self {
        Amount(self.0.saturating_sub(amount.0))
    }
}

/// display an Amount in decimal string form (like "10.33")
///
/// ```
/// # use sigma_models::Amount;
/// # use std::str::FromStr;
/// let value = Amount::from_str("11.111").unwrap();
/// assert_eq!(format!("{}", value), "11.111")
/// ```
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = Decimal::from(self.0);
        value
            .set_scale(crate::constants::AMOUNT_DECIMAL_DIGITS)
            .map_err(|_| fmt::Error)?;
        write!(f, "{}", value.normalize())
    }
}

/// build an Amount from decimal string form (like "10.33")
/// note that this will fail if the string format is invalid
/// or if the conversion would cause an overflow, underflow or precision loss
///
/// ```
/// # use sigma_models::Amount;
/// # use std::str::FromStr;
/// assert!(Amount::from_str("11.1").is_ok());
/// assert!(Amount::from_str("11.1111111").is_err());
/// assert!(Amount::from_str("-11.1").is_err());
/// assert!(Amount::from_str("abc").is_err());
/// ```
impl FromStr for Amount {
    type Err = ModelsError;

    fn from_str(str_amount: &str) -> Result<Self, Self::Err> {
        let res = Decimal::from_str(str_amount)
            .map_err(|err| ModelsError::AmountParseError(err.to_string()))?
            .checked_mul(AMOUNT_DECIMAL_FACTOR.into())
            .ok_or_else(|| ModelsError::AmountParseError("amount is too large".to_string()))?;
        if res.is_sign_negative() {
            return Err(ModelsError::AmountParseError(
                "amounts cannot be strictly negative".to_string(),
            ));
        }
        if !res.fract().is_zero() {
            return Err(ModelsError::AmountParseError(format!(
                "amounts cannot be more precise than 1/{}",
                AMOUNT_DECIMAL_FACTOR
            )));
        }
        let res = res.to_u64().ok_or_else(|| {
            ModelsError::AmountParseError(
                "amount is too large to be represented as u64".to_string(),
            )
        })?;
        Ok(Amount(res))
    }
}

/// Packed asset symbol: the low byte is the precision, the following bytes
/// are up to seven upper-case ASCII letters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct AssetSymbol(u64);

impl Default for AssetSymbol {
    fn default() -> Self {
        BASE_SYMBOL
    }
}

impl AssetSymbol {
    /// Builds a symbol from its packed form
    pub const fn from_raw(raw: u64) -> Self {
        AssetSymbol(raw)
    }

    /// Packed form
    pub const fn to_raw(&self) -> u64 {
        self.0
    }

    /// Number of decimals
    pub fn precision(&self) -> u8 {
        (self.0 & 0xff) as u8
    }

    /// Ticker, like `TNC`
    pub fn name(&self) -> String {
        (1..8)
            .map(|i| ((self.0 >> (8 * i)) & 0xff) as u8)
            .take_while(|c| *c != 0)
            .map(char::from)
            .collect()
    }

    /// Checks the packed layout
    pub fn validate(&self) -> Result<(), ModelsError> {
        let name = self.name();
        if name.is_empty() || !name.bytes().all(|c| c.is_ascii_uppercase()) {
            return Err(ModelsError::InvalidAssetSymbol(format!("{:#x}", self.0)));
        }
        if (self.0 >> (8 * (name.len() + 1))) != 0 {
            return Err(ModelsError::InvalidAssetSymbol(format!(
                "{:#x} has bytes after its name",
                self.0
            )));
        }
        Ok(())
    }

    /// Packs a ticker with the chain precision
    pub fn from_name(name: &str) -> Result<Self, ModelsError> {
        if name.is_empty() || name.len() > 7 || !name.bytes().all(|c| c.is_ascii_uppercase()) {
            return Err(ModelsError::InvalidAssetSymbol(name.to_string()));
        }
        let raw = name
            .bytes()
            .enumerate()
            .fold(crate::constants::AMOUNT_DECIMAL_DIGITS as u64, |acc, (i, c)| {
                acc | (c as u64) << (8 * (i + 1))
            });
        Ok(AssetSymbol(raw))
    }
}

impl fmt::Display for AssetSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for AssetSymbol {
    type Err = ModelsError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetSymbol::from_name(s)
    }
}

/// An amount of a given asset, written `"12.5 TNC"`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Asset {
    /// quantity
    pub amount: Amount,
    /// asset
    pub symbol: AssetSymbol,
}

impl Asset {
    /// Builds an asset
    pub const fn new(amount: Amount, symbol: AssetSymbol) -> Self {
        Asset { amount, symbol }
    }

    /// Amount of the base asset
    pub const fn base(amount: Amount) -> Self {
        Asset {
            amount,
            symbol: BASE_SYMBOL,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.symbol)
    }
}

/// ```
/// # use sigma_models::{Amount, Asset};
/// # use std::str::FromStr;
/// let asset = Asset::from_str("12.5 TNC").unwrap();
/// assert_eq!(asset, Asset::base(Amount::from_str("12.5").unwrap()));
/// assert!(Asset::from_str("12.5").is_err());
/// ```
impl FromStr for Asset {
    type Err = ModelsError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(amount), Some(symbol), None) => Ok(Asset {
                amount: Amount::from_str(amount)?,
                symbol: AssetSymbol::from_str(symbol)?,
            }),
            _ => Err(ModelsError::AmountParseError(format!(
                "expected `<amount> <symbol>`, got `{}`",
                s
            ))),
        }
    }
}

macro_rules! text_serde {
    ($type:ident, $expecting:expr) => {
        impl serde::Serialize for $type {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $type {
            fn deserialize<D>(deserializer: D) -> Result<$type, D::Error>
            where
                D: serde::de::Deserializer<'de>,
            {
                struct TextVisitor;

                impl<'de> serde::de::Visitor<'de> for TextVisitor {
                    type Value = $type;

                    fn visit_str<E>(self, value: &str) -> Result<$type, E>
                    where
                        E: serde::de::Error,
                    {
                        $type::from_str(value)
                            .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
                    }

                    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                        write!(formatter, $expecting)
                    }
                }

                deserializer.deserialize_str(TextVisitor)
            }
        }
    };
}

text_serde!(Amount, "a fixed-point decimal amount");
text_serde!(AssetSymbol, "an upper-case asset ticker");
text_serde!(Asset, "an amount followed by an asset ticker");
text_serde!(InterestRate, "a non-negative percentage with at most 3 decimals");

/// Interest percentage in thousandths of a percent (`2.5%` is stored as `2500`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ord, PartialOrd, Hash, Default)]
pub struct InterestRate(u32);

impl InterestRate {
    const FACTOR: u32 = 10u32.pow(STAKING_INTEREST_PRECISION_DIGITS);

    /// Builds a rate from thousandths of a percent
    pub const fn from_raw(raw: u32) -> Self {
        InterestRate(raw)
    }

    /// Thousandths of a percent
    pub const fn to_raw(&self) -> u32 {
        self.0
    }

    /// `⌊amount · rate⌋`
    ///
    /// ```
    /// # use sigma_models::{Amount, InterestRate};
    /// # use std::str::FromStr;
    /// let rate = InterestRate::from_str("2").unwrap();
    /// let interest = rate.interest_on(Amount::from_str("1000").unwrap()).unwrap();
    /// assert_eq!(interest, Amount::from_str("20").unwrap());
    /// ```
    pub fn interest_on(&self, amount: Amount) -> Option<Amount> {
        let value = (amount.to_raw() as u128) * (self.0 as u128) / (100 * Self::FACTOR as u128);
        u64::try_from(value).ok().map(Amount::from_raw)
    }
}

impl fmt::Display for InterestRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = Decimal::from(self.0);
        value
            .set_scale(STAKING_INTEREST_PRECISION_DIGITS)
            .map_err(|_| fmt::Error)?;
        write!(f, "{}", value.normalize())
    }
}

/// ```
/// # use sigma_models::InterestRate;
/// # use std::str::FromStr;
/// assert_eq!(InterestRate::from_str("2.5").unwrap().to_raw(), 2500);
/// assert!(InterestRate::from_str("0.0001").is_err());
/// assert!(InterestRate::from_str("-1").is_err());
/// ```
impl FromStr for InterestRate {
    type Err = ModelsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|err| ModelsError::AmountParseError(err.to_string()))?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(ModelsError::AmountParseError(
                "interest cannot be negative".to_string(),
            ));
        }
        let scaled = value
            .checked_mul(Self::FACTOR.into())
            .ok_or_else(|| ModelsError::AmountParseError("interest is too large".to_string()))?;
        if !scaled.fract().is_zero() {
            return Err(ModelsError::AmountParseError(format!(
                "interest cannot have more than {} decimals",
                STAKING_INTEREST_PRECISION_DIGITS
            )));
        }
        scaled
            .to_u32()
            .map(InterestRate)
            .ok_or_else(|| ModelsError::AmountParseError("interest is too large".to_string()))
    }
}

/// Serializer for `Amount`
#[derive(Default, Clone, Copy)]
pub struct AmountSerializer {
    u64_serializer: U64VarIntSerializer,
}

impl AmountSerializer {
    /// Creates an `AmountSerializer`
    pub const fn new() -> Self {
        Self {
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<Amount> for AmountSerializer {
    fn serialize(&self, value: &Amount, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u64_serializer.serialize(&value.0, buffer)
    }
}

/// Deserializer for `Amount`
#[derive(Clone, Copy)]
pub struct AmountDeserializer {
    u64_deserializer: U64VarIntDeserializer,
}

impl AmountDeserializer {
    /// Creates an `AmountDeserializer`
    pub const fn new() -> Self {
        Self {
            u64_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
        }
    }
}

impl Default for AmountDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Amount> for AmountDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Amount, E> {
        context("Failed Amount deserialization", |input| {
            self.u64_deserializer.deserialize(input)
        })
        .map(Amount)
        .parse(buffer)
    }
}

/// Serializer for `Asset`: amount then packed symbol
#[derive(Default, Clone, Copy)]
pub struct AssetSerializer {
    amount_serializer: AmountSerializer,
    u64_serializer: U64VarIntSerializer,
}

impl AssetSerializer {
    /// Creates an `AssetSerializer`
    pub const fn new() -> Self {
        Self {
            amount_serializer: AmountSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<Asset> for AssetSerializer {
    fn serialize(&self, value: &Asset, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.amount_serializer.serialize(&value.amount, buffer)?;
        self.u64_serializer.serialize(&value.symbol.to_raw(), buffer)
    }
}

/// Deserializer for `Asset`
#[derive(Clone, Copy)]
pub struct AssetDeserializer {
    amount_deserializer: AmountDeserializer,
    symbol_deserializer: U64VarIntDeserializer,
}

impl AssetDeserializer {
    /// Creates an `AssetDeserializer`
    pub const fn new() -> Self {
        Self {
            amount_deserializer: AmountDeserializer::new(),
            symbol_deserializer: U64VarIntDeserializer::new(Included(0), Included(u64::MAX)),
        }
    }
}

impl Default for AssetDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<Asset> for AssetDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Asset, E> {
        context(
            "Failed Asset deserialization",
            tuple((
                |input| self.amount_deserializer.deserialize(input),
                |input| self.symbol_deserializer.deserialize(input),
            )),
        )
        .map(|(amount, symbol)| Asset::new(amount, AssetSymbol::from_raw(symbol)))
        .parse(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_symbol_layout() {
        assert_eq!(BASE_SYMBOL.name(), "TNC");
        assert_eq!(BASE_SYMBOL.precision(), 6);
        assert_eq!(AssetSymbol::from_str("TNC").unwrap(), BASE_SYMBOL);
        BASE_SYMBOL.validate().unwrap();
        assert!(AssetSymbol::from_raw(6).validate().is_err());
        assert!(AssetSymbol::from_str("tnc").is_err());
    }

    #[test]
    fn test_asset_text() {
        let asset = Asset::base(Amount::from_str("0.000001").unwrap());
        assert_eq!(asset.amount.to_raw(), 1);
        assert_eq!(asset.to_string(), "0.000001 TNC");
        assert_eq!(Asset::from_str(&asset.to_string()).unwrap(), asset);
    }

    #[test]
    fn test_interest_floors() {
        let rate = InterestRate::from_str("0.333").unwrap();
        assert_eq!(rate.to_raw(), 333);
        assert_eq!(rate.to_string(), "0.333");
        // 0.000010 * 0.333% rounds down to nothing
        assert_eq!(rate.interest_on(Amount::from_raw(10)), Some(Amount::zero()));
        assert_eq!(InterestRate::from_str("0").unwrap().to_raw(), 0);
    }
}
