// Copyright (c) 2024 SIGMA ENGINE

use displaydoc::Display;
use thiserror::Error;

/// Time error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// Error converting
    ConversionError,
    /// Time overflow error
    TimeOverflowError,
    /// Cannot parse `{0}` as a timestamp
    ParsingError(String),
}
