// Copyright (c) 2024 SIGMA ENGINE

use displaydoc::Display;
use thiserror::Error;

/// Hash error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum HashError {
    /// parsing error: {0}
    ParsingError(String),
    /// wrong prefix for hash: expected {0}, got {1}
    WrongPrefix(String, String),
}
