// Copyright (c) 2024 SIGMA ENGINE

/// Hash size
pub const HASH_SIZE_BYTES: usize = 32;
