// Copyright (c) 2024 SIGMA ENGINE

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Checks that the application pipeline may skip.
///
/// Blocks received from peers go through `SkipFlags::NOTHING`. Replaying
/// trusted blocks or producing locally may skip checks already performed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SkipFlags(u32);

impl SkipFlags {
    /// run every check
    pub const NOTHING: SkipFlags = SkipFlags(0);
    /// producer signature of the block
    pub const BOBSERVER_SIGNATURE: SkipFlags = SkipFlags(1 << 0);
    /// signatures of the transactions
    pub const TRANSACTION_SIGNATURES: SkipFlags = SkipFlags(1 << 1);
    /// already-applied transaction check
    pub const TRANSACTION_DUPE_CHECK: SkipFlags = SkipFlags(1 << 2);
    /// fork database bookkeeping
    pub const FORK_DB: SkipFlags = SkipFlags(1 << 3);
    /// maximal block size
    pub const BLOCK_SIZE_CHECK: SkipFlags = SkipFlags(1 << 4);
    /// authority verification of the transactions
    pub const AUTHORITY_CHECK: SkipFlags = SkipFlags(1 << 6);
    /// transaction merkle root
    pub const MERKLE_CHECK: SkipFlags = SkipFlags(1 << 7);
    /// bound on reversible history
    pub const UNDO_HISTORY_CHECK: SkipFlags = SkipFlags(1 << 8);
    /// scheduled producer of the slot
    pub const BOBSERVER_SCHEDULE_CHECK: SkipFlags = SkipFlags(1 << 9);
    /// structural validation of the operations
    pub const VALIDATE: SkipFlags = SkipFlags(1 << 10);
    /// supply invariants after each block
    pub const VALIDATE_INVARIANTS: SkipFlags = SkipFlags(1 << 11);
    /// undo session of the block
    pub const UNDO_BLOCK: SkipFlags = SkipFlags(1 << 12);
    /// block log
    pub const BLOCK_LOG: SkipFlags = SkipFlags(1 << 13);

    /// Whether every flag of `other` is set
    pub const fn contains(&self, other: SkipFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bits
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Flags from raw bits
    pub const fn from_bits(bits: u32) -> Self {
        SkipFlags(bits)
    }
}

impl BitOr for SkipFlags {
    type Output = SkipFlags;

    fn bitor(self, rhs: SkipFlags) -> SkipFlags {
        SkipFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for SkipFlags {
    fn bitor_assign(&mut self, rhs: SkipFlags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for SkipFlags {
    type Output = SkipFlags;

    fn bitand(self, rhs: SkipFlags) -> SkipFlags {
        SkipFlags(self.0 & rhs.0)
    }
}

impl fmt::Debug for SkipFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SkipFlags({:#06x})", self.0)
    }
}
