// Copyright (c) 2024 SIGMA ENGINE

/// Builds order-preserving index keys.
///
/// Byte-wise comparison of two keys follows the comparison of the values
/// they were built from, field by field:
/// * strings are written followed by a NUL byte so that a prefix sorts first
/// * integers are written big endian
/// * descending integers are written bit-inverted
///
/// ```
/// # use sigma_db::KeyBuilder;
/// let high = KeyBuilder::new().u64_desc(10).str("bob").build();
/// let low = KeyBuilder::new().u64_desc(3).str("alice").build();
/// assert!(high < low);
/// ```
#[derive(Debug, Default, Clone)]
pub struct KeyBuilder {
    buffer: Vec<u8>,
}

impl KeyBuilder {
    /// Starts an empty key
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a NUL-terminated string
    pub fn str(mut self, value: &str) -> Self {
        self.buffer.extend_from_slice(value.as_bytes());
        self.buffer.push(0);
        self
    }

    /// Appends raw bytes, for fixed-size values only
    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.buffer.extend_from_slice(value);
        self
    }

    /// Appends a single byte
    pub fn u8(mut self, value: u8) -> Self {
        self.buffer.push(value);
        self
    }

    /// Appends an ascending `u32`
    pub fn u32(self, value: u32) -> Self {
        self.bytes(&value.to_be_bytes())
    }

    /// Appends a descending `u32`
    pub fn u32_desc(self, value: u32) -> Self {
        self.u32(!value)
    }

    /// Appends an ascending `u64`
    pub fn u64(self, value: u64) -> Self {
        self.bytes(&value.to_be_bytes())
    }

    /// Appends a descending `u64`
    pub fn u64_desc(self, value: u64) -> Self {
        self.u64(!value)
    }

    /// Appends a boolean, `false` first
    pub fn bool(self, value: bool) -> Self {
        self.u8(value as u8)
    }

    /// Returns the key
    pub fn build(self) -> Vec<u8> {
        self.buffer
    }
}
