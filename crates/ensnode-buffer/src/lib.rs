//! Sequential binary buffer codec.
//!
//! Node records are written through a [`BufferWriter`] and read back through
//! a [`BufferReader`]. The two directions are separate types so a buffer can
//! never be read and written at once. All values are little-endian:
//!
//! | primitive  | encoding                                  |
//! |------------|-------------------------------------------|
//! | `i32`      | 4 bytes                                   |
//! | `i64`      | 8 bytes                                   |
//! | `u64`      | 8 bytes                                   |
//! | `f64`      | 8 bytes, IEEE-754 bit pattern             |
//! | timestamp  | `i64` seconds since the Unix epoch        |
//! | block      | `i32` length, then that many raw bytes    |
//! | string     | block holding UTF-8                       |
//! | `f64` vec  | `i32` count, then `count` doubles         |
//!
//! Counts always precede variable-length data, so every record is
//! self-delimiting.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ensnode_error::{EnsError, Result};

const I32_BYTES: usize = 4;
const I64_BYTES: usize = 8;
const F64_BYTES: usize = 8;

/// Append-only writer.
#[derive(Debug, Default, Clone)]
pub struct BufferWriter {
    bytes: Vec<u8>,
}

impl BufferWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a timestamp with one-second resolution.
    pub fn write_time(&mut self, time: SystemTime) {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_secs()).map_or(i64::MIN, |s| -s),
        };
        self.write_i64(secs);
    }

    /// Raw bytes with no length prefix; the reader must know the size.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Length-prefixed byte block.
    pub fn write_block(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_len(bytes.len(), "block")?;
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    /// Length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_block(value.as_bytes())
    }

    /// Count-prefixed sequence of doubles.
    pub fn write_f64_slice(&mut self, values: &[f64]) -> Result<()> {
        self.write_len(values.len(), "f64 vector")?;
        self.bytes.reserve(values.len() * F64_BYTES);
        for &value in values {
            self.write_f64(value);
        }
        Ok(())
    }

    fn write_len(&mut self, len: usize, what: &str) -> Result<()> {
        let len = i32::try_from(len).map_err(|_| {
            EnsError::invalid_state(format!("{what} too large for i32 length prefix: {len}"))
        })?;
        self.write_i32(len);
        Ok(())
    }
}

/// Forward-only reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct BufferReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> BufferReader<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    /// Current read offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes left to read.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.cursor >= self.bytes.len()
    }

    pub fn read_i32(&mut self, field: &str) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array::<I32_BYTES>(field)?))
    }

    pub fn read_i64(&mut self, field: &str) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array::<I64_BYTES>(field)?))
    }

    pub fn read_u64(&mut self, field: &str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array::<I64_BYTES>(field)?))
    }

    pub fn read_f64(&mut self, field: &str) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array::<F64_BYTES>(field)?))
    }

    pub fn read_time(&mut self, field: &str) -> Result<SystemTime> {
        let secs = self.read_i64(field)?;
        let offset = Duration::from_secs(secs.unsigned_abs());
        let time = if secs >= 0 {
            UNIX_EPOCH.checked_add(offset)
        } else {
            UNIX_EPOCH.checked_sub(offset)
        };
        time.ok_or_else(|| EnsError::corrupt(format!("timestamp {field}={secs} not representable")))
    }

    /// Borrow exactly `len` raw bytes.
    pub fn read_raw(&mut self, len: usize, field: &str) -> Result<&'a [u8]> {
        let end = self.cursor.checked_add(len).ok_or_else(|| {
            EnsError::corrupt(format!("overflow reading field {field}"))
        })?;
        if end > self.bytes.len() {
            return Err(EnsError::corrupt(format!(
                "field {field} out of bounds: need {len} bytes at offset {}, total {}",
                self.cursor,
                self.bytes.len()
            )));
        }
        let out = &self.bytes[self.cursor..end];
        self.cursor = end;
        Ok(out)
    }

    /// Borrow a length-prefixed block.
    pub fn read_block(&mut self, field: &str) -> Result<&'a [u8]> {
        let len = self.read_len(field)?;
        self.read_raw(len, field)
    }

    pub fn read_string(&mut self, field: &str) -> Result<String> {
        let bytes = self.read_block(field)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|err| EnsError::corrupt(format!("field {field} is not UTF-8: {err}")))
    }

    pub fn read_f64_vec(&mut self, field: &str) -> Result<Vec<f64>> {
        let count = self.read_len(field)?;
        let needed = count.checked_mul(F64_BYTES).ok_or_else(|| {
            EnsError::corrupt(format!("f64 count {count} for {field} overflows"))
        })?;
        if needed > self.remaining() {
            return Err(EnsError::corrupt(format!(
                "f64 vector {field} declares {count} values but only {} bytes remain",
                self.remaining()
            )));
        }
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_f64(field)?);
        }
        Ok(values)
    }

    /// Fail unless every byte has been consumed.
    pub fn expect_end(&self) -> Result<()> {
        if self.is_exhausted() {
            Ok(())
        } else {
            Err(EnsError::corrupt(format!(
                "trailing bytes: consumed {}, total {}",
                self.cursor,
                self.bytes.len()
            )))
        }
    }

    fn read_len(&mut self, field: &str) -> Result<usize> {
        let raw = self.read_i32(field)?;
        usize::try_from(raw)
            .map_err(|_| EnsError::corrupt(format!("negative length {raw} for field {field}")))
    }

    fn read_array<const N: usize>(&mut self, field: &str) -> Result<[u8; N]> {
        let raw = self.read_raw(N, field)?;
        let mut out = [0u8; N];
        out.copy_from_slice(raw);
        Ok(out)
    }
}
