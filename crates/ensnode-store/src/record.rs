//! Framing of one stored record.
//!
//! ```text
//! [stored_at: i64 secs][record: i32 len + bytes][xxh3_64(record): u64]
//! ```
//!
//! The record itself is the node's own `[kind tag][presence flag][payload]`
//! encoding and is never interpreted here; `Node::load_record` insists the
//! block holds exactly one record.

use std::time::SystemTime;

use ensnode_buffer::{BufferReader, BufferWriter};
use ensnode_error::{EnsError, Result};
use xxhash_rust::xxh3::xxh3_64;

/// A record read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub stored_at: SystemTime,
    bytes: Vec<u8>,
}

impl StoredRecord {
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Reader positioned at the start of the node record.
    #[must_use]
    pub fn reader(&self) -> BufferReader<'_> {
        BufferReader::new(&self.bytes)
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

pub(crate) fn encode(record: &[u8], stored_at: SystemTime) -> Result<Vec<u8>> {
    let mut framed = BufferWriter::with_capacity(record.len() + 20);
    framed.write_time(stored_at);
    framed.write_block(record)?;
    framed.write_u64(xxh3_64(record));
    Ok(framed.into_bytes())
}

pub(crate) fn decode(bytes: &[u8]) -> Result<StoredRecord> {
    let mut reader = BufferReader::new(bytes);
    let stored_at = reader.read_time("stored_at")?;
    let record = reader.read_block("record")?;
    let expected = reader.read_u64("checksum")?;
    reader.expect_end()?;
    let actual = xxh3_64(record);
    if actual != expected {
        return Err(EnsError::corrupt(format!(
            "record checksum mismatch: stored {expected:#018x}, computed {actual:#018x}"
        )));
    }
    Ok(StoredRecord {
        stored_at,
        bytes: record.to_vec(),
    })
}
