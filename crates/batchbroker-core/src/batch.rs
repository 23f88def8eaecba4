//! Record-Batch File Format
//!
//! This module implements the binary file format for storing a batch of
//! records in backing storage. A batch file is written exactly once when a
//! batch is committed and is never mutated afterwards.
//!
//! ## Batch File Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (32 bytes, little-endian, packed)                    │
//! │ - Magic bytes: "smb!" (4 bytes)                             │
//! │ - Version: 1 (2 bytes, signed)                              │
//! │ - Creation time, microseconds since epoch (8 bytes, signed) │
//! │ - Record count N (4 bytes, unsigned)                        │
//! │ - Reserved (14 bytes, zero)                                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Record index (N × 4 bytes)                                  │
//! │ - Byte offset of record i relative to the payload region    │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Payload region                                              │
//! │ - The N records concatenated with no separators             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Record i's size is `index[i+1] - index[i]`; the last record extends to
//! the end of the file. Storing no total payload size keeps the header
//! fixed while still allowing O(1) seeks to any record.
//!
//! ## Usage
//!
//! ### Writing a batch
//! ```ignore
//! let mut sink = backing.writer(&path).await?;
//! batch::write(&mut sink, &records).await?;
//! sink.commit().await?;
//! ```
//!
//! ### Reading a record
//! ```ignore
//! let rdr = backing.reader(&path).await?;
//! let mut batch = RecordBatch::parse(rdr).await?;
//! let record = batch.record(3).await?;
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Magic bytes identifying a record-batch file: "smb!"
pub const BATCH_MAGIC: [u8; 4] = [b's', b'm', b'b', b'!'];

/// Version number of the batch file format
pub const BATCH_VERSION: i16 = 1;

/// Batch header size (32 bytes)
pub const HEADER_SIZE: usize = 32;

/// Size of one record index entry (4 bytes)
pub const INDEX_ENTRY_SIZE: usize = 4;

const RESERVED_SIZE: usize = 14;

/// Current time in microseconds since the Unix epoch
fn now_us() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

/// Parsed batch file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Creation time in microseconds since the Unix epoch
    pub unix_epoch_us: i64,

    /// Number of records in the batch
    pub num_records: u32,
}

impl Header {
    /// Decode a header from its 32-byte wire representation.
    ///
    /// Magic bytes and version are validated; files written by an unknown
    /// producer or a newer format version are rejected.
    fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        if buf[0..4] != BATCH_MAGIC {
            return Err(Error::InvalidMagic);
        }

        let mut rest = &buf[4..];
        let version = rest.get_i16_le();
        if version != BATCH_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let unix_epoch_us = rest.get_i64_le();
        let num_records = rest.get_u32_le();

        Ok(Self {
            unix_epoch_us,
            num_records,
        })
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(&BATCH_MAGIC); // 4 bytes
        buf.put_i16_le(BATCH_VERSION); // 2 bytes
        buf.put_i64_le(self.unix_epoch_us); // 8 bytes
        buf.put_u32_le(self.num_records); // 4 bytes
        buf.put_bytes(0, RESERVED_SIZE); // 14 bytes
    }
}

/// Write a record-batch file to `wtr`: header, record index, payloads.
///
/// The creation timestamp is taken from the system clock. On failure the
/// sink's contents are undefined and the caller is expected to discard it.
pub async fn write<W>(wtr: &mut W, records: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_with_clock(wtr, records, now_us).await
}

/// Write a record-batch file, obtaining the creation timestamp from `clock`.
///
/// Injecting the clock keeps the on-disk bytes deterministic under test.
pub async fn write_with_clock<W>(
    wtr: &mut W,
    records: &[Bytes],
    clock: impl Fn() -> i64,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let header = Header {
        unix_epoch_us: clock(),
        num_records: records.len() as u32,
    };

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + records.len() * INDEX_ENTRY_SIZE);
    header.encode(&mut buf);

    let mut record_offset: u32 = 0;
    for record in records {
        buf.put_u32_le(record_offset);

        record_offset = u32::try_from(record.len())
            .ok()
            .and_then(|len| record_offset.checked_add(len))
            .ok_or_else(|| {
                Error::InvalidBatch("batch payload exceeds u32 offset space".to_string())
            })?;
    }

    wtr.write_all(&buf).await?;

    for record in records {
        wtr.write_all(record).await?;
    }

    Ok(())
}

/// A parsed record batch holding the header, the record index, and the
/// reader positioned over the file for lazy record extraction.
#[derive(Debug)]
pub struct RecordBatch<R> {
    header: Header,
    index: Vec<u32>,
    rdr: R,
}

impl<R> RecordBatch<R>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    /// Parse a record-batch file, reading the header and record index and
    /// retaining `rdr` for record extraction.
    pub async fn parse(mut rdr: R) -> Result<Self> {
        let mut header_buf = [0u8; HEADER_SIZE];
        rdr.read_exact(&mut header_buf).await?;
        let header = Header::decode(&header_buf)?;

        let mut index_buf = vec![0u8; header.num_records as usize * INDEX_ENTRY_SIZE];
        rdr.read_exact(&mut index_buf).await?;

        let mut entries = &index_buf[..];
        let index = (0..header.num_records)
            .map(|_| entries.get_u32_le())
            .collect();

        Ok(Self { header, index, rdr })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn num_records(&self) -> u32 {
        self.header.num_records
    }

    /// Read the bytes of record `index`.
    ///
    /// Non-final records span `index[i+1] - index[i]` bytes; the final
    /// record extends to the end of the file.
    pub async fn record(&mut self, index: u32) -> Result<Bytes> {
        if index >= self.header.num_records {
            return Err(Error::OutOfBounds {
                index,
                count: self.header.num_records,
            });
        }

        let record_offset = self.index[index as usize];
        let file_offset = (HEADER_SIZE + self.index.len() * INDEX_ENTRY_SIZE) as u64
            + u64::from(record_offset);
        self.rdr
            .seek(std::io::SeekFrom::Start(file_offset))
            .await?;

        // last record, read the remainder of the file
        if index as usize == self.index.len() - 1 {
            let mut buf = Vec::new();
            self.rdr.read_to_end(&mut buf).await?;
            return Ok(Bytes::from(buf));
        }

        let size = self.index[index as usize + 1]
            .checked_sub(record_offset)
            .ok_or_else(|| Error::InvalidBatch("record index is not monotonic".to_string()))?;
        let mut buf = vec![0u8; size as usize];
        self.rdr.read_exact(&mut buf).await?;

        Ok(Bytes::from(buf))
    }
}
