//! SDP package manifest record stream
//!
//! Each record describes one file of a version. Records are written
//! back to back with no count and no trailer; a reader consumes
//! records until the stream ends. Layout, bytes in order:
//!
//! | Field      | Size       | Encoding                     |
//! |------------|------------|------------------------------|
//! | `name_len` | 1 byte     | unsigned, max 255            |
//! | `name`     | `name_len` | raw path bytes               |
//! | `md5`      | 16 bytes   | raw digest                   |
//! | `crc32`    | 4 bytes    | big-endian unsigned          |
//! | `size`     | 4 bytes    | big-endian unsigned, uncompressed length |
//!
//! Both 32-bit fields are big-endian in both directions.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::{Error, Result};

/// One manifest entry on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpRecord {
    /// Version-relative path, normalized (lowercase, forward slashes)
    pub filename: String,
    /// MD5 digest of the uncompressed file content
    pub md5: [u8; 16],
    /// CRC32 (IEEE polynomial) of the uncompressed file content
    pub crc32: u32,
    /// Uncompressed length in bytes
    pub size: u32,
}

/// Read a single record.
///
/// Returns `Ok(None)` on end of stream at a record boundary. A stream
/// ending anywhere inside a record is [`Error::Truncated`].
pub fn read_record<R: Read>(r: &mut R) -> Result<Option<SdpRecord>> {
    let name_len = match r.read_u8() {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut name = vec![0u8; name_len as usize];
    read_exact_or_truncated(r, &mut name)?;

    let mut md5 = [0u8; 16];
    read_exact_or_truncated(r, &mut md5)?;

    let crc32 = read_u32_or_truncated(r)?;
    let size = read_u32_or_truncated(r)?;

    let filename = String::from_utf8(name).map_err(|_| Error::InvalidName)?;

    Ok(Some(SdpRecord {
        filename,
        md5,
        crc32,
        size,
    }))
}

/// Read records until end of stream.
pub fn read_all<R: Read>(r: &mut R) -> Result<Vec<SdpRecord>> {
    let mut records = Vec::new();
    while let Some(record) = read_record(r)? {
        records.push(record);
    }
    Ok(records)
}

/// Write a single record.
///
/// # Errors
///
/// [`Error::NameTooLong`] if the filename exceeds 255 bytes.
pub fn write_record<W: Write>(w: &mut W, record: &SdpRecord) -> Result<()> {
    let name = record.filename.as_bytes();
    if name.len() > 255 {
        return Err(Error::NameTooLong(name.len()));
    }

    w.write_u8(name.len() as u8)?;
    w.write_all(name)?;
    w.write_all(&record.md5)?;
    w.write_u32::<BigEndian>(record.crc32)?;
    w.write_u32::<BigEndian>(record.size)?;
    Ok(())
}

/// Write records back to back.
pub fn write_all<W: Write>(w: &mut W, records: &[SdpRecord]) -> Result<()> {
    for record in records {
        write_record(w, record)?;
    }
    Ok(())
}

fn read_exact_or_truncated<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Truncated
        } else {
            Error::Io(e)
        }
    })
}

fn read_u32_or_truncated<R: Read>(r: &mut R) -> Result<u32> {
    r.read_u32::<BigEndian>().map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Truncated
        } else {
            Error::Io(e)
        }
    })
}
