//! Segment (SST) wire format.
//!
//! `magic "SSTv1\0\0\0" (8B) | records... | trailer: count:u32`. Each record
//! is `key_len:u32 | value_len:u32 | key | value`, with keys strictly
//! increasing in lex order.
//!
//! The optional `.sxi` sidecar holds a sparse array of `(key, file_offset)`
//! pairs sampled every `SIDECAR_SAMPLE_RATE`th record: `key_len:u32 | key |
//! offset:u64`, one after another to EOF. It is advisory — a reader missing
//! or distrusting it can always fall back to a bounded linear scan — and
//! fully reconstructible from the data section alone.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub const MAGIC: &[u8; 8] = b"SSTv1\0\0\0";
pub const TRAILER_BYTES: u64 = 4;

/// Every this-many'th record gets a sidecar entry.
pub const SIDECAR_SAMPLE_RATE: usize = 16;

pub fn write_magic<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(MAGIC)
}

pub fn read_magic<R: Read>(r: &mut R) -> io::Result<bool> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(&buf == MAGIC)
}

pub fn write_record<W: Write>(w: &mut W, key: &[u8], value: &[u8]) -> io::Result<()> {
    w.write_u32::<LittleEndian>(key.len() as u32)?;
    w.write_u32::<LittleEndian>(value.len() as u32)?;
    w.write_all(key)?;
    w.write_all(value)?;
    Ok(())
}

/// Reads one record, or `Ok(None)` at a clean record-boundary EOF.
pub fn read_record<R: Read>(r: &mut R) -> io::Result<Option<(Vec<u8>, Vec<u8>)>> {
    let key_len = match r.read_u32::<LittleEndian>() {
        Ok(v) => v as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    let value_len = r.read_u32::<LittleEndian>()? as usize;
    let mut key = vec![0u8; key_len];
    r.read_exact(&mut key)?;
    let mut value = vec![0u8; value_len];
    r.read_exact(&mut value)?;
    Ok(Some((key, value)))
}

pub fn write_trailer<W: Write>(w: &mut W, count: u32) -> io::Result<()> {
    w.write_u32::<LittleEndian>(count)
}

pub fn write_sidecar_entry<W: Write>(w: &mut W, key: &[u8], offset: u64) -> io::Result<()> {
    w.write_u32::<LittleEndian>(key.len() as u32)?;
    w.write_all(key)?;
    w.write_u64::<LittleEndian>(offset)?;
    Ok(())
}

pub fn read_sidecar_entry<R: Read>(r: &mut R) -> io::Result<Option<(Vec<u8>, u64)>> {
    let key_len = match r.read_u32::<LittleEndian>() {
        Ok(v) => v as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut key = vec![0u8; key_len];
    r.read_exact(&mut key)?;
    let offset = r.read_u64::<LittleEndian>()?;
    Ok(Some((key, offset)))
}
