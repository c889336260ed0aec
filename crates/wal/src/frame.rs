//! Frame wire format and opcode payload encoding/decoding.
//!
//! A frame on disk is `len:u32 LE | payload:len bytes | crc32:u32 LE`, with
//! the CRC computed over `payload` alone using the reflected polynomial
//! 0xEDB88320 (the `crc32fast` crate's only polynomial, which matches).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::io::{self, Read};

pub const OP_BEGIN: u8 = 0x01;
pub const OP_PUT: u8 = 0x02;
pub const OP_DELETE: u8 = 0x03;
pub const OP_DROP_TABLE: u8 = 0x04;
pub const OP_COMMIT: u8 = 0xFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Begin {
        tx_id: u64,
        seq_no: u64,
    },
    Put {
        tx_id: u64,
        table: String,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        tx_id: u64,
        table: String,
        key: Vec<u8>,
    },
    DropTable {
        tx_id: u64,
        table: String,
    },
    Commit {
        tx_id: u64,
        ops_count: u32,
    },
}

/// Wraps a raw payload into a complete on-disk frame.
pub fn wrap_frame(payload: &[u8]) -> Vec<u8> {
    let mut hasher = Crc32::new();
    hasher.update(payload);
    let crc = hasher.finalize();

    let mut out = Vec::with_capacity(4 + payload.len() + 4);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

pub fn encode_begin(tx_id: u64, seq_no: u64) -> Vec<u8> {
    let mut p = Vec::with_capacity(17);
    p.write_u8(OP_BEGIN).unwrap();
    p.write_u64::<LittleEndian>(tx_id).unwrap();
    p.write_u64::<LittleEndian>(seq_no).unwrap();
    wrap_frame(&p)
}

pub fn encode_put(tx_id: u64, table: &str, key: &[u8], value: &[u8]) -> Vec<u8> {
    let table_bytes = table.as_bytes();
    let mut p = Vec::with_capacity(19 + table_bytes.len() + key.len() + value.len());
    p.write_u8(OP_PUT).unwrap();
    p.write_u64::<LittleEndian>(tx_id).unwrap();
    p.write_u16::<LittleEndian>(table_bytes.len() as u16).unwrap();
    p.write_u32::<LittleEndian>(key.len() as u32).unwrap();
    p.write_u32::<LittleEndian>(value.len() as u32).unwrap();
    p.extend_from_slice(table_bytes);
    p.extend_from_slice(key);
    p.extend_from_slice(value);
    wrap_frame(&p)
}

pub fn encode_delete(tx_id: u64, table: &str, key: &[u8]) -> Vec<u8> {
    let table_bytes = table.as_bytes();
    let mut p = Vec::with_capacity(15 + table_bytes.len() + key.len());
    p.write_u8(OP_DELETE).unwrap();
    p.write_u64::<LittleEndian>(tx_id).unwrap();
    p.write_u16::<LittleEndian>(table_bytes.len() as u16).unwrap();
    p.write_u32::<LittleEndian>(key.len() as u32).unwrap();
    p.extend_from_slice(table_bytes);
    p.extend_from_slice(key);
    wrap_frame(&p)
}

pub fn encode_drop_table(tx_id: u64, table: &str) -> Vec<u8> {
    let table_bytes = table.as_bytes();
    let mut p = Vec::with_capacity(11 + table_bytes.len());
    p.write_u8(OP_DROP_TABLE).unwrap();
    p.write_u64::<LittleEndian>(tx_id).unwrap();
    p.write_u16::<LittleEndian>(table_bytes.len() as u16).unwrap();
    p.extend_from_slice(table_bytes);
    wrap_frame(&p)
}

pub fn encode_commit(tx_id: u64, ops_count: u32) -> Vec<u8> {
    let mut p = Vec::with_capacity(13);
    p.write_u8(OP_COMMIT).unwrap();
    p.write_u64::<LittleEndian>(tx_id).unwrap();
    p.write_u32::<LittleEndian>(ops_count).unwrap();
    wrap_frame(&p)
}

#[derive(Debug)]
pub enum FrameReadError {
    Io(io::Error),
    /// Not an I/O error but the frame is unusable: truncated tail, bad CRC,
    /// a length too small for the declared op, or an unknown opcode.
    /// Recovery treats this as "stop here and truncate".
    Torn,
}

impl From<io::Error> for FrameReadError {
    fn from(e: io::Error) -> Self {
        FrameReadError::Io(e)
    }
}

/// Reads one frame and returns its payload, or `Ok(None)` on a clean EOF
/// (nothing read at all — the prior frame was the last well-formed one).
pub fn read_frame<R: Read>(r: &mut R) -> Result<Option<Vec<u8>>, FrameReadError> {
    let len = match r.read_u32::<LittleEndian>() {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    const MAX_FRAME: u32 = 256 * 1024 * 1024;
    if len > MAX_FRAME {
        return Err(FrameReadError::Torn);
    }

    let mut payload = vec![0u8; len as usize];
    if let Err(e) = r.read_exact(&mut payload) {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            return Err(FrameReadError::Torn);
        }
        return Err(e.into());
    }

    let crc = match r.read_u32::<LittleEndian>() {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(FrameReadError::Torn),
        Err(e) => return Err(e.into()),
    };

    let mut hasher = Crc32::new();
    hasher.update(&payload);
    if hasher.finalize() != crc {
        return Err(FrameReadError::Torn);
    }

    Ok(Some(payload))
}

/// Decodes a payload previously validated by [`read_frame`].
pub fn decode_payload(payload: &[u8]) -> Result<Payload, FrameReadError> {
    let mut r = payload;
    let op = r.read_u8().map_err(|_| FrameReadError::Torn)?;
    match op {
        OP_BEGIN => {
            let tx_id = r.read_u64::<LittleEndian>().map_err(|_| FrameReadError::Torn)?;
            let seq_no = r.read_u64::<LittleEndian>().map_err(|_| FrameReadError::Torn)?;
            Ok(Payload::Begin { tx_id, seq_no })
        }
        OP_PUT => {
            let tx_id = r.read_u64::<LittleEndian>().map_err(|_| FrameReadError::Torn)?;
            let table_len = r.read_u16::<LittleEndian>().map_err(|_| FrameReadError::Torn)? as usize;
            let key_len = r.read_u32::<LittleEndian>().map_err(|_| FrameReadError::Torn)? as usize;
            let value_len = r.read_u32::<LittleEndian>().map_err(|_| FrameReadError::Torn)? as usize;
            if table_len + key_len + value_len > r.len() {
                return Err(FrameReadError::Torn);
            }
            let mut table_buf = vec![0u8; table_len];
            r.read_exact(&mut table_buf).map_err(|_| FrameReadError::Torn)?;
            let table = String::from_utf8(table_buf).map_err(|_| FrameReadError::Torn)?;
            let mut key = vec![0u8; key_len];
            r.read_exact(&mut key).map_err(|_| FrameReadError::Torn)?;
            let mut value = vec![0u8; value_len];
            r.read_exact(&mut value).map_err(|_| FrameReadError::Torn)?;
            Ok(Payload::Put { tx_id, table, key, value })
        }
        OP_DELETE => {
            let tx_id = r.read_u64::<LittleEndian>().map_err(|_| FrameReadError::Torn)?;
            let table_len = r.read_u16::<LittleEndian>().map_err(|_| FrameReadError::Torn)? as usize;
            let key_len = r.read_u32::<LittleEndian>().map_err(|_| FrameReadError::Torn)? as usize;
            if table_len + key_len > r.len() {
                return Err(FrameReadError::Torn);
            }
            let mut table_buf = vec![0u8; table_len];
            r.read_exact(&mut table_buf).map_err(|_| FrameReadError::Torn)?;
            let table = String::from_utf8(table_buf).map_err(|_| FrameReadError::Torn)?;
            let mut key = vec![0u8; key_len];
            r.read_exact(&mut key).map_err(|_| FrameReadError::Torn)?;
            Ok(Payload::Delete { tx_id, table, key })
        }
        OP_DROP_TABLE => {
            let tx_id = r.read_u64::<LittleEndian>().map_err(|_| FrameReadError::Torn)?;
            let table_len = r.read_u16::<LittleEndian>().map_err(|_| FrameReadError::Torn)? as usize;
            if table_len > r.len() {
                return Err(FrameReadError::Torn);
            }
            let mut table_buf = vec![0u8; table_len];
            r.read_exact(&mut table_buf).map_err(|_| FrameReadError::Torn)?;
            let table = String::from_utf8(table_buf).map_err(|_| FrameReadError::Torn)?;
            Ok(Payload::DropTable { tx_id, table })
        }
        OP_COMMIT => {
            let tx_id = r.read_u64::<LittleEndian>().map_err(|_| FrameReadError::Torn)?;
            let ops_count = r.read_u32::<LittleEndian>().map_err(|_| FrameReadError::Torn)?;
            Ok(Payload::Commit { tx_id, ops_count })
        }
        _ => Err(FrameReadError::Torn),
    }
}
