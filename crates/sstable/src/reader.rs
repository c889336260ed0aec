//! Segment reader: point lookup and range scan over a published `.sst`.

use crate::format::{read_magic, read_record, read_sidecar_entry, TRAILER_BYTES};
use crate::writer::sidecar_path_for;
use crate::SstError;
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Bounded retry window for tolerating a concurrent atomic replace
/// (`ENOENT`/sharing errors) while opening or re-reading a segment file.
const RETRY_WINDOW: Duration = Duration::from_millis(200);
const RETRY_BACKOFF: Duration = Duration::from_millis(2);

pub struct SstReader {
    path: PathBuf,
    data_start: u64,
    count: u32,
    /// Sparse sidecar index, sorted by key. Empty if no `.sxi` was found or
    /// it failed to parse — the reader then falls back to a full scan.
    sidecar: Vec<(Vec<u8>, u64)>,
}

impl SstReader {
    pub fn open(path: &Path) -> Result<Self, SstError> {
        let file = open_with_retry(path)?;
        let mut reader = BufReader::new(file);
        if !read_magic(&mut reader)? {
            return Err(SstError::InvalidHeader);
        }
        let len = reader.get_ref().metadata()?.len();
        if len < 8 + TRAILER_BYTES {
            return Err(SstError::Truncated);
        }
        reader.seek(SeekFrom::Start(len - TRAILER_BYTES))?;
        let count = reader.read_u32::<LittleEndian>()?;

        let sidecar = read_sidecar(path).unwrap_or_default();

        Ok(Self {
            path: path.to_path_buf(),
            data_start: 8,
            count,
            sidecar,
        })
    }

    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Point lookup. Uses the sidecar to seek near the target key when
    /// present, otherwise scans from the start of the data section.
    pub fn try_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SstError> {
        let start_offset = self.seek_hint(key);
        let file = open_with_retry(&self.path)?;
        let data_end = data_end_of(&file)?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(start_offset))?;

        while let Some((k, v)) = read_bounded_record(&mut reader, data_end)? {
            match k.as_slice().cmp(key) {
                std::cmp::Ordering::Equal => return Ok(Some(v)),
                std::cmp::Ordering::Greater => return Ok(None),
                std::cmp::Ordering::Less => continue,
            }
        }
        Ok(None)
    }

    /// Range scan over `[from_inclusive, to_exclusive)`. `None` on either
    /// bound means unbounded on that side. Returns a materialized vector:
    /// segment files are read once per checkpoint and typically modest in
    /// size on the resource-constrained hosts this engine targets, so a
    /// lazy cursor buys little here.
    pub fn scan_range(
        &self,
        from_inclusive: Option<&[u8]>,
        to_exclusive: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, SstError> {
        let start_offset = from_inclusive
            .map(|k| self.seek_hint(k))
            .unwrap_or(self.data_start);
        let file = open_with_retry(&self.path)?;
        let data_end = data_end_of(&file)?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(start_offset))?;

        let mut out = Vec::new();
        while let Some((k, v)) = read_bounded_record(&mut reader, data_end)? {
            if let Some(from) = from_inclusive {
                if k.as_slice() < from {
                    continue;
                }
            }
            if let Some(to) = to_exclusive {
                if k.as_slice() >= to {
                    break;
                }
            }
            out.push((k, v));
        }
        Ok(out)
    }

    /// The largest sidecar offset at or before `key`, so a scan starting
    /// there never has to walk past the target. Falls back to the start of
    /// the data section when the sidecar is empty or `key` precedes every
    /// sampled entry.
    fn seek_hint(&self, key: &[u8]) -> u64 {
        match self.sidecar.partition_point(|(k, _)| k.as_slice() <= key) {
            0 => self.data_start,
            i => self.sidecar[i - 1].1,
        }
    }
}

/// The offset immediately after the last data record, i.e. the start of
/// the trailer. Reads must never cross this: `read_record` has no way to
/// tell a genuine record from the trailer's bare `count:u32`, so a loop
/// that keeps going past the last record reads the trailer as a corrupt
/// `key_len` and hits EOF mid-record instead of the clean end-of-data it
/// expects.
fn data_end_of(file: &File) -> io::Result<u64> {
    Ok(file.metadata()?.len().saturating_sub(TRAILER_BYTES))
}

/// Reads one record, refusing to read at or past `data_end` (the trailer).
fn read_bounded_record<R: Read + Seek>(
    reader: &mut R,
    data_end: u64,
) -> io::Result<Option<(Vec<u8>, Vec<u8>)>> {
    if reader.stream_position()? >= data_end {
        return Ok(None);
    }
    read_record(reader)
}

fn read_sidecar(sst_path: &Path) -> io::Result<Vec<(Vec<u8>, u64)>> {
    let sidecar_path = sidecar_path_for(sst_path);
    let file = File::open(sidecar_path)?;
    let mut reader = BufReader::new(file);
    let mut entries = Vec::new();
    while let Some(entry) = read_sidecar_entry(&mut reader)? {
        entries.push(entry);
    }
    Ok(entries)
}

fn open_with_retry(path: &Path) -> io::Result<File> {
    let deadline = Instant::now() + RETRY_WINDOW;
    loop {
        match File::open(path) {
            Ok(f) => return Ok(f),
            Err(e) if is_transient(&e) && Instant::now() < deadline => {
                std::thread::sleep(RETRY_BACKOFF);
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied | io::ErrorKind::WouldBlock
    )
}
