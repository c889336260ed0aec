//! Read-only integrity scanners over the WAL and published segments.
//!
//! These never mutate anything — they exist for an operator or test to
//! inspect on-disk state independently of the engine's own recovery path,
//! which self-heals and therefore can't itself report what it found broken.

use crate::{Database, Result};
use std::fs::File;
use std::io::BufReader;
use wal::{FrameReadError, Payload};

/// Tally of WAL frames found by a raw scan, independent of transaction
/// boundaries or torn-tail recovery.
#[derive(Debug, Clone, Default)]
pub struct WalIntegrityReport {
    pub begin_frames: usize,
    pub put_frames: usize,
    pub delete_frames: usize,
    pub drop_table_frames: usize,
    pub commit_frames: usize,
    /// True if the file ends mid-frame (a torn tail) rather than exactly on
    /// a frame boundary. Not an error: the engine's own recovery truncates
    /// this away on open.
    pub torn_tail: bool,
    pub bytes_scanned: u64,
}

/// Per-segment structural check: every record's key must strictly increase,
/// and the trailer's count must equal the number of records actually present.
#[derive(Debug, Clone)]
pub struct SegmentIntegrityReport {
    pub name: String,
    pub record_count: u32,
    pub trailer_count: u32,
    pub strictly_increasing: bool,
}

impl SegmentIntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.strictly_increasing && self.record_count == self.trailer_count
    }
}

impl Database {
    /// Scans the live WAL file frame-by-frame without going through
    /// transaction-boundary recovery logic.
    pub fn wal_integrity_report(&self) -> Result<WalIntegrityReport> {
        let mut report = WalIntegrityReport::default();
        let file = match File::open(&self.wal_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);
        loop {
            match wal::read_frame(&mut reader) {
                Ok(Some(payload)) => {
                    report.bytes_scanned += payload.len() as u64;
                    match wal::decode_payload(&payload) {
                        Ok(Payload::Begin { .. }) => report.begin_frames += 1,
                        Ok(Payload::Put { .. }) => report.put_frames += 1,
                        Ok(Payload::Delete { .. }) => report.delete_frames += 1,
                        Ok(Payload::DropTable { .. }) => report.drop_table_frames += 1,
                        Ok(Payload::Commit { .. }) => report.commit_frames += 1,
                        Err(FrameReadError::Torn) => report.torn_tail = true,
                        Err(e) => return Err(wal::WalError::Io(to_io_error(e)).into()),
                    }
                }
                Ok(None) => break,
                Err(FrameReadError::Torn) => {
                    report.torn_tail = true;
                    break;
                }
                Err(e) => return Err(wal::WalError::Io(to_io_error(e)).into()),
            }
        }
        Ok(report)
    }

    /// Independently re-verifies every published segment this `Database`
    /// currently has a reader open for.
    pub fn segment_integrity_reports(&self) -> Result<Vec<SegmentIntegrityReport>> {
        let mut reports = Vec::new();
        for state in self.tables.read().values() {
            let guard = state.segment.read();
            let Some(reader) = guard.as_ref() else {
                continue;
            };
            let records = reader.scan_range(None, None)?;
            let strictly_increasing = records.windows(2).all(|w| w[0].0 < w[1].0);
            reports.push(SegmentIntegrityReport {
                name: state.name.clone(),
                record_count: records.len() as u32,
                trailer_count: reader.len(),
                strictly_increasing,
            });
        }
        Ok(reports)
    }
}

fn to_io_error(e: FrameReadError) -> std::io::Error {
    match e {
        FrameReadError::Io(io) => io,
        FrameReadError::Torn => std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "torn frame"),
    }
}

#[cfg(test)]
mod tests;
