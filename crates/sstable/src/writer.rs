//! Streaming segment writer with atomic rename-replace publication.

use crate::format::{
    write_magic, write_record, write_sidecar_entry, write_trailer, SIDECAR_SAMPLE_RATE,
};
use crate::SstError;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Streams a sorted `(key, value)` iterator into `<path>` (plus its `.sxi`
/// sidecar), writing to temp files first and publishing both via
/// rename-replace only once the stream is fully and durably written.
///
/// `iter` MUST yield strictly increasing keys; this is a precondition
/// enforced by the caller (the checkpoint merge step), not re-validated
/// here beyond a debug assertion.
pub fn write_segment<I>(path: &Path, iter: I) -> Result<(), SstError>
where
    I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
{
    let tmp_path = tmp_path_for(path);
    let sidecar_tmp_path = sidecar_tmp_path_for(path);

    {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut data = BufWriter::new(file);
        let sidecar_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&sidecar_tmp_path)?;
        let mut sidecar = BufWriter::new(sidecar_file);

        write_magic(&mut data)?;
        let mut offset: u64 = 8;
        let mut count: u32 = 0;
        let mut last_key: Option<Vec<u8>> = None;

        for (key, value) in iter {
            if let Some(last) = &last_key {
                debug_assert!(
                    key.as_slice() > last.as_slice(),
                    "segment writer requires strictly increasing keys"
                );
            }
            if count as usize % SIDECAR_SAMPLE_RATE == 0 {
                write_sidecar_entry(&mut sidecar, &key, offset)?;
            }
            let record_len = 8 + key.len() as u64 + value.len() as u64;
            write_record(&mut data, &key, &value)?;
            offset += record_len;
            count += 1;
            last_key = Some(key);
        }

        write_trailer(&mut data, count)?;

        data.flush()?;
        data.get_ref().sync_all()?;
        sidecar.flush()?;
        sidecar.get_ref().sync_all()?;
    }

    // Publish the sidecar before the data file: a reader that opens the
    // final `.sst` and finds a stale or missing `.sxi` simply falls back to
    // a linear scan, which is always correct.
    fs::rename(&sidecar_tmp_path, sidecar_path_for(path))?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".tmp");
    s.into()
}

pub fn sidecar_path_for(path: &Path) -> std::path::PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".sxi");
    s.into()
}

pub fn sidecar_tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".tmp.sxi");
    s.into()
}

#[cfg(test)]
mod tests;
