//! Group-commit WAL writer.
//!
//! A single background thread owns the file handle. Callers enqueue
//! already-framed bytes and a [`Durability`] and block (unless `Fast`) until
//! the batch containing their frames has been fsynced. The loop batches
//! within a small time window so concurrent committers share one fsync.

use crate::WalError;
use config::Durability;
use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Sender};
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use std::thread::JoinHandle;
use std::time::Duration;

/// Group window: commits arriving within this span of the first commit in
/// a batch share its fsync.
const BATCH_WINDOW: Duration = Duration::from_millis(25);
const MAX_BATCH: usize = 256;

enum Msg {
    Write {
        frames: Vec<u8>,
        durability: Durability,
        done: Sender<Result<(), WalError>>,
    },
    Flush {
        done: Sender<Result<(), WalError>>,
    },
    Truncate {
        done: Sender<Result<(), WalError>>,
    },
}

pub struct WalWriter {
    tx: Sender<Msg>,
    handle: Option<JoinHandle<()>>,
}

impl WalWriter {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        // `append(true)` (not just `write(true)`) so every write lands at
        // the current end of file regardless of the fd's seek position.
        // Recovery replays the tail and truncates torn garbage before this
        // writer thread starts, but committed-and-replayed frames stay on
        // disk until the next checkpoint; opening in append mode keeps the
        // first write here from landing at offset 0 and clobbering them.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        let (tx, rx) = unbounded::<Msg>();
        let handle = std::thread::Builder::new()
            .name("wal-writer".into())
            .spawn(move || writer_loop(file, rx))
            .expect("spawning wal writer thread");
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Appends already-framed bytes (concatenation of one or more frames
    /// produced by `crate::frame::encode_*`) and waits according to
    /// `durability`.
    pub fn append(&self, frames: Vec<u8>, durability: Durability) -> Result<(), WalError> {
        let (done, rx) = bounded(1);
        self.tx
            .send(Msg::Write {
                frames,
                durability,
                done,
            })
            .map_err(|_| WalError::Disposed)?;
        if durability.waits_for_fsync() {
            rx.recv().map_err(|_| WalError::Disposed)?
        } else {
            Ok(())
        }
    }

    /// Forces an immediate durable flush regardless of pending batch state.
    pub fn flush(&self) -> Result<(), WalError> {
        let (done, rx) = bounded(1);
        self.tx
            .send(Msg::Flush { done })
            .map_err(|_| WalError::Disposed)?;
        rx.recv().map_err(|_| WalError::Disposed)?
    }

    /// Flushes, then truncates the file to length 0 (post-checkpoint).
    pub fn truncate(&self) -> Result<(), WalError> {
        let (done, rx) = bounded(1);
        self.tx
            .send(Msg::Truncate { done })
            .map_err(|_| WalError::Disposed)?;
        rx.recv().map_err(|_| WalError::Disposed)?
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        // Dropping the sender side closes the channel; the loop thread exits
        // its recv loop once drained and any outstanding completions fail
        // with `Disposed` rather than hanging.
        if let Some(handle) = self.handle.take() {
            drop(std::mem::replace(&mut self.tx, unbounded().0));
            let _ = handle.join();
        }
    }
}

fn writer_loop(mut file: File, rx: crossbeam_channel::Receiver<Msg>) {
    loop {
        let first = match rx.recv() {
            Ok(m) => m,
            Err(_) => return,
        };

        let mut batch: Vec<Msg> = vec![first];
        let deadline = std::time::Instant::now() + BATCH_WINDOW;
        while batch.len() < MAX_BATCH {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match rx.recv_timeout(remaining) {
                Ok(m) => batch.push(m),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        process_batch(&mut file, batch);
    }
}

fn process_batch(file: &mut File, batch: Vec<Msg>) {
    let mut needs_fsync = false;
    let mut write_err: Option<WalError> = None;
    let mut fast_completions: Vec<Sender<Result<(), WalError>>> = Vec::new();
    let mut waiting_completions: Vec<Sender<Result<(), WalError>>> = Vec::new();
    let mut control_completions: Vec<(bool, Sender<Result<(), WalError>>)> = Vec::new();

    for msg in batch {
        match msg {
            Msg::Write {
                frames,
                durability,
                done,
            } => {
                if write_err.is_none() {
                    if let Err(e) = file.write_all(&frames) {
                        write_err = Some(e.into());
                    }
                }
                if durability.waits_for_fsync() {
                    needs_fsync = true;
                    waiting_completions.push(done);
                } else {
                    fast_completions.push(done);
                }
            }
            Msg::Flush { done } => {
                needs_fsync = true;
                control_completions.push((false, done));
            }
            Msg::Truncate { done } => {
                needs_fsync = true;
                control_completions.push((true, done));
            }
        }
    }

    // Fast writers get word as soon as their bytes are in the file, before
    // we pay for fsync.
    for done in fast_completions {
        let _ = done.send(write_err.clone_result());
    }

    if write_err.is_none() && needs_fsync {
        if let Err(e) = file.sync_all() {
            write_err = Some(e.into());
        }
    }

    for done in waiting_completions {
        let _ = done.send(write_err.clone_result());
    }

    for (is_truncate, done) in control_completions {
        if is_truncate && write_err.is_none() {
            if let Err(e) = file.set_len(0).and_then(|_| file.seek(SeekFrom::Start(0)).map(|_| ())) {
                write_err = Some(e.into());
            }
        }
        let _ = done.send(write_err.clone_result());
    }
}

/// `WalError` does not implement `Clone` (it wraps `io::Error`); this lets
/// the batch fan-out send an equivalent result to every waiter.
trait CloneResult {
    fn clone_result(&self) -> Result<(), WalError>;
}

impl CloneResult for Option<WalError> {
    fn clone_result(&self) -> Result<(), WalError> {
        match self {
            None => Ok(()),
            Some(e) => Err(WalError::Io(io::Error::new(e.io_kind(), e.to_string()))),
        }
    }
}
