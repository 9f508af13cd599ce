//! Write-ahead log.
//!
//! Frames are `u32` little-endian length + bincode payload. A transaction is
//! written as `BeginTx`, its ops, then `CommitTx`, in one `append_batch` call
//! followed by a single `sync_data`. Recovery only applies a transaction once
//! its `CommitTx` frame has been read back.
//!
//! A batch that fails to write or sync is cut back off the file before the
//! error is returned. If that cut fails too, the log is poisoned and refuses
//! further appends until a checkpoint truncates it.

use hourledger_model::{Account, AccountId, Activity, LogEntry, Request, RequestId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// A single row-level mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalOp {
    CreateAccount(Account),
    CreateActivity(Activity),
    InsertRequest(Request),
    DeleteRequest { request_id: RequestId },
    AppendLog(LogEntry),
    IncrementHours { student_id: AccountId, delta: u64 },
    /// Counter overwrite; only issued by drift repair.
    SetHours { student_id: AccountId, hours: u64 },
    CacheAccolade { student_id: AccountId, summary: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalEntry {
    BeginTx { tx_id: u64, timestamp: i64 },
    Op { tx_id: u64, op: WalOp },
    CommitTx { tx_id: u64 },
    /// First frame after a truncation; carries the last committed tx id so
    /// ids keep increasing across checkpoints.
    Checkpoint { last_tx_id: u64 },
}

impl WalEntry {
    pub fn tx_id(&self) -> Option<u64> {
        match self {
            WalEntry::BeginTx { tx_id, .. }
            | WalEntry::Op { tx_id, .. }
            | WalEntry::CommitTx { tx_id } => Some(*tx_id),
            WalEntry::Checkpoint { .. } => None,
        }
    }
}

pub struct WriteAheadLog {
    file: Mutex<File>,
    path: PathBuf,
    sync_writes: bool,
    poisoned: AtomicBool,
    #[cfg(test)]
    fault: Mutex<Option<WriteFault>>,
}

/// Failures injected into the next `append_batch`.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteFault {
    /// Half the batch reaches the file, then the write fails.
    TornWrite,
    /// The whole batch is written but `sync_data` fails.
    SyncFailure,
    /// A torn write whose cleanup also fails.
    TornWriteUncleanable,
}

fn invalid_data(err: bincode::Error) -> std::io::Error {
    std::io::Error::new(ErrorKind::InvalidData, err)
}

impl WriteAheadLog {
    pub fn open(path: &Path, sync_writes: bool) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            sync_writes,
            poisoned: AtomicBool::new(false),
            #[cfg(test)]
            fault: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn inject_fault(&self, fault: WriteFault) {
        *self.fault.lock() = Some(fault);
    }

    /// Append entries and make them durable together. Returns bytes written.
    ///
    /// On failure the file is restored to its length before the call, so a
    /// failed batch leaves neither a torn frame nor an unacknowledged commit.
    pub fn append_batch(&self, entries: &[WalEntry]) -> std::io::Result<u64> {
        let mut buf = Vec::new();
        for entry in entries {
            let data = bincode::serialize(entry).map_err(invalid_data)?;
            let len = u32::try_from(data.len())
                .map_err(|_| std::io::Error::new(ErrorKind::InvalidInput, "wal frame too large"))?;
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(&data);
        }

        let mut file = self.file.lock();
        if self.is_poisoned() {
            return Err(std::io::Error::new(
                ErrorKind::Other,
                "wal poisoned by an earlier failed write; checkpoint or reopen the store",
            ));
        }
        let start = file.metadata()?.len();

        if let Err(err) = self.write_durably(&mut *file, &buf) {
            match self.cut_back(&mut *file, start) {
                Ok(()) => tracing::warn!(
                    path = %self.path.display(),
                    len = start,
                    error = %err,
                    "wal append failed; batch removed"
                ),
                Err(cut_err) => {
                    self.poisoned.store(true, Ordering::SeqCst);
                    tracing::error!(
                        path = %self.path.display(),
                        error = %err,
                        cut_error = %cut_err,
                        "wal append failed and could not be undone; wal poisoned"
                    );
                }
            }
            return Err(err);
        }
        Ok(buf.len() as u64)
    }

    fn write_durably(&self, file: &mut File, buf: &[u8]) -> std::io::Result<()> {
        #[cfg(test)]
        {
            let fault = self.fault.lock().take();
            if let Some(fault) = fault {
                return self.inject(fault, file, buf);
            }
        }

        file.write_all(buf)?;
        if self.sync_writes {
            file.sync_data()?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn inject(&self, fault: WriteFault, file: &mut File, buf: &[u8]) -> std::io::Result<()> {
        let injected = |what: &str| std::io::Error::new(ErrorKind::Other, format!("injected {what}"));
        match fault {
            WriteFault::TornWrite | WriteFault::TornWriteUncleanable => {
                file.write_all(&buf[..buf.len() / 2])?;
                if fault == WriteFault::TornWriteUncleanable {
                    // Consumed again by cut_back.
                    *self.fault.lock() = Some(fault);
                }
                Err(injected("torn write"))
            }
            WriteFault::SyncFailure => {
                file.write_all(buf)?;
                Err(injected("sync failure"))
            }
        }
    }

    fn cut_back(&self, file: &mut File, len: u64) -> std::io::Result<()> {
        #[cfg(test)]
        {
            let fault = self.fault.lock().take();
            if fault == Some(WriteFault::TornWriteUncleanable) {
                return Err(std::io::Error::new(ErrorKind::Other, "injected truncate failure"));
            }
        }

        file.set_len(len)?;
        file.seek(SeekFrom::Start(len))?;
        file.sync_all()
    }

    /// Feed every complete frame to `handler`, in file order.
    ///
    /// A truncated trailing frame (crash mid-write) ends the replay; it can
    /// only belong to a transaction whose commit marker never made it to disk.
    pub fn replay<F>(&self, mut handler: F) -> std::io::Result<ReplayStats>
    where
        F: FnMut(WalEntry) -> std::io::Result<()>,
    {
        let mut file = self.file.lock();
        let file_len = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&mut *file);
        let mut stats = ReplayStats::default();

        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }

            let len = u32::from_le_bytes(len_bytes) as usize;
            let remaining = file_len.saturating_sub(stats.valid_len + 4);
            if len as u64 > remaining {
                break;
            }
            let mut data = vec![0u8; len];
            match reader.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }

            let entry: WalEntry = bincode::deserialize(&data).map_err(invalid_data)?;
            stats.frames += 1;
            stats.valid_len += 4 + len as u64;
            handler(entry)?;
        }

        stats.torn_tail = stats.valid_len < file_len;
        Ok(stats)
    }

    /// Drop all frames. Clears poisoning, since the caller has just made the
    /// state the frames described durable elsewhere.
    pub fn truncate(&self) -> std::io::Result<()> {
        self.truncate_to(0)?;
        self.poisoned.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Cut the file back to `len` bytes, e.g. the end of the last complete
    /// frame after a torn write.
    pub fn truncate_to(&self, len: u64) -> std::io::Result<()> {
        let mut file = self.file.lock();
        file.set_len(len)?;
        file.seek(SeekFrom::Start(len))?;
        file.sync_all()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub frames: usize,
    /// Bytes covered by complete frames
    pub valid_len: u64,
    pub torn_tail: bool,
}
