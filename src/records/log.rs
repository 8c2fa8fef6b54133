//! Append-only entry log.

use crate::error::{RegistryError, Result};
use crate::types::{Company, CompanyId, Timestamp};
use parking_lot::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Magic bytes for log entries.
const LOG_MAGIC: &[u8; 4] = b"CMP\0";

/// Current entry format version.
const LOG_VERSION: u8 = 1;

/// Entry header size (fixed part).
const ENTRY_HEADER_SIZE: u64 = 4 + 1 + 1 + 8 + 8 + 4; // magic + version + op + id + timestamp + payload len

/// Checksum trailer size.
const ENTRY_TRAILER_SIZE: u64 = 4;

/// Sanity cap on a single payload; larger lengths mean a damaged header.
const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Kind of change an entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryOp {
    /// Insert or replace the record at `id`.
    Put,
    /// Remove the record at `id`.
    Delete,
    /// Keys below `id` are spent; written by compaction.
    Reserve,
}

impl EntryOp {
    fn to_byte(self) -> u8 {
        match self {
            EntryOp::Put => 0,
            EntryOp::Delete => 1,
            EntryOp::Reserve => 2,
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(EntryOp::Put),
            1 => Ok(EntryOp::Delete),
            2 => Ok(EntryOp::Reserve),
            other => Err(RegistryError::InvalidFormat(format!(
                "Unknown entry op: {}",
                other
            ))),
        }
    }
}

/// A decoded log entry.
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub op: EntryOp,
    pub id: CompanyId,
    pub timestamp: Timestamp,
    /// Present for `Put` entries only.
    pub company: Option<Company>,
}

/// Append-only log of company changes.
///
/// Every mutation is one checksummed entry, so a write either lands whole
/// or is discarded as a torn tail on the next open.
pub struct EntryLog {
    /// Path to the log file.
    path: PathBuf,

    /// Log file handle.
    file: RwLock<File>,

    /// Current file size (for appending).
    file_size: RwLock<u64>,

    /// Number of writes since last sync.
    writes_since_sync: RwLock<u64>,

    /// Sync every N writes.
    sync_interval: u64,
}

impl EntryLog {
    /// Default sync interval.
    pub const DEFAULT_SYNC_INTERVAL: u64 = 100;

    /// Open or create a log with default sync interval.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync_interval(path, Self::DEFAULT_SYNC_INTERVAL)
    }

    /// Open or create a log, truncating any torn tail.
    /// - sync_interval = 0 or 1: sync every write
    /// - sync_interval = 100: sync every 100 writes
    pub fn open_with_sync_interval(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let valid_end = Self::find_valid_end(&path, file_size)?;

        if valid_end < file_size {
            warn!(
                path = %path.display(),
                valid_end,
                file_size,
                "Truncating torn tail of company log"
            );
            file.set_len(valid_end)?;
            file.sync_all()?;
        }

        Ok(Self {
            path,
            file: RwLock::new(file),
            file_size: RwLock::new(valid_end),
            writes_since_sync: RwLock::new(0),
            sync_interval: sync_interval.max(1),
        })
    }

    /// Append an entry. Returns the offset where it was written.
    pub fn append(&self, op: EntryOp, id: CompanyId, company: Option<&Company>) -> Result<u64> {
        let payload = match company {
            Some(company) => rmp_serde::to_vec_named(company)?,
            None => Vec::new(),
        };

        let mut buf = Vec::with_capacity(payload.len() + 32);
        let len = write_entry(&mut buf, op, id, Timestamp::now(), &payload)?;

        let mut file = self.file.write();
        let offset = *self.file_size.read();
        file.seek(SeekFrom::Start(offset))?;

        if let Err(e) = file.write_all(&buf) {
            // Roll back a partial write so the next append starts clean
            let _ = file.set_len(offset);
            return Err(e.into());
        }

        *self.file_size.write() = offset + len;

        let mut writes = self.writes_since_sync.write();
        *writes += 1;
        if *writes >= self.sync_interval {
            file.sync_all()?;
            *writes = 0;
        }

        Ok(offset)
    }

    /// Force sync all pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let file = self.file.write();
        file.sync_all()?;
        *self.writes_since_sync.write() = 0;
        Ok(())
    }

    /// Read the entry at a given offset.
    pub fn read_at(&self, offset: u64) -> Result<LogEntry> {
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        let (entry, _) = read_entry(&mut BufReader::new(&mut *file))?;
        Ok(entry)
    }

    /// Iterate all entries from a given offset.
    ///
    /// Uses its own file handle so concurrent appends don't move its cursor.
    pub fn iter_from(&self, offset: u64) -> Result<EntryIterator> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(EntryIterator {
            reader: BufReader::new(file),
            offset,
            end: *self.file_size.read(),
        })
    }

    /// Get current file size.
    pub fn size(&self) -> u64 {
        *self.file_size.read()
    }

    /// Rewrite the log with only `live` records, preceded by a reservation
    /// of `next_id` so identifiers are never handed out twice.
    ///
    /// Returns the new offset of each live record and the number of bytes reclaimed.
    pub fn compact(
        &self,
        live: &[Company],
        next_id: CompanyId,
    ) -> Result<(Vec<(CompanyId, u64)>, u64)> {
        let mut file = self.file.write();
        let old_size = *self.file_size.read();

        let tmp_path = self.path.with_extension("log.compact");
        let mut offsets = Vec::with_capacity(live.len());
        {
            let tmp = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(tmp);
            let mut offset = 0u64;
            let now = Timestamp::now();

            offset += write_entry(&mut writer, EntryOp::Reserve, next_id, now, &[])?;
            for company in live {
                let payload = rmp_serde::to_vec_named(company)?;
                offsets.push((company.id, offset));
                offset += write_entry(&mut writer, EntryOp::Put, company.id, now, &payload)?;
            }

            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;

        let reopened = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let new_size = reopened.metadata()?.len();
        *file = reopened;
        *self.file_size.write() = new_size;
        *self.writes_since_sync.write() = 0;

        debug!(old_size, new_size, live = live.len(), "Compacted company log");

        Ok((offsets, old_size.saturating_sub(new_size)))
    }

    /// Find the end of the last intact entry.
    ///
    /// Damage that runs to the end of the file is a torn tail. Damage with
    /// intact data after it is corruption and fails the open.
    fn find_valid_end(path: &Path, file_size: u64) -> Result<u64> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut offset = 0u64;

        while offset < file_size {
            match read_entry(&mut reader) {
                Ok((_, len)) => offset += len,
                Err(RegistryError::Io(e)) if e.kind() != ErrorKind::UnexpectedEof => {
                    return Err(RegistryError::Io(e));
                }
                Err(e) => {
                    if !Self::damage_reaches_end(path, offset, file_size)? {
                        return Err(RegistryError::InvalidFormat(format!(
                            "Damaged entry at offset {} is followed by more data: {}",
                            offset, e
                        )));
                    }
                    debug!(offset, error = %e, "Stopped log scan at torn tail");
                    break;
                }
            }
        }

        Ok(offset.min(file_size))
    }

    /// Whether the bytes from `offset` on are one partial or damaged final
    /// entry (or zero fill), rather than a damaged entry followed by others.
    fn damage_reaches_end(path: &Path, offset: u64, file_size: u64) -> Result<bool> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut tail = Vec::new();
        file.take(file_size - offset).read_to_end(&mut tail)?;

        if tail.len() < ENTRY_HEADER_SIZE as usize || tail.iter().all(|b| *b == 0) {
            return Ok(true);
        }
        if &tail[..4] != LOG_MAGIC {
            return Ok(false);
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&tail[22..26]);
        let frame_len =
            ENTRY_HEADER_SIZE + u32::from_le_bytes(len_bytes) as u64 + ENTRY_TRAILER_SIZE;

        Ok(frame_len >= tail.len() as u64)
    }
}

/// Write one entry. Returns the number of bytes written.
fn write_entry(
    writer: &mut impl Write,
    op: EntryOp,
    id: CompanyId,
    timestamp: Timestamp,
    payload: &[u8],
) -> Result<u64> {
    let op_byte = op.to_byte();
    let id_bytes = id.0.to_le_bytes();

    writer.write_all(LOG_MAGIC)?;
    writer.write_all(&[LOG_VERSION])?;
    writer.write_all(&[op_byte])?;
    writer.write_all(&id_bytes)?;
    writer.write_all(&timestamp.0.to_le_bytes())?;
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(payload)?;

    let checksum = entry_checksum(op_byte, &id_bytes, payload);
    writer.write_all(&checksum.to_le_bytes())?;

    Ok(ENTRY_HEADER_SIZE + payload.len() as u64 + ENTRY_TRAILER_SIZE)
}

/// Read one entry from the current position. Returns it with its encoded length.
fn read_entry(reader: &mut impl Read) -> Result<(LogEntry, u64)> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != LOG_MAGIC {
        return Err(RegistryError::InvalidFormat("Invalid entry magic".into()));
    }

    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != LOG_VERSION {
        return Err(RegistryError::InvalidFormat(format!(
            "Unsupported log version: {}",
            version[0]
        )));
    }

    let mut op_byte = [0u8; 1];
    reader.read_exact(&mut op_byte)?;
    let op = EntryOp::from_byte(op_byte[0])?;

    let mut id_bytes = [0u8; 8];
    reader.read_exact(&mut id_bytes)?;
    let id = CompanyId(u64::from_le_bytes(id_bytes));

    let mut ts_bytes = [0u8; 8];
    reader.read_exact(&mut ts_bytes)?;
    let timestamp = Timestamp(i64::from_le_bytes(ts_bytes));

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let payload_len = u32::from_le_bytes(len_bytes) as usize;
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(RegistryError::InvalidFormat(format!(
            "Entry payload too large: {} bytes",
            payload_len
        )));
    }
    let mut payload = vec![0u8; payload_len];
    reader.read_exact(&mut payload)?;

    let mut checksum_bytes = [0u8; 4];
    reader.read_exact(&mut checksum_bytes)?;
    let stored = u32::from_le_bytes(checksum_bytes);
    let computed = entry_checksum(op_byte[0], &id_bytes, &payload);
    if stored != computed {
        return Err(RegistryError::ChecksumMismatch {
            expected: stored,
            got: computed,
        });
    }

    let company = match op {
        EntryOp::Put => {
            let company: Company = rmp_serde::from_slice(&payload)?;
            if company.id != id {
                return Err(RegistryError::Corruption {
                    id,
                    detail: format!("payload carries id {}", company.id),
                });
            }
            Some(company)
        }
        EntryOp::Delete | EntryOp::Reserve => None,
    };

    let len = ENTRY_HEADER_SIZE + payload_len as u64 + ENTRY_TRAILER_SIZE;
    Ok((
        LogEntry {
            op,
            id,
            timestamp,
            company,
        },
        len,
    ))
}

fn entry_checksum(op: u8, id_bytes: &[u8; 8], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[op]);
    hasher.update(id_bytes);
    hasher.update(payload);
    hasher.finalize()
}

/// Iterator over entries in the log.
pub struct EntryIterator {
    reader: BufReader<File>,
    offset: u64,
    end: u64,
}

impl Iterator for EntryIterator {
    type Item = Result<(u64, LogEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.end {
            return None;
        }

        let current = self.offset;
        match read_entry(&mut self.reader) {
            Ok((entry, len)) => {
                self.offset += len;
                Some(Ok((current, entry)))
            }
            Err(e) => {
                self.offset = self.end; // Stop iteration on error
                Some(Err(e))
            }
        }
    }
}
