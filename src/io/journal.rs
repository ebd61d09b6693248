//! Append-only mutation journal backing [`JournaledStore`](crate::store::JournaledStore).
//!
//! Layout: a 16 byte file header (`magic`, `version`, reserved) followed by entries of
//! `[seq: u64][len: u32][reserved: 4 bytes][checksum: 32 bytes][payload]`, where the payload
//! is a bincode-encoded [`JournalOp`] and the checksum is its blake3 digest.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use atomic_write_file::AtomicWriteFile;
use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_to_vec};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::constants::{JOURNAL_HEADER_SIZE, JOURNAL_MAGIC, JOURNAL_VERSION};
use crate::error::{IndexError, Result};
use crate::types::{AssociationId, AssociationRecord, JournalOptions};

const ENTRY_HEADER_SIZE: usize = 48;

/// One persisted store mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalOp {
    Put(AssociationRecord),
    Remove(AssociationId),
    /// Highest id handed out so far; keeps ids monotonic across compactions.
    Reserve(AssociationId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalStats {
    pub sequence: u64,
    pub bytes: u64,
    pub appends_since_compaction: u64,
}

#[derive(Debug)]
pub struct Journal {
    file: File,
    path: PathBuf,
    write_head: u64,
    sequence: u64,
    appends_since_compaction: u64,
    options: JournalOptions,
    /// Set when a compaction replaced the file but its successor could not be reopened.
    detached: Option<String>,
}

fn journal_config() -> impl Config {
    config::standard()
        .with_fixed_int_encoding()
        .with_little_endian()
}

fn file_header() -> [u8; JOURNAL_HEADER_SIZE] {
    let mut header = [0u8; JOURNAL_HEADER_SIZE];
    header[..4].copy_from_slice(&JOURNAL_MAGIC);
    header[4..6].copy_from_slice(&JOURNAL_VERSION.to_le_bytes());
    header
}

fn encode_entry(sequence: u64, op: &JournalOp) -> Result<Vec<u8>> {
    let payload = encode_to_vec(op, journal_config())?;
    let length = u32::try_from(payload.len()).map_err(|_| IndexError::JournalCorruption {
        offset: 0,
        reason: "journal payload too large".into(),
    })?;
    let digest = blake3::hash(&payload);
    let mut entry = Vec::with_capacity(ENTRY_HEADER_SIZE + payload.len());
    entry.extend_from_slice(&sequence.to_le_bytes());
    entry.extend_from_slice(&length.to_le_bytes());
    entry.extend_from_slice(&[0u8; 4]);
    entry.extend_from_slice(digest.as_bytes());
    entry.extend_from_slice(&payload);
    Ok(entry)
}

fn lock(file: &File, path: &Path) -> Result<()> {
    file.try_lock_exclusive().map_err(|err| {
        IndexError::Lock(format!("journal {} is held elsewhere: {err}", path.display()))
    })
}

impl Journal {
    /// Open (or create) the journal at `path`, returning it with every replayable operation.
    pub fn open(path: &Path, options: JournalOptions) -> Result<(Self, Vec<JournalOp>)> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        lock(&file, path)?;

        let len = file.metadata()?.len();
        if len == 0 {
            file.write_all(&file_header())?;
            file.sync_all()?;
        } else {
            Self::check_header(&mut file, len)?;
        }

        let (ops, sequence, write_head) = Self::scan(&mut file)?;
        tracing::debug!(
            journal.path = %path.display(),
            journal.entries = ops.len(),
            journal.sequence = sequence,
            "journal replayed"
        );
        let journal = Self {
            file,
            path: path.to_path_buf(),
            write_head,
            sequence,
            appends_since_compaction: ops.len() as u64,
            options,
            detached: None,
        };
        Ok((journal, ops))
    }

    fn check_header(file: &mut File, len: u64) -> Result<()> {
        if len < JOURNAL_HEADER_SIZE as u64 {
            return Err(IndexError::InvalidJournalHeader {
                reason: format!("file is {len} bytes, shorter than the header"),
            });
        }
        let mut header = [0u8; JOURNAL_HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header)?;
        if header[..4] != JOURNAL_MAGIC {
            return Err(IndexError::InvalidJournalHeader {
                reason: "bad magic".into(),
            });
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != JOURNAL_VERSION {
            return Err(IndexError::InvalidJournalHeader {
                reason: format!("unsupported version {version:#06x}"),
            });
        }
        Ok(())
    }

    /// Read every entry after the header. A torn final entry is truncated away; damage
    /// anywhere before the tail is reported as corruption.
    fn scan(file: &mut File) -> Result<(Vec<JournalOp>, u64, u64)> {
        let len = file.metadata()?.len();
        let mut ops = Vec::new();
        let mut sequence = 0u64;
        let mut cursor = JOURNAL_HEADER_SIZE as u64;

        while cursor < len {
            let remaining = len - cursor;
            if remaining < ENTRY_HEADER_SIZE as u64 {
                Self::truncate_tail(file, cursor, "partial entry header")?;
                break;
            }
            file.seek(SeekFrom::Start(cursor))?;
            let mut header = [0u8; ENTRY_HEADER_SIZE];
            file.read_exact(&mut header)?;

            let mut seq_bytes = [0u8; 8];
            seq_bytes.copy_from_slice(&header[..8]);
            let entry_sequence = u64::from_le_bytes(seq_bytes);
            let mut len_bytes = [0u8; 4];
            len_bytes.copy_from_slice(&header[8..12]);
            let length = u64::from(u32::from_le_bytes(len_bytes));
            let checksum = &header[16..48];

            if length == 0 || ENTRY_HEADER_SIZE as u64 + length > remaining {
                if entry_sequence == sequence + 1 || entry_sequence == 0 {
                    Self::truncate_tail(file, cursor, "entry extends past end of file")?;
                    break;
                }
                return Err(IndexError::JournalCorruption {
                    offset: cursor,
                    reason: "journal entry length invalid".into(),
                });
            }
            if entry_sequence != sequence + 1 {
                return Err(IndexError::JournalCorruption {
                    offset: cursor,
                    reason: format!(
                        "journal sequence gap: expected {}, found {entry_sequence}",
                        sequence + 1
                    ),
                });
            }

            let length_usize =
                usize::try_from(length).map_err(|_| IndexError::JournalCorruption {
                    offset: cursor,
                    reason: "journal entry too large for platform".into(),
                })?;
            let mut payload = vec![0u8; length_usize];
            file.read_exact(&mut payload)?;
            let next = cursor + ENTRY_HEADER_SIZE as u64 + length;
            if blake3::hash(&payload).as_bytes() != checksum {
                if next == len {
                    Self::truncate_tail(file, cursor, "checksum mismatch in final entry")?;
                    break;
                }
                return Err(IndexError::JournalCorruption {
                    offset: cursor,
                    reason: "journal entry checksum mismatch".into(),
                });
            }

            let (op, _) = decode_from_slice::<JournalOp, _>(&payload, journal_config())?;
            ops.push(op);
            sequence = entry_sequence;
            cursor = next;
        }

        Ok((ops, sequence, cursor))
    }

    fn truncate_tail(file: &mut File, offset: u64, reason: &str) -> Result<()> {
        tracing::warn!(journal.offset = offset, reason, "truncating torn journal tail");
        file.set_len(offset)?;
        file.sync_all()?;
        Ok(())
    }

    fn ensure_attached(&self) -> Result<()> {
        match &self.detached {
            Some(reason) => Err(IndexError::Lock(reason.clone())),
            None => Ok(()),
        }
    }

    pub fn append(&mut self, op: &JournalOp) -> Result<u64> {
        self.ensure_attached()?;
        let next_sequence = self.sequence + 1;
        let entry = encode_entry(next_sequence, op)?;
        self.file.seek(SeekFrom::Start(self.write_head))?;
        self.file.write_all(&entry)?;
        if self.options.sync_each_append {
            self.file.sync_all()?;
        }
        self.write_head += entry.len() as u64;
        self.sequence = next_sequence;
        self.appends_since_compaction = self.appends_since_compaction.saturating_add(1);
        Ok(self.sequence)
    }

    #[must_use]
    pub fn should_compact(&self) -> bool {
        self.options.compact_after > 0
            && self.appends_since_compaction >= self.options.compact_after
    }

    /// Atomically replace the journal with one `Put` per live row.
    pub fn compact<'a, I>(&mut self, high_water: AssociationId, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a AssociationRecord>,
    {
        self.ensure_attached()?;
        let mut staged = AtomicWriteFile::open(&self.path)?;
        staged.write_all(&file_header())?;
        let mut sequence = 1u64;
        let mut bytes = JOURNAL_HEADER_SIZE as u64;
        let reserve = encode_entry(sequence, &JournalOp::Reserve(high_water))?;
        staged.write_all(&reserve)?;
        bytes += reserve.len() as u64;
        for row in rows {
            sequence += 1;
            let entry = encode_entry(sequence, &JournalOp::Put(row.clone()))?;
            staged.write_all(&entry)?;
            bytes += entry.len() as u64;
        }
        staged.flush()?;
        staged.commit()?;

        let reopened = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(IndexError::from)
            .and_then(|file| lock(&file, &self.path).map(|()| file));
        self.adopt(reopened, sequence, bytes)
    }

    /// Swap in the locked handle of a freshly committed journal. Without one, the old
    /// handle is kept but points at the replaced file, so further writes are refused.
    fn adopt(&mut self, reopened: Result<File>, sequence: u64, bytes: u64) -> Result<()> {
        let file = match reopened {
            Ok(file) => file,
            Err(err) => {
                let reason = format!(
                    "journal {} was replaced by compaction but could not be reopened: {err}",
                    self.path.display()
                );
                tracing::error!(
                    journal.path = %self.path.display(),
                    error = %err,
                    "journal detached after compaction"
                );
                self.detached = Some(reason.clone());
                return Err(IndexError::Lock(reason));
            }
        };
        self.file = file;
        self.write_head = bytes;
        self.sequence = sequence;
        self.appends_since_compaction = 0;
        tracing::info!(
            journal.path = %self.path.display(),
            journal.entries = sequence,
            journal.bytes = bytes,
            "journal compacted"
        );
        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> JournalStats {
        JournalStats {
            sequence: self.sequence,
            bytes: self.write_head,
            appends_since_compaction: self.appends_since_compaction,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlacementKey;
    use tempfile::TempDir;

    fn record(id: u64, article: &str) -> AssociationRecord {
        AssociationRecord::shell(id).bind(&PlacementKey::new(20, false, 1, "p"), 10, article)
    }

    fn options() -> JournalOptions {
        JournalOptions {
            sync_each_append: false,
            compact_after: 0,
        }
    }

    #[test]
    fn append_and_replay() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("index.journal");
        {
            let (mut journal, ops) = Journal::open(&path, options()).expect("open");
            assert!(ops.is_empty());
            journal.append(&JournalOp::Put(record(1, "A1"))).expect("append put");
            journal.append(&JournalOp::Remove(1)).expect("append remove");
            assert_eq!(journal.stats().sequence, 2);
        }
        let (journal, ops) = Journal::open(&path, options()).expect("reopen");
        assert_eq!(ops, vec![JournalOp::Put(record(1, "A1")), JournalOp::Remove(1)]);
        assert_eq!(journal.stats().sequence, 2);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("index.journal");
        let intact_len = {
            let (mut journal, _) = Journal::open(&path, options()).expect("open");
            journal.append(&JournalOp::Put(record(1, "A1"))).expect("append");
            let intact = journal.stats().bytes;
            journal.append(&JournalOp::Put(record(2, "A2"))).expect("append");
            intact
        };
        let full_len = std::fs::metadata(&path).expect("metadata").len();
        let file = OpenOptions::new().write(true).open(&path).expect("open raw");
        file.set_len(full_len - 5).expect("tear");
        drop(file);

        let (journal, ops) = Journal::open(&path, options()).expect("reopen");
        assert_eq!(ops, vec![JournalOp::Put(record(1, "A1"))]);
        assert_eq!(journal.stats().bytes, intact_len);
        assert_eq!(std::fs::metadata(&path).expect("metadata").len(), intact_len);
    }

    #[test]
    fn corrupted_entry_reports_offset() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("index.journal");
        {
            let (mut journal, _) = Journal::open(&path, options()).expect("open");
            journal.append(&JournalOp::Put(record(1, "A1"))).expect("append");
            journal.append(&JournalOp::Put(record(2, "A2"))).expect("append");
        }
        // Flip a payload byte of the first entry.
        let mut file = OpenOptions::new().write(true).open(&path).expect("open raw");
        let offset = JOURNAL_HEADER_SIZE as u64 + ENTRY_HEADER_SIZE as u64 + 2;
        file.seek(SeekFrom::Start(offset)).expect("seek");
        file.write_all(&[0xFF]).expect("write");
        drop(file);

        let err = Journal::open(&path, options()).expect_err("open should fail");
        match err {
            IndexError::JournalCorruption { offset, reason } => {
                assert_eq!(offset, JOURNAL_HEADER_SIZE as u64);
                assert!(reason.contains("checksum"), "reason should mention checksum");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_magic_is_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("index.journal");
        std::fs::write(&path, [0u8; 32]).expect("write");
        let err = Journal::open(&path, options()).expect_err("open should fail");
        assert!(matches!(err, IndexError::InvalidJournalHeader { .. }));
    }

    #[test]
    fn second_open_is_locked_out() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("index.journal");
        let (_journal, _) = Journal::open(&path, options()).expect("open");
        let err = Journal::open(&path, options()).expect_err("second open should fail");
        assert!(matches!(err, IndexError::Lock(_)));
    }

    #[test]
    fn compaction_keeps_live_rows_and_high_water() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("index.journal");
        let rows = vec![record(3, "A3")];
        {
            let (mut journal, _) = Journal::open(&path, options()).expect("open");
            for id in 1..=3 {
                journal
                    .append(&JournalOp::Put(record(id, &format!("A{id}"))))
                    .expect("append");
            }
            journal.append(&JournalOp::Remove(1)).expect("remove");
            journal.append(&JournalOp::Remove(2)).expect("remove");
            journal.compact(7, &rows).expect("compact");
            assert_eq!(journal.stats().sequence, 2);
            journal.append(&JournalOp::Put(record(8, "A8"))).expect("append after compact");
        }
        let (_journal, ops) = Journal::open(&path, options()).expect("reopen");
        assert_eq!(
            ops,
            vec![
                JournalOp::Reserve(7),
                JournalOp::Put(record(3, "A3")),
                JournalOp::Put(record(8, "A8")),
            ]
        );
    }

    #[test]
    fn failed_reopen_after_compaction_refuses_writes() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("index.journal");
        let (mut journal, _) = Journal::open(&path, options()).expect("open");
        journal.append(&JournalOp::Put(record(1, "A1"))).expect("append");
        let before = journal.stats();

        let err = journal
            .adopt(Err(IndexError::Lock("held elsewhere".into())), 1, 64)
            .expect_err("adopt should fail");
        assert!(matches!(err, IndexError::Lock(_)));
        assert_eq!(journal.stats(), before);

        let err = journal
            .append(&JournalOp::Put(record(2, "A2")))
            .expect_err("append on a detached journal");
        assert!(matches!(err, IndexError::Lock(ref reason) if reason.contains("compaction")));
        assert!(journal.compact(1, &[record(1, "A1")]).is_err());
        assert_eq!(journal.stats(), before);
    }
}
