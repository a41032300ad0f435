//! Append-only transaction log — binary protobuf frames.
//!
//! Storage format: length-prefixed protobuf frames.
//!   [4-byte LE length][protobuf bytes][4-byte LE length][protobuf bytes]...
//!
//! Rules:
//!   - Strict append only, committed frames are never rewritten
//!   - fsync after every write
//!   - Sequence strictly increasing (validated on append)
//!   - Only committed transactions are written; rejections never reach disk
//!   - A failed append leaves the file at its last committed frame

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use prost::Message;
use tracing::warn;

use crate::proto_types::ProtoTransaction;

/// Upper bound on a single frame. A bottle transaction is a few hundred bytes.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Append-only transaction log backed by a binary file.
#[derive(Debug)]
pub struct TxLog {
    path: PathBuf,
    last_sequence: u64,
    /// File length after the last committed frame.
    committed_len: u64,
}

impl TxLog {
    /// Open or create a log at the given path.
    /// Reads existing frames to determine the last sequence number.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (last_sequence, committed_len) = if path.exists() {
            let last = Self::read_all_from_file(path)?
                .last()
                .map(|tx| tx.sequence)
                .unwrap_or(0);
            (last, std::fs::metadata(path)?.len())
        } else {
            (0, 0)
        };

        Ok(Self {
            path: path.to_path_buf(),
            last_sequence,
            committed_len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a committed transaction. Writes one frame and fsyncs.
    pub fn append(&mut self, tx: &ProtoTransaction) -> io::Result<()> {
        self.append_with(tx, |file, frame| {
            file.write_all(frame)?;
            file.sync_all()
        })
    }

    /// Append through `write`. Bytes past the last committed frame, whether
    /// left by an earlier failure or by this one, are cut off.
    fn append_with(
        &mut self,
        tx: &ProtoTransaction,
        write: impl FnOnce(&mut File, &[u8]) -> io::Result<()>,
    ) -> io::Result<()> {
        let expected = self.last_sequence + 1;
        if tx.sequence != expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Sequence violation in transaction log: expected {}, got {}",
                    expected, tx.sequence
                ),
            ));
        }

        let frame = encode_frame(tx)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let on_disk = file.metadata()?.len();
        if on_disk != self.committed_len {
            warn!(
                path = %self.path.display(),
                on_disk,
                committed = self.committed_len,
                "dropping bytes after the last committed frame"
            );
            file.set_len(self.committed_len)?;
        }

        if let Err(err) = write(&mut file, &frame) {
            if let Err(cut) = file
                .set_len(self.committed_len)
                .and_then(|()| file.sync_all())
            {
                // The next append retries the cut before writing.
                warn!(path = %self.path.display(), error = %cut, "could not cut back failed append");
            }
            return Err(err);
        }

        self.committed_len += frame.len() as u64;
        self.last_sequence = tx.sequence;
        Ok(())
    }

    /// Every logged transaction in sequence order.
    pub fn load_all(&self) -> io::Result<Vec<ProtoTransaction>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        Self::read_all_from_file(&self.path)
    }

    /// Transactions with a sequence number greater than `after`.
    pub fn load_after(&self, after: u64) -> io::Result<Vec<ProtoTransaction>> {
        let mut txs = self.load_all()?;
        txs.retain(|tx| tx.sequence > after);
        Ok(txs)
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    fn read_all_from_file(path: &Path) -> io::Result<Vec<ProtoTransaction>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut txs: Vec<ProtoTransaction> = Vec::new();
        let mut len_buf = [0u8; 4];

        loop {
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len == 0 || len > MAX_FRAME_LEN {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid frame length: {}", len),
                ));
            }

            let mut frame = vec![0u8; len];
            reader.read_exact(&mut frame).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Truncated frame after sequence {}: {}", last_seq(&txs), e),
                )
            })?;

            let tx = ProtoTransaction::decode(frame.as_slice()).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Protobuf decode error: {}", e),
                )
            })?;

            let expected = last_seq(&txs) + 1;
            if tx.sequence != expected {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Out-of-order frame: expected sequence {}, found {}",
                        expected, tx.sequence
                    ),
                ));
            }

            txs.push(tx);
        }

        Ok(txs)
    }
}

/// `[u32 LE length][protobuf bytes]` as one buffer.
fn encode_frame(tx: &ProtoTransaction) -> io::Result<Vec<u8>> {
    let body = tx.encode_to_vec();
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len as usize <= MAX_FRAME_LEN)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Frame too large: {} bytes", body.len()),
            )
        })?;

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

fn last_seq(txs: &[ProtoTransaction]) -> u64 {
    txs.last().map(|tx| tx.sequence).unwrap_or(0)
}
