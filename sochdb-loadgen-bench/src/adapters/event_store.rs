//! Embedded append-only event store.
//!
//! One segment file per handle, a sequence of frames:
//!
//! ```text
//! ┌──────────────┬──────────────┬─────────────────┐
//! │ len: u32 LE  │ crc32: u32 LE│ payload (len B) │
//! └──────────────┴──────────────┴─────────────────┘
//! ```
//!
//! Appends go through a buffered writer flushed every `flush_every` frames
//! and on close. Opening an iteration flushes the buffer, then reads through
//! a separate file handle, so a reader sees every append that completed
//! before the iteration opened. A partial frame at the tail is a
//! write still in flight and ends the iteration; a checksum mismatch is
//! corruption and fails it.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use sochdb_loadgen::{Backend, BackendError, BackendHandle, Codec, ItemIter};
use tempfile::TempDir;

use super::handle_dir;

const FRAME_HEADER: u64 = 8;
const SEGMENT_FILE: &str = "events.seg";

#[derive(Debug, Clone)]
pub struct EventStoreBackend {
    root: PathBuf,
    flush_every: usize,
    sync_on_close: bool,
}

impl EventStoreBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            flush_every: 1024,
            sync_on_close: false,
        }
    }

    /// Flush the write buffer after this many appends (minimum 1).
    pub fn with_flush_every(mut self, frames: usize) -> Self {
        self.flush_every = frames.max(1);
        self
    }

    /// `fsync` the segment when the handle closes.
    pub fn with_sync_on_close(mut self, sync: bool) -> Self {
        self.sync_on_close = sync;
        self
    }
}

impl<T: Send + Sync + 'static> Backend<T> for EventStoreBackend {
    type Handle = EventStoreHandle<T>;

    fn name(&self) -> &str {
        "event_store"
    }

    fn supports_iteration(&self) -> bool {
        true
    }

    fn create(&self, codec: Codec<T>) -> Result<Self::Handle, BackendError> {
        let dir = handle_dir(&self.root, "event-store-")?;
        let path = dir.path().join(SEGMENT_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| BackendError::CreateFailed(format!("open segment: {}", e)))?;

        tracing::debug!(path = %path.display(), "Event store segment created");
        Ok(EventStoreHandle {
            codec,
            path,
            writer: Mutex::new(Some(SegmentWriter {
                out: BufWriter::new(file),
                unflushed: 0,
            })),
            flush_every: self.flush_every,
            sync_on_close: self.sync_on_close,
            _dir: dir,
        })
    }
}

struct SegmentWriter {
    out: BufWriter<File>,
    unflushed: usize,
}

pub struct EventStoreHandle<T> {
    codec: Codec<T>,
    path: PathBuf,
    writer: Mutex<Option<SegmentWriter>>,
    flush_every: usize,
    sync_on_close: bool,
    // Dropped last: removes the segment.
    _dir: TempDir,
}

impl<T> EventStoreHandle<T> {
    pub fn segment_path(&self) -> &Path {
        &self.path
    }
}

/// Encode one frame: header followed by the payload.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_HEADER as usize + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

impl<T: Send + Sync + 'static> BackendHandle<T> for EventStoreHandle<T> {
    fn append(&self, item: &T) -> Result<(), BackendError> {
        let frame = encode_frame(&self.codec.encode(item));
        let mut guard = self.writer.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| BackendError::WriteFailed("event store handle is closed".into()))?;

        writer
            .out
            .write_all(&frame)
            .map_err(|e| BackendError::WriteFailed(format!("append frame: {}", e)))?;
        writer.unflushed += 1;
        if writer.unflushed >= self.flush_every {
            writer
                .out
                .flush()
                .map_err(|e| BackendError::WriteFailed(format!("flush segment: {}", e)))?;
            writer.unflushed = 0;
        }
        Ok(())
    }

    /// Flushes buffered appends first, so every completed append is visible.
    fn iterate_all(&self) -> Result<ItemIter<'_, T>, BackendError> {
        if let Some(writer) = self.writer.lock().as_mut() {
            writer
                .out
                .flush()
                .map_err(|e| BackendError::ReadFailed(format!("flush segment: {}", e)))?;
            writer.unflushed = 0;
        }

        let file = File::open(&self.path)
            .map_err(|e| BackendError::ReadFailed(format!("open segment: {}", e)))?;
        let remaining = file
            .metadata()
            .map_err(|e| BackendError::ReadFailed(format!("stat segment: {}", e)))?
            .len();

        Ok(Box::new(FrameIter {
            reader: BufReader::new(file),
            remaining,
            codec: self.codec,
            done: false,
            _item: PhantomData,
        }))
    }

    fn close(&self) -> Result<(), BackendError> {
        let Some(mut writer) = self.writer.lock().take() else {
            return Ok(());
        };
        writer
            .out
            .flush()
            .map_err(|e| BackendError::CloseFailed(format!("flush segment: {}", e)))?;
        if self.sync_on_close {
            writer
                .out
                .get_ref()
                .sync_all()
                .map_err(|e| BackendError::CloseFailed(format!("sync segment: {}", e)))?;
        }
        Ok(())
    }
}

/// Sequential frame reader bounded by the segment length at open time.
struct FrameIter<T> {
    reader: BufReader<File>,
    remaining: u64,
    codec: Codec<T>,
    done: bool,
    _item: PhantomData<fn() -> T>,
}

impl<T> FrameIter<T> {
    fn fail(&mut self, reason: String) -> Option<Result<T, BackendError>> {
        self.done = true;
        Some(Err(BackendError::ReadFailed(reason)))
    }
}

impl<T> Iterator for FrameIter<T> {
    type Item = Result<T, BackendError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining < FRAME_HEADER {
            return None;
        }

        let mut header = [0u8; FRAME_HEADER as usize];
        if let Err(e) = self.reader.read_exact(&mut header) {
            return self.fail(format!("read frame header: {}", e));
        }
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if self.remaining - FRAME_HEADER < len {
            // Tail frame not fully flushed yet.
            self.done = true;
            return None;
        }

        let mut payload = vec![0u8; len as usize];
        if let Err(e) = self.reader.read_exact(&mut payload) {
            return self.fail(format!("read frame payload: {}", e));
        }
        self.remaining -= FRAME_HEADER + len;

        let actual = crc32fast::hash(&payload);
        if actual != crc {
            return self.fail(format!(
                "frame checksum mismatch (expected {:08x}, got {:08x})",
                crc, actual
            ));
        }

        Some(self.codec.decode(&payload).map_err(BackendError::from))
    }
}
