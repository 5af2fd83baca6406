//! In-memory store: encoded items in a vector behind a read/write lock.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use sochdb_loadgen::{Backend, BackendError, BackendHandle, Codec, ItemIter};

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend;

impl MemoryBackend {
    pub fn new() -> Self {
        Self
    }
}

impl<T: Send + Sync + 'static> Backend<T> for MemoryBackend {
    type Handle = MemoryHandle<T>;

    fn name(&self) -> &str {
        "memory"
    }

    fn supports_iteration(&self) -> bool {
        true
    }

    fn create(&self, codec: Codec<T>) -> Result<Self::Handle, BackendError> {
        Ok(MemoryHandle {
            codec,
            rows: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }
}

pub struct MemoryHandle<T> {
    codec: Codec<T>,
    rows: RwLock<Vec<Vec<u8>>>,
    closed: AtomicBool,
}

impl<T> MemoryHandle<T> {
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl<T: Send + Sync + 'static> BackendHandle<T> for MemoryHandle<T> {
    fn append(&self, item: &T) -> Result<(), BackendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BackendError::WriteFailed("memory handle is closed".into()));
        }
        let bytes = self.codec.encode(item);
        self.rows.write().push(bytes);
        Ok(())
    }

    /// Iterates the rows present when the iteration opened; each row is
    /// decoded lazily under a short read lock.
    fn iterate_all(&self) -> Result<ItemIter<'_, T>, BackendError> {
        let len = self.rows.read().len();
        Ok(Box::new((0..len).map(move |i| {
            let rows = self.rows.read();
            match rows.get(i) {
                Some(bytes) => self.codec.decode(bytes).map_err(BackendError::from),
                None => Err(BackendError::ReadFailed(format!("row {} vanished", i))),
            }
        })))
    }

    fn close(&self) -> Result<(), BackendError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let mut rows = self.rows.write();
            rows.clear();
            rows.shrink_to_fit();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sochdb_loadgen::CodecError;

    fn u32_codec() -> Codec<u32> {
        fn ser(v: &u32) -> Vec<u8> {
            v.to_le_bytes().to_vec()
        }
        fn de(b: &[u8]) -> Result<u32, CodecError> {
            b.try_into()
                .map(u32::from_le_bytes)
                .map_err(|_| CodecError::Malformed {
                    type_name: "u32",
                    reason: "bad length".into(),
                })
        }
        Codec::new("u32", ser, de)
    }

    #[test]
    fn test_iteration_sees_prefix_at_open() {
        let handle: MemoryHandle<u32> = MemoryBackend.create(u32_codec()).unwrap();
        handle.append(&1).unwrap();
        handle.append(&2).unwrap();

        let iter = handle.iterate_all().unwrap();
        handle.append(&3).unwrap();
        let seen: Vec<u32> = iter.map(Result::unwrap).collect();
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(handle.len(), 3);
    }

    #[test]
    fn test_close_releases_rows_and_rejects_appends() {
        let handle: MemoryHandle<u32> = MemoryBackend.create(u32_codec()).unwrap();
        handle.append(&7).unwrap();
        handle.close().unwrap();
        assert!(handle.is_empty());
        assert!(handle.append(&8).is_err());
    }
}
