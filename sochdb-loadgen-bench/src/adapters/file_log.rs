//! Write-only line logger.
//!
//! Each append writes one formatted record to the handle's log file:
//! `<epoch millis> INFO <target> - <payload>`. The payload is the encoded
//! item rendered as UTF-8 (lossy). Logs cannot be read back.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use sochdb_loadgen::{Backend, BackendError, BackendHandle, Codec};
use tempfile::TempDir;

use super::handle_dir;
use crate::epoch_millis;

#[derive(Debug, Clone)]
pub struct FileLogBackend {
    root: PathBuf,
    target: String,
}

impl FileLogBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            target: "loadgen.eval".to_string(),
        }
    }

    /// Logger name written into every record.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }
}

impl<T: Send + Sync + 'static> Backend<T> for FileLogBackend {
    type Handle = FileLogHandle<T>;

    fn name(&self) -> &str {
        "file_log"
    }

    fn supports_iteration(&self) -> bool {
        false
    }

    fn create(&self, codec: Codec<T>) -> Result<Self::Handle, BackendError> {
        let dir = handle_dir(&self.root, "file-log-")?;
        let path = dir.path().join("eval.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| BackendError::CreateFailed(format!("open log: {}", e)))?;

        Ok(FileLogHandle {
            codec,
            target: self.target.clone(),
            path,
            out: Mutex::new(Some(BufWriter::new(file))),
            _dir: dir,
        })
    }
}

pub struct FileLogHandle<T> {
    codec: Codec<T>,
    target: String,
    path: PathBuf,
    out: Mutex<Option<BufWriter<File>>>,
    _dir: TempDir,
}

impl<T> FileLogHandle<T> {
    pub fn log_path(&self) -> &Path {
        &self.path
    }
}

impl<T: Send + Sync + 'static> BackendHandle<T> for FileLogHandle<T> {
    fn append(&self, item: &T) -> Result<(), BackendError> {
        let payload = self.codec.encode(item);
        let mut guard = self.out.lock();
        let out = guard
            .as_mut()
            .ok_or_else(|| BackendError::WriteFailed("log handle is closed".into()))?;
        writeln!(
            out,
            "{} INFO {} - {}",
            epoch_millis(),
            self.target,
            String::from_utf8_lossy(&payload)
        )
        .map_err(|e| BackendError::WriteFailed(format!("write log record: {}", e)))
    }

    fn close(&self) -> Result<(), BackendError> {
        match self.out.lock().take() {
            Some(mut out) => out
                .flush()
                .map_err(|e| BackendError::CloseFailed(format!("flush log: {}", e))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sochdb_loadgen::CodecError;

    fn text_codec() -> Codec<String> {
        fn ser(s: &String) -> Vec<u8> {
            s.as_bytes().to_vec()
        }
        fn de(b: &[u8]) -> Result<String, CodecError> {
            Ok(String::from_utf8_lossy(b).into_owned())
        }
        Codec::new("String", ser, de)
    }

    #[test]
    fn test_records_are_formatted_lines() {
        let tmp = TempDir::new().unwrap();
        let backend = FileLogBackend::new(tmp.path()).with_target("test.target");
        let handle: FileLogHandle<String> = backend.create(text_codec()).unwrap();

        handle.append(&"first".to_string()).unwrap();
        handle.append(&"second".to_string()).unwrap();
        handle.close().unwrap();

        let text = std::fs::read_to_string(handle.log_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" INFO test.target - first"));
        assert!(lines[1].ends_with(" - second"));
    }

    #[test]
    fn test_iteration_is_unsupported() {
        let tmp = TempDir::new().unwrap();
        let backend = FileLogBackend::new(tmp.path());
        assert!(!<FileLogBackend as Backend<String>>::supports_iteration(&backend));

        let handle: FileLogHandle<String> = backend.create(text_codec()).unwrap();
        assert!(matches!(
            handle.iterate_all(),
            Err(BackendError::Unsupported { operation: "iteration", .. })
        ));
    }
}
