use std::{
    fmt,
    io::{Read, Write},
    sync::{Arc, Mutex},
};

use crate::errors::{Error, RunResult};

/// A readable stream shared between the runtime and host handles.
pub type SharedReader = Arc<Mutex<Box<dyn Read + Send>>>;
/// A writable stream shared between the runtime and host handles.
pub type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

enum FileStream {
    Reader(SharedReader),
    Writer(SharedWriter),
    Closed,
}

/// A file-like handle exposed to scripts: `os.stdin`, `os.stdout`, and
/// handles returned by the filesystem abstraction.
pub struct File {
    name: String,
    stream: Mutex<FileStream>,
}

impl File {
    #[must_use]
    pub fn reader(name: impl Into<String>, stream: SharedReader) -> Self {
        Self {
            name: name.into(),
            stream: Mutex::new(FileStream::Reader(stream)),
        }
    }

    #[must_use]
    pub fn writer(name: impl Into<String>, stream: SharedWriter) -> Self {
        Self {
            name: name.into(),
            stream: Mutex::new(FileStream::Writer(stream)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the stream to the end and returns the content as a string.
    pub fn read_all(&self) -> RunResult<String> {
        let stream = self
            .stream
            .lock()
            .expect("file lock poisoned - a thread panicked while holding it");
        match &*stream {
            FileStream::Reader(reader) => {
                let mut buf = Vec::new();
                reader
                    .lock()
                    .expect("file stream lock poisoned - a thread panicked while holding it")
                    .read_to_end(&mut buf)
                    .map_err(|err| Error::eval_error(format!("read {}: {err}", self.name)))?;
                Ok(String::from_utf8_lossy(&buf).into_owned())
            }
            FileStream::Writer(_) => Err(Error::type_error(format!(
                "file {} is not open for reading",
                self.name
            ))),
            FileStream::Closed => Err(Error::value_error(format!("file {} is closed", self.name))),
        }
    }

    /// Writes bytes to the stream and returns the number written.
    pub fn write(&self, data: &[u8]) -> RunResult<usize> {
        let stream = self
            .stream
            .lock()
            .expect("file lock poisoned - a thread panicked while holding it");
        match &*stream {
            FileStream::Writer(writer) => {
                let mut writer = writer
                    .lock()
                    .expect("file stream lock poisoned - a thread panicked while holding it");
                writer
                    .write_all(data)
                    .and_then(|()| writer.flush())
                    .map_err(|err| Error::eval_error(format!("write {}: {err}", self.name)))?;
                Ok(data.len())
            }
            FileStream::Reader(_) => Err(Error::type_error(format!(
                "file {} is not open for writing",
                self.name
            ))),
            FileStream::Closed => Err(Error::value_error(format!("file {} is closed", self.name))),
        }
    }

    /// Releases the handle. Shared streams (stdin/stdout) stay usable
    /// through other handles.
    pub fn close(&self) {
        let mut stream = self
            .stream
            .lock()
            .expect("file lock poisoned - a thread panicked while holding it");
        *stream = FileStream::Closed;
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File").field("name", &self.name).finish()
    }
}
