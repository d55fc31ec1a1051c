use parking_lot::Mutex;
use std::fmt::Debug;
use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::Path;

/// What the snapshot payloads get written to.
trait BackingFile: Read + Write + Seek + Send + Debug {
    fn truncate(&mut self) -> io::Result<()>;
}

impl BackingFile for fs::File {
    fn truncate(&mut self) -> io::Result<()> {
        self.set_len(0)?;
        self.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

impl BackingFile for Cursor<Vec<u8>> {
    fn truncate(&mut self) -> io::Result<()> {
        self.get_mut().clear();
        self.set_position(0);
        Ok(())
    }
}

/// Location of a payload inside a [`BackingStorage`]. Only valid for the
/// generation of the storage it was written in.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct StorageRange {
    pub range: Range<u64>,
    pub generation: u64,
}

#[derive(Debug)]
pub(crate) enum ReadError {
    /// The storage was reset after the range was written.
    StaleGeneration,
    OutOfBounds,
    Io(io::Error),
}

impl From<io::Error> for ReadError {
    fn from(e: io::Error) -> Self {
        ReadError::Io(e)
    }
}

/// An append-only store for large snapshot payloads. Writes are buffered;
/// reads flush the buffer first and then read the requested byte range
/// back.
#[derive(Debug)]
pub struct BackingStorage {
    data: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    file: Box<dyn BackingFile>,
    buffer: Vec<u8>,
    buf_pos: usize,
    addr: u64,
    generation: u64,
}

const BUFFER_SIZE: usize = 1024 * 64;

impl BackingStorage {
    pub fn new_in_memory() -> BackingStorage {
        BackingStorage::with_file(Box::new(Cursor::new(Vec::new())))
    }

    pub fn from_path(path: &Path) -> io::Result<BackingStorage> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        Ok(BackingStorage::with_file(Box::new(file)))
    }

    fn with_file(file: Box<dyn BackingFile>) -> BackingStorage {
        BackingStorage {
            data: Mutex::new(Inner {
                file,
                buffer: vec![0; BUFFER_SIZE],
                buf_pos: 0,
                addr: 0,
                generation: 0,
            }),
        }
    }

    /// Appends `bytes` and returns where they ended up.
    pub fn append(&self, bytes: &[u8]) -> io::Result<StorageRange> {
        let mut data = self.data.lock();
        let Inner {
            ref mut file,
            ref mut buffer,
            ref mut buf_pos,
            ref mut addr,
            generation,
        } = *data;

        let start = *addr;
        let buf_start = *buf_pos;
        let buf_end = buf_start + bytes.len();

        if buf_end <= buffer.len() {
            // We have enough space in the buffer, just copy the data over.
            buffer[buf_start..buf_end].copy_from_slice(bytes);
            *buf_pos = buf_end;
        } else {
            // Flush what we have and write the payload straight through.
            file.write_all(&buffer[..buf_start])?;
            *buf_pos = 0;
            file.write_all(bytes)?;
        }

        *addr += bytes.len() as u64;

        Ok(StorageRange {
            range: start..*addr,
            generation,
        })
    }

    pub(crate) fn read(&self, location: &StorageRange) -> Result<Vec<u8>, ReadError> {
        let mut data = self.data.lock();

        if location.generation != data.generation {
            return Err(ReadError::StaleGeneration);
        }
        if location.range.start > location.range.end || location.range.end > data.addr {
            return Err(ReadError::OutOfBounds);
        }

        data.flush_buffer()?;

        let mut bytes = vec![0; (location.range.end - location.range.start) as usize];
        data.file.seek(SeekFrom::Start(location.range.start))?;
        let result = data.file.read_exact(&mut bytes);

        // Put the cursor back at the end so appends keep appending.
        data.file.seek(SeekFrom::End(0))?;
        result?;

        Ok(bytes)
    }

    /// Writes out everything that is still buffered. Called once the
    /// recording is complete; the storage is read-only from then on.
    pub fn flush(&self) -> io::Result<()> {
        let mut data = self.data.lock();
        data.flush_buffer()?;
        data.file.flush()
    }

    /// Drops all stored payloads. Ranges handed out before the reset are
    /// no longer readable.
    pub fn reset(&self) -> io::Result<()> {
        let mut data = self.data.lock();
        data.buf_pos = 0;
        data.addr = 0;
        data.generation += 1;
        data.file.truncate()
    }

    /// Number of bytes written so far, buffered or not.
    pub fn len(&self) -> u64 {
        self.data.lock().addr
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    fn flush_buffer(&mut self) -> io::Result<()> {
        if self.buf_pos > 0 {
            self.file.write_all(&self.buffer[..self.buf_pos])?;
            self.buf_pos = 0;
        }
        Ok(())
    }
}

impl Drop for BackingStorage {
    fn drop(&mut self) {
        let data = self.data.get_mut();
        if let Err(e) = data.flush_buffer() {
            log::warn!("Could not flush snapshot storage: {}", e);
        }
    }
}
