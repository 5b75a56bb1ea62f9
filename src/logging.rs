//! Rotating log file
//!
//! A `MakeWriter` for `tracing-subscriber` that appends formatted events to a
//! file and truncates it once a fixed number of entries has been written.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

/// Log file truncated after `max_entries` lines
#[derive(Clone)]
pub struct RotatingLog {
    inner: Arc<Mutex<LogFile>>,
}

struct LogFile {
    file: File,
    entry_count: usize,
    max_entries: usize,
}

impl RotatingLog {
    /// Open (or create) the log file in append mode
    pub fn open(path: &Path, max_entries: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(LogFile {
                file,
                entry_count: 0,
                max_entries: max_entries.max(1),
            })),
        })
    }
}

impl LogFile {
    fn rotate(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.entry_count = 0;
        Ok(())
    }
}

/// Handle returned for each event
pub struct RotatingLogWriter {
    inner: Arc<Mutex<LogFile>>,
}

impl Write for RotatingLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Rotation and append happen under one lock so concurrent
        // events never interleave with a truncate.
        let mut log = self.inner.lock();

        if log.entry_count >= log.max_entries {
            log.rotate()?;
        }

        log.file.write_all(buf)?;
        log.entry_count += buf.iter().filter(|b| **b == b'\n').count().max(1);

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingLog {
    type Writer = RotatingLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingLogWriter {
            inner: Arc::clone(&self.inner),
        }
    }
}
