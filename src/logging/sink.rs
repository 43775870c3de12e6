//! Output destinations for rendered records.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::MakeWriter;

/// In-memory sink, shareable between the logger and the code reading it.
///
/// Every record lands with a single locked write, so concurrent records
/// never interleave.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    /// Written records, one per line, without line endings.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.buf.lock().clear();
    }
}

/// Writer handed out for one record; holds the sink lock until dropped.
pub struct MemoryWriter<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
}

impl Write for MemoryWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MemorySink {
    type Writer = MemoryWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        MemoryWriter {
            guard: self.buf.lock(),
        }
    }
}

/// Fan `writers` out into one writer. `None` when there are none.
pub(crate) fn combine(writers: Vec<BoxMakeWriter>) -> Option<BoxMakeWriter> {
    writers
        .into_iter()
        .reduce(|acc, next| BoxMakeWriter::new(acc.and(next)))
}
