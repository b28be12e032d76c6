//! Destination side of the pipeline: the resource contract and the single writer.

pub mod record;

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use metrics::counter;

use crate::ingest::queue::QueueConsumer;
pub use record::{RecordFormat, StoredItem, CSV_HEADER};

/// Open handle on a destination. Dropping it closes the resource.
pub trait RecordSink: Send {
    fn append(&mut self, record: &str) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Where a run's records end up.
pub trait Destination: Send + Sync {
    fn exists(&self) -> bool;
    /// Open for exclusive writing; must fail if the resource already exists.
    fn open(&self) -> io::Result<Box<dyn RecordSink>>;
    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct FileDestination {
    path: PathBuf,
}

impl FileDestination {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Destination for FileDestination {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn open(&self) -> io::Result<Box<dyn RecordSink>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;
        Ok(Box::new(FileSink {
            out: BufWriter::new(file),
        }))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

struct FileSink {
    out: BufWriter<File>,
}

impl RecordSink for FileSink {
    fn append(&mut self, record: &str) -> io::Result<()> {
        self.out.write_all(record.as_bytes())?;
        self.out.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.out.get_ref().sync_data()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("destination already exists: {0}")]
    AlreadyExists(String),
    #[error("i/o error on {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    pub batches: usize,
    pub items: usize,
}

/// Open `dest` exclusively, mapping "already exists" to its own error.
pub fn open_destination(dest: &dyn Destination) -> Result<Box<dyn RecordSink>, SinkError> {
    let target = dest.describe();
    dest.open().map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => SinkError::AlreadyExists(target),
        _ => SinkError::Io { target, source: e },
    })
}

/// Sole consumer of the fan-in queue. Blocking; run it on a dedicated thread.
pub struct SinkWriter {
    format: RecordFormat,
    tz: FixedOffset,
    target: String,
}

impl SinkWriter {
    pub fn new(format: RecordFormat, tz: FixedOffset, target: impl Into<String>) -> Self {
        Self {
            format,
            tz,
            target: target.into(),
        }
    }

    /// Append every batch until the queue is closed and drained, then flush and
    /// close `sink`. The sink is flushed and closed on the error path too.
    pub fn run(
        &self,
        mut sink: Box<dyn RecordSink>,
        mut queue: QueueConsumer,
    ) -> Result<WriteReport, SinkError> {
        let written = self.consume(sink.as_mut(), &mut queue);
        let flushed = sink.flush();
        drop(sink);
        // Unread batches are discarded with the consumer.
        drop(queue);

        let report = written?;
        flushed.map_err(|source| self.io_error(source))?;
        Ok(report)
    }

    fn io_error(&self, source: io::Error) -> SinkError {
        SinkError::Io {
            target: self.target.clone(),
            source,
        }
    }

    fn consume(
        &self,
        sink: &mut dyn RecordSink,
        queue: &mut QueueConsumer,
    ) -> Result<WriteReport, SinkError> {
        if let Some(header) = self.format.header() {
            sink.append(header).map_err(|e| self.io_error(e))?;
        }

        let mut report = WriteReport::default();
        while let Some(batch) = queue.blocking_next() {
            for item in &batch.items {
                let line = self.format.encode(item, &self.tz)?;
                sink.append(&line).map_err(|e| self.io_error(e))?;
            }
            report.batches += 1;
            report.items += batch.len();
            counter!("harvest_items_written_total").increment(batch.len() as u64);
        }
        Ok(report)
    }
}
