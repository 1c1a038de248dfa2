use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use log::{error, info};
use crate::drivers::Result;
/// One line of the session log.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord<'a> {
    pub elapsed_ms: f64,
    pub values: &'a [f64],
    /// Ground-truth class for training sessions.
    pub label: Option<usize>,
}
/// Turns a record into the bytes of one log line.
pub trait RecordFormatter: Send {
    fn format(&self, record: &LogRecord<'_>, out: &mut String);
}
/// `<elapsed>,<v1>,...,<vN>[,<label>]` with a fixed number of decimals and
/// no trailing delimiter.
#[derive(Clone, Copy, Debug)]
pub struct CsvFormatter {
    precision: usize,
}
impl CsvFormatter {
    pub fn new(precision: usize) -> Self {
        Self { precision }
    }
}
impl Default for CsvFormatter {
    fn default() -> Self {
        Self::new(4)
    }
}
impl RecordFormatter for CsvFormatter {
    fn format(&self, record: &LogRecord<'_>, out: &mut String) {
        use std::fmt::Write as _;
        let p = self.precision;
        // Writing into a String cannot fail.
        let _ = write!(out, "{:.p$}", record.elapsed_ms);
        for value in record.values {
            let _ = write!(out, ",{value:.p$}");
        }
        if let Some(label) = record.label {
            let _ = write!(out, ",{label}");
        }
        out.push('\n');
    }
}
/// Append-only record sink. Errors are returned to the caller untouched.
pub struct LogWriter {
    writer: Option<Box<dyn Write + Send>>,
    formatter: Box<dyn RecordFormatter>,
    path: Option<PathBuf>,
    line: String,
    records: u64,
}
impl LogWriter {
    /// Create (or truncate) a file destination.
    pub fn create(path: impl AsRef<Path>, formatter: impl RecordFormatter + 'static) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        info!("recording to {}", path.display());
        let mut writer = Self::from_writer(BufWriter::new(file), formatter);
        writer.path = Some(path);
        Ok(writer)
    }
    pub fn from_writer(
        writer: impl Write + Send + 'static,
        formatter: impl RecordFormatter + 'static,
    ) -> Self {
        Self {
            writer: Some(Box::new(writer)),
            formatter: Box::new(formatter),
            path: None,
            line: String::with_capacity(256),
            records: 0,
        }
    }
    pub fn write_record(&mut self, record: &LogRecord<'_>) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "log destination already closed",
            )
            .into());
        };
        self.line.clear();
        self.formatter.format(record, &mut self.line);
        writer.write_all(self.line.as_bytes())?;
        self.records += 1;
        Ok(())
    }
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
    /// Flush and release the destination. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            match &self.path {
                Some(path) => info!("{} records saved to {}", self.records, path.display()),
                None => info!("{} records saved", self.records),
            }
        }
        Ok(())
    }
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }
    pub fn records_written(&self) -> u64 {
        self.records
    }
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
impl Drop for LogWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("failed to finalize log: {e}");
        }
    }
}
