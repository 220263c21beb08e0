use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::api::FusionOutput;
use crate::error::Result;
use crate::io::OutputSink;

/// Writes the `FusionReport` of every accepted run as pretty-printed JSON.
#[derive(Debug)]
pub struct JsonReportSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonReportSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of reports written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonReportSink<BufWriter<File>> {
    /// Sidecar report file at `path`, truncated if it exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        info!("Writing fusion report to {:?}", path.as_ref());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> OutputSink for JsonReportSink<W> {
    fn accept(&mut self, output: &FusionOutput) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, &output.report())?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }
}
