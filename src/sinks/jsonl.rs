use super::RecordSink;
use crate::pipeline::Record;
use anyhow::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One JSON document per record, newline terminated.
///
/// Pretty mode indents each document over several lines; bulk loaders that
/// accept concatenated documents still read it, strict line readers do not.
pub struct JsonlSink {
    writer: BufWriter<Box<dyn Write>>,
    pretty: bool,
}

impl JsonlSink {
    pub fn new<P: AsRef<Path>>(path: P, pretty: bool) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(Box::new(file), pretty))
    }

    pub fn stdout(pretty: bool) -> Result<Self> {
        Ok(Self::from_writer(Box::new(std::io::stdout()), pretty))
    }

    pub fn from_writer(writer: Box<dyn Write>, pretty: bool) -> Self {
        Self {
            writer: BufWriter::new(writer),
            pretty,
        }
    }
}

impl RecordSink for JsonlSink {
    fn add_record(&mut self, record: &Record) -> Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, record)?;
        } else {
            serde_json::to_writer(&mut self.writer, record)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
