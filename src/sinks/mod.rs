use anyhow::Result;

use crate::pipeline::Record;

pub mod jsonl;

pub use self::jsonl::JsonlSink;

pub trait RecordSink {
    fn add_record(&mut self, record: &Record) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

/// Keeps records in memory for inspection.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct VecSink {
    pub records: Vec<Record>,
}

#[cfg(test)]
impl RecordSink for VecSink {
    fn add_record(&mut self, record: &Record) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
