//! The aggregations a document store would be asked for, run over the
//! emitted records instead.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::pipeline::{ElementKind, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostcodeCount {
    pub postcode: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub documents: u64,
    pub nodes: u64,
    pub ways: u64,
    pub unique_users: u64,
    /// Most frequent first; ties ordered by postcode.
    pub postcodes: Vec<PostcodeCount>,
}

#[derive(Debug, Default)]
pub struct StatsCollector {
    documents: u64,
    nodes: u64,
    ways: u64,
    // A missing user groups as its own value, like a null group key.
    users: BTreeSet<Option<String>>,
    postcodes: BTreeMap<String, u64>,
}

impl StatsCollector {
    pub fn observe(&mut self, record: &Record) {
        self.documents += 1;
        match record.kind {
            ElementKind::Node => self.nodes += 1,
            ElementKind::Way => self.ways += 1,
        }
        self.users.insert(record.created.user.clone());
        if let Some(postcode) = record.postcode() {
            *self.postcodes.entry(postcode.to_string()).or_default() += 1;
        }
    }

    pub fn finish(self) -> Summary {
        let mut postcodes: Vec<PostcodeCount> = self
            .postcodes
            .into_iter()
            .map(|(postcode, count)| PostcodeCount { postcode, count })
            .collect();
        // Stable sort keeps the map's postcode order within equal counts.
        postcodes.sort_by(|a, b| b.count.cmp(&a.count));

        Summary {
            documents: self.documents,
            nodes: self.nodes,
            ways: self.ways,
            unique_users: self.users.len() as u64,
            postcodes,
        }
    }
}

/// Records from compact (one per line) or pretty-printed output.
pub fn read_records<R: Read>(reader: R) -> impl Iterator<Item = Result<Record>> {
    serde_json::Deserializer::from_reader(reader)
        .into_iter::<Record>()
        .map(|result| result.context("Stats: Invalid record"))
}

pub fn summarize<I>(records: I) -> Result<Summary>
where
    I: IntoIterator<Item = Result<Record>>,
{
    let mut collector = StatsCollector::default();
    for record in records {
        collector.observe(&record?);
    }
    Ok(collector.finish())
}

pub fn summarize_file(path: &Path) -> Result<Summary> {
    let file =
        File::open(path).with_context(|| format!("Stats: Failed to open {}", path.display()))?;
    summarize(read_records(BufReader::new(file)))
}
