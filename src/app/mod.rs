use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::audit::{AuditReport, Auditor};
use crate::config::{ReplaceScope, RulesConfig, RuntimeConfig};
use crate::pipeline::{Anomaly, shape_element};
use crate::sinks::{JsonlSink, RecordSink};
use crate::source::{ElementReader, SourceElement};
use crate::utils::ProgressCounter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Rule tables file (YAML); the built-in Waterloo Region tables are used when omitted
    #[arg(short, long, global = true, env = "OSM_WRANGLE_RULES")]
    pub rules: Option<PathBuf>,

    /// Street correction scope (first|trailing); overrides the rules file
    #[arg(long, global = true)]
    pub replace: Option<ReplaceScope>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Report unexpected street types, postal codes and tag key classes
    Audit {
        /// Input OSM XML file
        #[arg(short, long)]
        input: PathBuf,

        /// Report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Yaml)]
        format: ReportFormat,

        /// Only print unexpected street types and the names carrying them
        #[arg(long)]
        streets: bool,
    },

    /// Shape nodes and ways into JSON documents
    Transform {
        /// Input OSM XML file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file, `-` for stdout (default: <input>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Indent each document
        #[arg(long)]
        pretty: bool,

        /// Also write anomalies, one JSON object per line
        #[arg(long)]
        anomalies: Option<PathBuf>,
    },

    /// Aggregate a transformed file (postcodes, counts, users)
    Stats {
        /// Transformed JSON file
        #[arg(short, long)]
        input: PathBuf,

        /// Report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Yaml)]
        format: ReportFormat,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum ReportFormat {
    Yaml,
    Json,
}

#[derive(Debug, Default)]
pub struct TransformSummary {
    pub elements: u64,
    pub records: u64,
    pub anomalies: Vec<Anomaly>,
}

pub fn load_rules(path: Option<&Path>, replace: Option<ReplaceScope>) -> Result<RulesConfig> {
    let mut rules = match path {
        Some(path) => {
            let rules = RulesConfig::load(path)
                .with_context(|| format!("Config: Failed to load rules from {}", path.display()))?;
            tracing::info!(
                "Rules: {} expected types, {} corrections from {:?}",
                rules.expected.len(),
                rules.corrections.len(),
                path
            );
            rules
        }
        None => {
            tracing::info!("Rules: built-in tables");
            RulesConfig::default()
        }
    };
    if let Some(scope) = replace {
        tracing::info!("Rules: replace scope {:?}", scope);
        rules.replace = scope;
    }
    Ok(rules)
}

pub fn init_sink(output: &Path, pretty: bool) -> Result<Box<dyn RecordSink>> {
    if output == Path::new("-") {
        tracing::info!("Sink: jsonl -> stdout");
        Ok(Box::new(JsonlSink::stdout(pretty)?))
    } else {
        tracing::info!("Sink: jsonl -> {:?}", output);
        let sink = JsonlSink::new(output, pretty)
            .with_context(|| format!("CLI: Failed to create {}", output.display()))?;
        Ok(Box::new(sink))
    }
}

pub fn run_audit<I>(elements: I, rules: &RulesConfig, progress: bool) -> Result<AuditReport>
where
    I: IntoIterator<Item = Result<SourceElement>>,
{
    let mut auditor = Auditor::new(rules);
    let mut progress = ProgressCounter::new("Auditing elements", 10_000, progress);
    for element in elements {
        auditor.observe(&element?);
        progress.inc(1);
    }
    progress.finish();

    let report = auditor.finish();
    tracing::info!(
        "Audit: {} elements, {} unexpected street types, {} malformed postcodes",
        report.elements,
        report.street_types.len(),
        report.malformed_postcodes().count()
    );
    Ok(report)
}

/// Shape every element and hand the records to `sink`, in document order.
pub fn process_map<I>(
    elements: I,
    rules: &RulesConfig,
    runtime: &RuntimeConfig,
    sink: &mut dyn RecordSink,
) -> Result<TransformSummary>
where
    I: IntoIterator<Item = Result<SourceElement>>,
{
    let mut summary = TransformSummary::default();
    let mut progress = ProgressCounter::new("Shaping elements", 10_000, runtime.progress);

    for element in elements {
        let element = element?;
        summary.elements += 1;
        progress.inc(1);

        let Some(record) = shape_element(&element, rules, &mut summary.anomalies) else {
            continue;
        };
        sink.add_record(&record).context("Pipeline: Failed to write record")?;
        summary.records += 1;
    }

    progress.finish();
    sink.finish().context("Pipeline: Failed to finalize sink")?;
    Ok(summary)
}

pub fn run_transform(
    input: &Path,
    output: &Path,
    rules: &RulesConfig,
    runtime: &RuntimeConfig,
) -> Result<TransformSummary> {
    let elements = ElementReader::from_path(input)?;
    let mut sink = init_sink(output, runtime.pretty)?;
    tracing::info!("Transform: {:?} -> {:?}", input, output);
    process_map(elements, rules, runtime, sink.as_mut())
}

pub fn log_anomalies(anomalies: &[Anomaly]) {
    let mut totals: BTreeMap<&'static str, u64> = BTreeMap::new();
    for anomaly in anomalies {
        tracing::debug!("Anomaly: {:?}", anomaly);
        *totals.entry(anomaly.label()).or_default() += 1;
    }
    for (label, count) in totals {
        tracing::info!("Anomalies: {} x {}", count, label);
    }
}

pub fn write_anomalies(path: &Path, anomalies: &[Anomaly]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("CLI: Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for anomaly in anomalies {
        serde_json::to_writer(&mut writer, anomaly)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_report<T: Serialize, W: Write>(
    value: &T,
    format: ReportFormat,
    mut writer: W,
) -> Result<()> {
    match format {
        ReportFormat::Yaml => serde_yaml::to_writer(&mut writer, value)?,
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, value)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ElementKind;
    use crate::sinks::VecSink;

    const MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <bounds minlat="43.4" minlon="-80.6" maxlat="43.5" maxlon="-80.5"/>
  <node id="1" lat="43.47" lon="-80.54" version="2" user="alice" uid="7">
    <tag k="addr:postcode" v="N2L3G1"/>
    <tag k="addr:street" v="University Ave"/>
  </node>
  <node id="2" lat="43.48" lon="-80.55" user="bob"/>
  <way id="10" user="alice">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="residential"/>
  </way>
  <relation id="20">
    <member type="way" ref="10" role="outer"/>
  </relation>
</osm>
"#;

    #[test]
    fn process_map_emits_nodes_and_ways_in_order() {
        let mut sink = VecSink::default();
        let summary = process_map(
            ElementReader::from_xml(MAP),
            &RulesConfig::default(),
            &RuntimeConfig::default(),
            &mut sink,
        )
        .unwrap();

        assert_eq!(summary.elements, 5);
        assert_eq!(summary.records, 3);
        let kinds: Vec<ElementKind> = sink.records.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![ElementKind::Node, ElementKind::Node, ElementKind::Way]
        );

        let first = &sink.records[0];
        assert_eq!(first.postcode(), Some("N2L 3G1"));
        assert_eq!(
            first.address.as_ref().unwrap()["street"],
            "University Avenue"
        );
        assert_eq!(sink.records[2].node_refs.as_ref().unwrap().len(), 2);
        assert_eq!(summary.anomalies.len(), 2);
    }

    #[test]
    fn process_map_aborts_on_malformed_input() {
        let mut sink = VecSink::default();
        let result = process_map(
            ElementReader::from_xml("<osm><node id=\"1\"></osm>"),
            &RulesConfig::default(),
            &RuntimeConfig::default(),
            &mut sink,
        );
        assert!(result.is_err());
    }

    #[test]
    fn audit_collects_report() {
        let report =
            run_audit(ElementReader::from_xml(MAP), &RulesConfig::default(), false).unwrap();
        assert_eq!(report.elements, 5);
        assert!(report.street_types.contains_key("Ave"));
        assert_eq!(report.malformed_postcodes().count(), 1);
    }

    #[test]
    fn reports_render_as_yaml_and_json() {
        let report =
            run_audit(ElementReader::from_xml(MAP), &RulesConfig::default(), false).unwrap();

        let mut yaml = Vec::new();
        write_report(&report, ReportFormat::Yaml, &mut yaml).unwrap();
        let yaml = String::from_utf8(yaml).unwrap();
        assert!(yaml.contains("street_types:"));
        assert!(yaml.contains("University Ave"));

        let mut json = Vec::new();
        write_report(&report, ReportFormat::Json, &mut json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["key_types"]["lower_colon"], 2);
    }

    #[test]
    fn replace_flag_overrides_rules_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            "expected: [Street]\ncorrections:\n  - {{ from: \"N\", to: \"North\" }}\nreplace: trailing\n"
        )
        .unwrap();

        let rules = load_rules(Some(file.path()), None).unwrap();
        assert_eq!(rules.replace, ReplaceScope::Trailing);
        let rules = load_rules(Some(file.path()), Some(ReplaceScope::First)).unwrap();
        assert_eq!(rules.replace, ReplaceScope::First);
        let rules = load_rules(None, Some(ReplaceScope::Trailing)).unwrap();
        assert_eq!(rules.replace, ReplaceScope::Trailing);
    }

    #[test]
    fn replace_flag_parses_scope() {
        let cli = Cli::try_parse_from([
            "osm-wrangle",
            "stats",
            "-i",
            "x.json",
            "--replace",
            "Trailing",
        ])
        .unwrap();
        assert_eq!(cli.replace, Some(ReplaceScope::Trailing));

        let bad = Cli::try_parse_from(["osm-wrangle", "--replace", "last", "stats", "-i", "x"]);
        assert!(bad.is_err());
    }

    #[test]
    fn anomalies_are_written_as_lines() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let anomalies = vec![
            Anomaly::ProblemKey { key: "a b".into() },
            Anomaly::MissingValue { key: "name".into() },
        ];
        write_anomalies(file.path(), &anomalies).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"kind":"problem_key","key":"a b"}"#);
    }
}
