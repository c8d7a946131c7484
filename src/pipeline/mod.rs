use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::config::RulesConfig;
use crate::metadata::Created;
use crate::normalize::{normalize_postcode, normalize_street};
use crate::source::SourceElement;

/// Characters that disqualify a tag key.
pub static PROBLEM_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[=+/&<>;'"?%#$@,. \t\r\n]"#).expect("valid regex"));

const ADDRESS_PREFIX: &str = "addr:";

/// Top-level record keys a tag may not overwrite.
const RESERVED_KEYS: [&str; 5] = ["type", "created", "pos", "address", "node_refs"];

/// Attributes consumed elsewhere and never copied as plain fields.
const SKIPPED_ATTRS: [&str; 3] = ["v", "lat", "lon"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Way,
}

impl ElementKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "node" => Some(ElementKind::Node),
            "way" => Some(ElementKind::Way),
            _ => None,
        }
    }
}

/// One flattened document ready for bulk loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    #[serde(default)]
    pub created: Created,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_refs: Option<Vec<String>>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl Record {
    fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            created: Created::default(),
            pos: None,
            address: None,
            node_refs: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn postcode(&self) -> Option<&str> {
        self.address.as_ref()?.get("postcode").map(String::as_str)
    }
}

/// Something worth a second look that did not stop the element from being shaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    ProblemKey { key: String },
    MissingValue { key: String },
    ReservedKey { key: String, value: String },
    InvalidCoordinate { lat: String, lon: String },
    PostcodeReformatted { from: String, to: String },
    StreetRenamed { from: String, to: String },
}

impl Anomaly {
    pub fn label(&self) -> &'static str {
        match self {
            Anomaly::ProblemKey { .. } => "problem_key",
            Anomaly::MissingValue { .. } => "missing_value",
            Anomaly::ReservedKey { .. } => "reserved_key",
            Anomaly::InvalidCoordinate { .. } => "invalid_coordinate",
            Anomaly::PostcodeReformatted { .. } => "postcode_reformatted",
            Anomaly::StreetRenamed { .. } => "street_renamed",
        }
    }
}

/// Reshape a `node` or `way` into a [`Record`]; every other element yields `None`.
///
/// The element and all its descendants are walked attribute by attribute:
/// created attributes fill `created`, `k`/`v` pairs become address or plain
/// fields, `ref`s append to `node_refs`, and any other attribute is copied
/// verbatim (last write wins).
pub fn shape_element(
    element: &SourceElement,
    rules: &RulesConfig,
    anomalies: &mut Vec<Anomaly>,
) -> Option<Record> {
    let kind = ElementKind::from_tag(&element.tag)?;
    let mut record = Record::new(kind);

    if let (Some(lat), Some(lon)) = (element.attr("lat"), element.attr("lon")) {
        match (lat.trim().parse::<f64>(), lon.trim().parse::<f64>()) {
            // NaN and infinities parse but cannot be written as JSON numbers
            (Ok(lat), Ok(lon)) if lat.is_finite() && lon.is_finite() => {
                record.pos = Some([lat, lon])
            }
            _ => anomalies.push(Anomaly::InvalidCoordinate {
                lat: lat.to_string(),
                lon: lon.to_string(),
            }),
        }
    }

    for el in element.iter() {
        for (name, value) in &el.attributes {
            if record.created.set(name, value) {
                continue;
            }
            match name.as_str() {
                "k" => apply_tag(&mut record, value, el.attr("v"), rules, anomalies),
                "ref" => record
                    .node_refs
                    .get_or_insert_with(Vec::new)
                    .push(value.clone()),
                other if SKIPPED_ATTRS.contains(&other) => {}
                other => {
                    record.fields.insert(other.to_string(), value.clone());
                }
            }
        }
    }

    Some(record)
}

fn apply_tag(
    record: &mut Record,
    key: &str,
    value: Option<&str>,
    rules: &RulesConfig,
    anomalies: &mut Vec<Anomaly>,
) {
    if PROBLEM_CHARS.is_match(key) {
        anomalies.push(Anomaly::ProblemKey {
            key: key.to_string(),
        });
        return;
    }
    let Some(value) = value else {
        anomalies.push(Anomaly::MissingValue {
            key: key.to_string(),
        });
        return;
    };

    if let Some(suffix) = key.strip_prefix(ADDRESS_PREFIX) {
        // addr:street:name and friends duplicate addr:street
        if suffix.contains(':') {
            return;
        }
        let value = shape_address_value(suffix, value, rules, anomalies);
        record
            .address
            .get_or_insert_with(BTreeMap::new)
            .insert(suffix.to_string(), value);
    } else if RESERVED_KEYS.contains(&key) {
        anomalies.push(Anomaly::ReservedKey {
            key: key.to_string(),
            value: value.to_string(),
        });
    } else {
        record.fields.insert(key.to_string(), value.to_string());
    }
}

fn shape_address_value(
    suffix: &str,
    value: &str,
    rules: &RulesConfig,
    anomalies: &mut Vec<Anomaly>,
) -> String {
    let shaped = match suffix {
        "street" => normalize_street(value, rules),
        "postcode" => normalize_postcode(value),
        _ => return value.to_string(),
    };
    if shaped != value {
        let (from, to) = (value.to_string(), shaped.clone());
        anomalies.push(match suffix {
            "street" => Anomaly::StreetRenamed { from, to },
            _ => Anomaly::PostcodeReformatted { from, to },
        });
    }
    shaped
}
