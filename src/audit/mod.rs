//! Discovery pass over the raw export.
//!
//! Nothing here feeds the transformer directly: the report is read by a
//! person who then grows the rule tables.

use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::config::RulesConfig;
use crate::normalize::{is_canonical_postcode, trailing_token};
use crate::pipeline::{ElementKind, PROBLEM_CHARS};
use crate::source::SourceElement;

static LOWER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]|_)*$").expect("valid regex"));
static LOWER_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]|_)*:([a-z]|_)*$").expect("valid regex"));

/// Unrecognized street type mapped to every distinct name ending in it.
pub type StreetTypes = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyTypes {
    pub lower: u64,
    pub lower_colon: u64,
    pub problemchars: u64,
    pub other: u64,
}

impl KeyTypes {
    fn observe(&mut self, key: &str) {
        if LOWER.is_match(key) {
            self.lower += 1;
        } else if LOWER_COLON.is_match(key) {
            self.lower_colon += 1;
        } else if PROBLEM_CHARS.is_match(key) {
            self.problemchars += 1;
        } else {
            self.other += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostcodeFinding {
    pub value: String,
    pub count: u64,
    pub canonical: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub elements: u64,
    pub street_types: StreetTypes,
    pub postcodes: Vec<PostcodeFinding>,
    pub key_types: KeyTypes,
}

impl AuditReport {
    pub fn malformed_postcodes(&self) -> impl Iterator<Item = &PostcodeFinding> {
        self.postcodes.iter().filter(|finding| !finding.canonical)
    }
}

/// File `name` under its trailing token unless that token is expected.
pub fn audit_street_type(street_types: &mut StreetTypes, name: &str, rules: &RulesConfig) {
    let Some(token) = trailing_token(name) else {
        return;
    };
    if !rules.is_expected(token) {
        street_types
            .entry(token.to_string())
            .or_default()
            .insert(name.to_string());
    }
}

/// Street names of `node` and `way` elements grouped by unexpected street type.
pub fn classify_street_types<I>(elements: I, rules: &RulesConfig) -> Result<StreetTypes>
where
    I: IntoIterator<Item = Result<SourceElement>>,
{
    let mut auditor = Auditor::new(rules);
    for element in elements {
        auditor.observe(&element?);
    }
    Ok(auditor.finish().street_types)
}

pub struct Auditor<'a> {
    rules: &'a RulesConfig,
    elements: u64,
    street_types: StreetTypes,
    postcodes: BTreeMap<String, u64>,
    key_types: KeyTypes,
}

impl<'a> Auditor<'a> {
    pub fn new(rules: &'a RulesConfig) -> Self {
        Self {
            rules,
            elements: 0,
            street_types: StreetTypes::new(),
            postcodes: BTreeMap::new(),
            key_types: KeyTypes::default(),
        }
    }

    pub fn observe(&mut self, element: &SourceElement) {
        self.elements += 1;
        let shaped = ElementKind::from_tag(&element.tag).is_some();

        for (key, value) in element.tags() {
            self.key_types.observe(key);
            let Some(value) = value else {
                continue;
            };
            match key {
                "addr:street" if shaped => {
                    audit_street_type(&mut self.street_types, value, self.rules)
                }
                "addr:postcode" => *self.postcodes.entry(value.to_string()).or_default() += 1,
                _ => {}
            }
        }
    }

    pub fn finish(self) -> AuditReport {
        let postcodes = self
            .postcodes
            .into_iter()
            .map(|(value, count)| PostcodeFinding {
                canonical: is_canonical_postcode(&value),
                value,
                count,
            })
            .collect();

        AuditReport {
            elements: self.elements,
            street_types: self.street_types,
            postcodes,
            key_types: self.key_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ElementReader;

    fn node_with_street(name: &str) -> SourceElement {
        SourceElement::new("node").with_tag("addr:street", name)
    }

    #[test]
    fn reports_only_unexpected_street_types() {
        let elements = vec![
            Ok(node_with_street("123 Main Street")),
            Ok(node_with_street("45 Oak Rd")),
        ];
        let types = classify_street_types(elements, &RulesConfig::default()).unwrap();

        assert_eq!(types.len(), 1);
        assert_eq!(
            types.get("Rd"),
            Some(&BTreeSet::from(["45 Oak Rd".to_string()]))
        );
        assert!(!types.contains_key("Street"));
    }

    #[test]
    fn groups_distinct_names_per_token() {
        let xml = r#"<osm>
  <node id="1"><tag k="addr:street" v="King St"/></node>
  <way id="2"><tag k="addr:street" v="Queen St"/></way>
  <node id="3"><tag k="addr:street" v="King St"/></node>
  <relation id="4"><tag k="addr:street" v="Ignored St"/></relation>
  <node id="5"><tag k="addr:street" v="Parkside Dr."/></node>
</osm>"#;
        let types =
            classify_street_types(ElementReader::from_xml(xml), &RulesConfig::default()).unwrap();

        assert_eq!(types["St"].len(), 2);
        assert!(types["St"].contains("Queen St"));
        assert!(!types["St"].contains("Ignored St"));
        assert_eq!(types["Dr."], BTreeSet::from(["Parkside Dr.".to_string()]));
    }

    #[test]
    fn parse_errors_propagate() {
        let result = classify_street_types(
            ElementReader::from_xml("<osm><node>"),
            &RulesConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn report_counts_postcodes_and_key_types() {
        let rules = RulesConfig::default();
        let mut auditor = Auditor::new(&rules);
        auditor.observe(
            &SourceElement::new("node")
                .with_tag("addr:postcode", "N2L3G1")
                .with_tag("name", "Cafe")
                .with_tag("fixme?", "x")
                .with_tag("Name_Upper", "y"),
        );
        auditor.observe(
            &SourceElement::new("relation")
                .with_tag("addr:postcode", "N2L 3G1")
                .with_tag("addr:postcode", "N2L 3G1"),
        );
        let report = auditor.finish();

        assert_eq!(report.elements, 2);
        assert_eq!(
            report.postcodes,
            vec![
                PostcodeFinding {
                    value: "N2L 3G1".into(),
                    count: 2,
                    canonical: true
                },
                PostcodeFinding {
                    value: "N2L3G1".into(),
                    count: 1,
                    canonical: false
                },
            ]
        );
        assert_eq!(report.malformed_postcodes().count(), 1);
        assert_eq!(
            report.key_types,
            KeyTypes {
                lower: 1,
                lower_colon: 3,
                problemchars: 1,
                other: 1
            }
        );
    }
}
