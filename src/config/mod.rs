use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

/// Street types accepted as-is by the auditor.
const DEFAULT_EXPECTED: &[&str] = &[
    "Street", "Avenue", "Boulevard", "Drive", "Court", "Place", "Square", "Lane", "Road", "Trail",
    "Parkway", "Commons", "1", "10", "11", "116", "12", "124", "13", "14", "15", "154", "16", "17",
    "18", "2", "20", "21", "22", "24", "3", "30", "32", "34", "4", "45", "5", "51", "6", "7", "8",
    "86", "9", "97", "Baseline", "Boardwalk", "Circle", "Close", "Cove", "Crescent", "Crestway",
    "Cross", "Crossing", "East", "West", "South", "North", "Estates", "Gardens", "Gate", "Grove",
    "Heights", "Highway", "Hill", "Hollow", "Line", "Walk", "Way",
];

/// Known-bad street types and their replacements. An empty replacement deletes the token.
const DEFAULT_CORRECTIONS: &[(&str, &str)] = &[
    ("St", "Street"),
    ("St.", "Street"),
    ("Ave", "Avenue"),
    ("Ave.", "Avenue"),
    ("Rd.", "Road"),
    ("Rd", "Road"),
    ("AVenue", "Avenue"),
    ("Cresent", "Crescent"),
    ("Dr", "Drive"),
    ("Dr.", "Drive"),
    ("N", "North"),
    ("E", "East"),
    ("S", "South"),
    ("W", "West"),
    ("road", "Road"),
    ("g", ""),
    ("canadatrust.com", ""),
    ("45th", "45"),
];

/// Rule tables as written in a YAML rules file.
///
/// Corrections are a list of `from`/`to` pairs rather than a map so that
/// case-sensitive tokens like `St` and `road` survive key normalization.
#[derive(Debug, Deserialize, Serialize)]
pub struct RulesFile {
    pub expected: Vec<String>,
    pub corrections: Vec<Correction>,
    #[serde(default)]
    pub replace: ReplaceScope,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Correction {
    pub from: String,
    pub to: String,
}

/// Immutable rule tables shared by the auditor and the transformer.
#[derive(Debug, Clone)]
pub struct RulesConfig {
    pub expected: BTreeSet<String>,
    pub corrections: BTreeMap<String, String>,
    pub replace: ReplaceScope,
}

impl RulesConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?;
        let file: RulesFile = settings.try_deserialize()?;
        Ok(Self::from(file))
    }

    pub fn is_expected(&self, token: &str) -> bool {
        self.expected.contains(token)
    }

    pub fn correction(&self, token: &str) -> Option<&str> {
        self.corrections.get(token).map(String::as_str)
    }
}

impl From<RulesFile> for RulesConfig {
    fn from(file: RulesFile) -> Self {
        Self {
            expected: file.expected.into_iter().collect(),
            // Later entries win, matching a hand-edited dict literal.
            corrections: file
                .corrections
                .into_iter()
                .map(|c| (c.from, c.to))
                .collect(),
            replace: file.replace,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            expected: DEFAULT_EXPECTED.iter().map(|s| s.to_string()).collect(),
            corrections: DEFAULT_CORRECTIONS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            replace: ReplaceScope::default(),
        }
    }
}

/// Where a corrected street type is substituted.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReplaceScope {
    /// First occurrence of the token anywhere in the name.
    #[default]
    First,
    /// Only the trailing token span.
    Trailing,
}

impl FromStr for ReplaceScope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "first" => Ok(ReplaceScope::First),
            "trailing" => Ok(ReplaceScope::Trailing),
            _ => Err(format!("invalid replace scope: {value}")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub pretty: bool,
    pub progress: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_cover_common_abbreviations() {
        let rules = RulesConfig::default();
        assert_eq!(rules.correction("St"), Some("Street"));
        assert_eq!(rules.correction("Dr."), Some("Drive"));
        assert_eq!(rules.correction("g"), Some(""));
        assert!(rules.is_expected("Street"));
        assert!(rules.is_expected("97"));
        assert!(!rules.is_expected("St"));
        assert_eq!(rules.replace, ReplaceScope::First);
    }

    #[test]
    fn loads_rules_from_yaml_preserving_case() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r#"
expected: ["Street", "Road"]
corrections:
  - from: "St"
    to: "Street"
  - from: "road"
    to: "Road"
replace: trailing
"#
        )
        .unwrap();

        let rules = RulesConfig::load(file.path()).unwrap();
        assert_eq!(rules.expected.len(), 2);
        assert_eq!(rules.correction("St"), Some("Street"));
        assert_eq!(rules.correction("road"), Some("Road"));
        assert_eq!(rules.correction("st"), None);
        assert_eq!(rules.replace, ReplaceScope::Trailing);
    }

    #[test]
    fn replace_scope_parses_case_insensitively() {
        assert_eq!("Trailing".parse::<ReplaceScope>(), Ok(ReplaceScope::Trailing));
        assert!("last".parse::<ReplaceScope>().is_err());
    }
}
