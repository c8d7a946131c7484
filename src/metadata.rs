use serde::{Deserialize, Serialize};

/// Edit provenance of an element, kept as the raw attribute strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changeset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl Created {
    /// Store `value` under `name`; returns false for anything but
    /// version, changeset, timestamp, user and uid.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        let slot = match name {
            "version" => &mut self.version,
            "changeset" => &mut self.changeset,
            "timestamp" => &mut self.timestamp,
            "user" => &mut self.user,
            "uid" => &mut self.uid,
            _ => return false,
        };
        *slot = Some(value.to_string());
        true
    }
}
