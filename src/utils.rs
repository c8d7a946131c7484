use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix appended to the input path for the default output file.
pub const OUTPUT_SUFFIX: &str = ".json";

/// Carriage-return progress line on stderr; silent when disabled.
pub struct ProgressCounter {
    label: &'static str,
    interval: u64,
    count: u64,
    enabled: bool,
}

impl ProgressCounter {
    pub fn new(label: &'static str, interval: u64, enabled: bool) -> Self {
        let counter = Self {
            label,
            interval: interval.max(1),
            count: 0,
            enabled,
        };
        counter.print();
        counter
    }

    pub fn inc(&mut self, delta: u64) {
        let prev = self.count;
        self.count += delta;
        // Print if we crossed an interval boundary
        if prev / self.interval < self.count / self.interval {
            self.print();
        }
    }

    pub fn finish(&self) {
        if self.enabled {
            self.print();
            eprintln!();
        }
    }

    fn print(&self) {
        if !self.enabled {
            return;
        }
        eprint!("\r{}: {}", self.label, self.count);
        let _ = std::io::stderr().flush();
    }
}

/// `map.osm` becomes `map.osm.json`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(OUTPUT_SUFFIX);
    PathBuf::from(name)
}
