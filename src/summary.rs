//! ==============================================================================
//! summary.rs - sensor summary builder
//! ==============================================================================
//!
//! purpose:
//!     turns the json-lines log written by the 433 MHz sniffer into the
//!     nested model -> id -> measurement -> readings mapping served as
//!     /sensors.json.
//!
//! behaviour:
//!     - every line is decoded on its own. blank, torn or non-object lines
//!       are counted and skipped, the scan never aborts
//!     - excluded models and records without model/id are dropped
//!     - model, id, channel and mic are stripped from the measurements
//!     - keys matching a normalization rule are converted and merged into
//!       the rule's target key (temperature_F -> temperature_C, ...)
//!     - everything else is passed through as a string
//!     - readings accumulate in log order, nothing is deduplicated
//!
//! relationships:
//!     - used by: main.rs (/sensors.json handler, `summary` subcommand)
//!     - configured by: config.rs (exclude list, rule table)
//!
//! ==============================================================================

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::SummaryConfig;
use crate::domain::SummaryReport;
use crate::error::{HostError, Result};

/// record keys that never become measurements
const STRIPPED_KEYS: [&str; 4] = ["model", "id", "channel", "mic"];

// ==============================================================================
// normalization rules
// ==============================================================================

/// unit conversion applied by a normalization rule
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conversion {
    /// C = 5/9 * (F - 32)
    FahrenheitToCelsius,
    /// out = in * factor
    Scale { factor: f64 },
}

impl Conversion {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::FahrenheitToCelsius => 5.0 / 9.0 * (value - 32.0),
            Self::Scale { factor } => value * factor,
        }
    }
}

/// maps a unit-specific key onto a canonical key
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NormalizationRule {
    pub source: String,
    pub target: String,
    pub conversion: Conversion,
    #[serde(default)]
    pub decimals: usize,
}

impl NormalizationRule {
    pub fn new(source: &str, target: &str, conversion: Conversion, decimals: usize) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            conversion,
            decimals,
        }
    }

    /// converted and formatted reading, None if the value is not numeric
    /// or too large to print at the rule's precision
    pub fn convert(&self, value: &Value) -> Option<String> {
        let input = numeric(value)?;
        format_fixed(self.conversion.apply(input), self.decimals)
    }
}

/// highest precision a rule may ask for
pub const MAX_DECIMALS: usize = 15;

/// fixed-point decimal string, rounding half away from zero
///
/// the scaled value is first cut to 15 significant digits so decimal ties
/// that binary floats miss by one ulp (1.025 -> 102.49999999999999) still
/// round up. never uses scientific notation and never renders a negative
/// zero. None when the scaled value is not finite.
pub fn format_fixed(value: f64, decimals: usize) -> Option<String> {
    let decimals = decimals.min(MAX_DECIMALS);
    let scale = 10f64.powi(decimals as i32);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return None;
    }

    let scaled = format!("{:.14e}", scaled)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(scaled);
    let mut rounded = scaled.round() / scale;
    if rounded == 0.0 {
        rounded = 0.0;
    }
    Some(format!("{:.*}", decimals, rounded))
}

fn numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// pass-through rendering of a raw measurement
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ==============================================================================
// record decoding
// ==============================================================================

/// decode one log line into a json object
pub fn decode_line(line_no: usize, line: &str) -> Result<Map<String, Value>> {
    let failure = |reason: String| HostError::DecodeFailure { line: line_no, reason };

    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(failure("empty line".to_string()));
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(failure("not a json object".to_string())),
        Err(e) => Err(failure(e.to_string())),
    }
}

fn model_of(record: &Map<String, Value>) -> Result<String> {
    match record.get("model") {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(HostError::KeyAbsent("model")),
    }
}

/// string ids are used verbatim, numeric ids by their json text
fn id_of(record: &Map<String, Value>) -> Result<String> {
    match record.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(HostError::KeyAbsent("id")),
    }
}

// ==============================================================================
// builder
// ==============================================================================

/// one pass over `lines`, grouping readings by model, id and measurement key
pub fn build_summary<I, S>(
    lines: I,
    exclude: &BTreeSet<String>,
    rules: &[NormalizationRule],
) -> SummaryReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut report = SummaryReport::default();

    for (index, line) in lines.into_iter().enumerate() {
        report.lines += 1;

        let mut record = match decode_line(index + 1, line.as_ref()) {
            Ok(record) => record,
            Err(e) => {
                tracing::trace!("skipping {}", e);
                report.skipped_malformed += 1;
                continue;
            }
        };

        let model = match model_of(&record) {
            Ok(model) => model,
            Err(_) => {
                report.skipped_incomplete += 1;
                continue;
            }
        };

        if exclude.contains(&model) {
            report.skipped_excluded += 1;
            continue;
        }

        let id = match id_of(&record) {
            Ok(id) => id,
            Err(_) => {
                report.skipped_incomplete += 1;
                continue;
            }
        };

        for key in STRIPPED_KEYS {
            record.shift_remove(key);
        }

        let measurements = report
            .summary
            .entry(model)
            .or_default()
            .entry(id)
            .or_default();

        for (key, value) in record {
            match rules.iter().find(|rule| rule.source == key) {
                Some(rule) => match rule.convert(&value) {
                    Some(reading) => measurements.entry(rule.target.clone()).or_default().push(reading),
                    None => tracing::debug!("line {}: unconvertible {} = {}", index + 1, key, value),
                },
                None => measurements.entry(key).or_default().push(as_text(&value)),
            }
        }

        report.records += 1;
    }

    report
}

/// exclude list and rule table bundled for repeated scans
#[derive(Debug, Clone)]
pub struct SummaryBuilder {
    exclude: BTreeSet<String>,
    rules: Vec<NormalizationRule>,
}

impl SummaryBuilder {
    pub fn new(exclude: BTreeSet<String>, rules: Vec<NormalizationRule>) -> Self {
        Self { exclude, rules }
    }

    pub fn from_config(config: &SummaryConfig) -> Self {
        Self::new(config.exclude_set(), config.rules.clone())
    }

    pub fn build<I, S>(&self, lines: I) -> SummaryReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        build_summary(lines, &self.exclude, &self.rules)
    }

    /// scan the log at `path`
    ///
    /// a missing log is `SourceUnavailable`. lines that are not valid utf-8
    /// count as malformed; a read error ends the scan with what was read.
    pub fn load(&self, path: &Path) -> Result<SummaryReport> {
        if !path.exists() {
            return Err(HostError::SourceUnavailable(path.to_path_buf()));
        }

        let report = self.scan(BufReader::new(File::open(path)?), path);
        tracing::debug!(
            path = %path.display(),
            lines = report.lines,
            records = report.records,
            malformed = report.skipped_malformed,
            excluded = report.skipped_excluded,
            incomplete = report.skipped_incomplete,
            "sensor log scanned"
        );
        Ok(report)
    }

    /// summarize everything `reader` yields up to its first read error
    pub fn scan<R: BufRead>(&self, reader: R, origin: &Path) -> SummaryReport {
        let lines = reader
            .split(b'\n')
            .map_while(|chunk| match chunk {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(path = %origin.display(), "read failed, scan cut short: {}", e);
                    None
                }
            })
            .map(|bytes| String::from_utf8(bytes).unwrap_or_default());

        self.build(lines)
    }
}
