use serde::Serialize;
use std::collections::BTreeMap;

/// measurement key -> formatted readings, in log order
pub type Measurements = BTreeMap<String, Vec<String>>;

/// model -> device id -> measurements
pub type Summary = BTreeMap<String, BTreeMap<String, Measurements>>;

/// result of one pass over the sensor log
#[derive(Clone, Debug, Default)]
pub struct SummaryReport {
    pub summary: Summary,
    /// lines seen, including blank and malformed ones
    pub lines: usize,
    /// records that made it into the summary
    pub records: usize,
    pub skipped_malformed: usize,
    pub skipped_excluded: usize,
    /// records without model or id
    pub skipped_incomplete: usize,
}

/// flat webcam/weather snapshot served to the page header
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub mtime: String,
    pub temp: String,
    pub humi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lumi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baro: Option<String>,
}

/// one recorded video as listed to the page
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VideoEntry {
    /// display name (file stem)
    pub name: String,
    /// file name relative to the video directory
    pub file: String,
}
