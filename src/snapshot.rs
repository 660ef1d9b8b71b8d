//! ==============================================================================
//! snapshot.rs - webcam/weather snapshot reader
//! ==============================================================================
//!
//! purpose:
//!     builds the small header object shown above the webcam image:
//!     image time, outdoor temperature and humidity, plus luminosity and
//!     barometric pressure where those sensors exist.
//!
//! sources:
//!     the sniffer and sensor daemons write one value per file, sysfs-style
//!     (e.g. /ram/433/Nexus-TH/231/temperature_C holds "21.5\n").
//!
//! ==============================================================================

use chrono::{DateTime, Local};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::domain::Snapshot;
use crate::error::{HostError, Result};

/// single-value file with all line terminators removed
pub fn read_value(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(raw.replace(['\r', '\n'], "")),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(HostError::SourceUnavailable(path.to_path_buf())),
        Err(e) => Err(e.into()),
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match read_value(path) {
        Ok(value) => Ok(Some(value)),
        Err(HostError::SourceUnavailable(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// `.mtime` stamp written by the capture job, else the image's own mtime
fn image_time(webcam_dir: &Path) -> Result<String> {
    if let Some(stamp) = read_optional(&webcam_dir.join(".mtime"))? {
        return Ok(stamp);
    }

    match fs::metadata(webcam_dir.join("current.jpg")).and_then(|m| m.modified()) {
        Ok(modified) => Ok(DateTime::<Local>::from(modified).format("%d.%m.%Y %H:%M").to_string()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

pub fn read_snapshot(webcam_dir: &Path, sensor_dir: &Path) -> Result<Snapshot> {
    for dir in [webcam_dir, sensor_dir] {
        if !dir.exists() {
            return Err(HostError::SourceUnavailable(dir.to_path_buf()));
        }
    }

    Ok(Snapshot {
        mtime: image_time(webcam_dir)?,
        temp: format!("{}°C", read_value(&sensor_dir.join("temperature_C"))?),
        humi: format!("{}%", read_value(&sensor_dir.join("humidity"))?),
        lumi: read_optional(&sensor_dir.join("lumi"))?.map(|v| format!("{} lx", v)),
        baro: read_optional(&sensor_dir.join("baro"))?.map(|v| format!("{} hPa", v)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let root = tempfile::tempdir().unwrap();
        let webcam = root.path().join("webcam");
        let sensor = root.path().join("433/Nexus-TH/231");
        fs::create_dir_all(&webcam).unwrap();
        fs::create_dir_all(&sensor).unwrap();
        (root, webcam, sensor)
    }

    #[test]
    fn basic_snapshot() {
        let (_root, webcam, sensor) = site();
        fs::write(webcam.join(".mtime"), "19.10.2026 14:05\n").unwrap();
        fs::write(sensor.join("temperature_C"), "12.4\n").unwrap();
        fs::write(sensor.join("humidity"), "81\r\n").unwrap();

        let snapshot = read_snapshot(&webcam, &sensor).unwrap();
        assert_eq!(
            snapshot,
            Snapshot {
                mtime: "19.10.2026 14:05".to_string(),
                temp: "12.4°C".to_string(),
                humi: "81%".to_string(),
                lumi: None,
                baro: None,
            }
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("lumi").is_none());
        assert!(json.get("baro").is_none());
    }

    #[test]
    fn optional_readings_included_when_present() {
        let (_root, webcam, sensor) = site();
        fs::write(webcam.join(".mtime"), "x").unwrap();
        fs::write(sensor.join("temperature_C"), "3").unwrap();
        fs::write(sensor.join("humidity"), "90").unwrap();
        fs::write(sensor.join("lumi"), "1200\n").unwrap();
        fs::write(sensor.join("baro"), "1013.2\n").unwrap();

        let snapshot = read_snapshot(&webcam, &sensor).unwrap();
        assert_eq!(snapshot.lumi.as_deref(), Some("1200 lx"));
        assert_eq!(snapshot.baro.as_deref(), Some("1013.2 hPa"));
    }

    #[test]
    fn mtime_falls_back_to_image() {
        let (_root, webcam, sensor) = site();
        fs::write(webcam.join("current.jpg"), b"jpeg").unwrap();
        fs::write(sensor.join("temperature_C"), "3").unwrap();
        fs::write(sensor.join("humidity"), "90").unwrap();

        let snapshot = read_snapshot(&webcam, &sensor).unwrap();
        // dd.mm.yyyy hh:mm
        assert_eq!(snapshot.mtime.len(), 16);
        assert_eq!(&snapshot.mtime[2..3], ".");
    }

    #[test]
    fn missing_directory_is_source_unavailable() {
        let (root, webcam, _sensor) = site();
        let err = read_snapshot(&webcam, &root.path().join("433/Nexus-TH/999")).unwrap_err();
        assert!(matches!(err, HostError::SourceUnavailable(_)));
    }

    #[test]
    fn missing_required_reading_is_source_unavailable() {
        let (_root, webcam, sensor) = site();
        fs::write(sensor.join("temperature_C"), "3").unwrap();
        let err = read_snapshot(&webcam, &sensor).unwrap_err();
        assert!(matches!(err, HostError::SourceUnavailable(p) if p.ends_with("humidity")));
    }
}
