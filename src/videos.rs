//! ==============================================================================
//! videos.rs - recorded video listing
//! ==============================================================================
//!
//! purpose:
//!     lists the recordings the capture job leaves in the video directory so
//!     the page can offer them as a clickable list, and resolves a single
//!     recording for playback.
//!
//! recordings are named by their start time (e.g. 2026-10-19_0600.mp4),
//! so reverse name order is newest first.
//!
//! ==============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::VideoEntry;
use crate::error::{HostError, Result};
use crate::imaging;

const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "webm"];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn is_video(path: &Path) -> bool {
    extension(path).is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
}

pub fn list_videos(dir: &Path) -> Result<Vec<VideoEntry>> {
    if !dir.is_dir() {
        return Err(HostError::SourceUnavailable(dir.to_path_buf()));
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() || !is_video(&path) {
            continue;
        }

        let (Some(file), Some(name)) = (
            path.file_name().and_then(|n| n.to_str()),
            path.file_stem().and_then(|n| n.to_str()),
        ) else {
            tracing::debug!("skipping non utf-8 file name {}", path.display());
            continue;
        };

        entries.push(VideoEntry {
            name: name.to_string(),
            file: file.to_string(),
        });
    }

    entries.sort_by(|a, b| b.file.cmp(&a.file));
    Ok(entries)
}

/// path of one recording; only names the listing would show are served
pub fn open_video(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = imaging::resolve(dir, name)?;
    if !is_video(&path) {
        return Err(HostError::PathRejected(name.to_string()));
    }
    Ok(path)
}
