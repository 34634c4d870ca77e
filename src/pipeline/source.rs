use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{error::SourceError, types::DetectionFrame};

/// Supplies one frame of hand detections per tick.
pub trait HandSource: Send + 'static {
    /// `Ok(None)` means the source is exhausted. An `Err` only spoils the
    /// current tick.
    fn next_frame(&mut self) -> Result<Option<DetectionFrame>, SourceError>;

    fn label(&self) -> &'static str;
}

/// Plays back detections recorded one JSON object per line, looping forever.
pub struct ReplaySource {
    path: PathBuf,
    lines: Vec<String>,
    cursor: usize,
}

impl ReplaySource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let text = fs::read_to_string(path).map_err(|err| SourceError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        let lines: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect();
        log::info!(
            "replaying {} recorded frames from {}",
            lines.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            lines,
            cursor: 0,
        })
    }
}

impl HandSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<DetectionFrame>, SourceError> {
        if self.lines.is_empty() {
            log::warn!("{} holds no frames", self.path.display());
            return Ok(None);
        }
        let line_no = self.cursor;
        self.cursor = (self.cursor + 1) % self.lines.len();

        serde_json::from_str(&self.lines[line_no])
            .map(Some)
            .map_err(|source| SourceError::Malformed {
                line: line_no + 1,
                source,
            })
    }

    fn label(&self) -> &'static str {
        "replay"
    }
}

/// Frames with no hands, for running without a detector attached.
pub struct IdleSource {
    width: u32,
    height: u32,
}

impl IdleSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl HandSource for IdleSource {
    fn next_frame(&mut self) -> Result<Option<DetectionFrame>, SourceError> {
        Ok(Some(DetectionFrame::empty(self.width, self.height)))
    }

    fn label(&self) -> &'static str {
        "idle"
    }
}
