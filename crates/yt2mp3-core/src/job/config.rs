//! Per-job configuration record.

use std::path::{Path, PathBuf};

/// Extension of every audio file the pipeline produces.
pub const AUDIO_EXTENSION: &str = "mp3";

/// Default segment naming pattern: zero-padded three digit counter.
pub const DEFAULT_SEGMENT_NAME: &str = "%03d";

/// What one job converts and where the result goes.
///
/// Values are plain data; a job hands out copies and accepts edits only
/// while it is in an editable state (see `Job::edit`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    /// Video id or URL handed to the fetcher.
    pub video: String,
    /// Destination file (single output) or directory (segmented output).
    pub output: PathBuf,
    /// Split the audio into fixed-length segments.
    pub segment: bool,
    /// Segment length in seconds; must be positive when `segment` is set.
    pub segment_length: Option<u32>,
    /// Naming pattern for segments, e.g. `%03d`; the audio extension is appended if missing.
    pub segment_name: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            video: String::new(),
            output: PathBuf::new(),
            segment: false,
            segment_length: None,
            segment_name: DEFAULT_SEGMENT_NAME.to_string(),
        }
    }
}

/// Resolved segmentation parameters for a runnable config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    pub length_secs: u32,
    /// Naming pattern, normalized to end in the audio extension.
    pub pattern: String,
}

impl JobConfig {
    pub fn new(video: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            video: video.into(),
            output: output.into(),
            ..Self::default()
        }
    }

    /// Turns segmentation on with the given length and naming pattern.
    pub fn with_segments(mut self, length_secs: u32, name: impl Into<String>) -> Self {
        self.segment = true;
        self.segment_length = Some(length_secs);
        self.segment_name = name.into();
        self
    }

    /// True when every field the pipeline needs is present and valid.
    pub fn is_complete(&self) -> bool {
        if self.video.trim().is_empty() || self.output.as_os_str().is_empty() {
            return false;
        }
        !self.segment || self.segmentation().is_some()
    }

    /// Segmentation parameters, or None for single-file output.
    pub fn segmentation(&self) -> Option<Segmentation> {
        if !self.segment {
            return None;
        }
        let length_secs = self.segment_length.filter(|l| *l > 0)?;
        if self.segment_name.trim().is_empty() {
            return None;
        }
        Some(Segmentation {
            length_secs,
            pattern: with_audio_extension(&self.segment_name),
        })
    }

    /// Short label for listings: the file name of the output destination.
    pub fn display_name(&self) -> String {
        self.output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Output name derived from a video id or URL, used when none is given.
    ///
    /// `https://www.youtube.com/watch?v=abc123&t=4` → `abc123`,
    /// `https://youtu.be/abc123` → `abc123`.
    pub fn default_output_for(video: &str) -> PathBuf {
        let video = video.trim();
        let token = match video.split_once("v=") {
            Some((_, rest)) => rest.split('&').next().unwrap_or(rest),
            None => {
                let path = video.split(['?', '#']).next().unwrap_or(video);
                path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
            }
        };
        let name: String = token
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if name.is_empty() {
            PathBuf::from("audio")
        } else {
            PathBuf::from(name)
        }
    }
}

/// Appends `.mp3` unless the name already ends with it.
pub fn with_audio_extension(name: &str) -> String {
    let suffix = format!(".{}", AUDIO_EXTENSION);
    if name.ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{}{}", name, suffix)
    }
}

/// Same as `with_audio_extension` for paths (string append, not extension replace).
pub fn path_with_audio_extension(path: &Path) -> PathBuf {
    let suffix = format!(".{}", AUDIO_EXTENSION);
    if path.to_string_lossy().ends_with(&suffix) {
        return path.to_path_buf();
    }
    let mut o = path.as_os_str().to_owned();
    o.push(&suffix);
    PathBuf::from(o)
}
