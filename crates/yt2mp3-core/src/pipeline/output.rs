//! Placement decision and output stage.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::job::{path_with_audio_extension, JobConfig, AUDIO_EXTENSION};

use super::{os, run_stage_tool, PipelineEnv, StageHost};

/// Where the converted audio ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// One file; the path always ends in `.mp3`.
    File(PathBuf),
    /// Fixed-length pieces named by `pattern` inside `dir`.
    Segments {
        dir: PathBuf,
        length_secs: u32,
        pattern: String,
    },
}

impl Placement {
    /// Single file unless segmentation is configured; segment directories are
    /// created if absent.
    pub fn decide(config: &JobConfig) -> Result<Placement, PipelineError> {
        match config.segmentation() {
            None => Ok(Placement::File(path_with_audio_extension(&config.output))),
            Some(seg) => {
                let dir = config.output.clone();
                fs::create_dir_all(&dir).map_err(|e| {
                    PipelineError::io(format!("create output directory {}", dir.display()), e)
                })?;
                Ok(Placement::Segments {
                    dir,
                    length_secs: seg.length_secs,
                    pattern: seg.pattern,
                })
            }
        }
    }

    pub fn destination(&self) -> &Path {
        match self {
            Placement::File(path) => path,
            Placement::Segments { dir, .. } => dir,
        }
    }
}

pub(crate) fn segment_argv(
    transcoder: &Path,
    audio: &Path,
    length_secs: u32,
    dir: &Path,
    pattern: &str,
) -> Vec<OsString> {
    vec![
        os(transcoder),
        "-i".into(),
        os(audio),
        "-f".into(),
        "segment".into(),
        "-segment_time".into(),
        length_secs.to_string().into(),
        "-c".into(),
        "copy".into(),
        os(&dir.join(pattern)),
    ]
}

/// Moves or splits `audio` according to `placement`. Returns the destination.
pub(super) fn place(
    placement: &Placement,
    audio: &Path,
    env: &PipelineEnv,
    host: &dyn StageHost,
) -> Result<PathBuf, PipelineError> {
    match placement {
        Placement::File(dest) => {
            if audio != dest.as_path() {
                host.log(&format!("moving audio to {}", dest.display()));
                move_file(audio, dest).map_err(|e| {
                    PipelineError::io(format!("move {} to {}", audio.display(), dest.display()), e)
                })?;
            }
            Ok(dest.clone())
        }
        Placement::Segments {
            dir,
            length_secs,
            pattern,
        } => {
            host.log(&format!(
                "splitting into {}s segments as {}",
                length_secs,
                dir.join(pattern).display()
            ));
            run_stage_tool(
                host,
                "segment",
                segment_argv(&env.tools.transcoder, audio, *length_secs, dir, pattern),
            )?;
            let produced = count_audio_files(dir)
                .map_err(|e| PipelineError::io(format!("list {}", dir.display()), e))?;
            if produced == 0 {
                return Err(PipelineError::Segmentation { dir: dir.clone() });
            }
            tracing::debug!(dir = %dir.display(), produced, "segments written");
            fs::remove_file(audio)
                .map_err(|e| PipelineError::io(format!("remove {}", audio.display()), e))?;
            Ok(dir.clone())
        }
    }
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

fn count_audio_files(dir: &Path) -> io::Result<usize> {
    let mut n = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == AUDIO_EXTENSION) {
            n += 1;
        }
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_placement_enforces_extension() {
        let cfg = JobConfig::new("abc123", "out");
        assert_eq!(
            Placement::decide(&cfg).unwrap(),
            Placement::File(PathBuf::from("out.mp3"))
        );
    }

    #[test]
    fn segmented_placement_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested").join("out");
        let cfg = JobConfig::new("abc123", &out).with_segments(30, "%03d");
        let placement = Placement::decide(&cfg).unwrap();
        assert!(out.is_dir());
        assert_eq!(
            placement,
            Placement::Segments {
                dir: out.clone(),
                length_secs: 30,
                pattern: "%03d.mp3".to_string(),
            }
        );
        assert_eq!(placement.destination(), out.as_path());
    }

    #[test]
    fn segment_argv_contract() {
        let argv = segment_argv(Path::new("ffmpeg"), Path::new("/w/a.mp3"), 30, Path::new("out"), "%03d.mp3");
        let argv: Vec<String> = argv.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            argv,
            vec!["ffmpeg", "-i", "/w/a.mp3", "-f", "segment", "-segment_time", "30", "-c", "copy", "out/%03d.mp3"]
        );
    }
}
