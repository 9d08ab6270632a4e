//! Transcode stage: extract the audio of the fetched media into an mp3.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::job::AUDIO_EXTENSION;

use super::{os, run_stage_tool, Artifacts, PipelineEnv, StageHost};

pub(crate) fn convert_argv(transcoder: &Path, source: &Path, quality: u8, temp_audio: &Path) -> Vec<OsString> {
    vec![
        os(transcoder),
        "-i".into(),
        os(source),
        "-q:a".into(),
        quality.to_string().into(),
        "-vn".into(),
        os(temp_audio),
    ]
}

/// `<dir>/<stem>.tmp.mp3` and `<dir>/<stem>.mp3` for a fetched media file.
pub(crate) fn audio_paths(media: &Path) -> (PathBuf, PathBuf) {
    let dir = media.parent().unwrap_or_else(|| Path::new("."));
    let stem = media
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    (
        dir.join(format!("{}.tmp.{}", stem, AUDIO_EXTENSION)),
        dir.join(format!("{}.{}", stem, AUDIO_EXTENSION)),
    )
}

/// Converts `media` and renames the result to its final name. Returns the audio path.
pub(super) fn convert(
    media: &Path,
    env: &PipelineEnv,
    host: &dyn StageHost,
    artifacts: &mut Artifacts,
) -> Result<PathBuf, PipelineError> {
    let (temp_audio, audio) = audio_paths(media);
    artifacts.temp_audio = Some(temp_audio.clone());

    host.log(&format!("converting {}", display_name(media)));
    run_stage_tool(
        host,
        "transcode",
        convert_argv(&env.tools.transcoder, media, env.audio_quality, &temp_audio),
    )?;

    if !temp_audio.is_file() {
        return Err(PipelineError::Transcode { path: temp_audio });
    }
    fs::rename(&temp_audio, &audio).map_err(|e| {
        PipelineError::io(
            format!("rename {} to {}", temp_audio.display(), audio.display()),
            e,
        )
    })?;
    artifacts.audio = Some(audio.clone());
    Ok(audio)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
