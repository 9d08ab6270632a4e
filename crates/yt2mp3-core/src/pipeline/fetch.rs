//! Fetch stage: download the best audio stream of one video into the work dir.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

use super::{os, run_stage_tool, Artifacts, PipelineEnv, StageHost};

/// Download archive written by the fetcher; records the id of the fetched item.
pub(crate) const MANIFEST_NAME: &str = ".download-archive.txt";

/// Output template handed to the fetcher, relative to the work dir.
pub(crate) const OUTPUT_TEMPLATE: &str = "%(title)s-%(id)s.%(ext)s";

pub(crate) fn fetch_argv(fetcher: &Path, manifest: &Path, work_dir: &Path, video: &str) -> Vec<OsString> {
    vec![
        os(fetcher),
        "--ignore-errors".into(),
        "--format".into(),
        "bestaudio".into(),
        "--download-archive".into(),
        os(manifest),
        "--output".into(),
        os(&work_dir.join(OUTPUT_TEMPLATE)),
        video.into(),
    ]
}

/// Runs the fetcher and returns the path of the downloaded media file.
pub(super) fn fetch(
    video: &str,
    work_dir: &Path,
    env: &PipelineEnv,
    host: &dyn StageHost,
    artifacts: &mut Artifacts,
) -> Result<PathBuf, PipelineError> {
    let manifest = work_dir.join(MANIFEST_NAME);
    artifacts.manifest = Some(manifest.clone());

    host.log(&format!("fetching {}", video));
    run_stage_tool(host, "fetch", fetch_argv(&env.tools.fetcher, &manifest, work_dir, video))?;

    let fail = |reason: &str| PipelineError::Fetch {
        video: video.to_string(),
        reason: reason.to_string(),
    };

    if !manifest.is_file() {
        return Err(fail("download archive was not written"));
    }
    let content = fs::read_to_string(&manifest)
        .map_err(|e| PipelineError::io(format!("read {}", manifest.display()), e))?;
    let id = archived_id(&content).ok_or_else(|| fail("download archive is empty"))?;

    let mut matches = media_files_for(work_dir, id)
        .map_err(|e| PipelineError::io(format!("list {}", work_dir.display()), e))?;
    if matches.is_empty() {
        return Err(fail(&format!("no downloaded file matches id {}", id)));
    }
    matches.sort();
    if matches.len() > 1 {
        tracing::warn!(id, count = matches.len(), "several files match the fetched id, using the first");
    }
    let media = matches.swap_remove(0);
    tracing::debug!(media = %media.display(), "fetched media");
    artifacts.media = Some(media.clone());
    Ok(media)
}

/// First recorded id. Archive lines look like `<extractor> <id>`.
pub(crate) fn archived_id(content: &str) -> Option<&str> {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let first = parts.next()?;
            Some(parts.next().unwrap_or(first))
        })
        .next()
}

/// Regular files in `dir` whose stem ends with `id` (`title-<id>.<ext>`).
fn media_files_for(dir: &Path, id: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.file_name().is_some_and(|n| n == MANIFEST_NAME) {
            continue;
        }
        let matches = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| stem.ends_with(id));
        if matches {
            out.push(path);
        }
    }
    Ok(out)
}
