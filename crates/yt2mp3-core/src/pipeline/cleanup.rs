//! Cleanup stage: best-effort removal of everything a run left in its work dir.

use std::fs;
use std::path::Path;

use super::{Artifacts, StageHost};

/// Removes the manifest, fetched media and audio leftovers, then the work
/// dir if it is empty. Missing files are fine; other failures are logged only.
pub(super) fn remove_artifacts(artifacts: &Artifacts, host: &dyn StageHost) {
    let files = [
        &artifacts.manifest,
        &artifacts.media,
        &artifacts.temp_audio,
        &artifacts.audio,
    ];
    for path in files.into_iter().flatten() {
        remove_file_if_present(path, host);
    }
    if let Some(dir) = &artifacts.work_dir {
        remove_dir_if_empty(dir, host);
    }
}

fn remove_file_if_present(path: &Path, host: &dyn StageHost) {
    if !path.is_file() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed"),
        Err(e) => {
            tracing::warn!(path = %path.display(), "cleanup could not remove file: {}", e);
            host.log(&format!("cleanup: could not remove {}: {}", path.display(), e));
        }
    }
}

fn remove_dir_if_empty(dir: &Path, host: &dyn StageHost) {
    let empty = match fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => return,
    };
    if !empty {
        tracing::debug!(dir = %dir.display(), "work dir not empty, keeping it");
        return;
    }
    if let Err(e) = fs::remove_dir(dir) {
        tracing::warn!(dir = %dir.display(), "cleanup could not remove work dir: {}", e);
        host.log(&format!("cleanup: could not remove {}: {}", dir.display(), e));
    }
}
