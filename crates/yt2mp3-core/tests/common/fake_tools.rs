//! `/bin/sh` stand-ins for the fetcher and the transcoder.
//!
//! They accept the same argument vectors as the real tools and produce the
//! files the pipeline looks for, so spawn, wait and kill run for real.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use yt2mp3_core::pipeline::PipelineEnv;
use yt2mp3_core::tools::ToolPaths;

/// Writes `title-<id>.webm` next to the output template and records the id
/// in the download archive.
pub const FETCHER: &str = r#"#!/bin/sh
archive=""; output=""; video=""
while [ $# -gt 0 ]; do
  case "$1" in
    --download-archive) archive="$2"; shift 2 ;;
    --output) output="$2"; shift 2 ;;
    --format) shift 2 ;;
    --*) shift ;;
    *) video="$1"; shift ;;
  esac
done
echo "[download] fetching $video"
dir=$(dirname "$output")
printf 'media for %s\n' "$video" > "$dir/title-$video.webm"
printf 'youtube %s\n' "$video" > "$archive"
"#;

/// Leaves an empty download archive and no media.
pub const EMPTY_ARCHIVE_FETCHER: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    --download-archive) : > "$2"; shift 2 ;;
    *) shift ;;
  esac
done
"#;

/// Hangs until killed.
pub const SLOW_FETCHER: &str = r#"#!/bin/sh
echo "[download] waiting for network"
sleep 30
exit 1
"#;

/// Copies the input to the last argument. In segment mode the last argument
/// is a printf pattern and a single segment numbered 0 is written.
pub const TRANSCODER: &str = r#"#!/bin/sh
for last; do :; done
input=""; seg=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) input="$2"; shift 2 ;;
    -segment_time) seg="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if [ -n "$seg" ]; then
  out=$(printf "$last" 0)
  cp "$input" "$out"
else
  cp "$input" "$last"
fi
"#;

/// Exits with an error without writing anything.
pub const FAILING_TRANSCODER: &str = r#"#!/bin/sh
echo "Conversion failed!" >&2
exit 1
"#;

pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Pipeline environment using the given script bodies, with temporary
/// directories under `root/work`.
pub fn env_with(root: &Path, fetcher: &str, transcoder: &str) -> PipelineEnv {
    let bin = root.join("bin");
    fs::create_dir_all(&bin).unwrap();
    let tools = ToolPaths {
        fetcher: write_script(&bin, "fetcher", fetcher),
        transcoder: write_script(&bin, "transcoder", transcoder),
    };
    let mut env = PipelineEnv::new(tools, root.join("work"));
    env.process_poll_interval = Duration::from_millis(10);
    env
}

pub fn env(root: &Path) -> PipelineEnv {
    env_with(root, FETCHER, TRANSCODER)
}

/// Entries left in the work root (missing root counts as empty).
pub fn leftover_work_dirs(env: &PipelineEnv) -> usize {
    fs::read_dir(&env.work_root).map(|d| d.count()).unwrap_or(0)
}
