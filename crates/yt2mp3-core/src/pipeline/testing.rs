//! In-process stand-ins for the fetcher and transcoder.

use std::cell::{Cell, RefCell};
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use crate::error::PipelineError;
use crate::process::ExitResult;
use crate::tools::ToolPaths;

use super::{PipelineEnv, StageHost};

pub(crate) const FETCHER: &str = "fake-fetcher";
pub(crate) const TRANSCODER: &str = "fake-transcoder";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fetch {
    /// Writes `title-<id>.webm` and an archive line for it.
    Ok,
    /// Writes an empty archive and no media.
    EmptyManifest,
    /// Writes nothing at all.
    Nothing,
}

pub(crate) struct FakeHost {
    pub fetch: Fetch,
    pub transcode_ok: bool,
    pub segment_ok: bool,
    /// Behave as if a stop request arrived during the n-th tool run (1-based).
    pub stop_during_call: Option<usize>,
    pub calls: RefCell<Vec<Vec<String>>>,
    pub lines: RefCell<Vec<String>>,
    pub stopped: Cell<bool>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            fetch: Fetch::Ok,
            transcode_ok: true,
            segment_ok: true,
            stop_during_call: None,
            calls: RefCell::new(Vec::new()),
            lines: RefCell::new(Vec::new()),
            stopped: Cell::new(false),
        }
    }
}

pub(crate) fn fake_env(work_root: impl Into<PathBuf>) -> PipelineEnv {
    PipelineEnv::new(
        ToolPaths {
            fetcher: PathBuf::from(FETCHER),
            transcoder: PathBuf::from(TRANSCODER),
        },
        work_root,
    )
}

fn value_after(argv: &[String], flag: &str) -> Option<String> {
    argv.iter()
        .position(|a| a == flag)
        .and_then(|i| argv.get(i + 1))
        .cloned()
}

impl FakeHost {
    /// A host whose run was stopped before the pipeline started.
    pub fn already_stopped() -> Self {
        let host = Self::default();
        host.stopped.set(true);
        host
    }

    pub fn tool_calls(&self) -> usize {
        self.calls.borrow().len()
    }

    fn simulate_fetch(&self, argv: &[String]) {
        if self.fetch == Fetch::Nothing {
            return;
        }
        let manifest = value_after(argv, "--download-archive").unwrap();
        let template = value_after(argv, "--output").unwrap();
        let video = argv.last().unwrap();
        if self.fetch == Fetch::EmptyManifest {
            fs::write(manifest, "").unwrap();
            return;
        }
        let media = template
            .replace("%(title)s", "title")
            .replace("%(id)s", video)
            .replace("%(ext)s", "webm");
        fs::write(&media, b"media").unwrap();
        fs::write(manifest, format!("youtube {}\n", video)).unwrap();
    }

    fn simulate_transcode(&self, argv: &[String]) {
        let source = value_after(argv, "-i").unwrap();
        let target = argv.last().unwrap();
        if argv.iter().any(|a| a == "segment") {
            if self.segment_ok {
                fs::copy(&source, target.replace("%03d", "000")).unwrap();
            }
        } else if self.transcode_ok {
            fs::copy(&source, target).unwrap();
        }
    }
}

impl StageHost for FakeHost {
    fn run_tool(&self, argv: &[OsString]) -> Result<ExitResult, PipelineError> {
        let argv: Vec<String> = argv.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        self.calls.borrow_mut().push(argv.clone());
        if self.stop_during_call == Some(self.tool_calls()) {
            self.stopped.set(true);
            return Ok(ExitResult {
                code: None,
                terminated: true,
            });
        }
        match argv[0].as_str() {
            FETCHER => self.simulate_fetch(&argv),
            TRANSCODER => self.simulate_transcode(&argv),
            other => panic!("unexpected tool {}", other),
        }
        Ok(ExitResult {
            code: Some(0),
            terminated: false,
        })
    }

    fn cancelled(&self) -> bool {
        self.stopped.get()
    }

    fn log(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}
