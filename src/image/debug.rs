//! Raw response dumps for post-hoc diagnosis.

use serde_json::Value;
use std::path::{Path, PathBuf};

/// Writes raw API responses as pretty JSON into a directory.
///
/// A dump that fails to write is logged and otherwise ignored: it must
/// never turn a successful generation into a failed one.
#[derive(Debug, Clone, Default)]
pub struct ResponseDumper {
    dir: Option<PathBuf>,
}

impl ResponseDumper {
    /// Dumps into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// A dumper that writes nothing.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Returns the dump directory, if enabled.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Writes `body` to `<dir>/<name>.json` and returns the path written.
    pub fn dump(&self, name: &str, body: &Value) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let path = dir.join(format!("{name}.json"));
        let result = std::fs::create_dir_all(dir).and_then(|_| {
            let text = serde_json::to_string_pretty(body).map_err(std::io::Error::other)?;
            std::fs::write(&path, text)
        });
        match result {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "saved raw response");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to save raw response: {e}");
                None
            }
        }
    }

    /// Dump name for a synchronous response, keyed by row (or time when untagged).
    pub fn response_name(row_number: Option<u32>) -> String {
        match row_number {
            Some(row) => format!("debug_response_{row}"),
            None => format!("debug_response_{}", chrono::Local::now().timestamp()),
        }
    }

    /// Dump name for one poll of an asynchronous task.
    pub fn task_name(task_id: &str, poll: u32) -> String {
        format!("task_debug_{task_id}_{poll}")
    }
}
