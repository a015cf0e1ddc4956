// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Human-readable mirror of a task's last outcome, stored in frontmatter.
///
/// The directory a task sits in is authoritative; this field only tells a
/// reader of `Done/` or `Failed/` what happened on the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "done" => Ok(TaskStatus::Done),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!(
                "invalid status: {other} (expected \"pending\", \"done\" or \"failed\")"
            )),
        }
    }
}

/// Which watch strategy the user asked for in `[watch].mode`.
///
/// - `Auto`: use filesystem events, fall back to polling if they are not
///   available (default).
/// - `Event`: require filesystem events; startup fails without them.
/// - `Poll`: always poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchPreference {
    #[default]
    Auto,
    Event,
    Poll,
}

impl FromStr for WatchPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(WatchPreference::Auto),
            "event" => Ok(WatchPreference::Event),
            "poll" => Ok(WatchPreference::Poll),
            other => Err(format!(
                "invalid watch mode: {other} (expected \"auto\", \"event\" or \"poll\")"
            )),
        }
    }
}

impl fmt::Display for WatchPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchPreference::Auto => f.write_str("auto"),
            WatchPreference::Event => f.write_str("event"),
            WatchPreference::Poll => f.write_str("poll"),
        }
    }
}

/// The strategy actually in use, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    Event,
    Poll,
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchMode::Event => f.write_str("event"),
            WatchMode::Poll => f.write_str("poll"),
        }
    }
}
