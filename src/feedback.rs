//! Audible feedback for task operations.

use anyhow::Result;
use serde::Serialize;
use std::io::Write;

/// Kind of feedback to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    /// A task was completed.
    Success,
    /// An operation failed.
    Error,
}

/// Fire-and-forget feedback sink.
///
/// Errors are reported to the caller, which logs them and carries on.
pub trait Feedback: Send + Sync {
    fn play(&self, kind: FeedbackKind) -> Result<()>;
}

/// Feedback sink that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentFeedback;

impl Feedback for SilentFeedback {
    fn play(&self, _kind: FeedbackKind) -> Result<()> {
        Ok(())
    }
}

/// Rings the terminal bell on stderr: once for success, twice for errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl Feedback for TerminalBell {
    fn play(&self, kind: FeedbackKind) -> Result<()> {
        let bells: &[u8] = match kind {
            FeedbackKind::Success => b"\x07",
            FeedbackKind::Error => b"\x07\x07",
        };
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(bells)?;
        stderr.flush()?;
        Ok(())
    }
}
