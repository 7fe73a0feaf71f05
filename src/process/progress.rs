//! Progress reporting from running processes.
//!
//! A [`ProgressSink`] is handed to [`Process::execute`](crate::Process::execute).
//! Reports go through an unbounded channel so that a process never blocks on
//! the job store; the worker drains the channel concurrently and persists
//! each update.

use procman_jobs::JobStatus;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// One progress report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Completion percentage, 0 to 100.
    pub percent: u8,
    /// Human-readable message.
    pub message: Option<String>,
    /// Status the process believes it is in. Informational; terminal status
    /// is always decided by the outcome of `execute`.
    pub status: Option<JobStatus>,
}

/// Sending half of a progress channel.
///
/// Cheap to clone. Reports sent after the receiving side is gone are
/// dropped silently.
///
/// # Examples
///
/// ```
/// use procman::process::ProgressSink;
///
/// let (sink, mut updates) = ProgressSink::channel();
/// sink.report(25, "loading").unwrap();
/// assert!(sink.report(150, "too far").is_err());
///
/// let update = updates.try_recv().unwrap();
/// assert_eq!(update.percent, 25);
/// assert_eq!(update.message.as_deref(), Some("loading"));
/// ```
#[derive(Debug, Clone)]
pub struct ProgressSink {
    sender: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ProgressSink {
    /// Creates a sink and the receiver that observes it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Reports progress with a message.
    ///
    /// # Errors
    ///
    /// [`Error::Execution`] if `percent` is above 100.
    pub fn report(&self, percent: u8, message: impl Into<String>) -> Result<()> {
        self.send(percent, Some(message.into()), None)
    }

    /// Reports progress with a message and a status hint.
    ///
    /// # Errors
    ///
    /// [`Error::Execution`] if `percent` is above 100.
    pub fn report_status(
        &self,
        percent: u8,
        message: impl Into<String>,
        status: JobStatus,
    ) -> Result<()> {
        self.send(percent, Some(message.into()), Some(status))
    }

    /// Reports `current` of `total` items as a percentage.
    ///
    /// # Errors
    ///
    /// [`Error::Execution`] if `current` exceeds `total`.
    pub fn report_count(&self, current: usize, total: usize, message: impl Into<String>) -> Result<()> {
        if current > total {
            return Err(Error::execution(format!(
                "progress count {current} exceeds total {total}"
            )));
        }
        let percent = if total == 0 {
            100
        } else {
            // Widened so large counts cannot overflow; current <= total.
            let scaled = current as u128 * 100 / total as u128;
            u8::try_from(scaled).unwrap_or(100)
        };
        self.send(percent, Some(message.into()), None)
    }

    fn send(&self, percent: u8, message: Option<String>, status: Option<JobStatus>) -> Result<()> {
        if percent > 100 {
            return Err(Error::execution(format!(
                "progress must be between 0 and 100, got {percent}"
            )));
        }
        if self
            .sender
            .send(ProgressUpdate {
                percent,
                message,
                status,
            })
            .is_err()
        {
            tracing::trace!(percent, "progress receiver gone, dropping update");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_converts_to_percent() {
        let (sink, mut rx) = ProgressSink::channel();
        sink.report_count(1, 3, "one of three").unwrap();
        sink.report_count(0, 0, "nothing to do").unwrap();
        assert_eq!(rx.try_recv().unwrap().percent, 33);
        assert_eq!(rx.try_recv().unwrap().percent, 100);
        assert!(sink.report_count(4, 3, "overflow").is_err());
    }

    #[test]
    fn huge_counts_do_not_overflow() {
        let (sink, mut rx) = ProgressSink::channel();
        sink.report_count(usize::MAX / 2, usize::MAX, "halfway").unwrap();
        sink.report_count(usize::MAX, usize::MAX, "done").unwrap();
        assert_eq!(rx.try_recv().unwrap().percent, 49);
        assert_eq!(rx.try_recv().unwrap().percent, 100);
    }

    #[test]
    fn dropped_receiver_is_not_an_error() {
        let (sink, rx) = ProgressSink::channel();
        drop(rx);
        sink.report(10, "nobody listens").unwrap();
    }

    #[test]
    fn status_hint_is_carried() {
        let (sink, mut rx) = ProgressSink::channel();
        sink.report_status(50, "halfway", JobStatus::Running).unwrap();
        assert_eq!(rx.try_recv().unwrap().status, Some(JobStatus::Running));
    }
}
