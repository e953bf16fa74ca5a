//! Processing job lifecycle: `queued → running → {success, failed}`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Check that moving from `self` to `next` is a legal lifecycle step.
    pub fn transition(self, next: JobStatus) -> Result<JobStatus, CoreError> {
        match (self, next) {
            (Self::Queued, Self::Running)
            | (Self::Running, Self::Running)
            | (Self::Running, Self::Success)
            | (Self::Running, Self::Failed) => Ok(next),
            (from, to) => Err(CoreError::InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::UnknownJobStatus(other.to_string())),
        }
    }
}

/// Job-row snapshot as surfaced by the status poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub job_id: String,
    pub division: String,
    pub meta: serde_json::Value,
    pub status: JobStatus,
    /// 0..=100
    pub progress: u8,
    pub batches_total: u32,
    pub batches_done: u32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// What a worker receives when it claims a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimedJob {
    pub job_id: String,
    pub division: String,
    pub meta: serde_json::Value,
}

/// Progress percentage for `done` of `total` scoring batches, scaled into `[lo, hi]`.
pub fn batch_progress(done: u32, total: u32, lo: u8, hi: u8) -> u8 {
    if total == 0 {
        return hi;
    }
    let span = hi.saturating_sub(lo) as u32;
    let done = done.min(total);
    lo + (span * done / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions() {
        assert_eq!(
            JobStatus::Queued.transition(JobStatus::Running).unwrap(),
            JobStatus::Running
        );
        assert!(JobStatus::Running.transition(JobStatus::Success).is_ok());
        assert!(JobStatus::Running.transition(JobStatus::Failed).is_ok());
    }

    #[test]
    fn illegal_transitions() {
        assert!(JobStatus::Queued.transition(JobStatus::Success).is_err());
        assert!(JobStatus::Success.transition(JobStatus::Running).is_err());
        assert!(JobStatus::Failed.transition(JobStatus::Queued).is_err());
    }

    #[test]
    fn status_string_roundtrip() {
        for s in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Success,
            JobStatus::Failed,
        ] {
            assert_eq!(s.as_str().parse::<JobStatus>().unwrap(), s);
        }
        assert!("paused".parse::<JobStatus>().is_err());
    }

    #[test]
    fn progress_scaling() {
        assert_eq!(batch_progress(0, 4, 10, 90), 10);
        assert_eq!(batch_progress(2, 4, 10, 90), 50);
        assert_eq!(batch_progress(4, 4, 10, 90), 90);
        assert_eq!(batch_progress(9, 4, 10, 90), 90);
        assert_eq!(batch_progress(0, 0, 10, 90), 90);
    }
}
