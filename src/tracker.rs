// ABOUTME: Presentation-level state machine for a single generation job
// ABOUTME: idle -> submitting -> polling -> completed | failed, driven by poller callbacks

use std::fmt;

use crate::remote::models::{GenerationStatus, JobId};

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerState {
    Idle,
    Submitting,
    Polling {
        job_id: JobId,
        last: Option<GenerationStatus>,
    },
    Completed {
        job_id: JobId,
        status: GenerationStatus,
    },
    Failed {
        job_id: Option<JobId>,
        message: String,
    },
}

impl TrackerState {
    pub fn name(&self) -> &'static str {
        match self {
            TrackerState::Idle => "idle",
            TrackerState::Submitting => "submitting",
            TrackerState::Polling { .. } => "polling",
            TrackerState::Completed { .. } => "completed",
            TrackerState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrackerState::Completed { .. } | TrackerState::Failed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerError {
    pub from: &'static str,
    pub event: &'static str,
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "cannot apply '{}' while {}", self.event, self.from)
    }
}

impl std::error::Error for TrackerError {}

/// Tracks one job at a time. A terminal state is left only via [`JobTracker::reset`].
#[derive(Debug, Clone)]
pub struct JobTracker {
    state: TrackerState,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTracker {
    pub fn new() -> Self {
        Self {
            state: TrackerState::Idle,
        }
    }

    /// Tracker for a job that was submitted elsewhere, starting in `Polling`.
    pub fn resume(job_id: JobId) -> Self {
        Self {
            state: TrackerState::Polling { job_id, last: None },
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match &self.state {
            TrackerState::Polling { job_id, .. } | TrackerState::Completed { job_id, .. } => {
                Some(job_id)
            }
            TrackerState::Failed { job_id, .. } => job_id.as_ref(),
            TrackerState::Idle | TrackerState::Submitting => None,
        }
    }

    /// Latest progress percentage known to the tracker.
    pub fn progress(&self) -> u8 {
        match &self.state {
            TrackerState::Polling {
                last: Some(status), ..
            } => status.progress,
            TrackerState::Completed { status, .. } => status.progress,
            _ => 0,
        }
    }

    fn reject(&self, event: &'static str) -> TrackerError {
        TrackerError {
            from: self.state.name(),
            event,
        }
    }

    pub fn begin_submit(&mut self) -> Result<(), TrackerError> {
        match self.state {
            TrackerState::Idle => {
                self.state = TrackerState::Submitting;
                Ok(())
            }
            _ => Err(self.reject("submit")),
        }
    }

    pub fn submitted(&mut self, job_id: JobId) -> Result<(), TrackerError> {
        match self.state {
            TrackerState::Submitting => {
                self.state = TrackerState::Polling { job_id, last: None };
                Ok(())
            }
            _ => Err(self.reject("submitted")),
        }
    }

    /// Replaces the last snapshot wholesale.
    pub fn update(&mut self, status: &GenerationStatus) -> Result<(), TrackerError> {
        match &mut self.state {
            TrackerState::Polling { last, .. } => {
                *last = Some(status.clone());
                Ok(())
            }
            _ => Err(self.reject("update")),
        }
    }

    pub fn complete(&mut self, status: GenerationStatus) -> Result<(), TrackerError> {
        match &self.state {
            TrackerState::Polling { job_id, .. } => {
                self.state = TrackerState::Completed {
                    job_id: job_id.clone(),
                    status,
                };
                Ok(())
            }
            _ => Err(self.reject("complete")),
        }
    }

    /// Submission or polling failed.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TrackerError> {
        let job_id = match &self.state {
            TrackerState::Submitting => None,
            TrackerState::Polling { job_id, .. } => Some(job_id.clone()),
            _ => return Err(self.reject("fail")),
        };
        self.state = TrackerState::Failed {
            job_id,
            message: message.into(),
        };
        Ok(())
    }

    pub fn reset(&mut self) {
        self.state = TrackerState::Idle;
    }
}
