// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory print job registry.
//
// One mutex guards the whole map.  Every read-modify-write happens inside a
// single lock scope so concurrent submissions, status checks and cancels
// cannot lose each other's updates.  The lock is never held across an
// `.await`.  Jobs live for the lifetime of the process and are never
// removed, only moved to a terminal state.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, instrument};

use printgate_core::error::{GatewayError, Result};
use printgate_core::types::{JobId, JobStatus, PrintJob};

/// What `cancel` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was live and is now `Cancelled`.
    Cancelled,
    /// The job had already finished; nothing changed.
    AlreadyTerminal(JobStatus),
}

/// Job id → job record.
#[derive(Debug, Default)]
pub struct PrintJobRegistry {
    jobs: Mutex<HashMap<JobId, PrintJob>>,
}

impl PrintJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, PrintJob>> {
        // A panic elsewhere cannot leave a half-written job: every mutation
        // is a whole-field assignment.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a job record.
    ///
    /// A record that has reached a terminal state is final and is not
    /// replaced.
    pub fn put(&self, job: PrintJob) -> Result<()> {
        let mut jobs = self.lock();
        if let Some(existing) = jobs.get(&job.id) {
            if existing.status.is_terminal() {
                return Err(GatewayError::InvalidTransition {
                    id: job.id,
                    from: existing.status,
                    to: job.status,
                });
            }
        }
        debug!(job_id = %job.id, status = ?job.status, "job stored");
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    /// Insert a new job, refusing an id that is already tracked.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub fn register(&self, job: PrintJob) -> Result<()> {
        let mut jobs = self.lock();
        if jobs.contains_key(&job.id) {
            return Err(GatewayError::DuplicateJob(job.id));
        }
        info!(printer = %job.printer_id, "job registered");
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    pub fn get(&self, id: &JobId) -> Option<PrintJob> {
        self.lock().get(id).cloned()
    }

    /// All jobs, oldest submission first.
    pub fn list(&self) -> Vec<PrintJob> {
        let mut jobs: Vec<PrintJob> = self.lock().values().cloned().collect();
        jobs.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        jobs
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Move a job to `status`.
    ///
    /// Setting the status a job already has is a no-op. Otherwise the move
    /// must be allowed by the job state machine. Entering a terminal state
    /// stamps `completed_at`; `error_message`, when given, replaces the
    /// previous one.
    #[instrument(skip(self, error_message), fields(job_id = %id))]
    pub fn update_status(
        &self,
        id: &JobId,
        status: JobStatus,
        error_message: Option<String>,
    ) -> Result<PrintJob> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| GatewayError::JobNotFound(id.clone()))?;

        if job.status == status {
            return Ok(job.clone());
        }
        if !job.status.can_transition_to(status) {
            return Err(GatewayError::InvalidTransition {
                id: id.clone(),
                from: job.status,
                to: status,
            });
        }

        apply_status(job, status);
        if error_message.is_some() {
            job.error_message = error_message;
        }
        debug!(?status, "job status updated");
        Ok(job.clone())
    }

    /// Mark a queued job as accepted by the agent and record the agent's
    /// correlation id.
    #[instrument(skip(self), fields(job_id = %id))]
    pub fn mark_dispatched(&self, id: &JobId, agent_job_id: Option<String>) -> Result<PrintJob> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| GatewayError::JobNotFound(id.clone()))?;

        if !job.status.can_transition_to(JobStatus::Printing) {
            return Err(GatewayError::InvalidTransition {
                id: id.clone(),
                from: job.status,
                to: JobStatus::Printing,
            });
        }

        apply_status(job, JobStatus::Printing);
        job.agent_job_id = agent_job_id;
        Ok(job.clone())
    }

    /// Record the agent's correlation id without touching the status.
    pub fn set_agent_job_id(&self, id: &JobId, agent_job_id: impl Into<String>) -> Result<()> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| GatewayError::JobNotFound(id.clone()))?;
        job.agent_job_id = Some(agent_job_id.into());
        Ok(())
    }

    /// Cancel a live job. Cancelling a finished job changes nothing.
    #[instrument(skip(self), fields(job_id = %id))]
    pub fn cancel(&self, id: &JobId) -> Result<CancelOutcome> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| GatewayError::JobNotFound(id.clone()))?;

        if job.status.is_terminal() {
            debug!(status = ?job.status, "cancel ignored for finished job");
            return Ok(CancelOutcome::AlreadyTerminal(job.status));
        }

        apply_status(job, JobStatus::Cancelled);
        info!("job cancelled");
        Ok(CancelOutcome::Cancelled)
    }
}

fn apply_status(job: &mut PrintJob, status: JobStatus) {
    job.status = status;
    if status.is_terminal() {
        job.completed_at = Some(Utc::now());
    }
}
