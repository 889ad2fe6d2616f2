/// Job executor events.
///
/// Job failures are never reported synchronously to the caller that
/// scheduled the work; these events plus the job's queryable retry and
/// dead-letter state are the only observers.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Created {
        job_id: String,
        handler_type: String,
    },
    /// A timer job fired and re-entered the execution tree.
    TimerFired {
        job_id: String,
    },
    /// A handler failed; the job stays eligible with one retry fewer.
    RetriesDecremented {
        job_id: String,
        retries: i32,
    },
    /// Retries exhausted; the job requires operator intervention.
    DeadLettered {
        job_id: String,
        exception: String,
    },
}
