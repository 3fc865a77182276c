use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
};

/// Identifies a job within a batch, jobs in a batch of `n` are numbered `0..n`
pub type JobId = usize;

/// A unit of work which the dispatcher runs once for each id in the batch
///
/// The job reports success or failure, the dispatcher turns that into an [`Outcome`] bound to the id it dispatched, so a job can't misattribute its result. Jobs run concurrently on several threads and must not touch the batch's shared state, any progress output is their own business.
pub trait Job: Send + Sync + 'static {
    type Error: fmt::Display;

    fn execute(&self, id: JobId) -> Result<(), Self::Error>;
}

impl<F, E> Job for F
where
    F: Fn(JobId) -> Result<(), E> + Send + Sync + 'static,
    E: fmt::Display,
{
    type Error = E;

    fn execute(&self, id: JobId) -> Result<(), E> {
        (self)(id)
    }
}

/// The terminal state of one job, both variants carry the id so it can be attributed whichever path delivered it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { id: JobId },
    Failure { id: JobId, reason: String },
}

impl Outcome {
    pub fn id(&self) -> JobId {
        match self {
            Outcome::Success { id } | Outcome::Failure { id, .. } => *id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

impl From<JobFailure> for Outcome {
    fn from(JobFailure { id, reason }: JobFailure) -> Self {
        Outcome::Failure { id, reason }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success { id } => write!(f, "finished job {}", id),
            Outcome::Failure { id, reason } => write!(f, "failed job {}: {}", id, reason),
        }
    }
}

/// Payload of the failure path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed job {id}: {reason}")]
pub struct JobFailure {
    pub id: JobId,
    pub reason: String,
}

/// Run `job` for `id`, always producing exactly one outcome for that id. A panic in the job becomes a failure
pub(crate) fn run<J: Job + ?Sized>(job: &J, id: JobId) -> Outcome {
    match panic::catch_unwind(AssertUnwindSafe(|| job.execute(id))) {
        Ok(Ok(())) => Outcome::Success { id },
        Ok(Err(err)) => Outcome::Failure {
            id,
            reason: err.to_string(),
        },
        Err(payload) => {
            let reason = format!("job panicked: {}", panic_message(&*payload));
            log::error!("{}: {}", id, reason);
            Outcome::Failure { id, reason }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic payload"
    }
}
