//! # muster
//!
//! Runs a fixed batch of independent jobs with bounded parallelism and checks that every one of them reached a terminal state exactly once.
//!
//! Jobs are run by at most `max_concurrent` worker threads, and every job has to get through an [`AdmissionGate`] before it runs, so no more than `max_concurrent` jobs execute at the same time however large the batch. Outcomes come back on two independent bounded paths, one for successes and one for failures, and a single collector drains exactly one outcome per job from whichever path is ready. Once all outcomes are in, the batch is validated: a failed job still counts as completed, only a job with no outcome at all is an error.
//!
//! __Features__
//!
//! * Admission control: a counting semaphore with RAII permits, released on every exit from a job including panics
//! * Backpressure: small bounded outcome paths block fast jobs until the collector catches up
//! * Panic containment: a panicking job is reported as a failure of that job rather than losing its outcome
//! * Completeness validation: a batch that lost an outcome fails with [`Error::Incomplete`] naming the missing ids
//!
//! ## Example
//!
//! ```rust
//! use muster::{Batch, JobId};
//!
//! let batch = Batch::builder()
//!     .jobs(4)
//!     .max_concurrent(2)
//!     .build(|id: JobId| if id % 2 == 0 { Err("even") } else { Ok(()) })
//!     .unwrap();
//! let report = batch.run().unwrap();
//! assert_eq!((report.succeeded, report.failed), (2, 2));
//! ```
use std::{fmt, marker::PhantomData, num::NonZeroUsize};

pub use collect::CompletedSet;
pub use dispatch::{Dispatcher, OutcomePaths};
pub use error::{Error, Result};
pub use gate::{AdmissionGate, Permit};
pub use job::{Job, JobFailure, JobId, Outcome};

pub mod collect;
pub mod dispatch;
mod error;
pub mod gate;
mod job;
pub mod validate;

/// Size of a batch and how it is run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of jobs, ids run from `0` to `jobs - 1`
    pub jobs: usize,
    /// Maximum number of jobs executing at once, at least 1
    pub max_concurrent: usize,
    /// Queue length of each of the success and failure paths
    pub path_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs: 100,
            max_concurrent: 5,
            path_capacity: 1,
        }
    }
}

pub struct Builder<J> {
    config: Config,
    _job: PhantomData<fn() -> J>,
}

impl<J: Job> Builder<J> {
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.config.jobs = jobs;
        self
    }

    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.config.max_concurrent = max_concurrent;
        self
    }

    pub fn path_capacity(mut self, path_capacity: usize) -> Self {
        self.config.path_capacity = path_capacity;
        self
    }

    /// Fails with [`Error::ZeroConcurrency`] if `max_concurrent` is 0
    pub fn build(self, job: J) -> Result<Batch<J>> {
        Batch::new(self.config, job)
    }
}

/// A batch of `jobs` runs of one [`Job`], ready to be run
pub struct Batch<J: Job> {
    config: Config,
    dispatcher: Dispatcher<J>,
}

impl<J: Job> Batch<J> {
    pub fn builder() -> Builder<J> {
        Builder {
            config: Config::default(),
            _job: PhantomData,
        }
    }

    pub fn new(config: Config, job: J) -> Result<Self> {
        let capacity = NonZeroUsize::new(config.max_concurrent).ok_or(Error::ZeroConcurrency)?;
        let dispatcher = Dispatcher::new(job, AdmissionGate::new(capacity), config.path_capacity);
        Ok(Self { config, dispatcher })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The gate shared by all runs of this batch, exposed for instrumentation
    pub fn gate(&self) -> &AdmissionGate {
        self.dispatcher.gate()
    }

    /// For driving dispatch and collection separately, see [`collect::collect`]
    pub fn dispatcher(&self) -> &Dispatcher<J> {
        &self.dispatcher
    }

    /// Dispatch every job, collect one outcome for each and validate that none is missing
    pub fn run(&self) -> Result<Report> {
        self.run_collecting(self.config.jobs)
    }

    /// As [`Batch::run`], but the collector stops after `count` outcomes. Collecting fewer outcomes than there are jobs makes validation fail
    pub fn run_collecting(&self, count: usize) -> Result<Report> {
        let jobs = self.config.jobs;
        let mut state = State::Dispatching;
        log::debug!(
            "{:?} {} jobs, at most {} at once",
            state,
            jobs,
            self.config.max_concurrent
        );
        let paths = self.dispatcher.dispatch(jobs)?;

        state.advance(State::Collecting);
        let completed = collect::collect(&paths, count);
        drop(paths);

        state.advance(State::Validating);
        if validate::validate(&completed, jobs) {
            state.advance(State::Done);
            Ok(Report {
                jobs,
                succeeded: completed.succeeded(),
                failed: completed.failed(),
            })
        } else {
            state.advance(State::Aborted);
            let missing = validate::missing(&completed, jobs);
            log::error!("{} of {} jobs have no outcome", missing.len(), jobs);
            Err(Error::Incomplete {
                expected: jobs,
                missing,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Dispatching,
    Collecting,
    Validating,
    Done,
    Aborted,
}

impl State {
    fn advance(&mut self, next: State) {
        log::debug!("{:?} -> {:?}", self, next);
        *self = next;
    }
}

/// Summary of a batch where every job was accounted for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub jobs: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "All {} jobs passed! ({} succeeded, {} failed)",
            self.jobs, self.succeeded, self.failed
        )
    }
}
