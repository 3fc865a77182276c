//! Fan out of a batch: a fixed set of named worker threads, no more than the gate's capacity, pull job ids from a shared cursor and are admitted through the [`AdmissionGate`] before each job runs
//!
//! Outcomes leave a worker on one of two independent bounded paths, successes on one and failures on the other, so a backed up success path can't hold up a failure or the other way round. A full path blocks the sending worker until the collector catches up.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    error::{Error, Result},
    gate::AdmissionGate,
    job::{self, Job, JobFailure, JobId, Outcome},
};

pub struct Dispatcher<J: Job> {
    job: Arc<J>,
    gate: AdmissionGate,
    path_capacity: usize,
}

impl<J: Job> Dispatcher<J> {
    /// `path_capacity` is the queue length of each outcome path, 0 makes every send wait for the collector
    pub fn new(job: J, gate: AdmissionGate, path_capacity: usize) -> Self {
        Self {
            job: Arc::new(job),
            gate,
            path_capacity,
        }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Start the workers for ids `0..n` and return immediately, the outcomes arrive on the returned paths
    ///
    /// `min(n, capacity)` workers are started, each runs jobs until the ids are used up. If some workers can't be spawned the ones already running take on their share, only failing to spawn any at all is an error
    pub fn dispatch(&self, n: usize) -> Result<OutcomePaths> {
        let (success_send, success) = crossbeam_channel::bounded(self.path_capacity);
        let (failure_send, failure) = crossbeam_channel::bounded(self.path_capacity);
        let cursor = Arc::new(AtomicUsize::new(0));
        let workers = n.min(self.gate.capacity());
        let mut started = 0;
        for index in 0..workers {
            let worker = Worker {
                n,
                cursor: cursor.clone(),
                job: self.job.clone(),
                gate: self.gate.clone(),
                success: success_send.clone(),
                failure: failure_send.clone(),
            };
            match thread::Builder::new()
                .name(format!("muster#{}", index))
                .spawn(move || worker.run())
            {
                Ok(_) => started += 1,
                Err(source) if started == 0 => {
                    return Err(Error::Spawn {
                        worker: index,
                        source,
                    })
                }
                Err(err) => {
                    log::warn!(
                        "Started {} of {} workers, failed to spawn more: {}",
                        started,
                        workers,
                        err
                    );
                    break;
                }
            }
        }
        log::debug!("Dispatched {} jobs to {} workers", n, started);
        Ok(OutcomePaths { success, failure })
    }
}

/// Receiving ends of the success and failure paths of one dispatched batch
///
/// Dropping this while workers are still sending makes their sends fail, which stops them
pub struct OutcomePaths {
    pub(crate) success: Receiver<JobId>,
    pub(crate) failure: Receiver<JobFailure>,
}

struct Worker<J: Job> {
    n: usize,
    cursor: Arc<AtomicUsize>,
    job: Arc<J>,
    gate: AdmissionGate,
    success: Sender<JobId>,
    failure: Sender<JobFailure>,
}

impl<J: Job> Worker<J> {
    fn run(self) {
        loop {
            let id = self.cursor.fetch_add(1, Ordering::Relaxed);
            if id >= self.n {
                return;
            }
            if !self.run_job(id) {
                log::warn!("{}: outcome not delivered, collector has gone", id);
                return;
            }
        }
    }

    /// Returns whether the outcome was handed over
    fn run_job(&self, id: JobId) -> bool {
        let _permit = self.gate.acquire();
        log::debug!(
            "{}: admitted, {} of {} slots held",
            id,
            self.gate.admitted(),
            self.gate.capacity()
        );
        // the permit is held until the outcome has been handed over
        let delivered = match job::run(&*self.job, id) {
            Outcome::Success { id } => self.success.send(id).is_ok(),
            Outcome::Failure { id, reason } => self.failure.send(JobFailure { id, reason }).is_ok(),
        };
        log::trace!("{}: releasing slot", id);
        delivered
    }
}

#[cfg(test)]
mod dispatch_test {
    use std::{collections::HashSet, num::NonZeroUsize, time::Duration};

    use super::*;

    fn gate(capacity: usize) -> AdmissionGate {
        AdmissionGate::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn outcomes_go_to_their_own_path() {
        let dispatcher = Dispatcher::new(
            |id: JobId| if id == 1 { Err("one") } else { Ok(()) },
            gate(2),
            1,
        );
        let paths = dispatcher.dispatch(2).unwrap();
        let timeout = Duration::from_secs(1);
        assert_eq!(paths.success.recv_timeout(timeout), Ok(0));
        assert_eq!(
            paths.failure.recv_timeout(timeout),
            Ok(JobFailure {
                id: 1,
                reason: "one".to_string()
            })
        );
        assert!(paths.success.recv_timeout(timeout).is_err());
        assert!(paths.failure.recv_timeout(timeout).is_err());
    }

    /// a full success path leaves the failure path free to deliver
    #[test]
    fn full_success_path_does_not_block_failures() {
        let dispatcher = Dispatcher::new(
            |id: JobId| if id < 3 { Ok(()) } else { Err("late") },
            gate(4),
            1,
        );
        let paths = dispatcher.dispatch(4).unwrap();
        let failure = paths.failure.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(failure.id, 3);
    }

    /// workers blocked on sending stop once the paths are dropped, giving their slots back
    #[test]
    fn dropping_paths_releases_blocked_workers() {
        let dispatcher = Dispatcher::new(|_: JobId| Ok::<(), String>(()), gate(2), 0);
        let paths = dispatcher.dispatch(4).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(dispatcher.gate().admitted(), 2);
        drop(paths);
        let mut waited = 0;
        while dispatcher.gate().admitted() > 0 && waited < 100 {
            std::thread::sleep(Duration::from_millis(10));
            waited += 1;
        }
        assert_eq!(dispatcher.gate().admitted(), 0);
    }

    /// jobs share at most `capacity` worker threads however many there are
    #[test]
    fn workers_bounded_by_capacity() {
        let names = Arc::new(parking_lot::Mutex::new(HashSet::new()));
        let seen = names.clone();
        let dispatcher = Dispatcher::new(
            move |_: JobId| {
                let name = thread::current().name().map(str::to_string);
                seen.lock().insert(name);
                Ok::<(), String>(())
            },
            gate(3),
            1,
        );
        let paths = dispatcher.dispatch(50).unwrap();
        let completed = crate::collect::collect(&paths, 50);
        assert_eq!(completed.len(), 50);
        let names = names.lock();
        assert!(names.len() <= 3, "{:?}", names);
        assert!(names.iter().all(|name| matches!(name, Some(n) if n.starts_with("muster#"))));
    }

    #[test]
    fn empty_batch_starts_no_workers() {
        let dispatcher = Dispatcher::new(|_: JobId| Ok::<(), String>(()), gate(3), 1);
        let paths = dispatcher.dispatch(0).unwrap();
        assert!(paths.success.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(dispatcher.gate().peak(), 0);
    }
}
