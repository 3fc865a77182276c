use std::collections::{hash_map::Entry, HashMap};

use crossbeam_channel::Select;

use crate::{
    dispatch::OutcomePaths,
    job::{JobId, Outcome},
};

/// The outcome recorded for each job which reached a terminal state, at most one per id
#[derive(Debug, Default, Clone)]
pub struct CompletedSet {
    outcomes: HashMap<JobId, Outcome>,
}

impl CompletedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outcomes: HashMap::with_capacity(capacity),
        }
    }

    /// Record the outcome of a job. Returns `false` and keeps the first outcome if this job was already recorded
    pub fn record(&mut self, outcome: Outcome) -> bool {
        match self.outcomes.entry(outcome.id()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(outcome);
                true
            }
        }
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.outcomes.contains_key(&id)
    }

    pub fn get(&self, id: JobId) -> Option<&Outcome> {
        self.outcomes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Recorded ids, in no particular order
    pub fn ids(&self) -> impl Iterator<Item = JobId> + '_ {
        self.outcomes.keys().copied()
    }
}

/// Receive `n` outcomes from whichever path has one ready and record them
///
/// When both paths are ready the choice between them is random. Each job's outcome is sent exactly once, so `n` receives drain a batch of `n`. If every worker has gone and both paths are disconnected before `n` arrive, the outcomes gathered so far are returned and the gap is left for validation to report.
pub fn collect(paths: &OutcomePaths, n: usize) -> CompletedSet {
    let mut completed = CompletedSet::with_capacity(n);
    let mut select = Select::new();
    let success = select.recv(&paths.success);
    let failure = select.recv(&paths.failure);
    let mut open = 2;
    let mut received = 0;
    while received < n {
        if open == 0 {
            log::error!(
                "Outcome paths disconnected after {} of {} outcomes",
                received,
                n
            );
            break;
        }
        let oper = select.select();
        let index = oper.index();
        let outcome = if index == success {
            oper.recv(&paths.success).map(|id| Outcome::Success { id })
        } else {
            debug_assert_eq!(index, failure);
            oper.recv(&paths.failure).map(Outcome::from)
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(_) => {
                log::debug!("Outcome path {} disconnected", index);
                select.remove(index);
                open -= 1;
                continue;
            }
        };
        received += 1;
        if outcome.is_success() {
            log::info!("{}, recording", outcome);
        } else {
            log::warn!("Error with a job: {}", outcome);
        }
        let id = outcome.id();
        if !completed.record(outcome) {
            if let Some(first) = completed.get(id) {
                log::error!("Job {} reported more than once, keeping: {}", id, first);
            }
        }
    }
    completed
}

#[cfg(test)]
mod collect_test {
    use crossbeam_channel::bounded;

    use super::*;
    use crate::job::JobFailure;

    fn paths() -> (
        crossbeam_channel::Sender<JobId>,
        crossbeam_channel::Sender<JobFailure>,
        OutcomePaths,
    ) {
        let (success_send, success) = bounded(4);
        let (failure_send, failure) = bounded(4);
        (success_send, failure_send, OutcomePaths { success, failure })
    }

    #[test]
    fn records_from_both_paths() {
        let (success, failure, paths) = paths();
        success.send(1).unwrap();
        failure
            .send(JobFailure {
                id: 0,
                reason: "even".to_string(),
            })
            .unwrap();
        success.send(3).unwrap();
        let completed = collect(&paths, 3);
        assert_eq!(completed.len(), 3);
        assert_eq!(completed.succeeded(), 2);
        assert_eq!(completed.failed(), 1);
        assert_eq!(
            completed.get(0),
            Some(&Outcome::Failure {
                id: 0,
                reason: "even".to_string()
            })
        );
        assert_eq!(completed.get(1), Some(&Outcome::Success { id: 1 }));
    }

    #[test]
    fn zero_outcomes_receives_nothing() {
        let (success, _failure, paths) = paths();
        success.send(0).unwrap();
        let completed = collect(&paths, 0);
        assert!(completed.is_empty());
        // the queued outcome was left alone
        assert_eq!(paths.success.try_recv(), Ok(0));
    }

    #[test]
    fn stops_when_all_senders_gone() {
        let (success, failure, paths) = paths();
        success.send(2).unwrap();
        drop(success);
        drop(failure);
        let completed = collect(&paths, 5);
        assert_eq!(completed.ids().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn drains_remaining_path_after_other_disconnects() {
        let (success, failure, paths) = paths();
        drop(success);
        failure
            .send(JobFailure {
                id: 4,
                reason: "x".to_string(),
            })
            .unwrap();
        let completed = collect(&paths, 1);
        assert!(completed.contains(4));
    }

    #[test]
    fn duplicate_keeps_first() {
        let mut completed = CompletedSet::new();
        assert!(completed.record(Outcome::Success { id: 1 }));
        assert!(!completed.record(Outcome::Failure {
            id: 1,
            reason: "again".to_string()
        }));
        assert_eq!(completed.get(1), Some(&Outcome::Success { id: 1 }));
        assert_eq!(completed.len(), 1);
    }

    /// a second outcome for the same job is received and counted but not recorded
    #[test]
    fn duplicate_over_paths_is_not_recorded() {
        let (success, failure, paths) = paths();
        success.send(1).unwrap();
        failure
            .send(JobFailure {
                id: 1,
                reason: "again".to_string(),
            })
            .unwrap();
        let completed = collect(&paths, 2);
        assert_eq!(completed.len(), 1);
        assert!(completed.get(1).is_some());
        assert!(paths.success.try_recv().is_err());
        assert!(paths.failure.try_recv().is_err());
    }
}
