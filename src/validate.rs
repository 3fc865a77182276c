use crate::{collect::CompletedSet, job::JobId};

/// `true` iff every id in `0..n` has a recorded outcome
pub fn validate(completed: &CompletedSet, n: usize) -> bool {
    (0..n).all(|id| completed.contains(id))
}

/// Ids in `0..n` with no recorded outcome, ascending
pub fn missing(completed: &CompletedSet, n: usize) -> Vec<JobId> {
    (0..n).filter(|id| !completed.contains(*id)).collect()
}

#[cfg(test)]
mod validate_test {
    use super::*;
    use crate::job::Outcome;

    fn completed(ids: &[JobId]) -> CompletedSet {
        let mut set = CompletedSet::new();
        for &id in ids {
            set.record(Outcome::Success { id });
        }
        set
    }

    #[test]
    fn empty_batch_is_complete() {
        assert!(validate(&CompletedSet::new(), 0));
        assert!(missing(&CompletedSet::new(), 0).is_empty());
    }

    #[test]
    fn all_present() {
        let set = completed(&[3, 0, 2, 1]);
        assert!(validate(&set, 4));
        assert!(validate(&set, 2));
    }

    #[test]
    fn one_missing() {
        let set = completed(&[0, 1, 3]);
        assert!(!validate(&set, 4));
        assert_eq!(missing(&set, 4), vec![2]);
    }

    /// ids outside the batch don't make up for ones missing inside it
    #[test]
    fn extra_ids_dont_count() {
        let set = completed(&[0, 1, 2, 7]);
        assert!(!validate(&set, 4));
        assert_eq!(missing(&set, 4), vec![3]);
    }

    #[test]
    fn failures_count_as_complete() {
        let mut set = completed(&[1]);
        set.record(Outcome::Failure {
            id: 0,
            reason: "even".to_string(),
        });
        assert!(validate(&set, 2));
    }
}
