use std::{fmt, io};

use crate::JobId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors which stop a batch as a whole. A failing job is not one of these, it is reported through [`crate::Outcome::Failure`]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The admission gate needs at least one slot or no job could ever run
    #[error("max concurrent jobs must be at least 1")]
    ZeroConcurrency,

    /// Not a single worker thread could be started
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: io::Error,
    },

    /// Some dispatched job never had its outcome collected, the dispatch / collect pairing is broken
    #[error("some jobs did not finish: {} of {expected} unaccounted for (missing: {})", .missing.len(), Abbreviated(.missing))]
    Incomplete { expected: usize, missing: Vec<JobId> },
}

/// Lists the first few ids only, a badly broken batch can be missing most of them
struct Abbreviated<'a>(&'a [JobId]);

impl Abbreviated<'_> {
    const SHOWN: usize = 5;
}

impl fmt::Display for Abbreviated<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, id) in self.0.iter().take(Self::SHOWN).enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", id)?;
        }
        if self.0.len() > Self::SHOWN {
            write!(f, ", ...")?;
        }
        Ok(())
    }
}
